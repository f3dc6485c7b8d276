//! Operating-style classification.
//!
//! Labels every contact in a stream as Run, S&P or Unknown.
//!
//! # Algorithm Summary
//!
//! 1. Walk the stream in time order with a sliding window of recent contacts.
//!    A frequency becomes a run once enough contacts land on it inside the
//!    window; those contacts are relabelled Run retroactively.
//! 2. An active run ends after a long enough pause, or once the station has
//!    drifted to another frequency for several contacts in a row.
//! 3. Contacts still labelled S&P with too little activity on both sides of
//!    them are downgraded to Unknown.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::contact::{OperatingStyle, Qso};
use crate::prepare::{DropCounts, PreparedLog};
use crate::types::{Mode, ModeFamily, ValidationError};

/// Slack for float noise when comparing frequencies in kHz.
const FREQUENCY_EPSILON_KHZ: f64 = 1e-6;

/// How far apart two frequencies may be and still count as the same spot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrequencyTolerance {
    /// Tolerance for CW contacts in kHz. Default: 0.1.
    pub cw_khz: f64,
    /// Tolerance for voice contacts in kHz. Default: 0.5.
    pub phone_khz: f64,
    /// Tolerance for digital contacts in kHz. Default: 0.1.
    pub digital_khz: f64,
}

impl Default for FrequencyTolerance {
    fn default() -> Self {
        Self {
            cw_khz: 0.1,
            phone_khz: 0.5,
            digital_khz: 0.1,
        }
    }
}

impl FrequencyTolerance {
    /// Tolerance that applies to contacts made in `mode`.
    #[must_use]
    pub fn for_mode(&self, mode: &Mode) -> f64 {
        match mode.family() {
            ModeFamily::Cw => self.cw_khz,
            ModeFamily::Phone => self.phone_khz,
            ModeFamily::Digital => self.digital_khz,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (mode, value) in [
            ("cw", self.cw_khz),
            ("phone", self.phone_khz),
            ("digital", self.digital_khz),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ValidationError::InvalidTolerance { mode, value });
            }
        }
        Ok(())
    }
}

/// Configuration for operating-style classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Span in which enough contacts on one frequency make a run.
    /// Default: 601000 (10 minutes and 1 second).
    pub run_window_ms: i64,

    /// Longest pause between run contacts before the run is considered over.
    /// Default: 120000 (2 minutes).
    pub run_break_ms: i64,

    /// Contacts on one frequency needed to start a run. Default: 3.
    pub min_run_contacts: usize,

    /// Consecutive contacts on a new frequency that end a run. Default: 3.
    pub drift_limit: u32,

    /// Neighbourhood checked on each side of an S&P contact. Default: 600000 (10 minutes).
    pub activity_window_ms: i64,

    /// Contacts needed on at least one side to keep an S&P label. Default: 3.
    pub min_activity: usize,

    /// Per-mode frequency tolerance.
    pub tolerance: FrequencyTolerance,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            run_window_ms: 601_000,      // 10 minutes + 1 second
            run_break_ms: 120_000,       // 2 minutes
            min_run_contacts: 3,
            drift_limit: 3,
            activity_window_ms: 600_000, // 10 minutes
            min_activity: 3,
            tolerance: FrequencyTolerance::default(),
        }
    }
}

impl ClassifierConfig {
    /// Rejects settings the classifier cannot run with.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, positive) in [
            ("run_window_ms", self.run_window_ms > 0),
            ("run_break_ms", self.run_break_ms > 0),
            ("min_run_contacts", self.min_run_contacts > 0),
            ("drift_limit", self.drift_limit > 0),
            ("activity_window_ms", self.activity_window_ms > 0),
        ] {
            if !positive {
                return Err(ValidationError::NotPositive { field });
            }
        }
        self.tolerance.validate()
    }
}

/// The two facts the classifier needs about a contact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamPoint {
    pub timestamp: DateTime<Utc>,
    pub frequency_khz: f64,
}

impl StreamPoint {
    pub const fn of(qso: &Qso) -> Self {
        Self {
            timestamp: qso.timestamp,
            frequency_khz: qso.frequency_khz,
        }
    }
}

/// A contact held in the run-detection window.
#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    /// Position in the stream.
    index: usize,
    timestamp: DateTime<Utc>,
    frequency_khz: f64,
}

/// Tracks contacts made away from the active run frequency.
#[derive(Debug, Clone, Default)]
struct Drift {
    /// Frequency the station appears to be moving to.
    candidate_khz: Option<f64>,
    /// Consecutive off-run contacts near the candidate.
    streak: u32,
}

impl Drift {
    fn record(&mut self, frequency_khz: f64, tolerance_khz: f64) {
        match self.candidate_khz {
            Some(candidate) if same_spot(candidate, frequency_khz, tolerance_khz) => {
                self.streak += 1;
            }
            _ => {
                self.candidate_khz = Some(frequency_khz);
                self.streak = 1;
            }
        }
    }
}

/// Pass-1 state for one stream.
#[derive(Debug)]
struct RunTracker<'a> {
    config: &'a ClassifierConfig,
    tolerance_khz: f64,
    /// Frequency of the run in progress, if any.
    active_khz: Option<f64>,
    last_run_at: Option<DateTime<Utc>>,
    drift: Drift,
    window: VecDeque<WindowEntry>,
    labels: Vec<OperatingStyle>,
}

impl<'a> RunTracker<'a> {
    fn new(config: &'a ClassifierConfig, tolerance_khz: f64) -> Self {
        Self {
            config,
            tolerance_khz,
            active_khz: None,
            last_run_at: None,
            drift: Drift::default(),
            window: VecDeque::new(),
            labels: Vec::new(),
        }
    }

    /// Labels the next contact. Points must arrive in time order.
    fn observe(&mut self, point: StreamPoint) {
        let index = self.labels.len();
        self.labels.push(OperatingStyle::SearchAndPounce);

        self.window.push_back(WindowEntry {
            index,
            timestamp: point.timestamp,
            frequency_khz: point.frequency_khz,
        });
        while self.window.front().is_some_and(|oldest| {
            (point.timestamp - oldest.timestamp).num_milliseconds() > self.config.run_window_ms
        }) {
            self.window.pop_front();
        }

        if let Some(run_khz) = self.active_khz {
            let on_frequency = same_spot(run_khz, point.frequency_khz, self.tolerance_khz);
            let within_break = self.last_run_at.is_some_and(|last| {
                (point.timestamp - last).num_milliseconds() <= self.config.run_break_ms
            });

            if on_frequency && within_break {
                self.labels[index] = OperatingStyle::Run;
                self.last_run_at = Some(point.timestamp);
                self.drift = Drift::default();
                return;
            }

            if !on_frequency {
                self.drift.record(point.frequency_khz, self.tolerance_khz);
            }
            if within_break && self.drift.streak < self.config.drift_limit {
                // Still running; this one was a quick look elsewhere
                return;
            }

            tracing::trace!(
                run_khz,
                at = %point.timestamp,
                timed_out = !within_break,
                drift_streak = self.drift.streak,
                "run ended"
            );
            self.active_khz = None;
        }

        self.try_start_run(point);
    }

    /// Starts a run on the point's frequency if the window now supports one.
    fn try_start_run(&mut self, point: StreamPoint) {
        let matches: Vec<WindowEntry> = self
            .window
            .iter()
            .filter(|e| same_spot(e.frequency_khz, point.frequency_khz, self.tolerance_khz))
            .copied()
            .collect();

        let Some(qualifying) = latest_qualifying_window(
            &matches,
            self.config.min_run_contacts,
            self.config.run_window_ms,
        ) else {
            return;
        };

        for entry in qualifying {
            self.labels[entry.index] = OperatingStyle::Run;
        }
        self.active_khz = Some(point.frequency_khz);
        self.last_run_at = Some(point.timestamp);
        self.drift = Drift::default();
    }

    fn finish(self) -> Vec<OperatingStyle> {
        self.labels
    }
}

/// Finds the most recent run of at least `min_contacts` entries spanning no
/// more than `window_ms`, widened back to every earlier entry still inside
/// the window of its newest member.
///
/// `matches` must be in time order.
fn latest_qualifying_window(
    matches: &[WindowEntry],
    min_contacts: usize,
    window_ms: i64,
) -> Option<&[WindowEntry]> {
    let min_contacts = min_contacts.max(1);
    if matches.len() < min_contacts {
        return None;
    }

    for end in (min_contacts - 1..matches.len()).rev() {
        let newest = matches[end].timestamp;
        let oldest = matches[end + 1 - min_contacts].timestamp;
        if (newest - oldest).num_milliseconds() <= window_ms {
            let first = matches[..=end]
                .partition_point(|e| (newest - e.timestamp).num_milliseconds() > window_ms);
            return Some(&matches[first..=end]);
        }
    }
    None
}

fn same_spot(a_khz: f64, b_khz: f64, tolerance_khz: f64) -> bool {
    (a_khz - b_khz).abs() <= tolerance_khz + FREQUENCY_EPSILON_KHZ
}

/// Pass 2: downgrades S&P contacts with sparse surroundings to Unknown.
///
/// Neighbours sharing the contact's exact timestamp count on both sides.
/// Run labels are never touched.
fn mark_sparse_as_unknown(
    times: &[DateTime<Utc>],
    labels: &mut [OperatingStyle],
    config: &ClassifierConfig,
) {
    let window = Duration::milliseconds(config.activity_window_ms);

    for (index, label) in labels.iter_mut().enumerate() {
        if *label != OperatingStyle::SearchAndPounce {
            continue;
        }
        let t = times[index];
        let at_or_before = times.partition_point(|x| *x <= t);
        let before_window = times.partition_point(|x| *x < t - window);
        let before_t = times.partition_point(|x| *x < t);
        let within_after = times.partition_point(|x| *x <= t + window);

        // Both ranges include the contact itself
        let trailing = at_or_before - before_window - 1;
        let leading = within_after - before_t - 1;

        if trailing < config.min_activity && leading < config.min_activity {
            *label = OperatingStyle::Unknown;
        }
    }
}

/// Classifies one stream's contacts.
///
/// `points` must be in time order and belong to a single stream. Returns one
/// label per point, in the same order.
pub fn classify_stream(
    points: &[StreamPoint],
    tolerance_khz: f64,
    config: &ClassifierConfig,
) -> Vec<OperatingStyle> {
    if points.is_empty() {
        return Vec::new();
    }

    let mut tracker = RunTracker::new(config, tolerance_khz);
    for point in points {
        tracker.observe(*point);
    }
    let mut labels = tracker.finish();

    let times: Vec<_> = points.iter().map(|p| p.timestamp).collect();
    mark_sparse_as_unknown(&times, &mut labels, config);
    labels
}

/// Per-style contact counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StyleCounts {
    pub run: usize,
    pub search_and_pounce: usize,
    pub unknown: usize,
}

/// A prepared log whose contacts all carry an operating-style label.
#[derive(Debug, Clone)]
pub struct ClassifiedLog {
    log: PreparedLog,
}

impl ClassifiedLog {
    /// Classified contacts in time order.
    pub fn qsos(&self) -> &[Qso] {
        self.log.qsos()
    }

    pub const fn dropped(&self) -> DropCounts {
        self.log.dropped()
    }

    pub fn has_dimension(&self, dimension: &str) -> bool {
        self.log.has_dimension(dimension)
    }

    pub fn style_counts(&self) -> StyleCounts {
        let mut counts = StyleCounts::default();
        for qso in self.qsos() {
            match qso.style {
                Some(OperatingStyle::Run) => counts.run += 1,
                Some(OperatingStyle::SearchAndPounce) => counts.search_and_pounce += 1,
                Some(OperatingStyle::Unknown) | None => counts.unknown += 1,
            }
        }
        counts
    }

    /// One label per row originally handed to the preparer, in that order.
    /// Dropped rows read as `None`.
    pub fn labels_in_source_order(&self) -> Vec<Option<OperatingStyle>> {
        let mut labels = vec![None; self.log.source_len()];
        for qso in self.qsos() {
            labels[qso.source_index] = qso.style;
        }
        labels
    }
}

/// Classifies every stream of a prepared log independently.
pub fn classify_log(mut log: PreparedLog, config: &ClassifierConfig) -> ClassifiedLog {
    for (key, indices) in log.streams() {
        let tolerance_khz = config.tolerance.for_mode(&key.mode);
        let points: Vec<_> = indices
            .iter()
            .map(|&i| StreamPoint::of(&log.qsos()[i]))
            .collect();
        let labels = classify_stream(&points, tolerance_khz, config);

        tracing::debug!(
            stream = %key,
            contacts = labels.len(),
            run = labels.iter().filter(|l| l.is_run()).count(),
            "classified stream"
        );

        let qsos = log.qsos_mut();
        for (&i, label) in indices.iter().zip(labels) {
            qsos[i].style = Some(label);
        }
    }

    ClassifiedLog { log }
}
