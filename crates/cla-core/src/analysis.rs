//! Per-log analysis pipeline and the multi-log driver.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::classify::{ClassifiedLog, ClassifierConfig, StyleCounts, classify_log};
use crate::contact::{Contact, OperatingStyle};
use crate::error::{AnalysisError, ScoreError};
use crate::grid::TimeBucketGrid;
use crate::prepare::{DropCounts, prepare_log};
use crate::rules::ContestRules;
use crate::score::{ScoreTrace, score_log};
use crate::types::Callsign;

/// One station's log as handed to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogInput {
    pub station: Callsign,

    /// Matched against [`MultiplierRule::applies_to`](crate::MultiplierRule).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station_category: Option<String>,

    pub contacts: Vec<Contact>,
}

/// Non-cumulative activity within one grid bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HourlyActivity {
    pub bucket_start: DateTime<Utc>,
    pub run: u64,
    pub search_and_pounce: u64,
    pub unknown: u64,
    /// Count of new multipliers across all rules, unweighted.
    pub new_multipliers: u64,
}

/// Everything the engine derives from one log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogAnalysis {
    pub station: Callsign,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station_category: Option<String>,
    pub dropped: DropCounts,
    pub styles: StyleCounts,
    /// One label per input contact, in input order. `None` for dropped rows.
    pub labels: Vec<Option<OperatingStyle>>,
    pub trace: ScoreTrace,
    pub hourly: Vec<HourlyActivity>,
}

fn hourly_activity(
    log: &ClassifiedLog,
    trace: &ScoreTrace,
    grid: &TimeBucketGrid,
) -> Vec<HourlyActivity> {
    let mut hourly: Vec<HourlyActivity> = grid
        .bucket_starts()
        .map(|bucket_start| HourlyActivity {
            bucket_start,
            run: 0,
            search_and_pounce: 0,
            unknown: 0,
            new_multipliers: 0,
        })
        .collect();

    for qso in log.qsos() {
        let Some(bucket) = hourly.get_mut(grid.bucket_of(qso.timestamp)) else {
            continue;
        };
        match qso.style {
            Some(OperatingStyle::Run) => bucket.run += 1,
            Some(OperatingStyle::SearchAndPounce) => bucket.search_and_pounce += 1,
            Some(OperatingStyle::Unknown) | None => bucket.unknown += 1,
        }
    }

    // One per event, whatever weight the rule gave it.
    for new in trace.rules.iter().flat_map(|totals| &totals.new_multipliers) {
        if let Some(bucket) = hourly.get_mut(new.bucket) {
            bucket.new_multipliers += 1;
        }
    }

    hourly
}

/// Runs the full pipeline for one contest.
///
/// Holds the contest's rules and the grid every log is traced on, so that
/// all results line up bucket for bucket.
#[derive(Debug, Clone)]
pub struct Analyzer {
    config: ClassifierConfig,
    rules: ContestRules,
    grid: TimeBucketGrid,
}

impl Analyzer {
    /// Validates the configuration and builds the contest grid.
    pub fn new(config: ClassifierConfig, rules: ContestRules) -> Result<Self, AnalysisError> {
        config.validate()?;
        rules.formula()?;
        let grid = rules.grid().map_err(ScoreError::from)?;
        Ok(Self {
            config,
            rules,
            grid,
        })
    }

    /// Uses an explicit grid instead of the one derived from the contest period.
    #[must_use]
    pub fn with_grid(mut self, grid: TimeBucketGrid) -> Self {
        self.grid = grid;
        self
    }

    pub const fn grid(&self) -> &TimeBucketGrid {
        &self.grid
    }

    pub const fn rules(&self) -> &ContestRules {
        &self.rules
    }

    /// Prepares and classifies a log without scoring it.
    pub fn classify(&self, contacts: &[Contact]) -> ClassifiedLog {
        classify_log(prepare_log(contacts), &self.config)
    }

    pub fn analyze(&self, input: &LogInput) -> Result<LogAnalysis, ScoreError> {
        let log = self.classify(&input.contacts);
        let trace = score_log(
            &log,
            &self.rules,
            input.station_category.as_deref(),
            &self.grid,
        )?;
        let hourly = hourly_activity(&log, &trace, &self.grid);

        tracing::debug!(
            station = %input.station,
            contacts = input.contacts.len(),
            score = trace.final_score().total,
            "analyzed log"
        );

        Ok(LogAnalysis {
            station: input.station.clone(),
            station_category: input.station_category.clone(),
            dropped: log.dropped(),
            styles: log.style_counts(),
            labels: log.labels_in_source_order(),
            trace,
            hourly,
        })
    }

    /// Analyzes several logs in parallel. Results keep the input order.
    ///
    /// Logs share nothing but the read-only rules and grid.
    pub fn analyze_logs(&self, inputs: &[LogInput]) -> Result<Vec<LogAnalysis>, ScoreError> {
        inputs.par_iter().map(|input| self.analyze(input)).collect()
    }
}
