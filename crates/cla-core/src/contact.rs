//! Logged contacts and the labels this engine attaches to them.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::AddAssign;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Band, Callsign, Mode};

/// Multiplier value meaning "looked up, but nothing could be assigned".
///
/// Compared case-insensitively. Blank values are treated the same way.
pub const UNASSIGNED_VALUE: &str = "Unknown";

/// How the station was operating when a contact was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingStyle {
    /// Holding a frequency and answering callers.
    Run,
    /// Tuning the band and calling other stations.
    SearchAndPounce,
    /// Too little activity nearby to tell the two apart.
    Unknown,
}

impl OperatingStyle {
    /// Short label used in logs and compact renderings.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Run => "Run",
            Self::SearchAndPounce => "S&P",
            Self::Unknown => "Unknown",
        }
    }

    #[must_use]
    pub const fn is_run(self) -> bool {
        matches!(self, Self::Run)
    }
}

impl fmt::Display for OperatingStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One logged exchange as handed over by the log reader.
///
/// Timestamp and frequency are optional because readers pass through rows
/// they could not parse; the preparer drops those before classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    /// Contest-local time of the contact.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,

    /// Frequency in kHz.
    #[serde(default)]
    pub frequency_khz: Option<f64>,

    pub band: Band,
    pub mode: Mode,

    /// Operator who made the contact (multi-op logs carry several).
    pub operator: Callsign,

    /// Multiplier dimension name to resolved value, one entry per rule the
    /// contest defines. `None` or [`UNASSIGNED_VALUE`] means no value.
    #[serde(default)]
    pub multipliers: BTreeMap<String, Option<String>>,

    /// QSO points already computed by the contest's point table.
    #[serde(default)]
    pub points: u32,

    #[serde(default)]
    pub is_dupe: bool,

    /// Filled in by classification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<OperatingStyle>,
}

impl Contact {
    /// Creates a non-duplicate, zero-point contact with no multiplier values.
    pub fn new(
        timestamp: DateTime<Utc>,
        frequency_khz: f64,
        band: Band,
        mode: Mode,
        operator: Callsign,
    ) -> Self {
        Self {
            timestamp: Some(timestamp),
            frequency_khz: Some(frequency_khz),
            band,
            mode,
            operator,
            multipliers: BTreeMap::new(),
            points: 0,
            is_dupe: false,
            style: None,
        }
    }

    #[must_use]
    pub fn with_points(mut self, points: u32) -> Self {
        self.points = points;
        self
    }

    #[must_use]
    pub fn with_multiplier(mut self, dimension: &str, value: Option<&str>) -> Self {
        self.multipliers
            .insert(dimension.to_string(), value.map(String::from));
        self
    }

    #[must_use]
    pub fn as_dupe(mut self) -> Self {
        self.is_dupe = true;
        self
    }
}

/// A contact that passed preparation: timed, on a valid frequency, not a dupe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Qso {
    /// Position of the contact in the caller's original sequence.
    pub source_index: usize,
    pub timestamp: DateTime<Utc>,
    pub frequency_khz: f64,
    pub band: Band,
    pub mode: Mode,
    pub operator: Callsign,
    pub multipliers: BTreeMap<String, Option<String>>,
    pub points: u32,
    pub style: Option<OperatingStyle>,
}

impl Qso {
    /// Returns the value for a multiplier dimension, if one was assigned.
    ///
    /// Absent, blank and [`UNASSIGNED_VALUE`] values all read as `None`.
    pub fn multiplier_value(&self, dimension: &str) -> Option<&str> {
        let value = self.multipliers.get(dimension)?.as_deref()?.trim();
        if value.is_empty() || value.eq_ignore_ascii_case(UNASSIGNED_VALUE) {
            None
        } else {
            Some(value)
        }
    }

    pub fn is_run(&self) -> bool {
        self.style.is_some_and(OperatingStyle::is_run)
    }
}

/// The grouping that scopes operating-style classification.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct StreamKey {
    pub operator: Callsign,
    pub band: Band,
    pub mode: Mode,
}

impl StreamKey {
    pub fn of(qso: &Qso) -> Self {
        Self {
            operator: qso.operator.clone(),
            band: qso.band.clone(),
            mode: qso.mode.clone(),
        }
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.operator, self.band, self.mode)
    }
}

/// A quantity split between Run and everything else (S&P plus Unknown).
///
/// `run + non_run == total` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleSplit {
    pub total: u64,
    pub run: u64,
    pub non_run: u64,
}

impl StyleSplit {
    /// Adds `amount` to the side `style` belongs to.
    pub fn record(&mut self, style: Option<OperatingStyle>, amount: u64) {
        self.total += amount;
        if style.is_some_and(OperatingStyle::is_run) {
            self.run += amount;
        } else {
            self.non_run += amount;
        }
    }
}

impl AddAssign for StyleSplit {
    fn add_assign(&mut self, rhs: Self) {
        self.total += rhs.total;
        self.run += rhs.run;
        self.non_run += rhs.non_run;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_qso() -> Qso {
        Qso {
            source_index: 0,
            timestamp: Utc.with_ymd_and_hms(2025, 10, 25, 0, 0, 0).unwrap(),
            frequency_khz: 14_025.0,
            band: Band::new("20m").unwrap(),
            mode: Mode::new("CW").unwrap(),
            operator: Callsign::new("K1ABC").unwrap(),
            multipliers: BTreeMap::from([
                ("zone".to_string(), Some("5".to_string())),
                ("country".to_string(), Some("unknown".to_string())),
                ("state".to_string(), Some("  ".to_string())),
                ("prefix".to_string(), None),
            ]),
            points: 3,
            style: None,
        }
    }

    #[test]
    fn style_serde_roundtrip() {
        let json = serde_json::to_string(&OperatingStyle::SearchAndPounce).unwrap();
        assert_eq!(json, "\"search_and_pounce\"");
        let parsed: OperatingStyle = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, OperatingStyle::SearchAndPounce);
    }

    #[test]
    fn multiplier_value_filters_sentinels() {
        let qso = sample_qso();
        assert_eq!(qso.multiplier_value("zone"), Some("5"));
        assert_eq!(qso.multiplier_value("country"), None);
        assert_eq!(qso.multiplier_value("state"), None);
        assert_eq!(qso.multiplier_value("prefix"), None);
        assert_eq!(qso.multiplier_value("section"), None);
    }

    #[test]
    fn contact_deserializes_with_missing_optional_fields() {
        let json = r#"{"band": "20m", "mode": "CW", "operator": "k1abc"}"#;
        let contact: Contact = serde_json::from_str(json).unwrap();
        assert!(contact.timestamp.is_none());
        assert!(contact.frequency_khz.is_none());
        assert_eq!(contact.operator.as_str(), "K1ABC");
        assert!(!contact.is_dupe);
    }

    #[test]
    fn contact_accepts_any_mode_spelling() {
        let json = r#"{"band": "20m", "mode": "sstv", "operator": "K1ABC"}"#;
        let contact: Contact = serde_json::from_str(json).unwrap();
        assert_eq!(contact.mode.as_str(), "SSTV");
    }

    #[test]
    fn style_split_records_by_side() {
        let mut split = StyleSplit::default();
        split.record(Some(OperatingStyle::Run), 3);
        split.record(Some(OperatingStyle::SearchAndPounce), 2);
        split.record(Some(OperatingStyle::Unknown), 1);
        split.record(None, 1);
        assert_eq!(
            split,
            StyleSplit {
                total: 7,
                run: 3,
                non_run: 4
            }
        );
    }
}
