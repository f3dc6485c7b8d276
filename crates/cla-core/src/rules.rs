//! Contest rule descriptor: multiplier rules, score formula and scoring variant.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::contact::Qso;
use crate::error::{GridError, ScoreError};
use crate::grid::{ContestPeriod, TimeBucketGrid};
use crate::types::{Band, Mode};

/// How distinct multiplier values are deduplicated and combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TotalingMethod {
    /// Distinct per band, summed across bands.
    SumByBand,
    /// Distinct across the whole log.
    OncePerLog,
    /// Distinct per mode, summed across modes.
    OncePerMode,
    /// Distinct per band; mode is ignored even where the log has one.
    OncePerBandIgnoringMode,
}

impl TotalingMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SumByBand => "sum_by_band",
            Self::OncePerLog => "once_per_log",
            Self::OncePerMode => "once_per_mode",
            Self::OncePerBandIgnoringMode => "once_per_band_ignoring_mode",
        }
    }
}

const fn default_true() -> bool {
    true
}

/// One named multiplier the contest counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiplierRule {
    pub name: String,

    /// Key into [`Qso::multipliers`].
    pub dimension: String,

    pub totaling: TotalingMethod,

    /// Station category this rule is limited to (asymmetric contests).
    /// `None` applies to every log.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applies_to: Option<String>,

    /// Whether zero-point contacts still count toward this multiplier.
    #[serde(default = "default_true")]
    pub count_zero_point: bool,
}

impl MultiplierRule {
    /// Creates a rule that applies to every log and counts zero-point contacts.
    pub fn new(name: &str, dimension: &str, totaling: TotalingMethod) -> Self {
        Self {
            name: name.to_string(),
            dimension: dimension.to_string(),
            totaling,
            applies_to: None,
            count_zero_point: true,
        }
    }

    #[must_use]
    pub fn only_for(mut self, category: &str) -> Self {
        self.applies_to = Some(category.to_string());
        self
    }

    #[must_use]
    pub fn skip_zero_point(mut self) -> Self {
        self.count_zero_point = false;
        self
    }

    /// Whether the rule counts for a log of the given station category.
    pub fn applies_to_category(&self, category: Option<&str>) -> bool {
        self.applies_to.as_deref().is_none_or(|required| {
            category.is_some_and(|c| c.trim().eq_ignore_ascii_case(required.trim()))
        })
    }

    /// The value this contact contributes under the rule, if any.
    ///
    /// Absent and unassigned values never count; zero-point contacts count
    /// only when the rule says so.
    pub fn value_of<'q>(&self, qso: &'q Qso) -> Option<&'q str> {
        if qso.points == 0 && !self.count_zero_point {
            return None;
        }
        qso.multiplier_value(&self.dimension)
    }
}

/// How cumulative points, contacts and multipliers combine into a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreFormula {
    PointsTimesMultipliers,
    ContactsTimesMultipliers,
    PointsOnly,
}

impl ScoreFormula {
    pub const fn apply(self, contacts: u64, points: u64, multipliers: u64) -> u64 {
        match self {
            Self::PointsTimesMultipliers => points.saturating_mul(multipliers),
            Self::ContactsTimesMultipliers => contacts.saturating_mul(multipliers),
            Self::PointsOnly => points,
        }
    }

    /// Whether score is apportioned by contact count rather than points.
    pub const fn counts_contacts(self) -> bool {
        matches!(self, Self::ContactsTimesMultipliers)
    }
}

/// Selects the contacts allowed to feed multiplier totals.
///
/// Empty lists admit everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EligibilityFilter {
    pub modes: Vec<Mode>,
    pub bands: Vec<Band>,
    pub min_points: u32,
}

impl EligibilityFilter {
    pub fn admits(&self, qso: &Qso) -> bool {
        (self.modes.is_empty() || self.modes.contains(&qso.mode))
            && (self.bands.is_empty() || self.bands.contains(&qso.band))
            && qso.points >= self.min_points
    }
}

const fn default_weight() -> u32 {
    1
}

/// Contest-family specific scoring. Every variant produces the same trace shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoringVariant {
    /// Points, contacts and multipliers all come from every valid contact.
    #[default]
    Standard,

    /// Every valid contact scores, but only admitted contacts feed multipliers.
    SplitEligibility { multipliers_from: EligibilityFilter },

    /// Contacts carrying a value in `dimension` earn `bonus_points` once per
    /// distinct value, on top of their regular points.
    AuxiliaryCredit { dimension: String, bonus_points: u32 },

    /// Each new multiplier is worth the weight of the band it was first
    /// worked on.
    BandWeighted {
        weights: BTreeMap<Band, u32>,
        #[serde(default = "default_weight")]
        default_weight: u32,
    },

    /// Each contact feeds at most one of the named rules: the first, in
    /// priority order, for which it has a value. Values are deduplicated per
    /// band only.
    ExclusiveCategories { priority: Vec<String> },
}

impl ScoringVariant {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::SplitEligibility { .. } => "split_eligibility",
            Self::AuxiliaryCredit { .. } => "auxiliary_credit",
            Self::BandWeighted { .. } => "band_weighted",
            Self::ExclusiveCategories { .. } => "exclusive_categories",
        }
    }
}

/// Everything the engine needs to know about a contest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestRules {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<ContestPeriod>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_formula: Option<ScoreFormula>,

    #[serde(default)]
    pub multipliers: Vec<MultiplierRule>,

    #[serde(default)]
    pub variant: ScoringVariant,
}

impl ContestRules {
    /// Looks up a multiplier rule by name.
    pub fn rule(&self, name: &str) -> Option<&MultiplierRule> {
        self.multipliers.iter().find(|r| r.name == name)
    }

    pub fn formula(&self) -> Result<ScoreFormula, ScoreError> {
        self.score_formula.ok_or_else(|| ScoreError::MissingFormula {
            contest: self.name.clone(),
        })
    }

    /// Builds the hourly grid for the declared period.
    pub fn grid(&self) -> Result<TimeBucketGrid, GridError> {
        TimeBucketGrid::from_period(self.period.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Callsign;
    use chrono::{TimeZone, Utc};

    fn qso(points: u32, zone: Option<&str>) -> Qso {
        Qso {
            source_index: 0,
            timestamp: Utc.with_ymd_and_hms(2025, 10, 25, 0, 0, 0).unwrap(),
            frequency_khz: 14_025.0,
            band: Band::new("20m").unwrap(),
            mode: Mode::new("CW").unwrap(),
            operator: Callsign::new("K1ABC").unwrap(),
            multipliers: BTreeMap::from([("zone".to_string(), zone.map(String::from))]),
            points,
            style: None,
        }
    }

    #[test]
    fn test_zero_point_policy() {
        let counting = MultiplierRule::new("zones", "zone", TotalingMethod::SumByBand);
        let skipping = counting.clone().skip_zero_point();

        assert_eq!(counting.value_of(&qso(0, Some("5"))), Some("5"));
        assert_eq!(skipping.value_of(&qso(0, Some("5"))), None);
        assert_eq!(skipping.value_of(&qso(1, Some("5"))), Some("5"));
        assert_eq!(counting.value_of(&qso(3, Some("Unknown"))), None);
        assert_eq!(counting.value_of(&qso(3, None)), None);
    }

    #[test]
    fn test_applicability() {
        let everyone = MultiplierRule::new("zones", "zone", TotalingMethod::SumByBand);
        let dx_only = everyone.clone().only_for("DX");

        assert!(everyone.applies_to_category(None));
        assert!(everyone.applies_to_category(Some("W/VE")));
        assert!(dx_only.applies_to_category(Some("dx")));
        assert!(!dx_only.applies_to_category(Some("W/VE")));
        assert!(!dx_only.applies_to_category(None));
    }

    #[test]
    fn test_formula_apply() {
        assert_eq!(ScoreFormula::PointsTimesMultipliers.apply(10, 30, 4), 120);
        assert_eq!(ScoreFormula::ContactsTimesMultipliers.apply(10, 30, 4), 40);
        assert_eq!(ScoreFormula::PointsOnly.apply(10, 30, 4), 30);
        assert!(ScoreFormula::ContactsTimesMultipliers.counts_contacts());
        assert!(!ScoreFormula::PointsOnly.counts_contacts());
    }

    #[test]
    fn test_eligibility_filter() {
        let filter = EligibilityFilter {
            modes: vec![Mode::new("CW").unwrap()],
            bands: vec![],
            min_points: 1,
        };
        assert!(filter.admits(&qso(1, None)));
        assert!(!filter.admits(&qso(0, None)));
        assert!(EligibilityFilter::default().admits(&qso(0, None)));
    }

    #[test]
    fn test_rules_deserialize_with_defaults() {
        let json = r#"{
            "name": "CQ WW CW",
            "period": {"start": "2025-11-29T00:00:00Z", "end": "2025-12-01T00:00:00Z"},
            "score_formula": "points_times_multipliers",
            "multipliers": [
                {"name": "Zones", "dimension": "cq_zone", "totaling": "sum_by_band"},
                {"name": "Countries", "dimension": "dxcc", "totaling": "sum_by_band",
                 "count_zero_point": false}
            ]
        }"#;
        let rules: ContestRules = serde_json::from_str(json).unwrap();

        assert_eq!(rules.variant, ScoringVariant::Standard);
        assert_eq!(rules.multipliers.len(), 2);
        assert!(rules.multipliers[0].count_zero_point);
        assert!(!rules.multipliers[1].count_zero_point);
        assert_eq!(rules.grid().unwrap().len(), 48);
        assert_eq!(
            rules.formula().unwrap(),
            ScoreFormula::PointsTimesMultipliers
        );
        assert!(rules.rule("Zones").is_some());
        assert!(rules.rule("States").is_none());
    }

    #[test]
    fn test_variant_tagging() {
        let json = r#"{"kind": "band_weighted", "weights": {"80m": 4, "40m": 3}}"#;
        let variant: ScoringVariant = serde_json::from_str(json).unwrap();
        let ScoringVariant::BandWeighted {
            weights,
            default_weight,
        } = variant
        else {
            panic!("expected band_weighted");
        };
        assert_eq!(weights[&Band::new("80m").unwrap()], 4);
        assert_eq!(default_weight, 1);
    }

    #[test]
    fn test_missing_formula_and_period_are_errors() {
        let rules = ContestRules {
            name: "Sprint".to_string(),
            period: None,
            score_formula: None,
            multipliers: Vec::new(),
            variant: ScoringVariant::Standard,
        };
        assert_eq!(
            rules.formula(),
            Err(ScoreError::MissingFormula {
                contest: "Sprint".to_string()
            })
        );
        assert_eq!(rules.grid(), Err(GridError::PeriodUndefined));
    }
}
