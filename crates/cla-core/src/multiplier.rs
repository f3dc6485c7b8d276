//! Multiplier totaling.
//!
//! Counts distinct multiplier values under a rule's totaling method, both as
//! a final total and as a cumulative series over the time bucket grid.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::classify::ClassifiedLog;
use crate::contact::{OperatingStyle, Qso, StyleSplit};
use crate::grid::TimeBucketGrid;
use crate::rules::{MultiplierRule, TotalingMethod};
use crate::types::{Band, Mode};

/// The grouping a multiplier value is deduplicated within.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScopeKey {
    /// The whole log.
    Log,
    Band(Band),
    Mode(Mode),
}

impl ScopeKey {
    /// Scope a contact falls in under `method`.
    pub fn for_method(method: TotalingMethod, qso: &Qso) -> Self {
        match method {
            TotalingMethod::SumByBand | TotalingMethod::OncePerBandIgnoringMode => {
                Self::Band(qso.band.clone())
            }
            TotalingMethod::OncePerLog => Self::Log,
            TotalingMethod::OncePerMode => Self::Mode(qso.mode.clone()),
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Log => write!(f, "log"),
            Self::Band(band) => write!(f, "band:{band}"),
            Self::Mode(mode) => write!(f, "mode:{mode}"),
        }
    }
}

impl Serialize for ScopeKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// The first time a (scope, value) pair was worked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewMultiplier {
    /// Grid bucket the contact falls in.
    pub bucket: usize,
    pub timestamp: DateTime<Utc>,
    pub scope: ScopeKey,
    pub value: String,
    /// Band of the contact that produced it, whatever the scope.
    pub band: Band,
    /// Style of the contact that produced it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<OperatingStyle>,
}

/// Running distinct-value sets for one rule over one log.
///
/// Contacts must be observed in time order. A fresh tally is created for
/// every log; nothing is shared between logs.
#[derive(Debug, Clone, Default)]
pub struct MultiplierTally {
    seen: BTreeMap<ScopeKey, BTreeSet<String>>,
    new_multipliers: Vec<NewMultiplier>,
}

impl MultiplierTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `value` for `qso` within `scope`. Returns whether it was new.
    pub fn observe(
        &mut self,
        scope: ScopeKey,
        value: &str,
        qso: &Qso,
        grid: &TimeBucketGrid,
    ) -> bool {
        let values = self.seen.entry(scope.clone()).or_default();
        if values.contains(value) {
            return false;
        }
        values.insert(value.to_string());
        self.new_multipliers.push(NewMultiplier {
            bucket: grid.bucket_of(qso.timestamp),
            timestamp: qso.timestamp,
            scope,
            value: value.to_string(),
            band: qso.band.clone(),
            style: qso.style,
        });
        true
    }

    /// Distinct (scope, value) pairs seen so far.
    pub fn distinct(&self) -> u64 {
        self.seen.values().map(|v| v.len() as u64).sum()
    }

    /// Closes the tally into totals, weighting each new multiplier.
    pub fn finish(
        self,
        rule: &str,
        grid: &TimeBucketGrid,
        weight: impl Fn(&NewMultiplier) -> u64,
    ) -> MultiplierTotals {
        let mut per_bucket = vec![StyleSplit::default(); grid.len()];
        let mut per_scope: BTreeMap<ScopeKey, u64> = BTreeMap::new();
        let mut total = 0;

        for new in &self.new_multipliers {
            let w = weight(new);
            total += w;
            *per_scope.entry(new.scope.clone()).or_insert(0) += w;
            if let Some(bucket) = per_bucket.get_mut(new.bucket) {
                bucket.record(new.style, w);
            }
        }

        MultiplierTotals {
            rule: rule.to_string(),
            total,
            per_scope,
            cumulative: accumulate(per_bucket),
            new_multipliers: self.new_multipliers,
        }
    }
}

/// Running sums of per-bucket splits.
pub(crate) fn accumulate(per_bucket: Vec<StyleSplit>) -> Vec<StyleSplit> {
    let mut running = StyleSplit::default();
    per_bucket
        .into_iter()
        .map(|bucket| {
            running += bucket;
            running
        })
        .collect()
}

/// Final and cumulative totals for one multiplier rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MultiplierTotals {
    pub rule: String,

    /// Final count under the rule's totaling method.
    pub total: u64,

    /// Final count within each scope.
    pub per_scope: BTreeMap<ScopeKey, u64>,

    /// Cumulative count at the end of each grid bucket, split by the style
    /// of the contact that first produced each multiplier. Non-decreasing.
    pub cumulative: Vec<StyleSplit>,

    /// Every first-time (scope, value) pair, in time order.
    pub new_multipliers: Vec<NewMultiplier>,
}

impl MultiplierTotals {
    /// Totals for a rule that contributes nothing.
    pub fn empty(rule: &str, grid: &TimeBucketGrid) -> Self {
        Self {
            rule: rule.to_string(),
            total: 0,
            per_scope: BTreeMap::new(),
            cumulative: vec![StyleSplit::default(); grid.len()],
            new_multipliers: Vec::new(),
        }
    }

    /// Cumulative total at the end of each bucket.
    pub fn series(&self) -> Vec<u64> {
        self.cumulative.iter().map(|s| s.total).collect()
    }

    /// How many multipliers were new in each bucket.
    pub fn new_per_bucket(&self) -> Vec<u64> {
        let mut previous = 0;
        self.cumulative
            .iter()
            .map(|s| {
                let new = s.total - previous;
                previous = s.total;
                new
            })
            .collect()
    }
}

/// Totals one rule over time-ordered contacts.
pub fn total_multipliers<'a>(
    qsos: impl IntoIterator<Item = &'a Qso>,
    rule: &MultiplierRule,
    grid: &TimeBucketGrid,
) -> MultiplierTotals {
    let mut tally = MultiplierTally::new();
    for qso in qsos {
        if let Some(value) = rule.value_of(qso) {
            tally.observe(ScopeKey::for_method(rule.totaling, qso), value, qso, grid);
        }
    }
    tally.finish(&rule.name, grid, |_| 1)
}

/// Totals one rule over a classified log.
///
/// A rule whose dimension no contact in the log carries contributes zero.
pub fn total_for_log(
    log: &ClassifiedLog,
    rule: &MultiplierRule,
    grid: &TimeBucketGrid,
) -> MultiplierTotals {
    if !log.has_dimension(&rule.dimension) {
        tracing::debug!(
            rule = %rule.name,
            dimension = %rule.dimension,
            "dimension absent from log, rule contributes zero"
        );
        return MultiplierTotals::empty(&rule.name, grid);
    }

    let totals = total_multipliers(log.qsos(), rule, grid);
    tracing::debug!(
        rule = %rule.name,
        method = rule.totaling.as_str(),
        total = totals.total,
        "totaled multiplier rule"
    );
    totals
}
