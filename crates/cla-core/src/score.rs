//! Time-series score calculation.
//!
//! Turns a classified log into a cumulative score trace over the contest's
//! hourly grid, split between Run and non-Run at every bucket.
//!
//! # Algorithm Summary
//!
//! 1. Sum contacts and points into their buckets, by style.
//! 2. Total every applicable multiplier rule over the grid. The contest's
//!    scoring variant decides which contacts feed which rule and how each new
//!    multiplier is weighted.
//! 3. Accumulate, apply the score formula per bucket, then apportion the
//!    score in proportion to the Run share of the formula's basis.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::classify::ClassifiedLog;
use crate::contact::{Qso, StyleSplit};
use crate::error::ScoreError;
use crate::grid::TimeBucketGrid;
use crate::multiplier::{
    MultiplierTally, MultiplierTotals, ScopeKey, accumulate, total_for_log, total_multipliers,
};
use crate::rules::{
    ContestRules, EligibilityFilter, MultiplierRule, ScoreFormula, ScoringVariant,
};
use crate::types::Band;

/// Cumulative standing at the end of one grid bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreSnapshot {
    pub bucket_start: DateTime<Utc>,
    pub contacts: StyleSplit,
    /// Includes any auxiliary credit.
    pub points: StyleSplit,
    /// Split by the style of the contact that first produced each multiplier.
    pub multipliers: StyleSplit,
    /// Total from the score formula, apportioned by the formula's basis.
    pub score: StyleSplit,
    /// Cumulative count per multiplier rule.
    pub per_rule: BTreeMap<String, u64>,
}

/// A log's full score trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreTrace {
    pub formula: ScoreFormula,
    pub variant: &'static str,
    /// One snapshot per grid bucket, in time order.
    pub snapshots: Vec<ScoreSnapshot>,
    /// Totals for every rule the contest defines, in declaration order.
    /// Rules that do not apply to the log are present with zero totals.
    pub rules: Vec<MultiplierTotals>,
}

impl ScoreTrace {
    /// The final bucket's score, which is the log's claimed score.
    pub fn final_score(&self) -> StyleSplit {
        self.snapshots.last().map(|s| s.score).unwrap_or_default()
    }

    pub fn final_multipliers(&self) -> u64 {
        self.snapshots.last().map_or(0, |s| s.multipliers.total)
    }
}

/// Splits `total` between Run and non-Run in the ratio `run_basis : basis`.
///
/// Rounds the Run side to the nearest integer; non-Run takes the remainder.
/// A zero basis yields an empty split, so `run + non_run == total` holds
/// for every input.
pub fn apportion(total: u64, run_basis: u64, basis: u64) -> StyleSplit {
    if basis == 0 {
        return StyleSplit::default();
    }
    let scaled = (u128::from(total) * u128::from(run_basis.min(basis)) + u128::from(basis) / 2)
        / u128::from(basis);
    let run = u64::try_from(scaled).unwrap_or(total).min(total);
    StyleSplit {
        total,
        run,
        non_run: total - run,
    }
}

/// Whether a rule can contribute anything for this log at all.
fn rule_is_live(log: &ClassifiedLog, rule: &MultiplierRule, category: Option<&str>) -> bool {
    if !rule.applies_to_category(category) {
        tracing::debug!(
            rule = %rule.name,
            applies_to = rule.applies_to.as_deref().unwrap_or_default(),
            "rule does not apply to station category"
        );
        return false;
    }
    log.has_dimension(&rule.dimension)
}

fn standard_totals(
    log: &ClassifiedLog,
    rules: &[MultiplierRule],
    category: Option<&str>,
    grid: &TimeBucketGrid,
) -> Vec<MultiplierTotals> {
    rules
        .iter()
        .map(|rule| {
            if rule.applies_to_category(category) {
                total_for_log(log, rule, grid)
            } else {
                MultiplierTotals::empty(&rule.name, grid)
            }
        })
        .collect()
}

fn split_eligibility_totals(
    log: &ClassifiedLog,
    rules: &[MultiplierRule],
    category: Option<&str>,
    grid: &TimeBucketGrid,
    filter: &EligibilityFilter,
) -> Vec<MultiplierTotals> {
    rules
        .iter()
        .map(|rule| {
            if rule_is_live(log, rule, category) {
                total_multipliers(log.qsos().iter().filter(|q| filter.admits(q)), rule, grid)
            } else {
                MultiplierTotals::empty(&rule.name, grid)
            }
        })
        .collect()
}

fn band_weighted_totals(
    log: &ClassifiedLog,
    rules: &[MultiplierRule],
    category: Option<&str>,
    grid: &TimeBucketGrid,
    weights: &BTreeMap<Band, u32>,
    default_weight: u32,
) -> Vec<MultiplierTotals> {
    let weight_of = |band: &Band| u64::from(weights.get(band).copied().unwrap_or(default_weight));

    rules
        .iter()
        .map(|rule| {
            if !rule_is_live(log, rule, category) {
                return MultiplierTotals::empty(&rule.name, grid);
            }
            let mut tally = MultiplierTally::new();
            for qso in log.qsos() {
                if let Some(value) = rule.value_of(qso) {
                    tally.observe(ScopeKey::for_method(rule.totaling, qso), value, qso, grid);
                }
            }
            tally.finish(&rule.name, grid, |new| weight_of(&new.band))
        })
        .collect()
}

fn exclusive_totals(
    log: &ClassifiedLog,
    rules: &[MultiplierRule],
    category: Option<&str>,
    grid: &TimeBucketGrid,
    priority: &[String],
) -> Result<Vec<MultiplierTotals>, ScoreError> {
    let mut ranked = Vec::with_capacity(priority.len());
    for name in priority {
        let index = rules
            .iter()
            .position(|r| &r.name == name)
            .ok_or_else(|| ScoreError::UnknownRule { name: name.clone() })?;
        ranked.push(index);
    }

    let live: Vec<usize> = ranked
        .iter()
        .copied()
        .filter(|&i| rule_is_live(log, &rules[i], category))
        .collect();
    let mut tallies: BTreeMap<usize, MultiplierTally> = BTreeMap::new();

    for qso in log.qsos() {
        let claimed = live
            .iter()
            .find_map(|&i| rules[i].value_of(qso).map(|value| (i, value)));
        if let Some((i, value)) = claimed {
            tallies
                .entry(i)
                .or_default()
                .observe(ScopeKey::Band(qso.band.clone()), value, qso, grid);
        }
    }

    let exclusive: BTreeSet<usize> = ranked.into_iter().collect();
    Ok(rules
        .iter()
        .enumerate()
        .map(|(i, rule)| match tallies.remove(&i) {
            Some(tally) => tally.finish(&rule.name, grid, |_| 1),
            None if exclusive.contains(&i) => MultiplierTotals::empty(&rule.name, grid),
            None if rule.applies_to_category(category) => total_for_log(log, rule, grid),
            None => MultiplierTotals::empty(&rule.name, grid),
        })
        .collect())
}

/// Per-bucket contact and point sums, before accumulation.
fn bucket_activity(
    qsos: &[Qso],
    grid: &TimeBucketGrid,
    variant: &ScoringVariant,
) -> (Vec<StyleSplit>, Vec<StyleSplit>) {
    let mut contacts = vec![StyleSplit::default(); grid.len()];
    let mut points = vec![StyleSplit::default(); grid.len()];
    let mut credited: BTreeSet<&str> = BTreeSet::new();

    for qso in qsos {
        let bucket = grid.bucket_of(qso.timestamp);
        let mut earned = u64::from(qso.points);
        if let ScoringVariant::AuxiliaryCredit {
            dimension,
            bonus_points,
        } = variant
        {
            if qso.multiplier_value(dimension).is_some_and(|v| credited.insert(v)) {
                earned += u64::from(*bonus_points);
            }
        }

        if let (Some(c), Some(p)) = (contacts.get_mut(bucket), points.get_mut(bucket)) {
            c.record(qso.style, 1);
            p.record(qso.style, earned);
        }
    }

    (contacts, points)
}

/// Computes the cumulative score trace for one classified log.
///
/// `category` is the log's station category, matched against each rule's
/// `applies_to`. Fails only when the contest lacks a score formula or a
/// scoring variant names an undefined rule.
pub fn score_log(
    log: &ClassifiedLog,
    rules: &ContestRules,
    category: Option<&str>,
    grid: &TimeBucketGrid,
) -> Result<ScoreTrace, ScoreError> {
    let formula = rules.formula()?;
    let defined = rules.multipliers.as_slice();

    let totals = match &rules.variant {
        ScoringVariant::Standard | ScoringVariant::AuxiliaryCredit { .. } => {
            standard_totals(log, defined, category, grid)
        }
        ScoringVariant::SplitEligibility { multipliers_from } => {
            split_eligibility_totals(log, defined, category, grid, multipliers_from)
        }
        ScoringVariant::BandWeighted {
            weights,
            default_weight,
        } => band_weighted_totals(log, defined, category, grid, weights, *default_weight),
        ScoringVariant::ExclusiveCategories { priority } => {
            exclusive_totals(log, defined, category, grid, priority)?
        }
    };

    let (contacts, points) = bucket_activity(log.qsos(), grid, &rules.variant);
    let contacts = accumulate(contacts);
    let points = accumulate(points);

    let snapshots = grid
        .bucket_starts()
        .enumerate()
        .map(|(i, bucket_start)| {
            let mut multipliers = StyleSplit::default();
            let mut per_rule = BTreeMap::new();
            for rule in &totals {
                let at = rule.cumulative.get(i).copied().unwrap_or_default();
                multipliers += at;
                per_rule.insert(rule.rule.clone(), at.total);
            }

            let total = formula.apply(contacts[i].total, points[i].total, multipliers.total);
            let basis = if formula.counts_contacts() {
                contacts[i]
            } else {
                points[i]
            };

            ScoreSnapshot {
                bucket_start,
                contacts: contacts[i],
                points: points[i],
                multipliers,
                score: apportion(total, basis.run, basis.total),
                per_rule,
            }
        })
        .collect::<Vec<_>>();

    let trace = ScoreTrace {
        formula,
        variant: rules.variant.as_str(),
        snapshots,
        rules: totals,
    };
    tracing::debug!(
        contest = %rules.name,
        variant = trace.variant,
        score = trace.final_score().total,
        multipliers = trace.final_multipliers(),
        "scored log"
    );
    Ok(trace)
}
