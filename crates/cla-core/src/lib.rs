//! Contact classification and scoring for radio-contest logs.
//!
//! This crate contains:
//! - Preparation: dropping unusable contacts and grouping the rest into streams
//! - Classification: labelling each contact Run, S&P or Unknown
//! - Multiplier totaling: distinct values per rule, with cumulative series
//! - Score tracing: a cumulative hourly score split between Run and non-Run

pub mod analysis;
pub mod classify;
pub mod contact;
pub mod error;
pub mod grid;
pub mod multiplier;
pub mod prepare;
pub mod rules;
pub mod score;
pub mod types;

pub use analysis::{Analyzer, HourlyActivity, LogAnalysis, LogInput};
pub use classify::{
    ClassifiedLog, ClassifierConfig, FrequencyTolerance, StreamPoint, StyleCounts,
    classify_log, classify_stream,
};
pub use contact::{Contact, OperatingStyle, Qso, StreamKey, StyleSplit};
pub use error::{AnalysisError, GridError, ScoreError};
pub use grid::{ContestPeriod, TimeBucketGrid};
pub use multiplier::{MultiplierTotals, NewMultiplier, ScopeKey, total_for_log};
pub use prepare::{DropCounts, PreparedLog, prepare_log};
pub use rules::{
    ContestRules, EligibilityFilter, MultiplierRule, ScoreFormula, ScoringVariant,
    TotalingMethod,
};
pub use score::{ScoreSnapshot, ScoreTrace, score_log};
pub use types::{Band, Callsign, Mode, ModeFamily, ValidationError};
