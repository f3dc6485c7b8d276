//! Errors surfaced to callers of the scoring pipeline.
//!
//! Per-contact problems are never errors here: the preparer drops and counts
//! them. Only configuration that leaves no meaningful result is reported.

use thiserror::Error;

use crate::types::ValidationError;

/// Problems building a time bucket grid.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GridError {
    /// The contest rule descriptor declares no start/end.
    #[error("contest period is not defined")]
    PeriodUndefined,

    /// The declared period is empty or runs backwards.
    #[error("contest period must end after it starts ({start} .. {end})")]
    EmptyPeriod { start: String, end: String },
}

/// Configuration problems that make a score trace impossible.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScoreError {
    /// No score formula selected for the contest.
    #[error("contest '{contest}' has no score formula")]
    MissingFormula { contest: String },

    /// The grid could not be built from the contest period.
    #[error(transparent)]
    Grid(#[from] GridError),

    /// A scoring variant refers to a multiplier rule that is not defined.
    #[error("scoring variant refers to unknown multiplier rule '{name}'")]
    UnknownRule { name: String },
}

/// Problems setting up an [`Analyzer`](crate::Analyzer).
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid classifier configuration: {0}")]
    Config(#[from] ValidationError),

    #[error(transparent)]
    Score(#[from] ScoreError),
}
