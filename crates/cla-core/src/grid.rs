//! The shared hourly grid cumulative series are aligned to.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GridError;

/// Width of one bucket in milliseconds (one hour).
pub const BUCKET_WIDTH_MS: i64 = 3_600_000;

/// A contest's declared operating period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Ordered, fixed-width time bins spanning a contest period.
///
/// Built once per contest and shared read-only by every log being compared,
/// so that all cumulative series line up bucket for bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeBucketGrid {
    start: DateTime<Utc>,
    len: usize,
}

impl TimeBucketGrid {
    /// Builds an hourly grid covering `period`. A trailing partial hour gets
    /// its own bucket.
    pub fn hourly(period: &ContestPeriod) -> Result<Self, GridError> {
        let span_ms = (period.end - period.start).num_milliseconds();
        if span_ms <= 0 {
            return Err(GridError::EmptyPeriod {
                start: period.start.to_rfc3339(),
                end: period.end.to_rfc3339(),
            });
        }
        let buckets = span_ms.div_euclid(BUCKET_WIDTH_MS)
            + i64::from(span_ms.rem_euclid(BUCKET_WIDTH_MS) != 0);
        Ok(Self {
            start: period.start,
            len: usize::try_from(buckets).unwrap_or(usize::MAX),
        })
    }

    /// Builds the grid for an optional period, failing when none is declared.
    pub fn from_period(period: Option<&ContestPeriod>) -> Result<Self, GridError> {
        period.map_or(Err(GridError::PeriodUndefined), Self::hourly)
    }

    /// Number of buckets.
    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// End of the last bucket (may extend past the declared period end).
    pub fn end(&self) -> DateTime<Utc> {
        self.bucket_start(self.len)
    }

    /// Start time of bucket `index`.
    pub fn bucket_start(&self, index: usize) -> DateTime<Utc> {
        let offset = i64::try_from(index).unwrap_or(i64::MAX / BUCKET_WIDTH_MS);
        self.start + Duration::milliseconds(offset * BUCKET_WIDTH_MS)
    }

    /// Start times of every bucket, in order.
    pub fn bucket_starts(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        (0..self.len).map(|i| self.bucket_start(i))
    }

    /// Bucket a timestamp falls in.
    ///
    /// Times before the grid land in the first bucket and times after it in
    /// the last, so the final bucket of every cumulative series equals the
    /// log's overall total.
    pub fn bucket_of(&self, timestamp: DateTime<Utc>) -> usize {
        let offset_ms = (timestamp - self.start).num_milliseconds();
        if offset_ms <= 0 {
            return 0;
        }
        let index = usize::try_from(offset_ms / BUCKET_WIDTH_MS).unwrap_or(usize::MAX);
        index.min(self.len.saturating_sub(1))
    }

    /// Whether `timestamp` lies inside the grid without clamping.
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp < self.end()
    }
}
