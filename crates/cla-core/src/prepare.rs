//! Contact stream preparation.
//!
//! Filters out rows the engine cannot use, orders the rest by time and
//! groups them into independent classification streams.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::contact::{Contact, Qso, StreamKey};

/// How many input rows were dropped, by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DropCounts {
    /// Rows with no usable timestamp.
    pub missing_timestamp: usize,
    /// Rows with no frequency, or one that is not a positive finite number.
    pub invalid_frequency: usize,
    /// Rows flagged as duplicates by the log checker.
    pub duplicate: usize,
}

impl DropCounts {
    pub const fn total(&self) -> usize {
        self.missing_timestamp + self.invalid_frequency + self.duplicate
    }
}

/// A log's valid contacts, sorted by time.
#[derive(Debug, Clone)]
pub struct PreparedLog {
    qsos: Vec<Qso>,
    dropped: DropCounts,
    source_len: usize,
    schema: BTreeSet<String>,
}

impl PreparedLog {
    /// Valid contacts in time order. Contacts sharing a timestamp keep their
    /// original relative order.
    pub fn qsos(&self) -> &[Qso] {
        &self.qsos
    }

    pub(crate) fn qsos_mut(&mut self) -> &mut [Qso] {
        &mut self.qsos
    }

    pub const fn dropped(&self) -> DropCounts {
        self.dropped
    }

    /// Number of rows handed to [`prepare_log`], valid or not.
    pub const fn source_len(&self) -> usize {
        self.source_len
    }

    pub fn len(&self) -> usize {
        self.qsos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.qsos.is_empty()
    }

    /// Whether any input row carried the multiplier dimension at all.
    pub fn has_dimension(&self, dimension: &str) -> bool {
        self.schema.contains(dimension)
    }

    /// Multiplier dimension names seen across the input rows.
    pub const fn schema(&self) -> &BTreeSet<String> {
        &self.schema
    }

    /// Groups contacts into classification streams.
    ///
    /// Values are indices into [`Self::qsos`], in time order. Streams are
    /// keyed in a deterministic order.
    pub fn streams(&self) -> BTreeMap<StreamKey, Vec<usize>> {
        let mut streams: BTreeMap<StreamKey, Vec<usize>> = BTreeMap::new();
        for (index, qso) in self.qsos.iter().enumerate() {
            streams.entry(StreamKey::of(qso)).or_default().push(index);
        }
        streams
    }
}

/// Prepares a log for classification and scoring.
///
/// Duplicates and rows without a timestamp or a usable frequency are dropped
/// and counted, never reported as errors.
pub fn prepare_log(contacts: &[Contact]) -> PreparedLog {
    let mut qsos = Vec::with_capacity(contacts.len());
    let mut dropped = DropCounts::default();
    let mut schema = BTreeSet::new();

    for (source_index, contact) in contacts.iter().enumerate() {
        schema.extend(contact.multipliers.keys().cloned());

        if contact.is_dupe {
            dropped.duplicate += 1;
            continue;
        }
        let Some(timestamp) = contact.timestamp else {
            dropped.missing_timestamp += 1;
            continue;
        };
        let Some(frequency_khz) = contact
            .frequency_khz
            .filter(|f| f.is_finite() && *f > 0.0)
        else {
            dropped.invalid_frequency += 1;
            continue;
        };

        qsos.push(Qso {
            source_index,
            timestamp,
            frequency_khz,
            band: contact.band.clone(),
            mode: contact.mode.clone(),
            operator: contact.operator.clone(),
            multipliers: contact.multipliers.clone(),
            points: contact.points,
            style: None,
        });
    }

    // Stable sort: equal timestamps keep log order
    qsos.sort_by_key(|q| q.timestamp);

    if dropped.missing_timestamp + dropped.invalid_frequency > 0 {
        tracing::warn!(
            missing_timestamp = dropped.missing_timestamp,
            invalid_frequency = dropped.invalid_frequency,
            "dropped contacts without a usable timestamp or frequency"
        );
    }
    tracing::debug!(
        kept = qsos.len(),
        duplicates = dropped.duplicate,
        "prepared log"
    );

    PreparedLog {
        qsos,
        dropped,
        source_len: contacts.len(),
        schema,
    }
}
