//! Classify command: labels a log's contacts without scoring them.

use std::fmt::Write;
use std::path::Path;

use anyhow::{Context, Result};
use cla_core::{
    ClassifierConfig, Contact, DropCounts, StyleCounts, classify_log, prepare_log,
};
use serde::Serialize;

use super::util::read_log;

/// A log's contacts with their labels filled in.
#[derive(Debug, Serialize)]
pub struct ClassifiedOutput {
    pub station: String,
    pub styles: StyleCounts,
    pub dropped: DropCounts,
    /// In input order. Dropped rows keep no label.
    pub contacts: Vec<Contact>,
}

/// Classifies `contacts` and copies each label back onto its input row.
pub fn label_contacts(
    contacts: &[Contact],
    config: &ClassifierConfig,
) -> (Vec<Contact>, StyleCounts, DropCounts) {
    let log = classify_log(prepare_log(contacts), config);
    let labelled = contacts
        .iter()
        .zip(log.labels_in_source_order())
        .map(|(contact, style)| Contact {
            style,
            ..contact.clone()
        })
        .collect();
    (labelled, log.style_counts(), log.dropped())
}

pub fn format_contacts(output: &ClassifiedOutput) -> String {
    let mut text = String::new();
    writeln!(text, "STATION {}", output.station).unwrap();
    writeln!(text).unwrap();

    for contact in &output.contacts {
        let time = contact.timestamp.map_or_else(
            || "-".repeat(16),
            |t| t.format("%Y-%m-%d %H:%M").to_string(),
        );
        let freq = contact
            .frequency_khz
            .map_or_else(|| "-".to_string(), |f| format!("{f:.1}"));
        let style = contact.style.map_or("dropped", |s| s.as_str());
        writeln!(
            text,
            "{time}  {freq:>9}  {:<5} {:<3} {:<10} {style}",
            contact.band.as_str(),
            contact.mode.as_str(),
            contact.operator.as_str()
        )
        .unwrap();
    }

    writeln!(text).unwrap();
    writeln!(
        text,
        "Run: {}  S&P: {}  Unknown: {}  Dropped: {}",
        output.styles.run,
        output.styles.search_and_pounce,
        output.styles.unknown,
        output.dropped.total()
    )
    .unwrap();
    text
}

pub fn run(config: &ClassifierConfig, log_path: &Path, json: bool) -> Result<()> {
    config.validate().context("invalid classifier configuration")?;
    let input = read_log(log_path)?;
    let (contacts, styles, dropped) = label_contacts(&input.contacts, config);

    let output = ClassifiedOutput {
        station: input.station.to_string(),
        styles,
        dropped,
        contacts,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print!("{}", format_contacts(&output));
    }
    Ok(())
}
