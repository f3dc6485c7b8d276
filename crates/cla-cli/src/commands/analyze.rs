//! Analyze command: classifies and scores logs against a contest's rules.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cla_core::{Analyzer, ClassifierConfig, ContestRules, LogAnalysis};
use figment::Figment;
use figment::providers::{Format, Toml};

use super::util::read_log;

/// Loads a contest rules file.
pub fn load_rules(path: &Path) -> Result<ContestRules> {
    if !path.exists() {
        anyhow::bail!("rules file not found: {}", path.display());
    }
    Figment::from(Toml::file(path))
        .extract()
        .with_context(|| format!("invalid rules file {}", path.display()))
}

pub fn format_analysis(rules: &ContestRules, results: &[LogAnalysis]) -> String {
    let mut text = String::new();
    writeln!(
        text,
        "CONTEST {} ({})",
        rules.name,
        rules.variant.as_str()
    )
    .unwrap();

    for analysis in results {
        let score = analysis.trace.final_score();
        let last = analysis.trace.snapshots.last();
        let contacts = last.map_or(0, |s| s.contacts.total);

        writeln!(text).unwrap();
        writeln!(text, "STATION {}", analysis.station).unwrap();
        writeln!(
            text,
            "  Score:       {:>8}  (Run {}, non-Run {})",
            score.total, score.run, score.non_run
        )
        .unwrap();
        writeln!(
            text,
            "  Contacts:    {:>8}  (Run {}, S&P {}, Unknown {}, dropped {})",
            contacts,
            analysis.styles.run,
            analysis.styles.search_and_pounce,
            analysis.styles.unknown,
            analysis.dropped.total()
        )
        .unwrap();
        writeln!(
            text,
            "  Multipliers: {:>8}",
            analysis.trace.final_multipliers()
        )
        .unwrap();
        for totals in &analysis.trace.rules {
            writeln!(text, "    {}: {}", totals.rule, totals.total).unwrap();
        }
    }
    text
}

pub fn run(
    config: &ClassifierConfig,
    rules_path: &Path,
    log_paths: &[PathBuf],
    json: bool,
) -> Result<()> {
    let rules = load_rules(rules_path)?;
    tracing::debug!(contest = %rules.name, logs = log_paths.len(), "loaded rules");

    let analyzer =
        Analyzer::new(config.clone(), rules).context("contest rules cannot be scored")?;

    let inputs = log_paths
        .iter()
        .map(|path| read_log(path))
        .collect::<Result<Vec<_>>>()?;
    let results = analyzer.analyze_logs(&inputs)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print!("{}", format_analysis(analyzer.rules(), &results));
    }
    Ok(())
}
