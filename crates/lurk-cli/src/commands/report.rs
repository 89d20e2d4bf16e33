//! Report command: rank idlers and talkers from a state file.
//!
//! Shared records (one identity, several nicks) are listed once under their
//! most used nick. Records last seen before the retention cutoff are left out.

use std::cmp::Ordering;
use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDateTime};
use lurk_core::{Aggregator, Bucket, SessionRecord};
use serde::Serialize;

use crate::Config;

/// How idle a participant has been, compared descending.
#[derive(Debug, Clone, Copy, PartialEq)]
struct IdlerKey {
    /// Only ever present in silent visits.
    said_nothing: bool,
    /// Only silent or one-line visits.
    said_not_much: bool,
    /// Quiet time minus chatty time, in seconds.
    adjusted_idle: f64,
}

impl IdlerKey {
    fn of(record: &SessionRecord) -> Self {
        let g = |bucket| record.bucket_seconds(bucket);
        let has = |bucket| g(bucket) > 0.0;
        let chatty = has(Bucket::Ten) || has(Bucket::Hundred) || has(Bucket::Unbounded);
        Self {
            said_nothing: has(Bucket::Zero) && !has(Bucket::One) && !chatty,
            said_not_much: (has(Bucket::Zero) || has(Bucket::One)) && !chatty,
            adjusted_idle: g(Bucket::Zero) + g(Bucket::One)
                - g(Bucket::Hundred)
                - g(Bucket::Unbounded),
        }
    }

    fn rank(&self, other: &Self) -> Ordering {
        self.said_nothing
            .cmp(&other.said_nothing)
            .then(self.said_not_much.cmp(&other.said_not_much))
            .then(self.adjusted_idle.total_cmp(&other.adjusted_idle))
    }
}

/// A talker and their efficiency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Talker {
    pub name: String,
    pub total_lines: u64,
    pub efficiency: f64,
}

/// Computed report sections, each already ranked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportData {
    pub said_nothing: Vec<String>,
    pub said_almost_nothing: Vec<String>,
    pub idle_exceeds_active: Vec<String>,
    pub most_talkative: Vec<Talker>,
}

/// Builds the report sections for records seen within `retention_days` of `now`.
pub fn generate_report_data(
    state: &Aggregator,
    now: NaiveDateTime,
    retention_days: i64,
) -> ReportData {
    let cutoff = now - Duration::days(retention_days);
    let kept: Vec<(String, &SessionRecord)> = state
        .records()
        .filter(|(_, r)| r.last_in_at.is_some_and(|t| t >= cutoff))
        .filter_map(|(_, r)| r.primary_alias().map(|n| (n.to_string(), r)))
        .collect();

    let mut keyed: Vec<(IdlerKey, &str)> = kept
        .iter()
        .map(|(name, r)| (IdlerKey::of(r), name.as_str()))
        .collect();
    keyed.sort_by(|(ka, na), (kb, nb)| kb.rank(ka).then_with(|| nb.cmp(na)));

    let pick = |f: fn(&IdlerKey) -> bool| -> Vec<String> {
        keyed
            .iter()
            .filter(|(k, _)| f(k))
            .map(|(_, n)| (*n).to_string())
            .collect()
    };

    let mut most_talkative: Vec<Talker> = kept
        .iter()
        .filter_map(|(name, r)| {
            r.efficiency.map(|efficiency| Talker {
                name: name.clone(),
                total_lines: r.total_lines,
                efficiency,
            })
        })
        .collect();
    most_talkative.sort_by(|a, b| {
        b.total_lines
            .cmp(&a.total_lines)
            .then_with(|| a.name.cmp(&b.name))
    });

    ReportData {
        said_nothing: pick(|k| k.said_nothing),
        said_almost_nothing: pick(|k| k.said_not_much && !k.said_nothing),
        idle_exceeds_active: pick(|k| k.adjusted_idle > 0.0),
        most_talkative,
    }
}

// ========== Layout ==========

/// Prefixes each entry with its 1-based rank, right-aligned.
pub fn rankify(entries: &[String]) -> Vec<String> {
    let pad = entries.len().to_string().len();
    entries
        .iter()
        .enumerate()
        .map(|(i, e)| format!("{:>pad$}. {e}", i + 1))
        .collect()
}

/// Splits entries into at most `groups` runs of equal size (the last shorter).
fn partition(entries: &[String], groups: usize) -> Vec<&[String]> {
    if groups <= 1 {
        return vec![entries];
    }
    let span = (entries.len() + groups) / groups;
    entries.chunks(span).collect()
}

/// Lays entries out top to bottom in as many columns as fit `width`.
pub fn columnify(entries: &[String], width: usize) -> String {
    let mut out = String::new();
    if entries.is_empty() {
        return out;
    }

    let column_widths = |groups: &[&[String]]| -> Vec<usize> {
        groups
            .iter()
            .map(|g| g.iter().map(|e| e.chars().count()).max().unwrap_or(0))
            .collect()
    };

    let mut layout = partition(entries, 1);
    let mut lengths = column_widths(&layout);
    for columns in 2..=entries.len() {
        let candidate = partition(entries, columns);
        let candidate_lengths = column_widths(&candidate);
        let total: usize = candidate_lengths.iter().sum::<usize>() + candidate_lengths.len() * 2;
        if total > width.saturating_sub(1) {
            break;
        }
        layout = candidate;
        lengths = candidate_lengths;
    }

    let rows = layout.iter().map(|g| g.len()).max().unwrap_or(0);
    for row in 0..rows {
        let mut line = String::new();
        for (group, len) in layout.iter().zip(&lengths) {
            let cell = group.get(row).map_or("", String::as_str);
            let _ = write!(line, "{cell:<w$}", w = len + 2);
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// Formats a value with three significant digits, dropping trailing zeros.
pub fn format_sig3(value: f64) -> String {
    if !value.is_normal() {
        return format!("{value}");
    }
    #[allow(clippy::cast_possible_truncation)]
    let exponent = value.abs().log10().floor() as i32;
    if !(-4..3).contains(&exponent) {
        return format!("{value:.2e}");
    }
    let decimals = usize::try_from(2 - exponent).unwrap_or(0);
    let fixed = format!("{value:.decimals$}");
    if fixed.contains('.') {
        fixed.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        fixed
    }
}

/// Formats the human-readable report.
pub fn format_report(data: &ReportData, width: usize) -> String {
    let mut output = String::new();

    let sections = [
        ("top said-nothingers by time spent in channel:", &data.said_nothing),
        (
            "top said-almost-nothingers by time spent in channel:",
            &data.said_almost_nothing,
        ),
        (
            "top idle-exceeds-active-visitors by time spent in channel:",
            &data.idle_exceeds_active,
        ),
    ];
    for (title, names) in sections {
        writeln!(output, "{title}").unwrap();
        output.push_str(&columnify(&rankify(names), width));
        writeln!(output).unwrap();
    }

    writeln!(output, "most talkative irc-ers:").unwrap();
    let talkers: Vec<String> = data
        .most_talkative
        .iter()
        .map(|t| format!("{} ({})", t.name, format_sig3(t.efficiency)))
        .collect();
    output.push_str(&columnify(&rankify(&talkers), width));

    output
}

/// Formats the report as JSON.
pub fn format_report_json(data: &ReportData) -> Result<String> {
    Ok(serde_json::to_string_pretty(data)?)
}

// ========== Public Interface ==========

/// Runs `lurk report` against the state at `state_path`.
pub fn run<W: Write>(
    writer: &mut W,
    state_path: &Path,
    config: &Config,
    json: bool,
    now: NaiveDateTime,
) -> Result<()> {
    let state = lurk_store::load(state_path)
        .with_context(|| format!("failed to read state from {}", state_path.display()))?;
    let data = generate_report_data(&state, now, config.retention_days);
    tracing::debug!(
        records = state.records().count(),
        talkers = data.most_talkative.len(),
        "report generated"
    );

    if json {
        writeln!(writer, "{}", format_report_json(&data)?)?;
    } else {
        write!(writer, "{}", format_report(&data, config.report_width))?;
    }
    Ok(())
}
