//! Ingest command: fold log files into the state file.
//!
//! Prior state is loaded once up front and written once at the end; there
//! is no checkpointing in between.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use lurk_core::{Aggregator, Dispatcher};

/// What one ingest run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    pub files: usize,
    pub lines: usize,
    pub events: usize,
    pub names: usize,
}

/// Processes `files` in order on top of the state in `read`, closing open
/// sessions at `now`.
pub fn ingest(
    files: &[PathBuf],
    read: Option<&Path>,
    now: NaiveDateTime,
) -> Result<(Aggregator, IngestSummary)> {
    let mut dispatcher = match read {
        Some(path) => {
            tracing::info!(path = %path.display(), "reading prior state");
            let prior = lurk_store::load(path)
                .with_context(|| format!("failed to read state from {}", path.display()))?;
            Dispatcher::with_state(prior)
        }
        None => Dispatcher::new(),
    };

    let mut lines = 0;
    let mut events = 0;
    for path in files {
        tracing::info!(path = %path.display(), "processing");
        let bytes =
            fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        // irssi writes whatever encoding the channel used
        let contents = String::from_utf8_lossy(&bytes);
        let summary = dispatcher.ingest(&path.display().to_string(), &contents)?;
        lines += summary.lines;
        events += summary.events;
    }

    let state = dispatcher
        .finish(now)
        .context("failed to close open sessions")?;
    let summary = IngestSummary {
        files: files.len(),
        lines,
        events,
        names: state.len(),
    };
    Ok((state, summary))
}

/// Runs `lurk ingest`, printing a one-line summary.
pub fn run<W: Write>(
    writer: &mut W,
    files: &[PathBuf],
    read: Option<&Path>,
    write: Option<&Path>,
    now: NaiveDateTime,
) -> Result<()> {
    let (state, summary) = ingest(files, read, now)?;

    if let Some(path) = write {
        tracing::info!(path = %path.display(), "writing state");
        lurk_store::save(path, &state)
            .with_context(|| format!("failed to write state to {}", path.display()))?;
    }

    writeln!(
        writer,
        "{} files, {} lines, {} events, {} names",
        summary.files, summary.lines, summary.events, summary.names
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::NaiveDate;

    const DAY_ONE: &str = "\
--- Log opened Wed Jan 01 08:00:00 2020
09:00 (-) alice [~a@host] has joined #x
09:01 <alice> hi
09:02 <alice> hi again
09:05 (-) alice [~a@host] has quit [Ping timeout]
--- Log closed Wed Jan 01 23:00:00 2020
";

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, 3)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn ingest_writes_state_and_summary() {
        let temp = tempfile::tempdir().unwrap();
        let log = temp.path().join("x.log");
        let state_path = temp.path().join("state.json");
        fs::write(&log, DAY_ONE).unwrap();

        let mut out = Vec::new();
        run(&mut out, &[log], None, Some(&state_path), now()).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "1 files, 6 lines, 4 events, 1 names\n"
        );

        let state = lurk_store::load(&state_path).unwrap();
        assert_eq!(state.record("alice").unwrap().total_lines, 2);
    }

    #[test]
    fn failing_second_file_names_file_and_line() {
        let temp = tempfile::tempdir().unwrap();
        let good = temp.path().join("good.log");
        let bad = temp.path().join("bad.log");
        fs::write(&good, DAY_ONE).unwrap();
        fs::write(&bad, "09:00 <bob> hi\nno stamp here\n").unwrap();

        let err = ingest(&[good, bad.clone()], None, now()).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains(&format!("{}:2", bad.display())), "{message}");
    }

    #[test]
    fn unreadable_prior_state_fails_before_processing() {
        let temp = tempfile::tempdir().unwrap();
        let log = temp.path().join("x.log");
        fs::write(&log, DAY_ONE).unwrap();

        let err = ingest(&[log], Some(&temp.path().join("missing.json")), now()).unwrap_err();
        assert!(format!("{err:#}").contains("failed to read state"));
    }
}
