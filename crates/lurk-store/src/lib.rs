//! Storage layer for lurk.
//!
//! Persists the aggregator's records as a single JSON document.
//!
//! # Document Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "records": [ { "aliases": { "alice": 1, "al": 2 }, "n_visits": 2, ... } ],
//!   "names": { "al": 0, "alice": 0 }
//! }
//! ```
//!
//! `records` is the record arena and `names` maps every known nick to an
//! index in it. Two names sharing one record after a nick change point at
//! the same index, so sharing survives a save/load cycle instead of being
//! flattened into copies.
//!
//! ## Timestamp Format
//!
//! Instants are naive local date-times (`2020-01-01T09:05:00`): irssi logs
//! carry no zone, so none is invented.
//!
//! ## Evolving the Document
//!
//! Record fields other than `aliases` and `n_visits` default when absent.
//! Anything that changes the meaning of an existing field must bump
//! [`STATE_VERSION`].

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use lurk_core::{AggregateError, Aggregator, Nick, RecordId, SessionRecord};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Version written to new documents.
pub const STATE_VERSION: u32 = 1;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the document failed.
    #[error("state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The document is not valid JSON or does not match the schema.
    #[error("invalid state document: {0}")]
    Json(#[from] serde_json::Error),
    /// The document was written by an incompatible version.
    #[error("unsupported state version {found} (expected {STATE_VERSION})")]
    UnsupportedVersion { found: u32 },
    /// A name refers to a record that is not in the document.
    #[error("inconsistent state document: {0}")]
    Dangling(#[from] AggregateError),
}

#[derive(Serialize)]
struct StateRef<'a> {
    version: u32,
    records: &'a [SessionRecord],
    names: &'a BTreeMap<Nick, RecordId>,
}

#[derive(Deserialize)]
struct StateDocument {
    version: u32,
    #[serde(default)]
    records: Vec<SessionRecord>,
    #[serde(default)]
    names: BTreeMap<Nick, RecordId>,
}

/// Renders the records as a pretty-printed document.
pub fn to_string(state: &Aggregator) -> Result<String, StoreError> {
    let doc = StateRef {
        version: STATE_VERSION,
        records: state.arena(),
        names: state.name_map(),
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

/// Parses a document back into an aggregator.
pub fn from_str(text: &str) -> Result<Aggregator, StoreError> {
    let doc: StateDocument = serde_json::from_str(text)?;
    if doc.version != STATE_VERSION {
        return Err(StoreError::UnsupportedVersion { found: doc.version });
    }
    Ok(Aggregator::from_parts(doc.records, doc.names)?)
}

/// Loads prior state from `path`. A missing file is an error.
pub fn load(path: &Path) -> Result<Aggregator, StoreError> {
    let text = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let state = from_str(&text)?;
    tracing::debug!(path = %path.display(), names = state.len(), "loaded state");
    Ok(state)
}

/// Writes state to `path`, replacing it only once the new content is on disk.
pub fn save(path: &Path, state: &Aggregator) -> Result<(), StoreError> {
    let text = to_string(state)?;
    let tmp = temp_path(path);
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    fs::write(&tmp, text).map_err(io_err)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(e));
    }
    tracing::debug!(path = %path.display(), names = state.len(), "saved state");
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{NaiveDate, NaiveDateTime};
    use lurk_core::Dispatcher;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn sample_state() -> Aggregator {
        let log = "\
--- Log opened Wed Jan 01 00:00:00 2020
09:00 (-) alice [h] has joined #x
09:01 <alice> hi
09:02 (-) alice is now known as al
09:03 <al> still me
09:04 < bob> hello
";
        let mut dispatcher = Dispatcher::new();
        dispatcher.ingest("sample.log", log).unwrap();
        dispatcher.finish(at(10, 0)).unwrap()
    }

    #[test]
    fn roundtrip_preserves_state_and_sharing() {
        let state = sample_state();
        let text = to_string(&state).unwrap();
        let loaded = from_str(&text).unwrap();

        assert_eq!(loaded, state);
        assert!(loaded.shares_record("alice", "al"));
        assert!(!loaded.shares_record("alice", "bob"));
        // saving again is byte-identical
        assert_eq!(to_string(&loaded).unwrap(), text);
    }

    #[test]
    fn document_layout() {
        let text = to_string(&sample_state()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["names"]["al"], value["names"]["alice"]);
        assert_eq!(value["records"][0]["aliases"]["al"], 1);
        assert_eq!(value["records"][0]["last_in_at"], "2020-01-01T10:00:00");
        assert_eq!(value["records"][0]["visits_by_bucket"]["1"], 3600.0);
    }

    #[test]
    fn save_then_load_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("state.json");
        let state = sample_state();

        save(&path, &state).unwrap();
        assert!(!temp.path().join("state.json.tmp").exists());
        assert_eq!(load(&path).unwrap(), state);
    }

    #[test]
    fn load_missing_file_fails() {
        let temp = tempfile::tempdir().unwrap();
        let err = load(&temp.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }

    #[test]
    fn save_into_missing_directory_fails() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("missing").join("state.json");
        let err = save(&path, &sample_state()).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }

    #[test]
    fn rejects_bad_documents() {
        assert!(matches!(from_str("not json"), Err(StoreError::Json(_))));
        assert!(matches!(
            from_str(r#"{"version": 7}"#),
            Err(StoreError::UnsupportedVersion { found: 7 })
        ));
        assert!(matches!(
            from_str(r#"{"version": 1, "records": [], "names": {"alice": 0}}"#),
            Err(StoreError::Dangling(_))
        ));
        assert!(matches!(
            from_str(r#"{"version": 1, "records": [], "names": {"": 0}}"#),
            Err(StoreError::Json(_))
        ));
    }

    #[test]
    fn empty_document_loads_empty_state() {
        let state = from_str(r#"{"version": 1}"#).unwrap();
        assert!(state.is_empty());
    }
}
