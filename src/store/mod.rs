//! # Durable Store
//!
//! Atomic, backed-up persistence of JSON documents.
//!
//! A write backs up the current file, stages the new content in a sibling
//! `.tmp` file, verifies it, then renames it over the target. A crash at any
//! point leaves the previous version readable.
//!
//! ```rust,no_run
//! use resilient_harvest::store::DurableStore;
//! use serde_json::json;
//!
//! let store = DurableStore::open("./output")?;
//! if !store.write("ranking.json", &json!({"records": []})) {
//!     // keep the data in memory and try again later
//! }
//! let back: Option<serde_json::Value> = store.read("ranking.json");
//! # Ok::<(), resilient_harvest::Error>(())
//! ```

mod documents;

pub use documents::{Completion, HarvestDocument, MatchReportDocument, MatchedEntry, RunStats};

use crate::{Error, ErrorContext, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const BACKUP_DIR: &str = "backups";

/// Serialized content sitting in its temporary file, not yet visible at the target.
#[derive(Debug)]
pub struct StagedWrite {
    temp_path: PathBuf,
    target_path: PathBuf,
}

impl StagedWrite {
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    pub fn target_path(&self) -> &Path {
        &self.target_path
    }
}

pub struct DurableStore {
    base_dir: PathBuf,
    backup_dir: PathBuf,
}

impl DurableStore {
    /// Open a store rooted at `base_dir`, creating it and its backup directory.
    pub fn open(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let backup_dir = base_dir.join(BACKUP_DIR);
        fs::create_dir_all(&backup_dir).map_err(|e| {
            Error::persistence_with_context(
                format!("cannot create store directories: {}", e),
                ErrorContext::new()
                    .with_details(backup_dir.display().to_string())
                    .with_source("durable_store"),
            )
        })?;
        Ok(Self {
            base_dir,
            backup_dir,
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }

    /// Atomically replace `name` with `data`.
    ///
    /// Returns `true` only when backup, staging, verification and rename all
    /// succeeded. Failures are logged, never raised.
    pub fn write<T: Serialize + ?Sized>(&self, name: &str, data: &T) -> bool {
        match self.try_write(name, data) {
            Ok(()) => {
                debug!(name, "durable write completed");
                true
            }
            Err(e) => {
                warn!(name, error = %e, "durable write failed");
                false
            }
        }
    }

    /// Same as [`write`](Self::write) but reports the failing step.
    pub fn try_write<T: Serialize + ?Sized>(&self, name: &str, data: &T) -> Result<()> {
        self.backup(name)?;
        let staged = self.stage(name, data)?;
        self.commit(staged)
    }

    /// Copy the current file, if any, to
    /// `backups/<name>-backup-<timestamp>-<seq>.json`.
    ///
    /// An existing backup is never replaced; writes landing in the same
    /// millisecond take the next sequence number.
    pub fn backup(&self, name: &str) -> Result<Option<PathBuf>> {
        let original = self.path_of(name);
        if !original.exists() {
            return Ok(None);
        }
        let stamp = chrono::Utc::now()
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
            .replace([':', '.'], "-");
        let mut seq = 0u32;
        let (backup_path, mut file) = loop {
            let candidate = self
                .backup_dir
                .join(format!("{}-backup-{}-{:04}.json", name, stamp, seq));
            match OpenOptions::new().write(true).create_new(true).open(&candidate) {
                Ok(file) => break (candidate, file),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => seq += 1,
                Err(e) => return Err(backup_error(e, &candidate)),
            }
        };
        let copied = fs::File::open(&original).and_then(|mut src| io::copy(&mut src, &mut file));
        if let Err(e) = copied {
            drop(file);
            let _ = fs::remove_file(&backup_path);
            return Err(backup_error(e, &backup_path));
        }
        debug!(backup = %backup_path.display(), "backup created");
        Ok(Some(backup_path))
    }

    /// Serialize `data` into the temporary sibling of `name` and verify it.
    ///
    /// The temporary file is removed again when staging fails.
    pub fn stage<T: Serialize + ?Sized>(&self, name: &str, data: &T) -> Result<StagedWrite> {
        let target_path = self.path_of(name);
        let temp_path = self.base_dir.join(format!("{}.tmp", name));
        let bytes = serde_json::to_vec_pretty(data)?;
        if let Err(e) = fs::write(&temp_path, &bytes) {
            discard(&temp_path);
            return Err(Error::persistence_with_context(
                format!("temp write failed: {}", e),
                ErrorContext::new()
                    .with_details(temp_path.display().to_string())
                    .with_source("durable_store"),
            ));
        }

        let written = fs::metadata(&temp_path).map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            discard(&temp_path);
            return Err(Error::persistence_with_context(
                "temp file verification failed",
                ErrorContext::new()
                    .with_details(temp_path.display().to_string())
                    .with_source("durable_store"),
            ));
        }
        Ok(StagedWrite {
            temp_path,
            target_path,
        })
    }

    /// Rename a staged file over its target. A failed rename removes the
    /// temporary file.
    pub fn commit(&self, staged: StagedWrite) -> Result<()> {
        fs::rename(&staged.temp_path, &staged.target_path).map_err(|e| {
            discard(&staged.temp_path);
            Error::persistence_with_context(
                format!("rename failed: {}", e),
                ErrorContext::new()
                    .with_details(staged.target_path.display().to_string())
                    .with_source("durable_store"),
            )
        })
    }

    /// `None` when the file is missing or does not parse as `T`.
    pub fn read<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let path = self.path_of(name);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(name, error = %e, "durable read failed");
                return None;
            }
        };
        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(name, error = %e, "stored document is corrupt, ignoring");
                None
            }
        }
    }

    /// Backups of `name`, oldest first.
    pub fn backups(&self, name: &str) -> Vec<PathBuf> {
        let prefix = format!("{}-backup-", name);
        let mut found: Vec<PathBuf> = fs::read_dir(&self.backup_dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .filter(|p| {
                        p.file_name()
                            .and_then(|n| n.to_str())
                            .map(|n| n.starts_with(&prefix))
                            .unwrap_or(false)
                    })
                    .collect()
            })
            .unwrap_or_default();
        found.sort();
        found
    }
}

fn backup_error(e: io::Error, path: &Path) -> Error {
    Error::persistence_with_context(
        format!("backup failed: {}", e),
        ErrorContext::new()
            .with_details(path.display().to_string())
            .with_source("durable_store"),
    )
}

/// Best-effort removal of a leftover temporary file.
fn discard(path: &Path) {
    if path.is_file() {
        if let Err(e) = fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "could not remove temp file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_write_then_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = DurableStore::open(dir.path()).unwrap();
        let doc = json!({"sourceId": "c1", "records": [{"username": "a", "rank": 1}]});
        assert!(store.write("final.json", &doc));
        assert_eq!(store.read::<serde_json::Value>("final.json"), Some(doc));
        assert!(!store.path_of("final.json.tmp").exists());
    }

    #[test]
    fn test_missing_and_corrupt_reads_are_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = DurableStore::open(dir.path()).unwrap();
        assert!(store.read::<serde_json::Value>("nope.json").is_none());

        fs::write(store.path_of("bad.json"), b"{not json").unwrap();
        assert!(store.read::<serde_json::Value>("bad.json").is_none());
    }

    #[test]
    fn test_overwrite_creates_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = DurableStore::open(dir.path()).unwrap();
        assert!(store.write("run.json", &json!({"v": 1})));
        assert!(store.backups("run.json").is_empty());

        assert!(store.write("run.json", &json!({"v": 2})));
        let backups = store.backups("run.json");
        assert_eq!(backups.len(), 1);
        let name = backups[0].file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("run.json-backup-"));
        assert!(name.ends_with(".json"));
        assert!(!name.contains(':'));

        let old: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&backups[0]).unwrap()).unwrap();
        assert_eq!(old, json!({"v": 1}));
        assert_eq!(store.read::<serde_json::Value>("run.json"), Some(json!({"v": 2})));
    }

    #[test]
    fn test_crash_before_rename_keeps_previous_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = DurableStore::open(dir.path()).unwrap();
        assert!(store.write("state.json", &json!({"page": 10})));

        // stage without committing: the process "dies" here
        let staged = store.stage("state.json", &json!({"page": 20})).unwrap();
        assert!(staged.temp_path().exists());
        drop(staged);

        let target = store.path_of("state.json");
        assert!(fs::metadata(&target).unwrap().len() > 0);
        assert_eq!(store.read::<serde_json::Value>("state.json"), Some(json!({"page": 10})));

        // the next write simply replaces the stale temp file
        assert!(store.write("state.json", &json!({"page": 30})));
        assert_eq!(store.read::<serde_json::Value>("state.json"), Some(json!({"page": 30})));
    }

    #[test]
    fn test_rapid_overwrites_keep_every_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = DurableStore::open(dir.path()).unwrap();
        for v in 0..20 {
            assert!(store.write("run.json", &json!({"v": v})));
        }
        let backups = store.backups("run.json");
        assert_eq!(backups.len(), 19);

        let versions: Vec<i64> = backups
            .iter()
            .map(|p| {
                let doc: serde_json::Value =
                    serde_json::from_str(&fs::read_to_string(p).unwrap()).unwrap();
                doc["v"].as_i64().unwrap()
            })
            .collect();
        assert_eq!(versions, (0..19).collect::<Vec<i64>>());
    }

    #[test]
    fn test_backup_never_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = DurableStore::open(dir.path()).unwrap();
        assert!(store.write("run.json", &json!({"v": 1})));
        let first = store.backup("run.json").unwrap().unwrap();
        let second = store.backup("run.json").unwrap().unwrap();
        assert_ne!(first, second);
        assert!(first.exists() && second.exists());
    }

    #[test]
    fn test_failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = DurableStore::open(dir.path()).unwrap();
        let staged = store.stage("ranking.json", &json!({"page": 1})).unwrap();
        let temp = staged.temp_path().to_path_buf();
        // a non-empty directory on the target makes the rename fail
        fs::create_dir_all(store.path_of("ranking.json").join("inner")).unwrap();

        assert!(store.commit(staged).is_err());
        assert!(!temp.exists());
    }

    #[test]
    fn test_write_failure_reports_false() {
        let dir = tempfile::tempdir().unwrap();
        let store = DurableStore::open(dir.path()).unwrap();
        // a directory squatting on the temp path makes staging fail
        fs::create_dir(store.path_of("blocked.json.tmp")).unwrap();
        assert!(!store.write("blocked.json", &json!({"x": 1})));
        assert!(!store.path_of("blocked.json").exists());
    }
}
