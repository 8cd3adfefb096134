use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use flagwatch_config::StoreSettings;
use flagwatch_paths::{FlagwatchPaths, PathError};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use super::{Monotonicity, SetOutcome, StoreError, WatermarkStore, guard};
use crate::types::{Category, Watermark};

/// On-disk form of one category's watermark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatermarkRecord {
    pub category: Category,
    pub watermark: Watermark,
    pub updated_at: DateTime<Utc>,
}

/// Persists one JSON file per category: `<dir>/<category>.json`.
///
/// Writes go through a temp file and a rename. A file that cannot be read or
/// parsed is logged and treated as absent.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    monotonicity: Monotonicity,
    // Serializes read-check-write in `set`
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(dir: PathBuf, monotonicity: Monotonicity) -> Self {
        Self {
            dir,
            monotonicity,
            write_lock: Mutex::new(()),
        }
    }

    /// `store.dir` when configured, else `~/.flagwatch/watermarks`.
    pub fn from_settings(settings: &StoreSettings) -> Result<Self, PathError> {
        let dir = match &settings.dir {
            Some(dir) => dir.clone(),
            None => FlagwatchPaths::resolve()?.watermarks_dir(),
        };
        Ok(Self::new(dir, settings.enforce_monotonic().into()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_for(&self, category: &Category) -> PathBuf {
        self.dir.join(format!("{}.json", category.as_str()))
    }

    /// Every readable record, sorted by category.
    pub fn records(&self) -> Result<Vec<WatermarkRecord>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::IoError { source: e }),
        };

        let mut records = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Ok(category) = Category::new(stem) else {
                warn!(
                    event = "core.store.unexpected_file",
                    file = %path.display(),
                    "File name is not a valid category, skipping"
                );
                continue;
            };
            if let Some(record) = read_record(&path, &category) {
                records.push(record);
            }
        }

        records.sort_by(|a, b| a.category.cmp(&b.category));
        Ok(records)
    }

    fn write_record(&self, record: &WatermarkRecord) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;

        let file = self.file_for(&record.category);
        let temp_file = self.dir.join(format!("{}.json.tmp", record.category.as_str()));
        let json = serde_json::to_string_pretty(record)?;

        if let Err(e) = fs::write(&temp_file, json) {
            cleanup_temp_file(&temp_file, &e);
            return Err(StoreError::IoError { source: e });
        }

        if let Err(e) = fs::rename(&temp_file, &file) {
            cleanup_temp_file(&temp_file, &e);
            return Err(StoreError::IoError { source: e });
        }

        Ok(())
    }
}

impl WatermarkStore for FileStore {
    fn get(&self, category: &Category) -> Result<Option<Watermark>, StoreError> {
        let path = self.file_for(category);
        if !path.exists() {
            return Ok(None);
        }
        Ok(read_record(&path, category).map(|r| r.watermark))
    }

    fn set(&self, category: &Category, watermark: Watermark) -> Result<SetOutcome, StoreError> {
        let _guard = match self.write_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!(event = "core.store.file_lock_poisoned");
                poisoned.into_inner()
            }
        };

        if let Some(rejected) = guard(self.monotonicity, self.get(category)?, watermark) {
            debug!(
                event = "core.store.write_rejected",
                category = %category,
                watermark = %watermark,
            );
            return Ok(rejected);
        }

        self.write_record(&WatermarkRecord {
            category: category.clone(),
            watermark,
            updated_at: Utc::now(),
        })?;

        debug!(
            event = "core.store.write_completed",
            category = %category,
            watermark = %watermark,
        );
        Ok(SetOutcome::Stored)
    }

    fn remove(&self, category: &Category) -> Result<bool, StoreError> {
        match fs::remove_file(self.file_for(category)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::IoError { source: e }),
        }
    }

    fn snapshot(&self) -> Result<BTreeMap<Category, Watermark>, StoreError> {
        Ok(self
            .records()?
            .into_iter()
            .map(|r| (r.category, r.watermark))
            .collect())
    }
}

fn read_record(path: &Path, category: &Category) -> Option<WatermarkRecord> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!(
                event = "core.store.read_failed",
                file = %path.display(),
                error = %e,
                "Failed to read watermark file, treating as absent"
            );
            return None;
        }
    };

    match serde_json::from_str::<WatermarkRecord>(&content) {
        Ok(record) if record.category == *category => Some(record),
        Ok(record) => {
            warn!(
                event = "core.store.category_mismatch",
                file = %path.display(),
                expected = %category,
                found = %record.category,
                "Watermark file belongs to another category, treating as absent"
            );
            None
        }
        Err(e) => {
            warn!(
                event = "core.store.invalid_json",
                file = %path.display(),
                error = %e,
                "Watermark file is corrupted, treating as absent"
            );
            None
        }
    }
}

fn cleanup_temp_file(temp_file: &Path, original_error: &std::io::Error) {
    if let Err(e) = fs::remove_file(temp_file)
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!(
            event = "core.store.temp_cleanup_failed",
            file = %temp_file.display(),
            error = %e,
            original_error = %original_error,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cat(name: &str) -> Category {
        Category::new(name).unwrap()
    }

    #[test]
    fn test_missing_dir_reads_empty() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().join("nope"), Monotonicity::Unchecked);
        assert_eq!(store.get(&cat("messages")).unwrap(), None);
        assert!(store.snapshot().unwrap().is_empty());
        assert!(!store.remove(&cat("messages")).unwrap());
    }

    #[test]
    fn test_round_trip_across_instances() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("watermarks");

        let store = FileStore::new(dir.clone(), Monotonicity::Unchecked);
        store.set(&cat("messages"), Watermark::new(100)).unwrap();
        store.set(&cat("activity"), Watermark::new(7)).unwrap();
        drop(store);

        let reopened = FileStore::new(dir.clone(), Monotonicity::Unchecked);
        assert_eq!(
            reopened.get(&cat("messages")).unwrap(),
            Some(Watermark::new(100))
        );
        let snapshot = reopened.snapshot().unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(dir.join("messages.json").is_file());
        assert!(!dir.join("messages.json.tmp").exists());
    }

    #[test]
    fn test_enforced_guard_on_disk() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().to_path_buf(), Monotonicity::Enforce);
        store.set(&cat("messages"), Watermark::new(100)).unwrap();
        let outcome = store.set(&cat("messages"), Watermark::new(99)).unwrap();
        assert_eq!(
            outcome,
            SetOutcome::Rejected {
                current: Watermark::new(100)
            }
        );
        assert_eq!(
            store.get(&cat("messages")).unwrap(),
            Some(Watermark::new(100))
        );
    }

    #[test]
    fn test_corrupt_file_treated_as_absent() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("messages.json"), "{not json").unwrap();
        let store = FileStore::new(tmp.path().to_path_buf(), Monotonicity::Enforce);

        assert_eq!(store.get(&cat("messages")).unwrap(), None);
        assert!(store.records().unwrap().is_empty());

        // A corrupt file does not block a fresh write
        store.set(&cat("messages"), Watermark::new(5)).unwrap();
        assert_eq!(store.get(&cat("messages")).unwrap(), Some(Watermark::new(5)));
    }

    #[test]
    fn test_foreign_files_skipped() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("notes.txt"), "hello").unwrap();
        fs::write(tmp.path().join(".hidden.json"), "{}").unwrap();
        let store = FileStore::new(tmp.path().to_path_buf(), Monotonicity::Unchecked);
        store.set(&cat("presence"), Watermark::new(3)).unwrap();

        let records = store.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].category, cat("presence"));
    }

    #[test]
    fn test_from_settings_prefers_configured_dir() {
        let tmp = TempDir::new().unwrap();
        let settings = StoreSettings {
            enforce_monotonic: Some(true),
            dir: Some(tmp.path().join("marks")),
        };
        let store = FileStore::from_settings(&settings).unwrap();
        assert_eq!(store.dir(), tmp.path().join("marks"));

        store.set(&cat("messages"), Watermark::new(10)).unwrap();
        let outcome = store.set(&cat("messages"), Watermark::new(9)).unwrap();
        assert!(matches!(outcome, SetOutcome::Rejected { .. }));
    }

    #[test]
    fn test_remove_deletes_file() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().to_path_buf(), Monotonicity::Unchecked);
        store.set(&cat("messages"), Watermark::new(1)).unwrap();
        assert!(store.remove(&cat("messages")).unwrap());
        assert!(!tmp.path().join("messages.json").exists());
    }
}
