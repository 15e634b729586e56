use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use log::warn;
use mantle_platform::write_atomic;
use serde::{Deserialize, Serialize};

/// Persisted verdict of the most recent remote release check.
///
/// `last_checked_at` and `latest_version_code` are only written together, by
/// a successful check. `checked` may be true with `last_checked_at` absent:
/// that is a build whose every check attempt has failed so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshnessRecord {
    /// True once any check attempt has completed, successful or not.
    #[serde(default)]
    pub checked: bool,
    /// Wall-clock time of the last successful fetch.
    #[serde(default)]
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Highest release code observed; 0 until a fetch succeeds.
    #[serde(default)]
    pub latest_version_code: i64,
}

/// Store for the freshness record. Injected rather than ambient so tests can
/// substitute an in-memory instance.
pub trait FreshnessStore: Send + Sync {
    /// Current record. Never observes a partially applied update.
    fn snapshot(&self) -> FreshnessRecord;

    /// Apply `mutate` to the record and persist the result as one atomic
    /// unit with respect to concurrent readers.
    fn update(&self, mutate: &mut dyn FnMut(&mut FreshnessRecord));
}

/// Durable store backed by a JSON file, mirrored in memory under a mutex.
pub struct DiskFreshnessStore {
    path: PathBuf,
    state: Mutex<FreshnessRecord>,
}

impl DiskFreshnessStore {
    /// Load the record at `path`, defaulting when the file is missing or
    /// unreadable.
    #[must_use]
    pub fn open(path: PathBuf) -> Self {
        let state = std::fs::read_to_string(&path)
            .ok()
            .and_then(|data| serde_json::from_str(&data).ok())
            .unwrap_or_default();
        Self {
            path,
            state: Mutex::new(state),
        }
    }

    fn persist(&self, record: &FreshnessRecord) {
        match serde_json::to_vec(record) {
            Ok(data) => {
                if let Err(error) = write_atomic(&self.path, &data) {
                    warn!("Failed to persist freshness record: {error}");
                }
            }
            Err(error) => warn!("Failed to serialize freshness record: {error}"),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FreshnessRecord> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FreshnessStore for DiskFreshnessStore {
    fn snapshot(&self) -> FreshnessRecord {
        self.lock().clone()
    }

    fn update(&self, mutate: &mut dyn FnMut(&mut FreshnessRecord)) {
        let mut guard = self.lock();
        mutate(&mut guard);
        self.persist(&guard);
    }
}

/// Volatile store for tests and for hosts without usable directories.
#[derive(Default)]
pub struct MemoryFreshnessStore {
    state: Mutex<FreshnessRecord>,
}

impl FreshnessStore for MemoryFreshnessStore {
    fn snapshot(&self) -> FreshnessRecord {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update(&self, mutate: &mut dyn FnMut(&mut FreshnessRecord)) {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        mutate(&mut guard);
    }
}
