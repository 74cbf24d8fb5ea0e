//! Durable record store.
//!
//! Three JSON files live in the data directory:
//!
//! ```text
//! authcodes.json  {"codes":  {code   -> AuthCodeRecord}}
//! grants.json     {"grants": {userId -> GrantRecord}}
//! state.json      {"lastAuditId": string | null}
//! ```
//!
//! Each file is owned by exactly one [`RecordSet`] in this process. All
//! mutations go through [`RecordSet::try_update`], which runs a synchronous
//! closure and rewrites the whole file while holding the set's lock, so a
//! check-then-mutate sequence can never interleave with another writer.

mod persistence;
pub mod records;

pub use records::{AuthCodeFile, AuthCodeRecord, GrantFile, GrantRecord, StateFile};

use crate::error::StoreError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::warn;

const AUTHCODES_FILE: &str = "authcodes.json";
const GRANTS_FILE: &str = "grants.json";
const STATE_FILE: &str = "state.json";

/// Single in-process owner of one record file.
#[derive(Debug)]
pub struct RecordSet<T> {
    path: PathBuf,
    data: Mutex<T>,
}

impl<T> RecordSet<T>
where
    T: Serialize + DeserializeOwned + Default + Clone + Send + Sync,
{
    /// Open (or create) the record file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let data = persistence::load_or_init(&path)?;
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current records without copying the whole set.
    pub async fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.data.lock().await;
        f(&*guard)
    }

    /// Clone of the current records.
    #[cfg_attr(not(test), allow(dead_code))]
    pub async fn snapshot(&self) -> T {
        self.data.lock().await.clone()
    }

    /// Mutate the records and persist them.
    ///
    /// The closure's `Err` aborts without touching the file. On either kind
    /// of failure the in-memory records are restored to their previous
    /// state, so memory and disk never diverge.
    pub async fn try_update<R, E>(&self, f: impl FnOnce(&mut T) -> Result<R, E>) -> Result<R, E>
    where
        E: From<StoreError>,
    {
        let mut guard = self.data.lock().await;
        let before = guard.clone();
        let out = match f(&mut *guard) {
            Ok(out) => out,
            Err(e) => {
                *guard = before;
                return Err(e);
            }
        };
        if let Err(e) = persistence::save(&self.path, &*guard).await {
            warn!(path = %self.path.display(), error = %e, "Record write failed, rolling back");
            *guard = before;
            return Err(e.into());
        }
        Ok(out)
    }

    /// Infallible-closure form of [`RecordSet::try_update`].
    pub async fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, StoreError> {
        self.try_update(|data| Ok::<R, StoreError>(f(data))).await
    }
}

/// The bot's three record sets.
#[derive(Debug)]
pub struct RecordStore {
    pub authcodes: RecordSet<AuthCodeFile>,
    pub grants: RecordSet<GrantFile>,
    pub state: RecordSet<StateFile>,
}

impl RecordStore {
    /// Open every record file under `data_dir`, creating the directory and
    /// any missing file.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = data_dir.as_ref();
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            authcodes: RecordSet::open(dir.join(AUTHCODES_FILE))?,
            grants: RecordSet::open(dir.join(GRANTS_FILE))?,
            state: RecordSet::open(dir.join(STATE_FILE))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_empty_files() {
        let dir = tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let _store = RecordStore::open(&data_dir).unwrap();

        let state = std::fs::read_to_string(data_dir.join(STATE_FILE)).unwrap();
        let state: StateFile = serde_json::from_str(&state).unwrap();
        assert_eq!(state.last_audit_id, None);
        assert!(data_dir.join(AUTHCODES_FILE).exists());
        assert!(data_dir.join(GRANTS_FILE).exists());
    }

    #[tokio::test]
    async fn update_persists_and_reopens() {
        let dir = tempdir().unwrap();
        {
            let store = RecordStore::open(dir.path()).unwrap();
            store
                .state
                .update(|s| s.last_audit_id = Some("123".into()))
                .await
                .unwrap();
        }
        let store = RecordStore::open(dir.path()).unwrap();
        assert_eq!(
            store.state.snapshot().await.last_audit_id.as_deref(),
            Some("123")
        );
    }

    #[tokio::test]
    async fn closure_error_skips_write() {
        let dir = tempdir().unwrap();
        let set: RecordSet<StateFile> = RecordSet::open(dir.path().join("s.json")).unwrap();
        let result: Result<(), StoreError> = set
            .try_update(|s| {
                s.last_audit_id = Some("x".into());
                Err(StoreError::Io(std::io::Error::other("nope")))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(set.snapshot().await.last_audit_id, None);

        let on_disk: StateFile =
            serde_json::from_slice(&std::fs::read(set.path()).unwrap()).unwrap();
        assert_eq!(on_disk.last_audit_id, None);
    }

    #[tokio::test]
    async fn failed_write_rolls_back_memory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sub").join("s.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let set: RecordSet<StateFile> = RecordSet::open(&path).unwrap();

        // Removing the directory makes the temp-file write fail.
        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
        let result = set.update(|s| s.last_audit_id = Some("lost".into())).await;
        assert!(result.is_err());
        assert_eq!(set.snapshot().await.last_audit_id, None);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("grants.json");
        std::fs::write(&path, b"{not json").unwrap();
        let result: Result<RecordSet<GrantFile>, _> = RecordSet::open(&path);
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }
}
