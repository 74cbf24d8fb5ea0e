//! File I/O for record sets.

use crate::error::StoreError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Load a record file, creating it with `T::default()` if it does not exist.
///
/// A file that exists but does not decode is an error: overwriting it
/// would destroy the records it holds.
pub(super) fn load_or_init<T>(path: &Path) -> Result<T, StoreError>
where
    T: Serialize + DeserializeOwned + Default,
{
    if !path.exists() {
        let empty = T::default();
        fs::write(path, serde_json::to_vec_pretty(&empty)?)?;
        info!(path = %path.display(), "Record file not found, created empty");
        return Ok(empty);
    }

    let content = fs::read(path)?;
    let value = serde_json::from_slice(&content)?;
    debug!(path = %path.display(), "Record file loaded");
    Ok(value)
}

/// Replace a record file with `value`.
///
/// Uses atomic write (temp file + rename) to prevent corruption.
pub(super) async fn save<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(value)?;
    let temp_path = path.with_extension("json.tmp");
    tokio::fs::write(&temp_path, bytes).await?;
    tokio::fs::rename(&temp_path, path).await?;
    debug!(path = %path.display(), "Record file saved");
    Ok(())
}
