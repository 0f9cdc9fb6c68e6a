//! Write-temp-then-rename helper, used for every on-disk cache file
//! (flow-job cache, browse filters, lock metadata) so a reader never
//! observes a half-written file. Follows the same pattern as
//! `StateStore::save` elsewhere in this codebase, which uses
//! `tempfile::NamedTempFile::new_in` + `persist` for the same reason.

use std::io::Write;
use std::path::Path;

use crate::error::{CanopyError, Result};

pub fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| CanopyError::io(path.display().to_string(), std::io::Error::new(std::io::ErrorKind::NotFound, "no parent directory")))?;
    fs_err::create_dir_all(parent).map_err(|e| CanopyError::io(parent.display().to_string(), e))?;

    let contents = serde_json::to_vec_pretty(value)
        .map_err(|e| CanopyError::json(path.display().to_string(), e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| CanopyError::io(format!("tempfile in {}", parent.display()), e))?;
    tmp.write_all(&contents)
        .map_err(|e| CanopyError::io(path.display().to_string(), e))?;
    tmp.flush()
        .map_err(|e| CanopyError::io(path.display().to_string(), e))?;
    tmp.persist(path)
        .map_err(|e| CanopyError::io(path.display().to_string(), e.error))?;
    Ok(())
}

pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    let contents = fs_err::read_to_string(path).ok()?;
    match serde_json::from_str(&contents) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "ignoring malformed cache file");
            None
        }
    }
}
