//! Resolves the on-disk layout once per CLI invocation, shared by every
//! `sessions` subcommand.

use std::path::PathBuf;

use canopy_core::{CanopyError, Result};
use canopy_store::Store;

pub struct CliContext {
    pub store: Store,
    pub fs_root: PathBuf,
    pub flow_cache_path: PathBuf,
}

impl CliContext {
    pub fn open() -> Result<Self> {
        let fs_root = canopy_core::paths::sessions_root().ok_or(CanopyError::DataHomeNotFound)?;
        let store_path = canopy_core::paths::store_path().ok_or(CanopyError::DataHomeNotFound)?;
        let flow_cache_path = canopy_core::paths::flow_cache_path().ok_or(CanopyError::DataHomeNotFound)?;
        Ok(CliContext {
            store: Store::open(store_path)?,
            fs_root,
            flow_cache_path,
        })
    }
}
