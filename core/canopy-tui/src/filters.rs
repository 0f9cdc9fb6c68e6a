//! Persisted TUI filter preferences (spec §6):
//! `browse_filters.json = {status_filters: {status -> bool}, type_filters: {type -> bool}}`.
//! A status/type absent from the map is treated as shown (`true`), so a
//! fresh install with no file shows everything.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrowseFilters {
    #[serde(default)]
    pub status_filters: HashMap<String, bool>,
    #[serde(default)]
    pub type_filters: HashMap<String, bool>,
}

impl BrowseFilters {
    pub fn load(path: &Path) -> Self {
        canopy_core::atomic::read_json(path).unwrap_or_default()
    }

    pub fn save(&self, path: &Path) {
        if let Err(err) = canopy_core::atomic::write_json_atomic(path, self) {
            tracing::warn!(error = %err, "failed to persist browse filters");
        }
    }

    pub fn shows_status(&self, status: &str) -> bool {
        *self.status_filters.get(status).unwrap_or(&true)
    }

    pub fn shows_type(&self, kind: &str) -> bool {
        *self.type_filters.get(kind).unwrap_or(&true)
    }

    pub fn toggle_status(&mut self, status: &str) {
        let current = self.shows_status(status);
        self.status_filters.insert(status.to_string(), !current);
    }
}
