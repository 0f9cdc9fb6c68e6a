//! Resolves the on-disk layout: data home, sessions root, store path, and
//! the two config file locations. Mirrors the defensive, default-on-failure
//! style of `config::get_claude_dir` elsewhere in this codebase.

use std::path::PathBuf;

/// `$XDG_DATA_HOME/grove-hooks/` if set, else `~/.grove/hooks/`.
pub fn data_home() -> Option<PathBuf> {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        if !xdg.is_empty() {
            return Some(PathBuf::from(xdg).join("grove-hooks"));
        }
    }
    dirs::home_dir().map(|h| h.join(".grove").join("hooks"))
}

pub fn sessions_root() -> Option<PathBuf> {
    data_home().map(|d| d.join("sessions"))
}

pub fn store_path() -> Option<PathBuf> {
    data_home().map(|d| d.join("state.db"))
}

pub fn flow_cache_path() -> Option<PathBuf> {
    data_home().map(|d| d.join("flow_jobs_cache.json"))
}

pub fn browse_filters_path() -> Option<PathBuf> {
    data_home().map(|d| d.join("browse_filters.json"))
}

/// Repo-local `.canopy.yaml`, searched for directly in `workdir` (no upward
/// walk — the hook runs with the agent's own working directory).
pub fn repo_config_path(workdir: &std::path::Path) -> PathBuf {
    workdir.join(".canopy.yaml")
}

/// Global `~/.config/canopy/config.yaml`.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("canopy").join("config.yaml"))
}
