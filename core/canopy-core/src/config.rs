//! Repo-local and global configuration. Missing files yield defaults rather
//! than an error — the same defensive load pattern applied to `hud.json`
//! (`config::load_hud_config`) elsewhere in this codebase, generalized from
//! JSON to YAML since both config files here are YAML.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunIf {
    Changes,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OnStopCommand {
    pub name: String,
    pub command: String,
    pub run_if: Option<RunIf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HooksConfig {
    #[serde(default)]
    pub on_stop: Vec<OnStopCommand>,
}

/// `<workdir>/.canopy.yaml`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RepoConfig {
    #[serde(default)]
    pub hooks: HooksConfig,
}

impl RepoConfig {
    /// Returns defaults (no on_stop commands) if the file is absent or
    /// unparseable — a malformed repo config must never fail a hook.
    pub fn load(workdir: &std::path::Path) -> Self {
        let path = crate::paths::repo_config_path(workdir);
        match fs_err::read_to_string(&path) {
            Ok(contents) => serde_yaml::from_str(&contents).unwrap_or_else(|err| {
                tracing::warn!(path = %path.display(), error = %err, "ignoring malformed .canopy.yaml");
                RepoConfig::default()
            }),
            Err(_) => RepoConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NtfyConfig {
    #[serde(default)]
    pub enabled: bool,
    pub url: Option<String>,
    pub topic: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NotificationsConfig {
    #[serde(default)]
    pub ntfy: NtfyConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SystemConfig {
    #[serde(default = "default_system_levels")]
    pub levels: Vec<String>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        SystemConfig {
            levels: default_system_levels(),
        }
    }
}

fn default_system_levels() -> Vec<String> {
    vec!["error".to_string(), "warning".to_string()]
}

/// `~/.config/canopy/config.yaml`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub system: SystemConfig,
}

impl GlobalConfig {
    pub fn load() -> Self {
        let Some(path) = crate::paths::global_config_path() else {
            return GlobalConfig::default();
        };
        match fs_err::read_to_string(&path) {
            Ok(contents) => serde_yaml::from_str(&contents).unwrap_or_else(|err| {
                tracing::warn!(path = %path.display(), error = %err, "ignoring malformed global config");
                GlobalConfig::default()
            }),
            Err(_) => GlobalConfig::default(),
        }
    }

    pub fn is_system_level(&self, level: &str) -> bool {
        self.system.levels.iter().any(|l| l == level)
    }
}
