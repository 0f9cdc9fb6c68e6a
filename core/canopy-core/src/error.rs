//! Error types, grouped the way a hook process needs to reason about them:
//! propagate-and-exit, log-and-continue (not an error variant at all — see
//! call sites), or propagate-as-blocking.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CanopyError {
    // ── Configuration ──────────────────────────────────────────────
    #[error("data home could not be determined (no XDG_DATA_HOME or HOME)")]
    DataHomeNotFound,

    #[error("config malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    // ── Session Store ──────────────────────────────────────────────
    #[error("store unavailable at {path}: {source}")]
    StoreUnavailable {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("store query failed: {0}")]
    StoreQuery(#[from] rusqlite::Error),

    // ── Filesystem Session Registry ────────────────────────────────
    #[error("io error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed session directory: {0}")]
    MalformedSessionDir(PathBuf),

    // ── Hook input / output ─────────────────────────────────────────
    #[error("hook input malformed: {0}")]
    HookInputMalformed(String),

    #[error("blocking stop command failed: {command}")]
    BlockingStopCommand { command: String, stderr: String },

    // ── JSON / YAML (de)serialization ───────────────────────────────
    #[error("json error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("yaml error: {context}: {source}")]
    Yaml {
        context: String,
        #[source]
        source: serde_yaml::Error,
    },
}

pub type Result<T> = std::result::Result<T, CanopyError>;

impl CanopyError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        CanopyError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        CanopyError::Json {
            context: context.into(),
            source,
        }
    }

    pub fn yaml(context: impl Into<String>, source: serde_yaml::Error) -> Self {
        CanopyError::Yaml {
            context: context.into(),
            source,
        }
    }

    /// The exit code a hook process should use if this error propagates to
    /// `main` (0 or 1; blocking is handled separately by the caller since it
    /// needs the command's own stderr relayed verbatim).
    pub fn exit_code(&self) -> i32 {
        match self {
            CanopyError::BlockingStopCommand { .. } => 2,
            _ => 1,
        }
    }
}
