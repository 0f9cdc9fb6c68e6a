//! Hook input/output shapes. One JSON object arrives on stdin per
//! invocation; unknown fields are ignored (serde's default behavior for
//! named-field structs covers this without extra code).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "hook_event_name", rename_all = "snake_case")]
pub enum HookInput {
    PreToolUse {
        session_id: String,
        transcript_path: Option<String>,
        current_uuid: Option<String>,
        parent_uuid: Option<String>,
        tool_name: String,
        tool_input: serde_json::Value,
    },
    PostToolUse {
        session_id: String,
        transcript_path: Option<String>,
        current_uuid: Option<String>,
        parent_uuid: Option<String>,
        tool_name: String,
        tool_input: serde_json::Value,
        tool_response: serde_json::Value,
        tool_duration_ms: u64,
        tool_error: Option<String>,
        tool_use_id: Option<String>,
    },
    Notification {
        session_id: String,
        transcript_path: Option<String>,
        current_uuid: Option<String>,
        parent_uuid: Option<String>,
        #[serde(rename = "type")]
        notification_type: String,
        message: String,
        level: String,
        #[serde(default)]
        system_notification_sent: bool,
    },
    Stop {
        session_id: String,
        transcript_path: Option<String>,
        current_uuid: Option<String>,
        parent_uuid: Option<String>,
        #[serde(default)]
        exit_reason: String,
        duration_ms: u64,
    },
    SubagentStop {
        session_id: String,
        transcript_path: Option<String>,
        current_uuid: Option<String>,
        parent_uuid: Option<String>,
        subagent_id: String,
        subagent_task: String,
        duration_ms: u64,
        status: String,
        result: Option<String>,
        error: Option<String>,
    },
}

impl HookInput {
    pub fn session_id(&self) -> &str {
        match self {
            HookInput::PreToolUse { session_id, .. }
            | HookInput::PostToolUse { session_id, .. }
            | HookInput::Notification { session_id, .. }
            | HookInput::Stop { session_id, .. }
            | HookInput::SubagentStop { session_id, .. } => session_id,
        }
    }

    pub fn transcript_path(&self) -> Option<&str> {
        match self {
            HookInput::PreToolUse { transcript_path, .. }
            | HookInput::PostToolUse { transcript_path, .. }
            | HookInput::Notification { transcript_path, .. }
            | HookInput::Stop { transcript_path, .. }
            | HookInput::SubagentStop { transcript_path, .. } => transcript_path.as_deref(),
        }
    }

    /// Parses a hook invocation's stdin. Malformed JSON is the
    /// propagate-and-exit case — returned as a `CanopyError` rather than
    /// panicking.
    pub fn parse(raw: &str) -> canopy_core::Result<Self> {
        serde_json::from_str(raw).map_err(|e| canopy_core::CanopyError::HookInputMalformed(e.to_string()))
    }
}

/// `pre_tool_use`'s stdout response. All other hooks produce no stdout on
/// success.
#[derive(Debug, Clone, Serialize)]
pub struct PreToolUseResponse {
    pub approved: bool,
    pub message: Option<String>,
}

/// `oneshot start` subcommand payload — not a classic hook, so it gets its
/// own input shape rather than a `HookInput` variant.
#[derive(Debug, Clone, Deserialize)]
pub struct OneshotStartInput {
    pub id: String,
    pub plan_name: Option<String>,
    pub plan_directory: Option<String>,
    pub job_title: Option<String>,
    pub job_file_path: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// `oneshot stop` subcommand payload.
#[derive(Debug, Clone, Deserialize)]
pub struct OneshotStopInput {
    pub id: String,
    pub status: String,
    pub error: Option<String>,
}
