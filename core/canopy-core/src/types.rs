//! Shared type vocabulary: the `Session` entity, its sub-records, and the
//! flow-job descriptor. Every crate in the workspace exchanges these types
//! rather than inventing its own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default `provider` value when a hook doesn't say otherwise.
pub const DEFAULT_PROVIDER: &str = "claude";

/// What kind of process a session tracks. Values beyond `Interactive` are
/// supplied by the external orchestrator and passed through verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Interactive,
    OneshotJob,
    InteractiveAgent,
    Chat,
    HeadlessAgent,
    Shell,
}

impl SessionKind {
    /// Parses an orchestrator-supplied `type` string, falling back to
    /// `OneshotJob` for anything unrecognized rather than failing the read.
    pub fn from_flow_type(raw: &str) -> Self {
        match raw {
            "interactive" => SessionKind::Interactive,
            "interactive_agent" => SessionKind::InteractiveAgent,
            "chat" => SessionKind::Chat,
            "headless_agent" => SessionKind::HeadlessAgent,
            "shell" => SessionKind::Shell,
            _ => SessionKind::OneshotJob,
        }
    }

    /// Non-chat, non-interactive-agent job types require a live `<file>.lock`
    /// PID to be considered running.
    pub fn requires_job_lock(self) -> bool {
        !matches!(self, SessionKind::Chat | SessionKind::InteractiveAgent)
    }
}

/// Lifecycle status. `Completed | Failed | Interrupted | Error | Abandoned`
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Idle,
    PendingUser,
    Completed,
    Interrupted,
    Failed,
    Error,
    Todo,
    Hold,
    Abandoned,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Completed
                | SessionStatus::Failed
                | SessionStatus::Interrupted
                | SessionStatus::Error
                | SessionStatus::Abandoned
        )
    }

    /// Sort bucket used by the reconciler: running=1, idle=2, else=3.
    pub fn sort_bucket(self) -> u8 {
        match self {
            SessionStatus::Running => 1,
            SessionStatus::Idle => 2,
            _ => 3,
        }
    }
}

/// A hook-lifecycle event appended to a session's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    pub recorded_at: DateTime<Utc>,
    pub hook_event_name: String,
    pub payload: serde_json::Value,
}

/// One tool invocation, opened by `pre_tool_use` and closed by `post_tool_use`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecution {
    pub tool_id: String,
    pub tool_name: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: Option<u64>,
    pub success: Option<bool>,
    pub error: Option<String>,
    pub result_summary: Option<String>,
    pub params: serde_json::Value,
}

/// A notification fired or logged against a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub recorded_at: DateTime<Utc>,
    pub level: String,
    pub message: String,
    pub system_sent: bool,
}

/// Per-session aggregate tool counters. Computed on read, never persisted
/// independently — summing `tool_executions` would otherwise become a
/// second, driftable source of truth.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolStats {
    pub total_calls: u32,
    pub errors: u32,
    pub by_tool_name: HashMap<String, u32>,
}

impl ToolStats {
    pub fn from_executions(executions: &[ToolExecution]) -> Self {
        let mut stats = ToolStats::default();
        for exec in executions {
            stats.total_calls += 1;
            if exec.success == Some(false) {
                stats.errors += 1;
            }
            *stats.by_tool_name.entry(exec.tool_name.clone()).or_insert(0) += 1;
        }
        stats
    }
}

/// The central entity of the whole system. Identity is `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub kind: SessionKind,
    #[serde(default = "default_provider")]
    pub provider: String,
    pub status: SessionStatus,
    #[serde(default)]
    pub pid: i64,

    pub repo: Option<String>,
    pub branch: Option<String>,
    pub working_directory: Option<String>,
    pub user: Option<String>,
    pub tmux_key: Option<String>,

    pub plan_name: Option<String>,
    pub plan_directory: Option<String>,
    pub job_title: Option<String>,
    pub job_file_path: Option<String>,

    /// Set when `kind = interactive_agent` and `GROVE_FLOW_JOB_ID` was present
    /// at creation (invariant 4): the runtime's own session UUID, preserved
    /// alongside the flow job id that became this session's `id`.
    pub claude_session_id: Option<String>,

    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub archived: bool,
    pub error: Option<String>,

    #[serde(default)]
    pub events: Vec<SessionEvent>,
    #[serde(default)]
    pub tool_executions: Vec<ToolExecution>,
    #[serde(default)]
    pub notifications: Vec<NotificationRecord>,

    #[serde(default)]
    pub tool_stats: ToolStats,
    pub session_summary: Option<String>,
}

fn default_provider() -> String {
    DEFAULT_PROVIDER.to_string()
}

impl Session {
    pub fn new(id: impl Into<String>, kind: SessionKind, now: DateTime<Utc>) -> Self {
        Session {
            id: id.into(),
            kind,
            provider: DEFAULT_PROVIDER.to_string(),
            status: SessionStatus::Running,
            pid: 0,
            repo: None,
            branch: None,
            working_directory: None,
            user: None,
            tmux_key: None,
            plan_name: None,
            plan_directory: None,
            job_title: None,
            job_file_path: None,
            claude_session_id: None,
            started_at: now,
            last_activity: now,
            ended_at: None,
            archived: false,
            error: None,
            events: Vec::new(),
            tool_executions: Vec::new(),
            notifications: Vec::new(),
            tool_stats: ToolStats::default(),
            session_summary: None,
        }
    }

    /// Fills `tool_stats` and `session_summary` from the session's own
    /// sub-records. Called by read paths before returning a `Session` over
    /// the `--json` surface; never stored.
    pub fn compute_derived(&mut self) {
        self.tool_stats = ToolStats::from_executions(&self.tool_executions);
        if self.tool_stats.total_calls > 0 {
            self.session_summary = Some(format!(
                "{} tool call{}{}",
                self.tool_stats.total_calls,
                if self.tool_stats.total_calls == 1 { "" } else { "s" },
                if self.tool_stats.errors > 0 {
                    format!(", {} error{}", self.tool_stats.errors, if self.tool_stats.errors == 1 { "" } else { "s" })
                } else {
                    String::new()
                }
            ));
        }
    }

    /// Time since the session last moved, measured against `ended_at` once
    /// terminal.
    pub fn state_duration_seconds(&self, now: DateTime<Utc>) -> i64 {
        let delta = match self.ended_at {
            Some(ended) => ended - self.started_at,
            None => now - self.last_activity,
        };
        delta.num_seconds().max(0)
    }

    pub fn mark_active(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }

    pub fn transition_terminal(&mut self, status: SessionStatus, now: DateTime<Utc>) {
        debug_assert!(status.is_terminal());
        self.status = status;
        if self.ended_at.is_none() {
            self.ended_at = Some(now);
        }
    }
}

/// A single job parsed from the external orchestrator's plan/job Markdown,
/// before it's mapped into a `Session`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowJobDescriptor {
    pub id: String,
    pub title: String,
    pub status: String,
    #[serde(rename = "type")]
    pub job_type: String,
    pub start_time: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub worktree: Option<String>,
    pub file_path: String,
}

impl FlowJobDescriptor {
    /// A job is "live" iff its frontmatter status is `running`/`pending_user`
    /// and the lock rule for its type holds.
    pub fn is_live(&self, lock_pid_alive: Option<bool>) -> bool {
        let status_live = matches!(self.status.as_str(), "running" | "pending_user");
        if !status_live {
            return false;
        }
        match lock_pid_alive {
            Some(alive) => alive,
            None => !SessionKind::from_flow_type(&self.job_type).requires_job_lock(),
        }
    }
}

/// A plan: a directory containing one or more job Markdown files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowPlan {
    pub title: String,
    pub path: String,
    pub workspace_name: Option<String>,
    pub jobs: Vec<FlowJobDescriptor>,
}

/// On-disk `pid.lock` + `metadata.json` pairing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub session_id: String,
    pub pid: i64,
    pub repo: Option<String>,
    pub branch: Option<String>,
    pub tmux_key: Option<String>,
    pub working_directory: String,
    pub user: Option<String>,
    pub started_at: DateTime<Utc>,
    pub transcript_path: Option<String>,
    pub project_name: Option<String>,
    #[serde(default)]
    pub is_worktree: bool,
    pub parent_ecosystem_path: Option<String>,

    pub plan_name: Option<String>,
    pub plan_directory: Option<String>,
    pub job_title: Option<String>,
    pub job_file_path: Option<String>,
    pub claude_session_id: Option<String>,
}
