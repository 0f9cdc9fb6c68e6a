//! The Hook Engine: one short-lived invocation per call, reading a single
//! `HookInput` and mutating the filesystem registry + store. Each handler
//! implements exactly the behavior assigned to its event; shared plumbing
//! (identity resolution, ensure-session, on_stop execution) is factored out
//! so the individual handlers read as a checklist rather than a pile of
//! incidental machinery.

use std::path::{Path, PathBuf};
use std::process::Command;

use canopy_core::config::{GlobalConfig, RepoConfig, RunIf};
use canopy_core::{
    CanopyError, NotificationRecord, Result, Session, SessionEvent, SessionKind, SessionStatus,
    ToolExecution,
};
use canopy_store::Store;
use chrono::Utc;

use crate::adapters::{GitInfo, Notifier, TmuxDetector};
use crate::input::{HookInput, OneshotStartInput, OneshotStopInput, PreToolUseResponse};

/// Everything a hook invocation needs, constructed once per process.
pub struct HookContext {
    pub store: Store,
    pub fs_root: PathBuf,
    pub working_dir: PathBuf,
    pub global_config: GlobalConfig,
    pub notifier: Box<dyn Notifier>,
    pub tmux: Box<dyn TmuxDetector>,
    pub git: Box<dyn GitInfo>,
}

impl HookContext {
    /// Production wiring: real adapters, `XDG_DATA_HOME`/`~/.grove/hooks`
    /// path resolution, the process's own working directory.
    pub fn production() -> Result<Self> {
        let fs_root = canopy_core::paths::sessions_root().ok_or(CanopyError::DataHomeNotFound)?;
        let store_path = canopy_core::paths::store_path().ok_or(CanopyError::DataHomeNotFound)?;
        let working_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        Ok(HookContext {
            store: Store::open(store_path)?,
            fs_root,
            working_dir,
            global_config: GlobalConfig::load(),
            notifier: Box::new(crate::adapters::DesktopNotifier),
            tmux: Box::new(crate::adapters::RealTmuxDetector),
            git: Box::new(crate::adapters::RealGitInfo),
        })
    }
}

/// Invariant 4: if `GROVE_FLOW_JOB_ID` is set, the session's durable id is
/// the flow job id, and the runtime's own session id is preserved separately
/// as `claude_session_id`.
fn resolve_identity(runtime_session_id: &str) -> (String, Option<String>, SessionKind) {
    match std::env::var("GROVE_FLOW_JOB_ID") {
        Ok(job_id) if !job_id.is_empty() => (
            job_id,
            Some(runtime_session_id.to_string()),
            SessionKind::InteractiveAgent,
        ),
        _ => (runtime_session_id.to_string(), None, SessionKind::Interactive),
    }
}

fn flow_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// The PID recorded in `pid.lock` must be the coding-agent runtime's own
/// process, not this short-lived hook's. The runtime spawns each hook as a
/// direct child, so the hook's own parent PID is the agent's PID;
/// `CLAUDE_PID` overrides that heuristic when set. Follows `hud-hook::handle::
/// get_ppid` elsewhere in this codebase, which uses the same
/// `libc::getppid()` call for the same reason from before `CLAUDE_PID`
/// existed.
fn resolve_agent_pid() -> i64 {
    if let Some(pid) = std::env::var("CLAUDE_PID")
        .ok()
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .filter(|&pid| pid > 0)
    {
        return pid;
    }
    parent_pid().unwrap_or_else(|| std::process::id() as i64)
}

#[cfg(unix)]
fn parent_pid() -> Option<i64> {
    let ppid = unsafe { libc::getppid() };
    (ppid > 0).then_some(ppid as i64)
}

#[cfg(not(unix))]
fn parent_pid() -> Option<i64> {
    None
}

fn tool_stash_path(runtime_session_id: &str) -> PathBuf {
    std::env::temp_dir().join(format!("canopy-tool-{runtime_session_id}.json"))
}

#[derive(serde::Serialize, serde::Deserialize)]
struct ToolStash {
    tool_id: String,
    effective_session_id: String,
}

fn log_event(ctx: &HookContext, session_id: &str, hook_event_name: &str, payload: serde_json::Value) {
    let event = SessionEvent {
        recorded_at: Utc::now(),
        hook_event_name: hook_event_name.to_string(),
        payload,
    };
    if let Err(err) = ctx.store.log_event(session_id, &event) {
        tracing::warn!(session_id, error = %err, "failed to log event, continuing");
    }
}

/// Pre-tool-use's "ensure session exists, creating the filesystem directory
/// if absent". Builds context (repo/branch/tmux/user) from the adapter
/// traits and `GROVE_FLOW_*` env vars.
fn ensure_session_and_directory(
    ctx: &HookContext,
    runtime_session_id: &str,
    transcript_path: Option<&str>,
) -> Result<String> {
    let (effective_id, claude_session_id, kind) = resolve_identity(runtime_session_id);
    let pid = resolve_agent_pid();
    let git = ctx.git.info(&ctx.working_dir);
    let tmux_key = ctx.tmux.detect(&ctx.working_dir);
    let user = std::env::var("USER").ok();
    let now = Utc::now();

    let metadata = canopy_core::SessionMetadata {
        session_id: effective_id.clone(),
        pid,
        repo: git.repo.clone(),
        branch: git.branch.clone(),
        tmux_key: tmux_key.clone(),
        working_directory: ctx.working_dir.to_string_lossy().to_string(),
        user: user.clone(),
        started_at: now,
        transcript_path: transcript_path.map(str::to_string),
        project_name: git.repo.clone(),
        is_worktree: git.is_worktree,
        parent_ecosystem_path: None,
        plan_name: flow_env("GROVE_FLOW_PLAN_NAME"),
        plan_directory: flow_env("GROVE_FLOW_PLAN_DIRECTORY"),
        job_title: flow_env("GROVE_FLOW_TITLE"),
        job_file_path: flow_env("GROVE_FLOW_JOB_PATH"),
        claude_session_id: claude_session_id.clone(),
    };

    canopy_fs::adopt_or_create(&ctx.fs_root, &effective_id, pid, &metadata)?;

    let mut session = Session::new(effective_id.clone(), kind, now);
    session.pid = pid;
    session.repo = git.repo;
    session.branch = git.branch;
    session.tmux_key = tmux_key;
    session.working_directory = Some(ctx.working_dir.to_string_lossy().to_string());
    session.user = user;
    session.plan_name = metadata.plan_name;
    session.plan_directory = metadata.plan_directory;
    session.job_title = metadata.job_title;
    session.job_file_path = metadata.job_file_path;
    session.claude_session_id = claude_session_id;

    ctx.store.ensure_session_exists(&session)?;
    Ok(effective_id)
}

/// Lighter path for hooks after the directory already exists (stop,
/// notification, subagent-stop): only touches the store row, resolving
/// identity the same way pre-tool-use did for the same runtime session id.
fn ensure_store_row(ctx: &HookContext, runtime_session_id: &str) -> Result<String> {
    let (effective_id, claude_session_id, kind) = resolve_identity(runtime_session_id);
    if let Some(existing) = ctx.store.get(&effective_id)? {
        let _ = existing;
        return Ok(effective_id);
    }
    let mut session = Session::new(effective_id.clone(), kind, Utc::now());
    session.claude_session_id = claude_session_id;
    ctx.store.ensure_session_exists(&session)?;
    Ok(effective_id)
}

fn handle_pre_tool_use(
    ctx: &HookContext,
    runtime_session_id: &str,
    transcript_path: Option<&str>,
    tool_name: &str,
    tool_input: serde_json::Value,
) -> Result<PreToolUseResponse> {
    let effective_id = ensure_session_and_directory(ctx, runtime_session_id, transcript_path)?;

    // Default policy: approve every tool.
    let approved = true;

    if approved {
        let tool_id = format!("{effective_id}_{}", Utc::now().timestamp_nanos_opt().unwrap_or(0));
        let execution = ToolExecution {
            tool_id: tool_id.clone(),
            tool_name: tool_name.to_string(),
            started_at: Utc::now(),
            duration_ms: None,
            success: None,
            error: None,
            result_summary: None,
            params: tool_input.clone(),
        };
        ctx.store.log_tool_usage(&effective_id, &execution)?;

        let stash = ToolStash {
            tool_id,
            effective_session_id: effective_id.clone(),
        };
        if let Ok(json) = serde_json::to_vec(&stash) {
            if let Err(err) = fs_err::write(tool_stash_path(runtime_session_id), json) {
                tracing::warn!(error = %err, "failed to stash tool id, post_tool_use won't find a match");
            }
        }
    }

    log_event(
        ctx,
        &effective_id,
        "pre_tool_use",
        serde_json::json!({"tool_name": tool_name, "tool_input": tool_input}),
    );

    Ok(PreToolUseResponse {
        approved,
        message: None,
    })
}

/// Per-tool result summaries, e.g. `command` for shell tools, a
/// `modified ...` note for edit tools.
fn summarize_tool(tool_name: &str, tool_input: &serde_json::Value, tool_response: &serde_json::Value) -> Option<String> {
    match tool_name {
        "Bash" => tool_input
            .get("command")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        "Edit" | "Write" | "MultiEdit" => tool_input
            .get("file_path")
            .and_then(|v| v.as_str())
            .map(|s| format!("modified {s}")),
        _ => tool_response
            .get("summary")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
    }
}

fn handle_post_tool_use(
    ctx: &HookContext,
    runtime_session_id: &str,
    tool_name: &str,
    tool_input: &serde_json::Value,
    tool_response: &serde_json::Value,
    tool_duration_ms: u64,
    tool_error: Option<&str>,
) -> Result<()> {
    let stash_path = tool_stash_path(runtime_session_id);
    let Some(stash): Option<ToolStash> = canopy_core::atomic::read_json(&stash_path) else {
        tracing::warn!(runtime_session_id, "no stashed tool id for post_tool_use, skipping update");
        return Ok(());
    };

    let success = tool_error.is_none();
    let summary = summarize_tool(tool_name, tool_input, tool_response);
    if let Err(err) = ctx
        .store
        .update_tool_execution(&stash.tool_id, tool_duration_ms, success, tool_error, summary.as_deref())
    {
        tracing::warn!(tool_id = %stash.tool_id, error = %err, "failed to update tool execution");
    }

    log_event(
        ctx,
        &stash.effective_session_id,
        "post_tool_use",
        serde_json::json!({"tool_name": tool_name, "success": success}),
    );

    let _ = fs_err::remove_file(&stash_path);
    Ok(())
}

fn handle_notification(
    ctx: &HookContext,
    runtime_session_id: &str,
    notification_type: &str,
    message: &str,
    level: &str,
) -> Result<()> {
    let effective_id = ensure_store_row(ctx, runtime_session_id)?;

    let system_sent = ctx.global_config.is_system_level(level);
    let record = NotificationRecord {
        recorded_at: Utc::now(),
        level: level.to_string(),
        message: message.to_string(),
        system_sent,
    };
    ctx.store.log_notification(&effective_id, &record)?;

    if system_sent {
        ctx.notifier.send("canopy", message, level, &[notification_type]);
    }

    log_event(ctx, &effective_id, "notification", serde_json::json!({"type": notification_type, "level": level}));
    Ok(())
}

/// Runs `<workdir>/.canopy.yaml`'s `hooks.on_stop` commands in order. An
/// exit code of 2 is a blocking error: propagated as `Err` immediately,
/// before any status transition, carrying the command's own stderr
/// verbatim.
fn run_on_stop_commands(ctx: &HookContext, workdir: &Path) -> Result<()> {
    let config = RepoConfig::load(workdir);
    for cmd in &config.hooks.on_stop {
        if cmd.run_if == Some(RunIf::Changes) && !ctx.git.has_changes(workdir) {
            continue;
        }

        let output = Command::new("sh").arg("-c").arg(&cmd.command).current_dir(workdir).output();
        let output = match output {
            Ok(output) => output,
            Err(err) => {
                tracing::warn!(name = %cmd.name, error = %err, "on_stop command failed to spawn, skipping");
                continue;
            }
        };

        match output.status.code() {
            Some(2) => {
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();
                return Err(CanopyError::BlockingStopCommand {
                    command: cmd.name.clone(),
                    stderr,
                });
            }
            Some(0) => {}
            _ => {
                tracing::warn!(
                    name = %cmd.name,
                    status = ?output.status.code(),
                    stderr = %String::from_utf8_lossy(&output.stderr),
                    "on_stop command exited non-zero, continuing"
                );
            }
        }
    }
    Ok(())
}

fn handle_stop(ctx: &HookContext, runtime_session_id: &str, exit_reason: &str) -> Result<()> {
    let effective_id = ensure_store_row(ctx, runtime_session_id)?;

    if let Some(session) = ctx.store.get(&effective_id)? {
        if let Some(workdir) = session.working_directory.as_deref() {
            run_on_stop_commands(ctx, Path::new(workdir))?;
        }
    }

    let terminal = matches!(exit_reason, "completed" | "error" | "interrupted" | "killed");
    let (new_status, message) = if terminal {
        (SessionStatus::Completed, "session completed")
    } else {
        (SessionStatus::Idle, "session stopped")
    };

    ctx.store.update_status(&effective_id, new_status)?;

    // The explicit terminal-hook teardown path: the runtime process is
    // already exiting on its own, so this just removes the directory,
    // unlike `kill` which also signals a still-live PID.
    if terminal {
        if let Err(err) = canopy_fs::remove(&ctx.fs_root, &effective_id) {
            tracing::warn!(session_id = %effective_id, error = %err, "failed to remove session directory on stop, continuing");
        }
    }

    // Notifications are best-effort and never block the status update —
    // the notifier trait already swallows its own errors.
    ctx.notifier.send("canopy", message, "info", &[]);

    log_event(ctx, &effective_id, "stop", serde_json::json!({"exit_reason": exit_reason}));
    Ok(())
}

fn handle_subagent_stop(
    ctx: &HookContext,
    runtime_session_id: &str,
    subagent_id: &str,
    subagent_task: &str,
    status: &str,
    error: Option<&str>,
) -> Result<()> {
    let effective_id = ensure_store_row(ctx, runtime_session_id)?;
    log_event(
        ctx,
        &effective_id,
        "subagent_stop",
        serde_json::json!({
            "subagent_id": subagent_id,
            "subagent_task": subagent_task,
            "status": status,
            "error": error,
        }),
    );
    Ok(())
}

/// Top-level dispatch for the five classic hooks. Returns `Some(response)`
/// only for `pre_tool_use`.
pub fn handle(ctx: &HookContext, input: HookInput) -> Result<Option<PreToolUseResponse>> {
    match input {
        HookInput::PreToolUse {
            session_id,
            transcript_path,
            tool_name,
            tool_input,
            ..
        } => {
            let response = handle_pre_tool_use(ctx, &session_id, transcript_path.as_deref(), &tool_name, tool_input)?;
            Ok(Some(response))
        }
        HookInput::PostToolUse {
            session_id,
            tool_name,
            tool_input,
            tool_response,
            tool_duration_ms,
            tool_error,
            ..
        } => {
            handle_post_tool_use(
                ctx,
                &session_id,
                &tool_name,
                &tool_input,
                &tool_response,
                tool_duration_ms,
                tool_error.as_deref(),
            )?;
            Ok(None)
        }
        HookInput::Notification {
            session_id,
            notification_type,
            message,
            level,
            ..
        } => {
            handle_notification(ctx, &session_id, &notification_type, &message, &level)?;
            Ok(None)
        }
        HookInput::Stop {
            session_id,
            exit_reason,
            ..
        } => {
            handle_stop(ctx, &session_id, &exit_reason)?;
            Ok(None)
        }
        HookInput::SubagentStop {
            session_id,
            subagent_id,
            subagent_task,
            status,
            error,
            ..
        } => {
            handle_subagent_stop(ctx, &session_id, &subagent_id, &subagent_task, &status, error.as_deref())?;
            Ok(None)
        }
    }
}

/// `oneshot start`: creates/adopts a job session, firing a "waiting for
/// input" notification when the payload's status is `pending_user`.
pub fn handle_oneshot_start(ctx: &HookContext, input: OneshotStartInput) -> Result<()> {
    let status = parse_job_status(input.status.as_deref().unwrap_or("running"));
    let now = Utc::now();

    let mut session = Session::new(input.id.clone(), SessionKind::OneshotJob, now);
    session.status = status;
    session.plan_name = input.plan_name;
    session.plan_directory = input.plan_directory;
    session.job_title = input.job_title;
    session.job_file_path = input.job_file_path;

    ctx.store.ensure_session_exists(&session)?;

    if status == SessionStatus::PendingUser {
        ctx.notifier.send("canopy", "waiting for input", "info", &[&input.id]);
    }
    Ok(())
}

/// `oneshot stop`: transitions the row via `update_status_with_error`,
/// firing an outcome notification for `completed|failed|success`.
pub fn handle_oneshot_stop(ctx: &HookContext, input: OneshotStopInput) -> Result<()> {
    let status = parse_job_status(&input.status);
    ctx.store.update_status_with_error(&input.id, status, input.error.as_deref())?;

    if matches!(input.status.as_str(), "completed" | "failed" | "success") {
        ctx.notifier.send(
            "canopy",
            &format!("job {} {}", input.id, input.status),
            "info",
            &[&input.id],
        );
    }
    Ok(())
}

fn parse_job_status(raw: &str) -> SessionStatus {
    match raw {
        "running" => SessionStatus::Running,
        "pending_user" => SessionStatus::PendingUser,
        "completed" | "success" => SessionStatus::Completed,
        "failed" => SessionStatus::Failed,
        "interrupted" => SessionStatus::Interrupted,
        "error" => SessionStatus::Error,
        "todo" => SessionStatus::Todo,
        "hold" => SessionStatus::Hold,
        "abandoned" => SessionStatus::Abandoned,
        _ => SessionStatus::Running,
    }
}
