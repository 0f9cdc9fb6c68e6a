//! `sessions` verb family: the CLI's reporting and maintenance surface.

use canopy_core::{Session, SessionStatus};
use chrono::{Duration, Utc};

use crate::context::CliContext;
use crate::output;

fn parse_status(raw: &str) -> Option<SessionStatus> {
    Some(match raw {
        "running" => SessionStatus::Running,
        "idle" => SessionStatus::Idle,
        "pending_user" => SessionStatus::PendingUser,
        "completed" => SessionStatus::Completed,
        "interrupted" => SessionStatus::Interrupted,
        "failed" => SessionStatus::Failed,
        "error" => SessionStatus::Error,
        "todo" => SessionStatus::Todo,
        "hold" => SessionStatus::Hold,
        "abandoned" => SessionStatus::Abandoned,
        _ => return None,
    })
}

fn status_eq(status: SessionStatus, raw: &str) -> bool {
    parse_status(raw) == Some(status)
}

pub fn list(
    status: Option<String>,
    plan: Option<String>,
    kind: Option<String>,
    json: bool,
    limit: Option<usize>,
    active: bool,
) -> i32 {
    let ctx = match CliContext::open() {
        Ok(ctx) => ctx,
        Err(err) => return fail(&err),
    };

    let mut sessions = match canopy_reconcile::all_sessions(
        &ctx.store,
        &ctx.fs_root,
        &ctx.flow_cache_path,
        active,
        canopy_reconcile::DEFAULT_INACTIVITY_THRESHOLD,
    ) {
        Ok(sessions) => sessions,
        Err(err) => return fail(&err),
    };

    if let Some(status) = &status {
        sessions.retain(|s| status_eq(s.status, status));
    }
    if let Some(plan) = &plan {
        sessions.retain(|s| s.plan_name.as_deref() == Some(plan.as_str()));
    }
    if let Some(kind) = &kind {
        sessions.retain(|s| kind_matches(s, kind));
    }
    if let Some(limit) = limit {
        sessions.truncate(limit);
    }

    if json {
        output::print_json(&sessions);
    } else {
        output::print_table(&sessions);
    }
    0
}

fn kind_matches(session: &Session, raw: &str) -> bool {
    use canopy_core::SessionKind::*;
    let kind = match raw {
        "interactive" => Interactive,
        "oneshot_job" => OneshotJob,
        "interactive_agent" => InteractiveAgent,
        "chat" => Chat,
        "headless_agent" => HeadlessAgent,
        "shell" => Shell,
        _ => return false,
    };
    session.kind == kind
}

pub fn get(id: &str, json: bool) -> i32 {
    let ctx = match CliContext::open() {
        Ok(ctx) => ctx,
        Err(err) => return fail(&err),
    };

    let sessions = match canopy_reconcile::all_sessions(
        &ctx.store,
        &ctx.fs_root,
        &ctx.flow_cache_path,
        false,
        canopy_reconcile::DEFAULT_INACTIVITY_THRESHOLD,
    ) {
        Ok(sessions) => sessions,
        Err(err) => return fail(&err),
    };

    let Some(session) = sessions.into_iter().find(|s| s.id == id) else {
        eprintln!("canopy: no such session: {id}");
        return 1;
    };

    if json {
        output::print_json(std::slice::from_ref(&session));
    } else {
        output::print_session_detail(&session);
    }
    0
}

pub fn archive(ids: Vec<String>, all: bool, completed: bool, failed: bool, running: bool, idle: bool) -> i32 {
    let ctx = match CliContext::open() {
        Ok(ctx) => ctx,
        Err(err) => return fail(&err),
    };

    let target_ids = if !ids.is_empty() {
        ids
    } else {
        let all_sessions = match ctx.store.get_all() {
            Ok(sessions) => sessions,
            Err(err) => return fail(&err),
        };
        all_sessions
            .into_iter()
            .filter(|s| {
                all || (completed && s.status == SessionStatus::Completed)
                    || (failed && s.status == SessionStatus::Failed)
                    || (running && s.status == SessionStatus::Running)
                    || (idle && s.status == SessionStatus::Idle)
            })
            .map(|s| s.id)
            .collect()
    };

    if target_ids.is_empty() {
        println!("nothing to archive");
        return 0;
    }

    if let Err(err) = ctx.store.archive(&target_ids) {
        return fail(&err);
    }
    println!("archived {} session(s)", target_ids.len());
    0
}

pub fn cleanup(inactive_minutes: Option<i64>) -> i32 {
    let ctx = match CliContext::open() {
        Ok(ctx) => ctx,
        Err(err) => return fail(&err),
    };

    let threshold = inactive_minutes
        .map(Duration::minutes)
        .unwrap_or(canopy_reconcile::DEFAULT_INACTIVITY_THRESHOLD);

    match canopy_reconcile::reap(&ctx.store, threshold, Utc::now()) {
        Ok(reaped) => {
            println!("reaped {} session(s)", reaped.len());
            0
        }
        Err(err) => fail(&err),
    }
}

pub fn kill(id: &str, force: bool) -> i32 {
    let ctx = match CliContext::open() {
        Ok(ctx) => ctx,
        Err(err) => return fail(&err),
    };

    if let Err(err) = canopy_fs::kill(&ctx.fs_root, id, force) {
        return fail(&err);
    }
    // Best-effort: also reflect the kill in the durable store, if the id is
    // tracked there (fs-only or flow-only sessions may not be).
    let _ = ctx.store.update_status(id, SessionStatus::Completed);

    println!("killed {id}");
    0
}

pub fn set_status(job_file: &str, status: &str) -> i32 {
    let Some(status) = parse_status(status) else {
        eprintln!("canopy: unknown status: {status}");
        return 1;
    };

    let Some(id) = read_job_id(job_file) else {
        eprintln!("canopy: could not read job id from {job_file}");
        return 1;
    };

    let ctx = match CliContext::open() {
        Ok(ctx) => ctx,
        Err(err) => return fail(&err),
    };

    match ctx.store.update_status(&id, status) {
        Ok(()) => {
            println!("{id} -> {status:?}");
            0
        }
        Err(err) => fail(&err),
    }
}

#[derive(serde::Deserialize)]
struct JobIdFrontmatter {
    id: String,
}

fn read_job_id(job_file: &str) -> Option<String> {
    let contents = fs_err::read_to_string(job_file).ok()?;
    let body = contents.strip_prefix("---")?;
    let end = body.find("\n---")?;
    let frontmatter: JobIdFrontmatter = serde_yaml::from_str(&body[..end]).ok()?;
    Some(frontmatter.id)
}

pub fn mark_interrupted(dry_run: bool) -> i32 {
    let ctx = match CliContext::open() {
        Ok(ctx) => ctx,
        Err(err) => return fail(&err),
    };

    let all_sessions = match ctx.store.get_all() {
        Ok(sessions) => sessions,
        Err(err) => return fail(&err),
    };

    let candidates: Vec<Session> = all_sessions
        .into_iter()
        .filter(|s| matches!(s.status, SessionStatus::Running | SessionStatus::Idle))
        .filter(|s| s.pid > 0 && !canopy_liveness::is_alive(s.pid))
        .collect();

    if dry_run {
        for session in &candidates {
            println!("would mark interrupted: {}", session.id);
        }
        println!("{} candidate(s)", candidates.len());
        return 0;
    }

    let mut marked = 0;
    for session in &candidates {
        match ctx.store.update_status(&session.id, SessionStatus::Interrupted) {
            Ok(()) => marked += 1,
            Err(err) => tracing::warn!(session_id = %session.id, error = %err, "failed to mark interrupted, skipping"),
        }
    }
    println!("marked {marked} session(s) interrupted");
    0
}

fn fail(err: &canopy_core::CanopyError) -> i32 {
    eprintln!("canopy: {err}");
    1
}
