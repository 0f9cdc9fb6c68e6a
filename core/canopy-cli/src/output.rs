//! Plain-text and `--json` rendering for the `sessions` verb family. No
//! table-drawing crate is in the pack's dependency stack for any example
//! repo, so this mirrors the teacher's own `println!`-based reporting style
//! (see `hud-core::state::daemon`'s status lines) rather than reaching for
//! one.

use canopy_core::Session;
use chrono::Utc;

pub fn print_json(sessions: &[Session]) {
    let mut sessions = sessions.to_vec();
    for session in &mut sessions {
        session.compute_derived();
    }
    match serde_json::to_string_pretty(&sessions) {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("canopy: failed to serialize sessions: {err}"),
    }
}

pub fn print_table(sessions: &[Session]) {
    if sessions.is_empty() {
        println!("no sessions");
        return;
    }

    println!(
        "{:<24} {:<12} {:<16} {:<28} {:>8}",
        "ID", "STATUS", "KIND", "REPO / PLAN", "AGE"
    );
    let now = Utc::now();
    for session in sessions {
        let repo_or_plan = session
            .repo
            .clone()
            .or_else(|| session.plan_name.clone())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<24} {:<12} {:<16} {:<28} {:>7}s",
            truncate(&session.id, 24),
            status_str(session.status),
            kind_str(session.kind),
            truncate(&repo_or_plan, 28),
            session.state_duration_seconds(now),
        );
    }
}

pub fn print_session_detail(session: &Session) {
    let mut session = session.clone();
    session.compute_derived();
    println!("id:                {}", session.id);
    println!("kind:              {}", kind_str(session.kind));
    println!("status:            {}", status_str(session.status));
    println!("pid:               {}", session.pid);
    println!("provider:          {}", session.provider);
    println!("repo:              {}", session.repo.as_deref().unwrap_or("-"));
    println!("branch:            {}", session.branch.as_deref().unwrap_or("-"));
    println!(
        "working_directory: {}",
        session.working_directory.as_deref().unwrap_or("-")
    );
    println!("plan_name:         {}", session.plan_name.as_deref().unwrap_or("-"));
    println!("job_title:         {}", session.job_title.as_deref().unwrap_or("-"));
    println!("started_at:        {}", session.started_at.to_rfc3339());
    println!("last_activity:     {}", session.last_activity.to_rfc3339());
    println!(
        "ended_at:          {}",
        session
            .ended_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string())
    );
    if let Some(summary) = &session.session_summary {
        println!("summary:           {summary}");
    }
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        value.to_string()
    } else {
        let head: String = value.chars().take(width.saturating_sub(1)).collect();
        format!("{head}…")
    }
}

fn status_str(status: canopy_core::SessionStatus) -> &'static str {
    use canopy_core::SessionStatus::*;
    match status {
        Running => "running",
        Idle => "idle",
        PendingUser => "pending_user",
        Completed => "completed",
        Interrupted => "interrupted",
        Failed => "failed",
        Error => "error",
        Todo => "todo",
        Hold => "hold",
        Abandoned => "abandoned",
    }
}

fn kind_str(kind: canopy_core::SessionKind) -> &'static str {
    use canopy_core::SessionKind::*;
    match kind {
        Interactive => "interactive",
        OneshotJob => "oneshot_job",
        InteractiveAgent => "interactive_agent",
        Chat => "chat",
        HeadlessAgent => "headless_agent",
        Shell => "shell",
    }
}
