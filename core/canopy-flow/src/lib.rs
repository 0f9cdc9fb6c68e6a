//! Scrapes the external `flow` orchestrator and caches the result. No
//! direct analogue for this elsewhere in this codebase (there's no external
//! orchestrator integration already); the Markdown+YAML-frontmatter job
//! parsing is grounded on `oj-runbook`'s frontmatter parsing shape
//! (groblegark-oddjobs), adapted from HCL to YAML since that's what this
//! system's job files use. The atomic disk cache reuses the write-temp,
//! rename pattern from `StateStore::save` (see `canopy_core::atomic`).

use std::path::Path;
use std::process::Command;

use canopy_core::{FlowJobDescriptor, FlowPlan, Result, Session, SessionKind, SessionStatus};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How long a cache entry is trusted before a re-scrape is warranted. A
/// cache timestamp exactly at the boundary is still fresh.
pub const CACHE_TTL: Duration = Duration::seconds(60);

#[derive(Debug, Clone, Deserialize)]
struct PlanJson {
    title: String,
    path: String,
    workspace_name: Option<String>,
    jobs: Vec<JobJson>,
}

#[derive(Debug, Clone, Deserialize)]
struct JobJson {
    id: String,
    title: String,
    status: String,
    #[serde(rename = "type")]
    job_type: String,
    worktree: Option<String>,
    file_path: String,
    start_time: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowCache {
    pub timestamp: DateTime<Utc>,
    pub sessions: Vec<Session>,
}

/// Runs `flow plan list --json --include-finished --verbose [--all-workspaces]`.
/// `GROVE_HOOKS_DISCOVERY_MODE=local` suppresses `--all-workspaces`. Any
/// failure (binary missing, non-zero exit, unparseable output) yields an
/// empty list rather than propagating — absence of the orchestrator is
/// treated as a no-op, not an error.
pub fn invoke_flow() -> Vec<FlowPlan> {
    let local_only = std::env::var("GROVE_HOOKS_DISCOVERY_MODE")
        .map(|v| v == "local")
        .unwrap_or(false);

    let mut cmd = Command::new("flow");
    cmd.args(["plan", "list", "--json", "--include-finished", "--verbose"]);
    if !local_only {
        cmd.arg("--all-workspaces");
    }

    let output = match cmd.output() {
        Ok(output) => output,
        Err(err) => {
            tracing::debug!(error = %err, "flow CLI not available, treating as no plans");
            return Vec::new();
        }
    };

    if !output.status.success() {
        tracing::debug!(status = %output.status, "flow CLI exited non-zero, treating as no plans");
        return Vec::new();
    }

    let plans: Vec<PlanJson> = match serde_json::from_slice(&output.stdout) {
        Ok(plans) => plans,
        Err(err) => {
            tracing::warn!(error = %err, "flow CLI output unparseable, treating as no plans");
            return Vec::new();
        }
    };

    plans
        .into_iter()
        .map(|plan| FlowPlan {
            title: plan.title,
            path: plan.path,
            workspace_name: plan.workspace_name,
            jobs: plan
                .jobs
                .into_iter()
                .map(|job| FlowJobDescriptor {
                    id: job.id,
                    title: job.title,
                    status: job.status,
                    job_type: job.job_type,
                    start_time: job.start_time,
                    updated_at: job.updated_at,
                    worktree: job.worktree,
                    file_path: job.file_path,
                })
                .collect(),
        })
        .collect()
}

/// Maps scraped plans/jobs into `Session`s, deduplicating by `file_path`.
pub fn plans_to_sessions(plans: &[FlowPlan]) -> Vec<Session> {
    let mut seen_files = std::collections::HashSet::new();
    let mut sessions = Vec::new();

    for plan in plans {
        for job in &plan.jobs {
            if !seen_files.insert(job.file_path.clone()) {
                continue;
            }
            sessions.push(job_to_session(plan, job));
        }
    }
    sessions
}

fn job_to_session(plan: &FlowPlan, job: &FlowJobDescriptor) -> Session {
    let started_at = job.start_time.unwrap_or_else(Utc::now);
    let mut session = Session::new(job.id.clone(), SessionKind::from_flow_type(&job.job_type), started_at);
    session.plan_name = Some(plan.title.clone());
    session.working_directory = Some(plan.path.clone());
    session.job_title = Some(job.title.clone());
    session.job_file_path = Some(job.file_path.clone());
    session.last_activity = job.updated_at.unwrap_or(started_at);

    session.status = match job.status.as_str() {
        // Displayed as running so it doesn't read as idle while a user's reply is pending.
        "pending_user" => SessionStatus::Running,
        "running" => SessionStatus::Running,
        "completed" => {
            session.ended_at = job.updated_at;
            SessionStatus::Completed
        }
        "failed" => {
            session.ended_at = job.updated_at;
            SessionStatus::Failed
        }
        "interrupted" => {
            session.ended_at = job.updated_at;
            SessionStatus::Interrupted
        }
        "todo" => SessionStatus::Todo,
        "hold" => SessionStatus::Hold,
        "abandoned" => {
            session.ended_at = job.updated_at;
            SessionStatus::Abandoned
        }
        _ => SessionStatus::Running,
    };
    session
}

/// Frontmatter parsed back out of a job's own Markdown file, used by
/// real-time revalidation rather than the scraped JSON.
#[derive(Debug, Clone, Deserialize)]
struct JobFrontmatter {
    id: String,
    title: String,
    status: String,
    #[serde(rename = "type")]
    job_type: String,
}

fn read_frontmatter(file_path: &Path) -> Option<JobFrontmatter> {
    let contents = fs_err::read_to_string(file_path).ok()?;
    let body = contents.strip_prefix("---")?;
    let end = body.find("\n---")?;
    serde_yaml::from_str(&body[..end]).ok()
}

/// Re-validates a job's status against its own file: terminal statuses in
/// frontmatter are authoritative; for job types other than
/// `chat`/`interactive_agent`, a `running` status also requires a live
/// `<file>.lock` PID, else it's demoted to `interrupted`.
pub fn revalidate(mut session: Session) -> Session {
    let Some(file_path) = session.job_file_path.clone() else {
        return session;
    };
    let path = Path::new(&file_path);

    let Some(frontmatter) = read_frontmatter(path) else {
        return session;
    };

    let kind = SessionKind::from_flow_type(&frontmatter.job_type);
    let terminal_status = match frontmatter.status.as_str() {
        "completed" => Some(SessionStatus::Completed),
        "failed" => Some(SessionStatus::Failed),
        "interrupted" => Some(SessionStatus::Interrupted),
        "abandoned" => Some(SessionStatus::Abandoned),
        _ => None,
    };

    if let Some(status) = terminal_status {
        session.status = status;
        if session.ended_at.is_none() {
            session.ended_at = Some(Utc::now());
        }
        return session;
    }

    if kind.requires_job_lock() {
        let lock_path = format!("{file_path}.lock");
        let alive = fs_err::read_to_string(&lock_path)
            .ok()
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .map(canopy_liveness::is_alive)
            .unwrap_or(false);

        session.status = if alive {
            SessionStatus::Running
        } else {
            SessionStatus::Interrupted
        };
    }

    session
}

pub fn is_cache_fresh(cache: &FlowCache, now: DateTime<Utc>) -> bool {
    now - cache.timestamp <= CACHE_TTL
}

pub fn load_cache(path: &Path) -> Option<FlowCache> {
    canopy_core::atomic::read_json(path)
}

pub fn save_cache(path: &Path, cache: &FlowCache) -> Result<()> {
    canopy_core::atomic::write_json_atomic(path, cache)
}

/// Top-level read entry point: a one-shot CLI invocation's own call to
/// `refresh_if_stale` (there's no background refresher in a short-lived
/// process), then revalidate whatever the cache now holds.
pub fn get(cache_path: &Path) -> Vec<Session> {
    refresh_if_stale(cache_path)
        .into_iter()
        .map(revalidate)
        .collect()
}

/// Returns the cache's sessions if fresh; otherwise re-scrapes the `flow`
/// binary and returns the refreshed sessions. A missing cache counts as
/// stale. This is what every one-shot CLI invocation calls — the
/// `BackgroundRefresher` (TUI only, §5/§9) is the only caller that instead
/// lets a stale cache ride until its own next tick.
pub fn refresh_if_stale(cache_path: &Path) -> Vec<Session> {
    match load_cache(cache_path) {
        Some(cache) if is_cache_fresh(&cache, Utc::now()) => cache.sessions,
        _ => refresh(cache_path),
    }
}

fn refresh(cache_path: &Path) -> Vec<Session> {
    let plans = invoke_flow();
    let sessions = plans_to_sessions(&plans);
    let cache = FlowCache {
        timestamp: Utc::now(),
        sessions: sessions.clone(),
    };
    if let Err(err) = save_cache(cache_path, &cache) {
        tracing::warn!(error = %err, "failed to persist flow job cache");
    }
    sessions.into_iter().map(revalidate).collect()
}

/// Process-local "background refresher started" flag: encapsulated here as
/// a one-shot initializer, never exposed to callers beyond `start`.
pub struct BackgroundRefresher {
    started: std::sync::Once,
}

impl Default for BackgroundRefresher {
    fn default() -> Self {
        BackgroundRefresher {
            started: std::sync::Once::new(),
        }
    }
}

impl BackgroundRefresher {
    /// Starts a thread that rewrites the cache every 30 seconds. Calling
    /// this more than once on the same instance is a no-op.
    pub fn start(&self, cache_path: std::path::PathBuf) {
        self.started.call_once(|| {
            std::thread::spawn(move || loop {
                refresh(&cache_path);
                std::thread::sleep(std::time::Duration::from_secs(30));
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan_with_job(status: &str) -> FlowPlan {
        FlowPlan {
            title: "my-plan".to_string(),
            path: "/tmp/my-plan".to_string(),
            workspace_name: None,
            jobs: vec![FlowJobDescriptor {
                id: "J1".to_string(),
                title: "do the thing".to_string(),
                status: status.to_string(),
                job_type: "headless_agent".to_string(),
                start_time: Some(Utc::now() - Duration::minutes(5)),
                updated_at: Some(Utc::now()),
                worktree: None,
                file_path: "/tmp/my-plan/J1.md".to_string(),
            }],
        }
    }

    #[test]
    fn pending_user_displays_as_running() {
        let sessions = plans_to_sessions(&[plan_with_job("pending_user")]);
        assert_eq!(sessions.len(), 1);
        assert!(matches!(sessions[0].status, SessionStatus::Running));
    }

    #[test]
    fn completed_job_populates_ended_at() {
        let sessions = plans_to_sessions(&[plan_with_job("completed")]);
        assert!(sessions[0].ended_at.is_some());
    }

    #[test]
    fn dedup_by_file_path_across_plans() {
        let mut plan_b = plan_with_job("running");
        plan_b.title = "other-plan".to_string();
        let sessions = plans_to_sessions(&[plan_with_job("running"), plan_b]);
        assert_eq!(sessions.len(), 1);
    }

    #[test]
    fn cache_exactly_at_ttl_is_fresh() {
        let cache = FlowCache {
            timestamp: Utc::now() - CACHE_TTL,
            sessions: vec![],
        };
        assert!(is_cache_fresh(&cache, Utc::now()));
    }

    #[test]
    fn cache_older_than_ttl_is_stale() {
        let cache = FlowCache {
            timestamp: Utc::now() - CACHE_TTL - Duration::seconds(1),
            sessions: vec![],
        };
        assert!(!is_cache_fresh(&cache, Utc::now()));
    }

    #[test]
    fn cache_round_trips_through_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("flow_jobs_cache.json");
        let cache = FlowCache {
            timestamp: Utc::now(),
            sessions: plans_to_sessions(&[plan_with_job("running")]),
        };
        save_cache(&path, &cache).unwrap();

        let loaded = load_cache(&path).unwrap();
        assert_eq!(loaded.sessions.len(), 1);
        assert_eq!(loaded.sessions[0].id, "J1");
    }

    #[test]
    fn refresh_if_stale_serves_fresh_cache_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("flow_jobs_cache.json");
        let cache = FlowCache {
            timestamp: Utc::now(),
            sessions: plans_to_sessions(&[plan_with_job("running")]),
        };
        save_cache(&path, &cache).unwrap();

        let sessions = refresh_if_stale(&path);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, "J1");
    }

    #[test]
    fn refresh_if_stale_rescrapes_when_cache_is_stale() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("flow_jobs_cache.json");
        let stale = FlowCache {
            timestamp: Utc::now() - CACHE_TTL - Duration::seconds(1),
            sessions: plans_to_sessions(&[plan_with_job("running")]),
        };
        save_cache(&path, &stale).unwrap();

        // No `flow` binary on the test host, so the rescrape yields an
        // empty result — the point is that it rescrapes rather than
        // serving the stale cache's stale session.
        let sessions = refresh_if_stale(&path);
        assert!(sessions.is_empty());

        let reloaded = load_cache(&path).unwrap();
        assert!(is_cache_fresh(&reloaded, Utc::now()));
    }

    #[test]
    fn refresh_if_stale_rescrapes_when_cache_is_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("flow_jobs_cache.json");
        assert!(refresh_if_stale(&path).is_empty());
        assert!(load_cache(&path).is_some());
    }

    #[test]
    fn revalidate_demotes_running_without_live_lock() {
        let tmp = tempfile::tempdir().unwrap();
        let job_file = tmp.path().join("J1.md");
        fs_err::write(
            &job_file,
            "---\nid: J1\ntitle: do the thing\nstatus: running\ntype: headless_agent\n---\nbody",
        )
        .unwrap();

        let mut session = plans_to_sessions(&[plan_with_job("running")]).remove(0);
        session.job_file_path = Some(job_file.to_string_lossy().to_string());

        let revalidated = revalidate(session);
        assert!(matches!(revalidated.status, SessionStatus::Interrupted));
    }

    #[test]
    fn revalidate_trusts_terminal_frontmatter() {
        let tmp = tempfile::tempdir().unwrap();
        let job_file = tmp.path().join("J1.md");
        fs_err::write(
            &job_file,
            "---\nid: J1\ntitle: do the thing\nstatus: completed\ntype: headless_agent\n---\nbody",
        )
        .unwrap();

        let mut session = plans_to_sessions(&[plan_with_job("running")]).remove(0);
        session.job_file_path = Some(job_file.to_string_lossy().to_string());

        let revalidated = revalidate(session);
        assert!(matches!(revalidated.status, SessionStatus::Completed));
    }

    #[test]
    fn revalidate_keeps_running_for_chat_kind_without_lock() {
        let tmp = tempfile::tempdir().unwrap();
        let job_file = tmp.path().join("C1.md");
        fs_err::write(
            &job_file,
            "---\nid: C1\ntitle: chat\nstatus: running\ntype: chat\n---\nbody",
        )
        .unwrap();

        let mut session = plans_to_sessions(&[{
            let mut plan = plan_with_job("running");
            plan.jobs[0].job_type = "chat".to_string();
            plan.jobs[0].id = "C1".to_string();
            plan.jobs[0].file_path = job_file.to_string_lossy().to_string();
            plan
        }])
        .remove(0);
        session.job_file_path = Some(job_file.to_string_lossy().to_string());

        let revalidated = revalidate(session);
        assert!(matches!(revalidated.status, SessionStatus::Running));
    }
}
