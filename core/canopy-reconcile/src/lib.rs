//! The read-path every consumer calls: merges filesystem, flow, and
//! database views into one ordered, deduplicated, filtered list, and runs
//! the dead-session reaper. `merge`/`sort_sessions` are pure functions so
//! the precedence and ordering rules stay testable in isolation.

use std::path::Path;

use canopy_core::{Result, Session, SessionKind, SessionStatus};
use canopy_store::Store;
use chrono::{DateTime, Duration, Utc};

pub const DEFAULT_INACTIVITY_THRESHOLD: Duration = Duration::minutes(30);

/// Merges `fs`, `flow`, `db` sources in that precedence: filesystem entries
/// are kept, then flow entries whose id is not already present, then db
/// entries whose id is not already present.
pub fn merge(fs: Vec<Session>, flow: Vec<Session>, db: Vec<Session>) -> Vec<Session> {
    let mut seen = std::collections::HashSet::new();
    let mut merged = Vec::with_capacity(fs.len() + flow.len() + db.len());

    for session in fs {
        if seen.insert(session.id.clone()) {
            merged.push(session);
        }
    }
    for session in flow {
        if seen.insert(session.id.clone()) {
            merged.push(session);
        }
    }
    for session in db {
        if seen.insert(session.id.clone()) {
            merged.push(session);
        }
    }
    merged
}

pub fn filter_hidden(sessions: Vec<Session>, hide_completed: bool) -> Vec<Session> {
    if !hide_completed {
        return sessions;
    }
    sessions
        .into_iter()
        .filter(|s| {
            !matches!(
                s.status,
                SessionStatus::Completed | SessionStatus::Failed | SessionStatus::Error
            )
        })
        .collect()
}

/// Stable sort: status bucket ascending (running=1, idle=2, else=3), then
/// `started_at` descending.
pub fn sort_sessions(mut sessions: Vec<Session>) -> Vec<Session> {
    sessions.sort_by(|a, b| {
        a.status
            .sort_bucket()
            .cmp(&b.status.sort_bucket())
            .then_with(|| b.started_at.cmp(&a.started_at))
    });
    sessions
}

/// For every non-one-shot session in the store with status `running`/`idle`:
/// reap it to `completed` if its pid is dead, or if it's been inactive
/// longer than `inactivity_threshold`. Returns the ids reaped. Idempotent: a
/// second run finds nothing left to reap. Per-session failures are logged
/// and skipped, never abort the whole pass.
pub fn reap(store: &Store, inactivity_threshold: Duration, now: DateTime<Utc>) -> Result<Vec<String>> {
    let mut reaped = Vec::new();
    for session in store.get_all()? {
        if session.kind == SessionKind::OneshotJob {
            continue;
        }
        if !matches!(session.status, SessionStatus::Running | SessionStatus::Idle) {
            continue;
        }

        let dead = session.pid > 0 && !canopy_liveness::is_alive(session.pid);
        let inactive = now - session.last_activity > inactivity_threshold;

        if dead || inactive {
            if let Err(err) = store.update_status(&session.id, SessionStatus::Completed) {
                tracing::warn!(session_id = %session.id, error = %err, "failed to reap session, skipping");
                continue;
            }
            reaped.push(session.id);
        }
    }
    Ok(reaped)
}

/// Top-level entry point: reap, then gather `fs = Filesystem.discover()`,
/// `flow = FlowDiscoverer.get()`, `db = Store.get_all()`, merge, filter,
/// sort.
pub fn all_sessions(
    store: &Store,
    fs_root: &Path,
    flow_cache_path: &Path,
    hide_completed: bool,
    inactivity_threshold: Duration,
) -> Result<Vec<Session>> {
    reap(store, inactivity_threshold, Utc::now())?;

    let fs = canopy_fs::discover(fs_root)?;
    let flow = canopy_flow::get(flow_cache_path);
    let db = store.get_all()?;

    let merged = merge(fs, flow, db);
    let filtered = filter_hidden(merged, hide_completed);
    Ok(sort_sessions(filtered))
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_core::SessionKind;

    fn session(id: &str, status: SessionStatus, started_at: DateTime<Utc>) -> Session {
        let mut s = Session::new(id, SessionKind::Interactive, started_at);
        s.status = status;
        s
    }

    #[test]
    fn merge_prefers_fs_over_flow_and_db() {
        let now = Utc::now();
        let fs = vec![session("A", SessionStatus::Running, now)];
        let flow = vec![session("A", SessionStatus::Completed, now)];
        let db = vec![session("A", SessionStatus::Idle, now)];

        let merged = merge(fs, flow, db);
        assert_eq!(merged.len(), 1);
        assert!(matches!(merged[0].status, SessionStatus::Running));
    }

    #[test]
    fn merge_prefers_flow_over_db_when_fs_absent() {
        let now = Utc::now();
        let flow = vec![session("J1", SessionStatus::Running, now)];
        let db = vec![session("J1", SessionStatus::Completed, now)];

        let merged = merge(vec![], flow, db);
        assert_eq!(merged.len(), 1);
        assert!(matches!(merged[0].status, SessionStatus::Running));
    }

    #[test]
    fn merge_has_no_duplicate_ids() {
        let now = Utc::now();
        let fs = vec![session("A", SessionStatus::Running, now)];
        let flow = vec![session("A", SessionStatus::Completed, now), session("B", SessionStatus::Running, now)];
        let db = vec![session("A", SessionStatus::Idle, now), session("C", SessionStatus::Idle, now)];

        let merged = merge(fs, flow, db);
        let ids: std::collections::HashSet<_> = merged.iter().map(|s| s.id.clone()).collect();
        assert_eq!(ids.len(), merged.len());
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn hide_completed_drops_terminal_but_not_all() {
        let now = Utc::now();
        let sessions = vec![
            session("A", SessionStatus::Completed, now),
            session("B", SessionStatus::Failed, now),
            session("C", SessionStatus::Error, now),
            session("D", SessionStatus::Running, now),
            session("E", SessionStatus::Interrupted, now),
        ];

        let filtered = filter_hidden(sessions, true);
        let ids: Vec<_> = filtered.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["D", "E"]);
    }

    #[test]
    fn sort_orders_running_then_idle_then_rest_by_recency() {
        let t0 = Utc::now();
        let t1 = t0 + Duration::seconds(10);
        let sessions = vec![
            session("old-idle", SessionStatus::Idle, t0),
            session("new-running", SessionStatus::Running, t1),
            session("old-completed", SessionStatus::Completed, t0),
            session("old-running", SessionStatus::Running, t0),
        ];

        let sorted = sort_sessions(sessions);
        let ids: Vec<_> = sorted.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["new-running", "old-running", "old-idle", "old-completed"]);
    }

    #[test]
    fn sort_is_stable_for_equal_keys() {
        let t0 = Utc::now();
        let sessions = vec![
            session("first", SessionStatus::Running, t0),
            session("second", SessionStatus::Running, t0),
        ];
        let sorted = sort_sessions(sessions);
        let ids: Vec<_> = sorted.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second"]);
    }

    #[test]
    fn reap_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Store::open(tmp.path().join("state.db")).unwrap();

        let mut dead = Session::new("dead", SessionKind::Interactive, Utc::now());
        dead.pid = 999_999_999;
        store.ensure_session_exists(&dead).unwrap();

        let first = reap(&store, DEFAULT_INACTIVITY_THRESHOLD, Utc::now()).unwrap();
        let second = reap(&store, DEFAULT_INACTIVITY_THRESHOLD, Utc::now()).unwrap();

        assert_eq!(first, vec!["dead".to_string()]);
        assert!(second.is_empty());
    }

    #[test]
    fn reap_excludes_oneshot_jobs() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Store::open(tmp.path().join("state.db")).unwrap();

        let mut job = Session::new("job1", SessionKind::OneshotJob, Utc::now());
        job.pid = 999_999_999;
        store.ensure_session_exists(&job).unwrap();

        let reaped = reap(&store, DEFAULT_INACTIVITY_THRESHOLD, Utc::now()).unwrap();
        assert!(reaped.is_empty());
    }

    #[test]
    fn reap_inactivity_boundary_is_exclusive() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Store::open(tmp.path().join("state.db")).unwrap();

        let session = Session::new("S1", SessionKind::Interactive, Utc::now() - DEFAULT_INACTIVITY_THRESHOLD);
        store.ensure_session_exists(&session).unwrap();

        let not_yet = reap(&store, DEFAULT_INACTIVITY_THRESHOLD, session.last_activity + DEFAULT_INACTIVITY_THRESHOLD).unwrap();
        assert!(not_yet.is_empty());

        let past = reap(
            &store,
            DEFAULT_INACTIVITY_THRESHOLD,
            session.last_activity + DEFAULT_INACTIVITY_THRESHOLD + Duration::seconds(1),
        )
        .unwrap();
        assert_eq!(past, vec!["S1".to_string()]);
    }
}
