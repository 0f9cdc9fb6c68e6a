//! Per-session directory registry, following `hud-core::state::lock`
//! elsewhere in this codebase — same atomic "stale directory, remove then
//! mkdir" creation, same `pid`+`meta.json` pairing — generalized from a
//! path-hash-keyed lock directory to one keyed directly by session id,
//! since this system already has a stable id and doesn't need to derive one
//! from a project path.

use std::path::{Path, PathBuf};

use canopy_core::{CanopyError, Result, Session, SessionKind, SessionMetadata, SessionStatus};
use chrono::Utc;

const PID_LOCK_FILE: &str = "pid.lock";
const METADATA_FILE: &str = "metadata.json";

pub fn session_dir(root: &Path, id: &str) -> PathBuf {
    root.join(id)
}

/// Adopt-or-create: if the directory exists and its pid.lock points to a
/// live PID, do nothing. Otherwise atomically replace it with a fresh
/// directory for the current PID.
pub fn adopt_or_create(root: &Path, id: &str, pid: i64, metadata: &SessionMetadata) -> Result<()> {
    let dir = session_dir(root, id);

    if let Some(existing_pid) = read_pid_lock(&dir) {
        if canopy_liveness::is_alive(existing_pid) {
            return Ok(());
        }
    }

    if dir.exists() {
        fs_err::remove_dir_all(&dir).map_err(|e| CanopyError::io(dir.display().to_string(), e))?;
    }
    fs_err::create_dir_all(&dir).map_err(|e| CanopyError::io(dir.display().to_string(), e))?;

    fs_err::write(dir.join(PID_LOCK_FILE), pid.to_string())
        .map_err(|e| CanopyError::io(dir.display().to_string(), e))?;

    let metadata_json = serde_json::to_vec_pretty(metadata)
        .map_err(|e| CanopyError::json(dir.display().to_string(), e))?;
    fs_err::write(dir.join(METADATA_FILE), metadata_json)
        .map_err(|e| CanopyError::io(dir.display().to_string(), e))?;

    Ok(())
}

fn read_pid_lock(dir: &Path) -> Option<i64> {
    let raw = fs_err::read_to_string(dir.join(PID_LOCK_FILE)).ok()?;
    raw.trim().parse().ok()
}

fn read_metadata(dir: &Path) -> Option<SessionMetadata> {
    let raw = fs_err::read_to_string(dir.join(METADATA_FILE)).ok()?;
    serde_json::from_str(&raw).ok()
}

/// Enumerates live interactive sessions. Directories missing either
/// `pid.lock` or `metadata.json` are skipped silently.
pub fn discover(root: &Path) -> Result<Vec<Session>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut sessions = Vec::new();
    let entries = fs_err::read_dir(root).map_err(|e| CanopyError::io(root.display().to_string(), e))?;
    for entry in entries {
        let entry = entry.map_err(|e| CanopyError::io(root.display().to_string(), e))?;
        let dir = entry.path();
        if !dir.is_dir() {
            continue;
        }

        let (Some(pid), Some(metadata)) = (read_pid_lock(&dir), read_metadata(&dir)) else {
            tracing::debug!(dir = %dir.display(), "skipping malformed session directory");
            continue;
        };

        sessions.push(session_from_metadata(pid, metadata));
    }
    Ok(sessions)
}

fn session_from_metadata(pid: i64, metadata: SessionMetadata) -> Session {
    let alive = canopy_liveness::is_alive(pid);
    let now = Utc::now();

    let kind = if metadata.job_file_path.is_some() {
        SessionKind::InteractiveAgent
    } else {
        SessionKind::Interactive
    };

    let mut session = Session::new(metadata.session_id.clone(), kind, metadata.started_at);
    session.pid = pid;
    session.repo = metadata.repo;
    session.branch = metadata.branch;
    session.tmux_key = metadata.tmux_key;
    session.working_directory = Some(metadata.working_directory);
    session.user = metadata.user;
    session.plan_name = metadata.plan_name;
    session.plan_directory = metadata.plan_directory;
    session.job_title = metadata.job_title;
    session.job_file_path = metadata.job_file_path;
    session.claude_session_id = metadata.claude_session_id;
    session.last_activity = now;

    if alive {
        session.status = SessionStatus::Running;
    } else {
        session.status = SessionStatus::Interrupted;
        session.ended_at = Some(now);
    }
    session
}

/// Sends SIGTERM (or SIGKILL with `force`) to the session's recorded PID,
/// then removes the directory regardless of whether the signal delivered
/// (an already-dead PID is not an error).
pub fn kill(root: &Path, id: &str, force: bool) -> Result<()> {
    let dir = session_dir(root, id);
    if let Some(pid) = read_pid_lock(&dir) {
        send_signal(pid, force);
    }
    remove(root, id)
}

/// Explicit terminal-hook teardown: removes the directory without signaling
/// (the process has already exited by the time this runs).
pub fn remove(root: &Path, id: &str) -> Result<()> {
    let dir = session_dir(root, id);
    if dir.exists() {
        fs_err::remove_dir_all(&dir).map_err(|e| CanopyError::io(dir.display().to_string(), e))?;
    }
    Ok(())
}

#[cfg(unix)]
fn send_signal(pid: i64, force: bool) {
    if pid <= 0 {
        return;
    }
    let Ok(pid) = i32::try_from(pid) else { return };
    let signal = if force { libc::SIGKILL } else { libc::SIGTERM };
    unsafe {
        libc::kill(pid, signal);
    }
}

#[cfg(not(unix))]
fn send_signal(_pid: i64, _force: bool) {}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metadata(id: &str) -> SessionMetadata {
        SessionMetadata {
            session_id: id.to_string(),
            pid: 0,
            repo: Some("canopy".to_string()),
            branch: Some("main".to_string()),
            tmux_key: None,
            working_directory: "/tmp/canopy".to_string(),
            user: Some("dev".to_string()),
            started_at: Utc::now(),
            transcript_path: None,
            project_name: Some("canopy".to_string()),
            is_worktree: false,
            parent_ecosystem_path: None,
            plan_name: None,
            plan_directory: None,
            job_title: None,
            job_file_path: None,
            claude_session_id: None,
        }
    }

    #[test]
    fn adopt_or_create_writes_both_files() {
        let tmp = tempfile::tempdir().unwrap();
        let pid = std::process::id() as i64;
        adopt_or_create(tmp.path(), "S1", pid, &sample_metadata("S1")).unwrap();

        let dir = session_dir(tmp.path(), "S1");
        assert!(dir.join("pid.lock").exists());
        assert!(dir.join("metadata.json").exists());
    }

    #[test]
    fn adopt_or_create_is_noop_when_live_pid_matches() {
        let tmp = tempfile::tempdir().unwrap();
        let pid = std::process::id() as i64;
        adopt_or_create(tmp.path(), "S1", pid, &sample_metadata("S1")).unwrap();
        let first_write = fs_err::metadata(session_dir(tmp.path(), "S1").join("metadata.json"))
            .unwrap()
            .modified()
            .unwrap();

        std::thread::sleep(std::time::Duration::from_millis(10));
        adopt_or_create(tmp.path(), "S1", pid, &sample_metadata("S1")).unwrap();
        let second_write = fs_err::metadata(session_dir(tmp.path(), "S1").join("metadata.json"))
            .unwrap()
            .modified()
            .unwrap();

        assert_eq!(first_write, second_write);
    }

    #[test]
    fn adopt_or_create_replaces_stale_dead_pid_dir() {
        let tmp = tempfile::tempdir().unwrap();
        adopt_or_create(tmp.path(), "S1", 999_999_999, &sample_metadata("S1")).unwrap();

        let pid = std::process::id() as i64;
        adopt_or_create(tmp.path(), "S1", pid, &sample_metadata("S1")).unwrap();

        let read_back = read_pid_lock(&session_dir(tmp.path(), "S1")).unwrap();
        assert_eq!(read_back, pid);
    }

    #[test]
    fn discover_marks_dead_pid_as_interrupted() {
        let tmp = tempfile::tempdir().unwrap();
        adopt_or_create(tmp.path(), "S1", 999_999_999, &sample_metadata("S1")).unwrap();

        let sessions = discover(tmp.path()).unwrap();
        assert_eq!(sessions.len(), 1);
        assert!(matches!(sessions[0].status, SessionStatus::Interrupted));
        assert!(sessions[0].ended_at.is_some());
    }

    #[test]
    fn discover_marks_live_pid_as_running() {
        let tmp = tempfile::tempdir().unwrap();
        let pid = std::process::id() as i64;
        adopt_or_create(tmp.path(), "S1", pid, &sample_metadata("S1")).unwrap();

        let sessions = discover(tmp.path()).unwrap();
        assert_eq!(sessions.len(), 1);
        assert!(matches!(sessions[0].status, SessionStatus::Running));
    }

    #[test]
    fn discover_skips_directory_missing_metadata() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = session_dir(tmp.path(), "S1");
        fs_err::create_dir_all(&dir).unwrap();
        fs_err::write(dir.join("pid.lock"), "123").unwrap();

        let sessions = discover(tmp.path()).unwrap();
        assert!(sessions.is_empty());
    }

    #[test]
    fn discover_skips_directory_missing_pid_lock() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = session_dir(tmp.path(), "S1");
        fs_err::create_dir_all(&dir).unwrap();
        let metadata_json = serde_json::to_vec_pretty(&sample_metadata("S1")).unwrap();
        fs_err::write(dir.join("metadata.json"), metadata_json).unwrap();

        let sessions = discover(tmp.path()).unwrap();
        assert!(sessions.is_empty());
    }

    #[test]
    fn remove_deletes_the_directory() {
        let tmp = tempfile::tempdir().unwrap();
        adopt_or_create(tmp.path(), "S1", std::process::id() as i64, &sample_metadata("S1")).unwrap();
        remove(tmp.path(), "S1").unwrap();
        assert!(!session_dir(tmp.path(), "S1").exists());
    }

    #[test]
    fn discover_on_missing_root_returns_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("does-not-exist");
        assert!(discover(&missing).unwrap().is_empty());
    }
}
