//! SQLite-backed durable session registry, following `capacitor-daemon::db::Db`
//! elsewhere in this codebase: same WAL/busy-timeout connection setup and
//! the same "open a connection per operation, no held mutex" idiom —
//! concurrency is mediated by SQLite's own file locking, not an in-process
//! one.

use std::path::{Path, PathBuf};

use canopy_core::{
    CanopyError, NotificationRecord, Result, Session, SessionEvent, SessionKind, SessionStatus,
    ToolExecution,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags};

pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let store = Store { path };
        store.with_connection(|conn| {
            init_schema(conn)?;
            Ok(())
        })?;
        Ok(store)
    }

    fn open_connection(&self) -> Result<Connection> {
        if let Some(parent) = self.path.parent() {
            fs_err::create_dir_all(parent).map_err(|e| CanopyError::io(parent.display().to_string(), e))?;
        }
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )
        .map_err(|e| CanopyError::StoreUnavailable {
            path: self.path.clone(),
            source: e,
        })?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(std::time::Duration::from_millis(5000))?;
        Ok(conn)
    }

    fn with_connection<T>(&self, op: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.open_connection()?;
        op(&mut conn)
    }

    /// Idempotent upsert keyed by `id`. If the row exists and is `idle`,
    /// transition to `running`; otherwise leave the existing row untouched
    /// (caller-supplied `session` is only used to seed a new row).
    pub fn ensure_session_exists(&self, session: &Session) -> Result<()> {
        self.with_connection(|conn| {
            let tx = conn.transaction()?;
            let existing_status: Option<String> = tx
                .query_row(
                    "SELECT status FROM sessions WHERE id = ?1",
                    params![session.id],
                    |row| row.get(0),
                )
                .ok();

            match existing_status {
                None => {
                    insert_session(&tx, session)?;
                }
                Some(status) if status == "idle" => {
                    tx.execute(
                        "UPDATE sessions SET status = 'running', last_activity = ?2 WHERE id = ?1",
                        params![session.id, session.last_activity.to_rfc3339()],
                    )?;
                }
                Some(_) => {}
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get(&self, id: &str) -> Result<Option<Session>> {
        self.with_connection(|conn| load_session(conn, id))
    }

    /// Excludes soft-archived rows.
    pub fn get_all(&self) -> Result<Vec<Session>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM sessions WHERE archived = 0")?;
            let ids: Vec<String> = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<_, _>>()?;
            drop(stmt);
            let mut sessions = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(session) = load_session(conn, &id)? {
                    sessions.push(session);
                }
            }
            Ok(sessions)
        })
    }

    pub fn update_status(&self, id: &str, status: SessionStatus) -> Result<()> {
        self.update_status_with_error(id, status, None)
    }

    pub fn update_status_with_error(
        &self,
        id: &str,
        status: SessionStatus,
        error: Option<&str>,
    ) -> Result<()> {
        self.with_connection(|conn| {
            let now = Utc::now();
            let ended_at = status.is_terminal().then(|| now.to_rfc3339());
            let rows = conn.execute(
                "UPDATE sessions SET status = ?2, error = ?3,
                     ended_at = COALESCE(ended_at, ?4)
                 WHERE id = ?1",
                params![id, status_str(status), error, ended_at],
            )?;
            if rows == 0 {
                return Err(CanopyError::SessionNotFound(id.to_string()));
            }
            Ok(())
        })
    }

    /// Soft-delete: archived rows are hidden from `get_all`.
    pub fn archive(&self, ids: &[String]) -> Result<()> {
        self.with_connection(|conn| {
            let tx = conn.transaction()?;
            for id in ids {
                tx.execute("UPDATE sessions SET archived = 1 WHERE id = ?1", params![id])?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn log_event(&self, session_id: &str, event: &SessionEvent) -> Result<()> {
        self.with_connection(|conn| {
            let payload = serde_json::to_string(&event.payload)
                .map_err(|e| CanopyError::json("event payload", e))?;
            conn.execute(
                "INSERT INTO events (session_id, recorded_at, hook_event_name, payload)
                 VALUES (?1, ?2, ?3, ?4)",
                params![session_id, event.recorded_at.to_rfc3339(), event.hook_event_name, payload],
            )?;
            conn.execute(
                "UPDATE sessions SET last_activity = ?2 WHERE id = ?1",
                params![session_id, event.recorded_at.to_rfc3339()],
            )?;
            Ok(())
        })
    }

    pub fn log_tool_usage(&self, session_id: &str, tool: &ToolExecution) -> Result<()> {
        self.with_connection(|conn| {
            let params_json = serde_json::to_string(&tool.params)
                .map_err(|e| CanopyError::json("tool params", e))?;
            conn.execute(
                "INSERT INTO tool_executions
                     (tool_id, session_id, tool_name, started_at, duration_ms, success, error, result_summary, params)
                 VALUES (?1, ?2, ?3, ?4, NULL, NULL, NULL, NULL, ?5)",
                params![
                    tool.tool_id,
                    session_id,
                    tool.tool_name,
                    tool.started_at.to_rfc3339(),
                    params_json,
                ],
            )?;
            Ok(())
        })
    }

    pub fn update_tool_execution(
        &self,
        tool_id: &str,
        duration_ms: u64,
        success: bool,
        error: Option<&str>,
        result_summary: Option<&str>,
    ) -> Result<()> {
        self.with_connection(|conn| {
            let rows = conn.execute(
                "UPDATE tool_executions
                 SET duration_ms = ?2, success = ?3, error = ?4, result_summary = ?5
                 WHERE tool_id = ?1",
                params![tool_id, duration_ms as i64, success, error, result_summary],
            )?;
            if rows == 0 {
                return Err(CanopyError::SessionNotFound(format!("tool_id {tool_id}")));
            }
            Ok(())
        })
    }

    pub fn log_notification(&self, session_id: &str, notification: &NotificationRecord) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO notifications (session_id, recorded_at, level, message, system_sent)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    session_id,
                    notification.recorded_at.to_rfc3339(),
                    notification.level,
                    notification.message,
                    notification.system_sent,
                ],
            )?;
            Ok(())
        })
    }
}

fn init_schema(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        "BEGIN;
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            provider TEXT NOT NULL,
            status TEXT NOT NULL,
            pid INTEGER NOT NULL DEFAULT 0,
            repo TEXT,
            branch TEXT,
            working_directory TEXT,
            user TEXT,
            tmux_key TEXT,
            plan_name TEXT,
            plan_directory TEXT,
            job_title TEXT,
            job_file_path TEXT,
            claude_session_id TEXT,
            started_at TEXT NOT NULL,
            last_activity TEXT NOT NULL,
            ended_at TEXT,
            archived INTEGER NOT NULL DEFAULT 0,
            error TEXT
        );
        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL,
            recorded_at TEXT NOT NULL,
            hook_event_name TEXT NOT NULL,
            payload TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS tool_executions (
            tool_id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            tool_name TEXT NOT NULL,
            started_at TEXT NOT NULL,
            duration_ms INTEGER,
            success INTEGER,
            error TEXT,
            result_summary TEXT,
            params TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS notifications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL,
            recorded_at TEXT NOT NULL,
            level TEXT NOT NULL,
            message TEXT NOT NULL,
            system_sent INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_events_session ON events(session_id);
        CREATE INDEX IF NOT EXISTS idx_tool_executions_session ON tool_executions(session_id);
        CREATE INDEX IF NOT EXISTS idx_notifications_session ON notifications(session_id);
        COMMIT;",
    )?;
    Ok(())
}

fn insert_session(tx: &rusqlite::Transaction, session: &Session) -> Result<()> {
    tx.execute(
        "INSERT INTO sessions
            (id, kind, provider, status, pid, repo, branch, working_directory, user, tmux_key,
             plan_name, plan_directory, job_title, job_file_path, claude_session_id,
             started_at, last_activity, ended_at, archived, error)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)
         ON CONFLICT(id) DO NOTHING",
        params![
            session.id,
            kind_str(session.kind),
            session.provider,
            status_str(session.status),
            session.pid,
            session.repo,
            session.branch,
            session.working_directory,
            session.user,
            session.tmux_key,
            session.plan_name,
            session.plan_directory,
            session.job_title,
            session.job_file_path,
            session.claude_session_id,
            session.started_at.to_rfc3339(),
            session.last_activity.to_rfc3339(),
            session.ended_at.map(|t| t.to_rfc3339()),
            session.archived,
            session.error,
        ],
    )?;
    Ok(())
}

fn load_session(conn: &Connection, id: &str) -> Result<Option<Session>> {
    let row = conn.query_row(
        "SELECT id, kind, provider, status, pid, repo, branch, working_directory, user, tmux_key,
                plan_name, plan_directory, job_title, job_file_path, claude_session_id,
                started_at, last_activity, ended_at, archived, error
         FROM sessions WHERE id = ?1",
        params![id],
        row_to_session,
    );

    let mut session = match row {
        Ok(session) => session,
        Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    session.events = load_events(conn, id)?;
    session.tool_executions = load_tool_executions(conn, id)?;
    session.notifications = load_notifications(conn, id)?;
    session.compute_derived();
    Ok(Some(session))
}

fn load_events(conn: &Connection, session_id: &str) -> Result<Vec<SessionEvent>> {
    let mut stmt = conn.prepare(
        "SELECT recorded_at, hook_event_name, payload FROM events WHERE session_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![session_id], |row| {
        let recorded_at: String = row.get(0)?;
        let hook_event_name: String = row.get(1)?;
        let payload_raw: String = row.get(2)?;
        Ok((recorded_at, hook_event_name, payload_raw))
    })?;

    let mut events = Vec::new();
    for row in rows {
        let (recorded_at, hook_event_name, payload_raw) = row?;
        events.push(SessionEvent {
            recorded_at: parse_rfc3339(&recorded_at)?,
            hook_event_name,
            payload: serde_json::from_str(&payload_raw).unwrap_or(serde_json::Value::Null),
        });
    }
    Ok(events)
}

fn load_tool_executions(conn: &Connection, session_id: &str) -> Result<Vec<ToolExecution>> {
    let mut stmt = conn.prepare(
        "SELECT tool_id, tool_name, started_at, duration_ms, success, error, result_summary, params
         FROM tool_executions WHERE session_id = ?1 ORDER BY started_at",
    )?;
    let rows = stmt.query_map(params![session_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<i64>>(3)?,
            row.get::<_, Option<bool>>(4)?,
            row.get::<_, Option<String>>(5)?,
            row.get::<_, Option<String>>(6)?,
            row.get::<_, String>(7)?,
        ))
    })?;

    let mut executions = Vec::new();
    for row in rows {
        let (tool_id, tool_name, started_at, duration_ms, success, error, result_summary, params_raw) = row?;
        executions.push(ToolExecution {
            tool_id,
            tool_name,
            started_at: parse_rfc3339(&started_at)?,
            duration_ms: duration_ms.map(|d| d as u64),
            success,
            error,
            result_summary,
            params: serde_json::from_str(&params_raw).unwrap_or(serde_json::Value::Null),
        });
    }
    Ok(executions)
}

fn load_notifications(conn: &Connection, session_id: &str) -> Result<Vec<NotificationRecord>> {
    let mut stmt = conn.prepare(
        "SELECT recorded_at, level, message, system_sent FROM notifications WHERE session_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![session_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, bool>(3)?,
        ))
    })?;

    let mut notifications = Vec::new();
    for row in rows {
        let (recorded_at, level, message, system_sent) = row?;
        notifications.push(NotificationRecord {
            recorded_at: parse_rfc3339(&recorded_at)?,
            level,
            message,
            system_sent,
        });
    }
    Ok(notifications)
}

fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<Session> {
    let kind: String = row.get(1)?;
    let status: String = row.get(3)?;
    let started_at: String = row.get(15)?;
    let last_activity: String = row.get(16)?;
    let ended_at: Option<String> = row.get(17)?;

    Ok(Session {
        id: row.get(0)?,
        kind: kind_from_str(&kind),
        provider: row.get(2)?,
        status: status_from_str(&status),
        pid: row.get(4)?,
        repo: row.get(5)?,
        branch: row.get(6)?,
        working_directory: row.get(7)?,
        user: row.get(8)?,
        tmux_key: row.get(9)?,
        plan_name: row.get(10)?,
        plan_directory: row.get(11)?,
        job_title: row.get(12)?,
        job_file_path: row.get(13)?,
        claude_session_id: row.get(14)?,
        started_at: parse_rfc3339(&started_at).unwrap_or_else(|_| Utc::now()),
        last_activity: parse_rfc3339(&last_activity).unwrap_or_else(|_| Utc::now()),
        ended_at: ended_at.and_then(|s| parse_rfc3339(&s).ok()),
        archived: row.get(18)?,
        error: row.get(19)?,
        events: Vec::new(),
        tool_executions: Vec::new(),
        notifications: Vec::new(),
        tool_stats: Default::default(),
        session_summary: None,
    })
}

fn parse_rfc3339(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CanopyError::ConfigMalformed {
            path: PathBuf::from("<timestamp>"),
            details: e.to_string(),
        })
}

fn kind_str(kind: SessionKind) -> &'static str {
    match kind {
        SessionKind::Interactive => "interactive",
        SessionKind::OneshotJob => "oneshot_job",
        SessionKind::InteractiveAgent => "interactive_agent",
        SessionKind::Chat => "chat",
        SessionKind::HeadlessAgent => "headless_agent",
        SessionKind::Shell => "shell",
    }
}

fn kind_from_str(raw: &str) -> SessionKind {
    SessionKind::from_flow_type(raw)
}

fn status_str(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Running => "running",
        SessionStatus::Idle => "idle",
        SessionStatus::PendingUser => "pending_user",
        SessionStatus::Completed => "completed",
        SessionStatus::Interrupted => "interrupted",
        SessionStatus::Failed => "failed",
        SessionStatus::Error => "error",
        SessionStatus::Todo => "todo",
        SessionStatus::Hold => "hold",
        SessionStatus::Abandoned => "abandoned",
    }
}

fn status_from_str(raw: &str) -> SessionStatus {
    match raw {
        "running" => SessionStatus::Running,
        "idle" => SessionStatus::Idle,
        "pending_user" => SessionStatus::PendingUser,
        "completed" => SessionStatus::Completed,
        "interrupted" => SessionStatus::Interrupted,
        "failed" => SessionStatus::Failed,
        "error" => SessionStatus::Error,
        "todo" => SessionStatus::Todo,
        "hold" => SessionStatus::Hold,
        _ => SessionStatus::Abandoned,
    }
}
