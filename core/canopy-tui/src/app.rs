//! Interactive browser state (spec §5 "Interactive browser"): pulls through
//! `canopy_reconcile::all_sessions` on a tick, keeps a filtered/sorted view
//! and a selection cursor, and applies the mutating keybindings (kill,
//! archive, set-status) back through `canopy_fs`/`canopy_store`.

use std::path::PathBuf;
use std::sync::Arc;

use canopy_core::{CanopyError, Result, Session, SessionStatus};
use canopy_flow::BackgroundRefresher;
use canopy_store::Store;
use chrono::Duration;

use crate::filters::BrowseFilters;

pub struct App {
    pub store: Store,
    pub fs_root: PathBuf,
    pub flow_cache_path: PathBuf,
    pub filters_path: PathBuf,

    pub sessions: Vec<Session>,
    pub selected: usize,
    pub filters: BrowseFilters,
    pub hide_completed: bool,
    pub status_message: Option<String>,
    pub should_quit: bool,

    pub refresher: Arc<BackgroundRefresher>,
}

impl App {
    pub fn new() -> Result<Self> {
        let fs_root = canopy_core::paths::sessions_root().ok_or(CanopyError::DataHomeNotFound)?;
        let store_path = canopy_core::paths::store_path().ok_or(CanopyError::DataHomeNotFound)?;
        let flow_cache_path = canopy_core::paths::flow_cache_path().ok_or(CanopyError::DataHomeNotFound)?;
        let filters_path = canopy_core::paths::browse_filters_path().ok_or(CanopyError::DataHomeNotFound)?;

        let filters = BrowseFilters::load(&filters_path);

        Ok(App {
            store: Store::open(store_path)?,
            fs_root,
            flow_cache_path,
            filters_path,
            sessions: Vec::new(),
            selected: 0,
            filters,
            hide_completed: false,
            status_message: None,
            should_quit: false,
            refresher: Arc::new(BackgroundRefresher::default()),
        })
    }

    pub fn start_background_refresh(&self) {
        self.refresher.start(self.flow_cache_path.clone());
    }

    pub fn refresh(&mut self) {
        match canopy_reconcile::all_sessions(
            &self.store,
            &self.fs_root,
            &self.flow_cache_path,
            self.hide_completed,
            canopy_reconcile::DEFAULT_INACTIVITY_THRESHOLD,
        ) {
            Ok(sessions) => self.sessions = sessions,
            Err(err) => self.status_message = Some(format!("refresh failed: {err}")),
        }
        if self.selected >= self.visible_len() && self.selected > 0 {
            self.selected = self.visible_len().saturating_sub(1);
        }
    }

    fn visible_indices(&self) -> Vec<usize> {
        self.sessions
            .iter()
            .enumerate()
            .filter(|(_, s)| self.filters.shows_status(status_key(s.status)) && self.filters.shows_type(kind_key(s.kind)))
            .map(|(i, _)| i)
            .collect()
    }

    fn visible_len(&self) -> usize {
        self.visible_indices().len()
    }

    pub fn visible_sessions(&self) -> Vec<&Session> {
        self.visible_indices().into_iter().map(|i| &self.sessions[i]).collect()
    }

    pub fn selected_session(&self) -> Option<&Session> {
        self.visible_sessions().into_iter().nth(self.selected)
    }

    pub fn move_selection(&mut self, delta: isize) {
        let len = self.visible_len();
        if len == 0 {
            self.selected = 0;
            return;
        }
        let current = self.selected as isize;
        let next = (current + delta).clamp(0, len as isize - 1);
        self.selected = next as usize;
    }

    pub fn toggle_hide_completed(&mut self) {
        self.hide_completed = !self.hide_completed;
        self.refresh();
    }

    pub fn toggle_status_filter(&mut self) {
        if let Some(session) = self.selected_session() {
            let key = status_key(session.status).to_string();
            self.filters.toggle_status(&key);
        }
    }

    pub fn kill_selected(&mut self) {
        let Some(id) = self.selected_session().map(|s| s.id.clone()) else {
            return;
        };
        match canopy_fs::kill(&self.fs_root, &id, false) {
            Ok(()) => {
                let _ = self.store.update_status(&id, SessionStatus::Completed);
                self.status_message = Some(format!("killed {id}"));
            }
            Err(err) => self.status_message = Some(format!("kill failed: {err}")),
        }
        self.refresh();
    }

    pub fn archive_selected(&mut self) {
        let Some(id) = self.selected_session().map(|s| s.id.clone()) else {
            return;
        };
        match self.store.archive(&[id.clone()]) {
            Ok(()) => self.status_message = Some(format!("archived {id}")),
            Err(err) => self.status_message = Some(format!("archive failed: {err}")),
        }
        self.refresh();
    }

    pub fn set_selected_status(&mut self, status: SessionStatus) {
        let Some(id) = self.selected_session().map(|s| s.id.clone()) else {
            return;
        };
        match self.store.update_status(&id, status) {
            Ok(()) => self.status_message = Some(format!("{id} -> {status:?}")),
            Err(err) => self.status_message = Some(format!("set-status failed: {err}")),
        }
        self.refresh();
    }

    pub fn run_cleanup(&mut self) {
        match canopy_reconcile::reap(&self.store, Duration::minutes(30), chrono::Utc::now()) {
            Ok(reaped) => self.status_message = Some(format!("reaped {} session(s)", reaped.len())),
            Err(err) => self.status_message = Some(format!("cleanup failed: {err}")),
        }
        self.refresh();
    }

    pub fn save_filters(&self) {
        self.filters.save(&self.filters_path);
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }
}

pub fn status_key(status: SessionStatus) -> &'static str {
    use SessionStatus::*;
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

pub fn kind_key(kind: canopy_core::SessionKind) -> &'static str {
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
