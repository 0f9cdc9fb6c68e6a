//! Narrow traits for the three external collaborators this system treats as
//! out of process: notification delivery, tmux key detection, and git
//! introspection. Each gets a real subprocess/library-backed impl and a
//! `Fake*` test double — the same adapter-trait-plus-fake shape the
//! `oj-adapters` crate uses throughout (`session::{tmux, fake}`,
//! `agent::{claude, fake}`).

use std::path::Path;
use std::process::Command;

pub trait Notifier: Send + Sync {
    fn send(&self, title: &str, message: &str, level: &str, tags: &[&str]);
}

pub struct DesktopNotifier;

impl Notifier for DesktopNotifier {
    fn send(&self, title: &str, message: &str, level: &str, tags: &[&str]) {
        let body = if tags.is_empty() {
            message.to_string()
        } else {
            format!("{message} [{}]", tags.join(", "))
        };
        let result = notify_rust::Notification::new()
            .summary(title)
            .body(&body)
            .appname("canopy")
            .show();
        if let Err(err) = result {
            tracing::debug!(error = %err, level, "desktop notification failed, continuing");
        }
    }
}

pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn send(&self, _title: &str, _message: &str, _level: &str, _tags: &[&str]) {}
}

#[derive(Default)]
pub struct FakeNotifier {
    pub sent: std::sync::Mutex<Vec<(String, String, String)>>,
}

impl Notifier for FakeNotifier {
    fn send(&self, title: &str, message: &str, level: &str, _tags: &[&str]) {
        self.sent
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string(), level.to_string()));
    }
}

pub trait TmuxDetector: Send + Sync {
    fn detect(&self, workdir: &Path) -> Option<String>;
}

pub struct RealTmuxDetector;

impl TmuxDetector for RealTmuxDetector {
    fn detect(&self, _workdir: &Path) -> Option<String> {
        std::env::var("TMUX").ok()?;
        let output = Command::new("tmux")
            .args(["display-message", "-p", "#S:#I"])
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let key = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!key.is_empty()).then_some(key)
    }
}

pub struct FakeTmuxDetector(pub Option<String>);

impl TmuxDetector for FakeTmuxDetector {
    fn detect(&self, _workdir: &Path) -> Option<String> {
        self.0.clone()
    }
}

#[derive(Debug, Clone, Default)]
pub struct GitContext {
    pub repo: Option<String>,
    pub branch: Option<String>,
    pub is_worktree: bool,
}

pub trait GitInfo: Send + Sync {
    fn info(&self, workdir: &Path) -> GitContext;
    /// True iff `git status --porcelain` reports any staged, unstaged, or
    /// untracked change.
    fn has_changes(&self, workdir: &Path) -> bool;
}

pub struct RealGitInfo;

impl RealGitInfo {
    /// Prefers `--show-toplevel` over `--git-common-dir`/path heuristics:
    /// worktrees may therefore report the worktree directory's own basename
    /// rather than the parent repository's — a documented limitation, not a
    /// bug.
    fn repo_name(workdir: &Path) -> Option<String> {
        let output = Command::new("git")
            .args(["-C", &workdir.to_string_lossy(), "rev-parse", "--show-toplevel"])
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let toplevel = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Path::new(&toplevel)
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
    }

    fn branch_name(workdir: &Path) -> Option<String> {
        let output = Command::new("git")
            .args(["-C", &workdir.to_string_lossy(), "rev-parse", "--abbrev-ref", "HEAD"])
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!branch.is_empty()).then_some(branch)
    }

    fn is_worktree(workdir: &Path) -> bool {
        let Ok(output) = Command::new("git")
            .args(["-C", &workdir.to_string_lossy(), "rev-parse", "--git-common-dir"])
            .output()
        else {
            return false;
        };
        if !output.status.success() {
            return false;
        }
        let common_dir = String::from_utf8_lossy(&output.stdout).trim().to_string();
        !common_dir.is_empty() && common_dir != ".git"
    }
}

impl GitInfo for RealGitInfo {
    fn info(&self, workdir: &Path) -> GitContext {
        GitContext {
            repo: Self::repo_name(workdir),
            branch: Self::branch_name(workdir),
            is_worktree: Self::is_worktree(workdir),
        }
    }

    fn has_changes(&self, workdir: &Path) -> bool {
        let Ok(output) = Command::new("git")
            .args(["-C", &workdir.to_string_lossy(), "status", "--porcelain"])
            .output()
        else {
            return false;
        };
        output.status.success() && !output.stdout.is_empty()
    }
}

pub struct FakeGitInfo {
    pub context: GitContext,
    pub has_changes: bool,
}

impl GitInfo for FakeGitInfo {
    fn info(&self, _workdir: &Path) -> GitContext {
        self.context.clone()
    }

    fn has_changes(&self, _workdir: &Path) -> bool {
        self.has_changes
    }
}
