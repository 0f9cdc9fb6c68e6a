//! Stdin-driven hook handlers: pre/post-tool-use, notification, stop,
//! subagent-stop, plus the `oneshot start|stop` subcommands. The CLI crate
//! owns argument parsing and argv[0] dispatch; this crate owns what each
//! event actually does to the filesystem registry and the store.

pub mod adapters;
pub mod engine;
pub mod input;

pub use engine::{handle, handle_oneshot_start, handle_oneshot_stop, HookContext};
pub use input::{HookInput, OneshotStartInput, OneshotStopInput, PreToolUseResponse};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{FakeGitInfo, FakeNotifier, FakeTmuxDetector, GitContext};
    use canopy_core::SessionStatus;
    use std::sync::Arc;

    fn test_ctx(tmp: &std::path::Path) -> HookContext {
        HookContext {
            store: canopy_store::Store::open(tmp.join("state.db")).unwrap(),
            fs_root: tmp.join("sessions"),
            working_dir: tmp.to_path_buf(),
            global_config: canopy_core::config::GlobalConfig::default(),
            notifier: Box::new(FakeNotifier::default()),
            tmux: Box::new(FakeTmuxDetector(None)),
            git: Box::new(FakeGitInfo {
                context: GitContext {
                    repo: Some("canopy".to_string()),
                    branch: Some("main".to_string()),
                    is_worktree: false,
                },
                has_changes: false,
            }),
        }
    }

    #[test]
    fn pre_tool_use_creates_session_and_approves() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = test_ctx(tmp.path());

        let input = HookInput::PreToolUse {
            session_id: "S1".to_string(),
            transcript_path: None,
            current_uuid: None,
            parent_uuid: None,
            tool_name: "Bash".to_string(),
            tool_input: serde_json::json!({"command": "ls"}),
        };

        let response = handle(&ctx, input).unwrap().unwrap();
        assert!(response.approved);

        let session = ctx.store.get("S1").unwrap().unwrap();
        assert!(matches!(session.status, SessionStatus::Running));
        assert!(ctx.fs_root.join("S1").join("pid.lock").exists());
    }

    /// Mutates the process-wide `CLAUDE_PID` env var, so this must not run
    /// concurrently with another test that reads it.
    #[test]
    #[serial_test::serial]
    fn pre_tool_use_records_claude_pid_override_not_the_hook_pid() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = test_ctx(tmp.path());

        std::env::set_var("CLAUDE_PID", "424242");
        let result = handle(
            &ctx,
            HookInput::PreToolUse {
                session_id: "S1".to_string(),
                transcript_path: None,
                current_uuid: None,
                parent_uuid: None,
                tool_name: "Bash".to_string(),
                tool_input: serde_json::json!({}),
            },
        );
        std::env::remove_var("CLAUDE_PID");
        result.unwrap();

        let session = ctx.store.get("S1").unwrap().unwrap();
        assert_eq!(session.pid, 424242);
        assert_ne!(session.pid, std::process::id() as i64);
    }

    #[test]
    fn post_tool_use_without_stash_is_best_effort() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = test_ctx(tmp.path());

        let input = HookInput::PostToolUse {
            session_id: "unknown".to_string(),
            transcript_path: None,
            current_uuid: None,
            parent_uuid: None,
            tool_name: "Bash".to_string(),
            tool_input: serde_json::json!({}),
            tool_response: serde_json::json!({}),
            tool_duration_ms: 10,
            tool_error: None,
            tool_use_id: None,
        };

        assert!(handle(&ctx, input).unwrap().is_none());
    }

    #[test]
    fn stop_with_terminal_reason_completes_session() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = test_ctx(tmp.path());

        handle(
            &ctx,
            HookInput::PreToolUse {
                session_id: "S1".to_string(),
                transcript_path: None,
                current_uuid: None,
                parent_uuid: None,
                tool_name: "Bash".to_string(),
                tool_input: serde_json::json!({}),
            },
        )
        .unwrap();

        handle(
            &ctx,
            HookInput::Stop {
                session_id: "S1".to_string(),
                transcript_path: None,
                current_uuid: None,
                parent_uuid: None,
                exit_reason: "completed".to_string(),
                duration_ms: 100,
            },
        )
        .unwrap();

        let session = ctx.store.get("S1").unwrap().unwrap();
        assert!(matches!(session.status, SessionStatus::Completed));
        assert!(session.ended_at.is_some());
        assert!(!ctx.fs_root.join("S1").exists());
    }

    #[test]
    fn stop_without_terminal_reason_keeps_session_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = test_ctx(tmp.path());

        handle(
            &ctx,
            HookInput::PreToolUse {
                session_id: "S1".to_string(),
                transcript_path: None,
                current_uuid: None,
                parent_uuid: None,
                tool_name: "Bash".to_string(),
                tool_input: serde_json::json!({}),
            },
        )
        .unwrap();

        handle(
            &ctx,
            HookInput::Stop {
                session_id: "S1".to_string(),
                transcript_path: None,
                current_uuid: None,
                parent_uuid: None,
                exit_reason: String::new(),
                duration_ms: 100,
            },
        )
        .unwrap();

        assert!(ctx.fs_root.join("S1").join("pid.lock").exists());
    }

    #[test]
    fn stop_without_reason_goes_idle() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = test_ctx(tmp.path());

        handle(
            &ctx,
            HookInput::PreToolUse {
                session_id: "S1".to_string(),
                transcript_path: None,
                current_uuid: None,
                parent_uuid: None,
                tool_name: "Bash".to_string(),
                tool_input: serde_json::json!({}),
            },
        )
        .unwrap();

        handle(
            &ctx,
            HookInput::Stop {
                session_id: "S1".to_string(),
                transcript_path: None,
                current_uuid: None,
                parent_uuid: None,
                exit_reason: String::new(),
                duration_ms: 100,
            },
        )
        .unwrap();

        let session = ctx.store.get("S1").unwrap().unwrap();
        assert!(matches!(session.status, SessionStatus::Idle));
    }

    #[test]
    fn blocking_on_stop_command_propagates_and_leaves_status_unchanged() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = test_ctx(tmp.path());

        fs_err::write(
            tmp.path().join(".canopy.yaml"),
            "hooks:\n  on_stop:\n    - name: lint\n      command: \"exit 2\"\n",
        )
        .unwrap();

        handle(
            &ctx,
            HookInput::PreToolUse {
                session_id: "S1".to_string(),
                transcript_path: None,
                current_uuid: None,
                parent_uuid: None,
                tool_name: "Bash".to_string(),
                tool_input: serde_json::json!({}),
            },
        )
        .unwrap();

        let err = handle(
            &ctx,
            HookInput::Stop {
                session_id: "S1".to_string(),
                transcript_path: None,
                current_uuid: None,
                parent_uuid: None,
                exit_reason: "completed".to_string(),
                duration_ms: 100,
            },
        )
        .unwrap_err();

        assert!(matches!(err, canopy_core::CanopyError::BlockingStopCommand { .. }));
        assert_eq!(err.exit_code(), 2);

        let session = ctx.store.get("S1").unwrap().unwrap();
        assert!(matches!(session.status, SessionStatus::Running));
    }

    #[test]
    fn oneshot_start_pending_user_fires_notification() {
        let tmp = tempfile::tempdir().unwrap();
        let notifier = Arc::new(FakeNotifier::default());
        let mut ctx = test_ctx(tmp.path());
        ctx.notifier = Box::new(FakeNotifierHandle(notifier.clone()));

        engine::handle_oneshot_start(
            &ctx,
            input::OneshotStartInput {
                id: "J1".to_string(),
                plan_name: Some("plan".to_string()),
                plan_directory: Some("/tmp/plan".to_string()),
                job_title: Some("do the thing".to_string()),
                job_file_path: Some("/tmp/plan/J1.md".to_string()),
                status: Some("pending_user".to_string()),
            },
        )
        .unwrap();

        let session = ctx.store.get("J1").unwrap().unwrap();
        assert!(matches!(session.status, SessionStatus::PendingUser));
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn oneshot_stop_records_error_on_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = test_ctx(tmp.path());

        engine::handle_oneshot_start(
            &ctx,
            input::OneshotStartInput {
                id: "J1".to_string(),
                plan_name: None,
                plan_directory: None,
                job_title: None,
                job_file_path: None,
                status: None,
            },
        )
        .unwrap();

        engine::handle_oneshot_stop(
            &ctx,
            input::OneshotStopInput {
                id: "J1".to_string(),
                status: "failed".to_string(),
                error: Some("boom".to_string()),
            },
        )
        .unwrap();

        let session = ctx.store.get("J1").unwrap().unwrap();
        assert!(matches!(session.status, SessionStatus::Failed));
        assert_eq!(session.error.as_deref(), Some("boom"));
    }

    /// Wraps a shared `FakeNotifier` so a test can both own a handle to
    /// assert on and hand it to `HookContext` by value.
    struct FakeNotifierHandle(Arc<FakeNotifier>);

    impl adapters::Notifier for FakeNotifierHandle {
        fn send(&self, title: &str, message: &str, level: &str, tags: &[&str]) {
            self.0.send(title, message, level, tags);
        }
    }
}
