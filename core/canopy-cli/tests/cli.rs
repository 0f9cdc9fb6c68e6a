//! End-to-end CLI specs driven through the compiled `canopy` binary, the
//! same `assert_cmd`/`predicates` shape the pack's CLI-heavy repos
//! (`oddjobs`) use for their own `tests/specs/cli` suites. Each test gets
//! its own `XDG_DATA_HOME` so runs never share state.

use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;

fn canopy(data_home: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("canopy").unwrap();
    cmd.env("XDG_DATA_HOME", data_home);
    cmd.env_remove("GROVE_FLOW_JOB_ID");
    cmd.env_remove("CLAUDE_PID");
    cmd
}

#[test]
fn sessions_list_on_empty_store_says_no_sessions() {
    let tmp = tempfile::tempdir().unwrap();
    canopy(tmp.path())
        .args(["sessions", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no sessions"));
}

#[test]
fn pre_tool_use_hook_creates_a_running_session() {
    let tmp = tempfile::tempdir().unwrap();
    let input = r#"{"session_id":"S1","hook_event_name":"pre_tool_use","tool_name":"Bash","tool_input":{"command":"ls"}}"#;

    canopy(tmp.path())
        .arg("pretooluse")
        .write_stdin(input)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"approved\":true"));

    canopy(tmp.path())
        .args(["sessions", "list", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"S1\""))
        .stdout(predicate::str::contains("\"running\""));
}

#[test]
fn stop_without_exit_reason_moves_session_to_idle() {
    let tmp = tempfile::tempdir().unwrap();
    canopy(tmp.path())
        .arg("pretooluse")
        .write_stdin(r#"{"session_id":"S1","hook_event_name":"pre_tool_use","tool_name":"Bash","tool_input":{}}"#)
        .assert()
        .success();

    canopy(tmp.path())
        .arg("stop")
        .write_stdin(r#"{"session_id":"S1","hook_event_name":"stop","exit_reason":"","duration_ms":100}"#)
        .assert()
        .success();

    canopy(tmp.path())
        .args(["sessions", "get", "S1", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"idle\""));
}

#[test]
fn malformed_hook_input_exits_one() {
    let tmp = tempfile::tempdir().unwrap();
    canopy(tmp.path())
        .arg("pretooluse")
        .write_stdin("not json")
        .assert()
        .failure()
        .code(1);
}

#[test]
fn kill_removes_an_unknown_session_without_error() {
    let tmp = tempfile::tempdir().unwrap();
    canopy(tmp.path())
        .args(["sessions", "kill", "nonexistent"])
        .assert()
        .success()
        .stdout(predicate::str::contains("killed nonexistent"));
}
