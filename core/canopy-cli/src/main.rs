//! `canopy`: the CLI surface (spec §6) — hook verbs, `sessions` reporting,
//! `oneshot start|stop`, and `browse` (the TUI). Hook verbs double as an
//! argv[0] symlink fast path (spec §9 "single dispatch table keyed by
//! name... install both the multi-command parser and an argv[0]-based fast
//! path"), grounded on the teacher's `hud-hook` binary shape generalized
//! from a two-subcommand CLI to this spec's full verb set.

mod commands;
mod context;
mod logging;
mod output;

use clap::{Parser, Subcommand};

const HOOK_VERBS: &[&str] = &["pretooluse", "posttooluse", "notification", "stop", "subagentstop"];

#[derive(Parser)]
#[command(name = "canopy", version, about = "AI coding-agent session tracker")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Session reporting, filtering, archiving, cleanup, kill.
    Sessions {
        #[command(subcommand)]
        command: SessionsCommand,
    },
    /// Launch the interactive session browser.
    Browse,
    /// Adopt or close a one-shot orchestrator job.
    Oneshot {
        #[command(subcommand)]
        command: OneshotCommand,
    },
    /// `pre_tool_use` hook (reads JSON from stdin).
    Pretooluse,
    /// `post_tool_use` hook (reads JSON from stdin).
    Posttooluse,
    /// `notification` hook (reads JSON from stdin).
    Notification,
    /// `stop` hook (reads JSON from stdin).
    Stop,
    /// `subagent_stop` hook (reads JSON from stdin).
    Subagentstop,
}

#[derive(Subcommand)]
enum SessionsCommand {
    /// List known sessions.
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        plan: Option<String>,
        #[arg(long = "type")]
        kind: Option<String>,
        #[arg(long)]
        json: bool,
        #[arg(long)]
        limit: Option<usize>,
        /// Hide completed/failed/error sessions.
        #[arg(long)]
        active: bool,
    },
    /// Show one session's full detail.
    Get {
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Soft-delete (hide from normal queries) one or more sessions.
    Archive {
        ids: Vec<String>,
        #[arg(long)]
        all: bool,
        #[arg(long)]
        completed: bool,
        #[arg(long)]
        failed: bool,
        #[arg(long)]
        running: bool,
        #[arg(long)]
        idle: bool,
    },
    /// Run the dead-session reaper immediately.
    Cleanup {
        #[arg(long)]
        inactive_minutes: Option<i64>,
    },
    /// Terminate a live session's process and remove its directory.
    Kill {
        id: String,
        #[arg(long)]
        force: bool,
    },
    /// Set a flow job's status directly, by job file path.
    SetStatus { job_file: String, status: String },
    /// Mark sessions whose recorded pid is dead as interrupted.
    MarkInterrupted {
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum OneshotCommand {
    /// Adopt a one-shot job (reads JSON from stdin).
    Start,
    /// Close a one-shot job (reads JSON from stdin).
    Stop,
}

fn main() {
    let _logging_guard = logging::init();

    if let Some(code) = dispatch_argv0_hook() {
        std::process::exit(code);
    }

    let cli = Cli::parse();
    let code = run(cli.command);
    std::process::exit(code);
}

/// argv[0]-based fast path: a symlink named e.g. `pretooluse` pointing at
/// this binary runs the hook handler directly, without the `canopy hook`
/// subcommand prefix (spec §9).
fn dispatch_argv0_hook() -> Option<i32> {
    let arg0 = std::env::args().next()?;
    let name = std::path::Path::new(&arg0).file_name()?.to_str()?;
    HOOK_VERBS.contains(&name).then(|| commands::hooks::run())
}

fn run(command: Command) -> i32 {
    match command {
        Command::Sessions { command } => run_sessions(command),
        Command::Browse => match canopy_tui::run() {
            Ok(()) => 0,
            Err(err) => {
                eprintln!("canopy: {err}");
                1
            }
        },
        Command::Oneshot { command } => match command {
            OneshotCommand::Start => commands::oneshot::start(),
            OneshotCommand::Stop => commands::oneshot::stop(),
        },
        Command::Pretooluse
        | Command::Posttooluse
        | Command::Notification
        | Command::Stop
        | Command::Subagentstop => commands::hooks::run(),
    }
}

fn run_sessions(command: SessionsCommand) -> i32 {
    match command {
        SessionsCommand::List {
            status,
            plan,
            kind,
            json,
            limit,
            active,
        } => commands::sessions::list(status, plan, kind, json, limit, active),
        SessionsCommand::Get { id, json } => commands::sessions::get(&id, json),
        SessionsCommand::Archive {
            ids,
            all,
            completed,
            failed,
            running,
            idle,
        } => commands::sessions::archive(ids, all, completed, failed, running, idle),
        SessionsCommand::Cleanup { inactive_minutes } => commands::sessions::cleanup(inactive_minutes),
        SessionsCommand::Kill { id, force } => commands::sessions::kill(&id, force),
        SessionsCommand::SetStatus { job_file, status } => commands::sessions::set_status(&job_file, &status),
        SessionsCommand::MarkInterrupted { dry_run } => commands::sessions::mark_interrupted(dry_run),
    }
}
