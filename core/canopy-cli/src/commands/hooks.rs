//! Classic hook dispatch: one JSON object on stdin, at most one JSON object
//! on stdout (`pre_tool_use` only), exit codes 0/1/2. The five verb names
//! (`pretooluse`, `posttooluse`, `notification`, `stop`, `subagentstop`)
//! all funnel through the same handler — `HookInput`'s own
//! `hook_event_name` tag already carries the dispatch information, so there
//! is nothing verb-specific left to do here beyond reading stdin and
//! shaping the exit code.

use std::io::Read;

use canopy_hooks::HookContext;

pub fn run() -> i32 {
    let ctx = match HookContext::production() {
        Ok(ctx) => ctx,
        Err(err) => {
            eprintln!("canopy: {err}");
            return err.exit_code();
        }
    };

    let mut raw = String::new();
    if let Err(err) = std::io::stdin().read_to_string(&mut raw) {
        eprintln!("canopy: failed to read stdin: {err}");
        return 1;
    }
    if raw.trim().is_empty() {
        eprintln!("canopy: empty hook input");
        return 1;
    }

    let input = match canopy_hooks::HookInput::parse(&raw) {
        Ok(input) => input,
        Err(err) => {
            eprintln!("canopy: {err}");
            return err.exit_code();
        }
    };

    match canopy_hooks::handle(&ctx, input) {
        Ok(Some(response)) => match serde_json::to_string(&response) {
            Ok(json) => {
                println!("{json}");
                0
            }
            Err(err) => {
                eprintln!("canopy: failed to serialize response: {err}");
                1
            }
        },
        Ok(None) => 0,
        Err(canopy_core::CanopyError::BlockingStopCommand { stderr, .. }) => {
            eprintln!("{stderr}");
            2
        }
        Err(err) => {
            eprintln!("canopy: {err}");
            err.exit_code()
        }
    }
}
