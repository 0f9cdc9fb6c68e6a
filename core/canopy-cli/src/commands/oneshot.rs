//! `oneshot start|stop` subcommands: not classic hooks, but still
//! stdin-JSON-driven.

use std::io::Read;

use canopy_hooks::HookContext;

fn read_stdin() -> Result<String, i32> {
    let mut raw = String::new();
    std::io::stdin().read_to_string(&mut raw).map_err(|err| {
        eprintln!("canopy: failed to read stdin: {err}");
        1
    })?;
    Ok(raw)
}

fn open_context() -> Result<HookContext, i32> {
    HookContext::production().map_err(|err| {
        eprintln!("canopy: {err}");
        err.exit_code()
    })
}

pub fn start() -> i32 {
    let ctx = match open_context() {
        Ok(ctx) => ctx,
        Err(code) => return code,
    };
    let raw = match read_stdin() {
        Ok(raw) => raw,
        Err(code) => return code,
    };

    let input: canopy_hooks::OneshotStartInput = match serde_json::from_str(&raw) {
        Ok(input) => input,
        Err(err) => {
            eprintln!("canopy: malformed oneshot start input: {err}");
            return 1;
        }
    };

    match canopy_hooks::handle_oneshot_start(&ctx, input) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("canopy: {err}");
            err.exit_code()
        }
    }
}

pub fn stop() -> i32 {
    let ctx = match open_context() {
        Ok(ctx) => ctx,
        Err(code) => return code,
    };
    let raw = match read_stdin() {
        Ok(raw) => raw,
        Err(code) => return code,
    };

    let input: canopy_hooks::OneshotStopInput = match serde_json::from_str(&raw) {
        Ok(input) => input,
        Err(err) => {
            eprintln!("canopy: malformed oneshot stop input: {err}");
            return 1;
        }
    };

    match canopy_hooks::handle_oneshot_stop(&ctx, input) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("canopy: {err}");
            err.exit_code()
        }
    }
}
