//! Hook-process logging (SPEC_FULL.md §6 "Ambient additions: Logging").
//! stdout/stderr are reserved for the hook protocol (spec §6), so all
//! tracing output goes to a rotating file under
//! `<data-home>/grove-hooks/logs/`; `GROVE_DEBUG` raises the level from
//! `warn` to `debug` (spec §6 env vars). Grounded on the workspace's
//! `tracing-appender` dependency and the teacher daemon's `EnvFilter`
//! bootstrap (`core/daemon::main::init_logging`), generalized from stderr to
//! a rolling file since a hook's stderr is reserved for blocking-stop
//! propagation (spec §6, §7).
use tracing_subscriber::EnvFilter;

pub fn init() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let Some(data_home) = canopy_core::paths::data_home() else {
        return None;
    };
    let log_dir = data_home.join("logs");
    if fs_err::create_dir_all(&log_dir).is_err() {
        return None;
    }

    let debug = std::env::var("GROVE_DEBUG").map(|v| v == "1").unwrap_or(false);
    let default_level = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_appender = tracing_appender::rolling::daily(&log_dir, "canopy.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .try_init();

    Some(guard)
}
