//! Zero-signal liveness check, following `state::lock::is_pid_alive`
//! elsewhere in this codebase (`libc::kill(pid, 0)`), simplified to the
//! exact contract this system needs: no process-name verification, no PID
//! reuse mitigation — those are reconciliation concerns layered on top by
//! callers that also have a recorded `started_at` to compare against.

/// Returns whether `pid` refers to a live process, via a zero-signal send.
///
/// `pid <= 0` is always false. Otherwise: the process exists iff `kill`
/// succeeds or fails with `EPERM` (owned by another user, but alive).
/// `ESRCH` ("no such process") is the only failure treated as dead; any
/// other errno is treated conservatively as dead too, since it cannot
/// assert liveness.
pub fn is_alive(pid: i64) -> bool {
    if pid <= 0 {
        return false;
    }
    let pid = match i32::try_from(pid) {
        Ok(p) => p,
        Err(_) => return false,
    };

    #[cfg(unix)]
    {
        let result = unsafe { libc::kill(pid, 0) };
        if result == 0 {
            return true;
        }
        matches!(std::io::Error::last_os_error().raw_os_error(), Some(libc::EPERM))
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_never_alive() {
        assert!(!is_alive(0));
    }

    #[test]
    fn negative_is_never_alive() {
        assert!(!is_alive(-1));
    }

    #[test]
    fn self_pid_is_alive() {
        let pid = std::process::id() as i64;
        assert!(is_alive(pid));
    }

    #[test]
    fn implausibly_large_pid_is_dead() {
        assert!(!is_alive(i64::MAX));
    }
}
