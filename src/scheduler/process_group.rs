//! Process-group helpers for killing a timed-out tool and every child it
//! spawned, not just the direct process. Adapted from VTCode's
//! `process_group.rs` for `std::process::Command` instead of `tokio`: the
//! child is placed in its own process group via `pre_exec`, and timeout
//! handling sends SIGTERM to the whole group, waits a grace period, then
//! SIGKILL.
use std::io;
use std::time::Duration;

/// Grace period between SIGTERM and SIGKILL when a tool times out.
pub const GRACE_PERIOD: Duration = Duration::from_secs(2);

/// Put the calling process into its own process group. Intended for use in
/// `pre_exec`, so the spawned tool becomes the leader of a group the
/// scheduler can terminate as a unit.
///
/// # Errors
///
/// Returns the underlying OS error if `setpgid` fails.
#[cfg(unix)]
#[allow(unsafe_code)]
pub fn set_process_group() -> io::Result<()> {
    // SAFETY: `setpgid(0, 0)` only affects the calling process's own process
    // group and takes no pointer arguments; safe to call from `pre_exec`.
    let result = unsafe { libc::setpgid(0, 0) };
    if result == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

#[cfg(not(unix))]
pub fn set_process_group() -> io::Result<()> {
    Ok(())
}

/// Detach from the controlling TTY by starting a new session, so the
/// fork-controller child survives the git hook's parent shell exiting.
///
/// # Errors
///
/// Returns the underlying OS error if `setsid` fails for a reason other
/// than already being a session leader.
#[cfg(unix)]
#[allow(unsafe_code)]
pub fn detach_from_tty() -> io::Result<()> {
    // SAFETY: `setsid()` takes no arguments and only affects the calling
    // process's own session.
    let result = unsafe { libc::setsid() };
    if result == -1 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EPERM) {
            return set_process_group();
        }
        return Err(err);
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn detach_from_tty() -> io::Result<()> {
    Ok(())
}

/// Send SIGTERM to the process group led by `pid`, poll for exit up to
/// `grace`, then send SIGKILL if it is still running.
///
/// `is_running` is polled by the caller (typically via `Child::try_wait`);
/// this function only issues signals.
#[cfg(unix)]
pub fn terminate(pid: u32) -> io::Result<()> {
    send_signal(pid, libc::SIGTERM)
}

/// Force-kill the process group led by `pid`.
#[cfg(unix)]
pub fn kill(pid: u32) -> io::Result<()> {
    send_signal(pid, libc::SIGKILL)
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn send_signal(pid: u32, signal: libc::c_int) -> io::Result<()> {
    let pid = i32::try_from(pid).unwrap_or(libc::pid_t::MAX);
    // SAFETY: `getpgid`/`killpg` take a plain pid/pgid integer and no
    // pointers; errors are reported via `errno` and handled below.
    let pgid = unsafe { libc::getpgid(pid) };
    if pgid == -1 {
        let err = io::Error::last_os_error();
        return if err.kind() == io::ErrorKind::NotFound {
            Ok(())
        } else {
            Err(err)
        };
    }
    // SAFETY: see above.
    let result = unsafe { libc::killpg(pgid, signal) };
    if result == -1 {
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::NotFound {
            return Err(err);
        }
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn terminate(_pid: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(not(unix))]
pub fn kill(_pid: u32) -> io::Result<()> {
    Ok(())
}
