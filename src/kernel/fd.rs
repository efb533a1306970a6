//! File descriptor plumbing for the worker result channel
//!
//! - pipes are created close-on-exec
//! - the read end is switched to non-blocking so the caller can drain it while polling
//! - the worker moves its write end to a fixed slot and closes everything else it inherited,
//!   so a sibling invocation's pipe is never held open by an unrelated worker

use crate::config::types::{KitError, Result};
use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::unistd::{close, dup2, pipe2};
use std::io;
use std::os::fd::{OwnedFd, RawFd};

/// Slot the worker's report descriptor is moved to before running work
pub const WORKER_REPORT_FD: RawFd = 3;

fn to_fd_error(prefix: &str, err: Errno) -> KitError {
    KitError::Io(io::Error::new(io::Error::from(err).kind(), format!("{prefix}: {err}")))
}

/// Create a pipe with both ends close-on-exec, returning (read, write)
pub fn pipe_cloexec() -> Result<(OwnedFd, OwnedFd)> {
    pipe2(OFlag::O_CLOEXEC).map_err(|e| to_fd_error("pipe2(report)", e))
}

pub fn set_nonblocking(fd: RawFd) -> Result<()> {
    let flags = fcntl(fd, FcntlArg::F_GETFL).map_err(|e| to_fd_error("fcntl(F_GETFL)", e))?;
    let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
    fcntl(fd, FcntlArg::F_SETFL(flags)).map_err(|e| to_fd_error("fcntl(F_SETFL)", e))?;
    Ok(())
}

/// Worker side: move `keep` to [`WORKER_REPORT_FD`] and close every other
/// descriptor above stderr. Returns the slot now holding the report pipe.
pub fn isolate_report_fd(keep: RawFd) -> io::Result<RawFd> {
    if keep != WORKER_REPORT_FD {
        dup2(keep, WORKER_REPORT_FD).map_err(io::Error::from)?;
    }

    #[cfg(target_os = "linux")]
    {
        if try_close_range(WORKER_REPORT_FD + 1) {
            return Ok(WORKER_REPORT_FD);
        }
    }

    close_fds_via_proc(WORKER_REPORT_FD + 1);
    Ok(WORKER_REPORT_FD)
}

/// close_range(2), Linux 5.9+
#[cfg(target_os = "linux")]
fn try_close_range(first: RawFd) -> bool {
    const SYS_CLOSE_RANGE: libc::c_long = 436;
    // SAFETY: closes descriptors we are about to abandon; nothing after this touches them.
    let rc = unsafe { libc::syscall(SYS_CLOSE_RANGE, first as libc::c_uint, !0 as libc::c_uint, 0) };
    rc == 0
}

/// Fallback: enumerate /proc/self/fd (or /dev/fd) and close what is found
fn close_fds_via_proc(first: RawFd) {
    let dir = if cfg!(target_os = "linux") {
        "/proc/self/fd"
    } else {
        "/dev/fd"
    };
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    // Collect first: the directory handle itself is one of the listed descriptors.
    let fds: Vec<RawFd> = entries
        .flatten()
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter_map(|name| name.parse::<RawFd>().ok())
        .filter(|fd| *fd >= first)
        .collect();

    for fd in fds {
        // EBADF for the already-closed directory handle is expected.
        let _ = close(fd);
    }
}
