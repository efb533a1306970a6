//! Process lifecycle primitives for the bounded executor.
//!
//! fork, process-group placement, parent-death signal, SIGKILL escalation and
//! reaping. The forked child is a full copy of a possibly multi-threaded
//! parent: it must not log or take any lock the parent may have held at fork.

use crate::config::types::{KitError, Result};
use nix::errno::Errno;
use nix::sys::signal::{kill, killpg, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, getpid, getppid, setpgid, ForkResult, Pid};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

fn to_process_error(prefix: &str, err: impl std::fmt::Display) -> KitError {
    KitError::Process(format!("{prefix}: {err}"))
}

/// Which side of a fork we are on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Forked {
    Child { parent: Pid },
    Parent { child: Pid },
}

/// How a worker left the process table.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum WorkerExit {
    /// Normal exit with this status code
    Exited(i32),
    /// Terminated by this signal number
    Signaled(i32),
    /// Reaped by someone else (ECHILD), status unknown
    Vanished,
}

impl WorkerExit {
    fn from_status(status: WaitStatus) -> Option<Self> {
        match status {
            WaitStatus::Exited(_, code) => Some(WorkerExit::Exited(code)),
            WaitStatus::Signaled(_, sig, _) => Some(WorkerExit::Signaled(sig as i32)),
            _ => None,
        }
    }

    pub fn killed_by(&self, signal: Signal) -> bool {
        matches!(self, WorkerExit::Signaled(sig) if *sig == signal as i32)
    }
}

/// What happened when the caller forcibly terminated a worker.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct KillReport {
    pub kill_sent: bool,
    pub group_kill: bool,
    /// The worker had already finished on its own when the kill landed
    pub already_exited: bool,
    pub waited_ms: u64,
    pub notes: Vec<String>,
}

impl KillReport {
    /// Fold the reaped exit status into the report.
    ///
    /// An unreaped zombie still accepts SIGKILL, so `kill_sent` alone cannot
    /// tell a worker that finished on its own from one the kill stopped. Any
    /// exit other than death by SIGKILL means it finished first.
    pub fn record_exit(&mut self, exit: WorkerExit) {
        if self.already_exited || exit.killed_by(Signal::SIGKILL) {
            return;
        }
        self.already_exited = true;
        self.notes
            .push(format!("worker finished before the kill ({exit:?})"));
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub fn millis_u64(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Fork the current process.
pub fn fork_worker() -> Result<Forked> {
    let parent = getpid();
    // SAFETY: the child branch runs registered work and leaves through `_exit`;
    // it never returns into the caller's stack frames.
    match unsafe { fork() } {
        Ok(ForkResult::Child) => Ok(Forked::Child { parent }),
        Ok(ForkResult::Parent { child }) => Ok(Forked::Parent { child }),
        Err(e) => Err(to_process_error("fork(worker)", e)),
    }
}

/// Child side: become leader of a fresh process group.
pub fn join_own_group() -> bool {
    setpgid(Pid::from_raw(0), Pid::from_raw(0)).is_ok()
}

/// Parent side of the same placement; whichever of the two runs first wins.
/// ESRCH/EACCES mean the child already exited or already moved.
pub fn place_in_own_group(child: Pid) -> Result<()> {
    match setpgid(child, child) {
        Ok(()) | Err(Errno::ESRCH) | Err(Errno::EACCES) => Ok(()),
        Err(e) => Err(to_process_error("setpgid(worker)", e)),
    }
}

/// Child side: ask the kernel to SIGKILL us when the forking thread goes away.
///
/// Returns false if the parent is already gone, in which case the child
/// should exit immediately.
pub fn set_parent_death_signal(parent: Pid) -> bool {
    #[cfg(target_os = "linux")]
    {
        // SAFETY: prctl(PR_SET_PDEATHSIG) only touches the calling process.
        unsafe {
            libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGKILL as libc::c_ulong, 0, 0, 0);
        }
    }
    getppid() == parent
}

/// SIGKILL a worker, preferring its whole process group.
///
/// Killing a worker that already exited is not an error. A worker already
/// reaped shows up here as ESRCH; one that exited but is not yet reaped only
/// shows up after the reap, through [`KillReport::record_exit`].
pub fn terminate_worker(pid: Pid, whole_group: bool) -> KillReport {
    let mut report = KillReport::default();
    let start = Instant::now();

    if whole_group {
        match killpg(pid, Signal::SIGKILL) {
            Ok(()) => {
                report.kill_sent = true;
                report.group_kill = true;
            }
            Err(e) => report
                .notes
                .push(format!("group SIGKILL failed ({e}); falling back to pid")),
        }
    }

    if !report.kill_sent {
        match kill(pid, Signal::SIGKILL) {
            Ok(()) => report.kill_sent = true,
            Err(Errno::ESRCH) => {
                report.already_exited = true;
                report.notes.push("worker already exited".to_string());
            }
            Err(e) => report.notes.push(format!("pid SIGKILL failed: {e}")),
        }
    }

    report.waited_ms = millis_u64(start.elapsed());
    report
}

/// Non-blocking reap. `Ok(None)` while the worker is still running.
pub fn try_reap(pid: Pid) -> Result<Option<WorkerExit>> {
    loop {
        match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => return Ok(None),
            Ok(status) => match WorkerExit::from_status(status) {
                Some(exit) => return Ok(Some(exit)),
                None => return Ok(None),
            },
            Err(Errno::EINTR) => continue,
            Err(Errno::ECHILD) => return Ok(Some(WorkerExit::Vanished)),
            Err(e) => return Err(to_process_error("waitpid(worker)", e)),
        }
    }
}

/// Blocking reap, used after a kill so no zombie is left behind.
pub fn reap_blocking(pid: Pid) -> Result<WorkerExit> {
    loop {
        match waitpid(pid, None) {
            Ok(status) => {
                if let Some(exit) = WorkerExit::from_status(status) {
                    return Ok(exit);
                }
            }
            Err(Errno::EINTR) => continue,
            Err(Errno::ECHILD) => return Ok(WorkerExit::Vanished),
            Err(e) => return Err(to_process_error("waitpid(reap)", e)),
        }
    }
}

/// Whether a pid still names a live (or unreaped) process.
pub fn is_alive(pid: i32) -> bool {
    match kill(Pid::from_raw(pid), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_sleeper() -> Pid {
        match fork_worker().unwrap() {
            Forked::Child { .. } => {
                join_own_group();
                std::thread::sleep(std::time::Duration::from_secs(30));
                unsafe { libc::_exit(0) }
            }
            Forked::Parent { child } => {
                place_in_own_group(child).unwrap();
                child
            }
        }
    }

    #[test]
    fn kill_then_reap_leaves_no_process() {
        let pid = spawn_sleeper();
        assert!(is_alive(pid.as_raw()));

        let report = terminate_worker(pid, true);
        assert!(report.kill_sent);
        assert!(report.group_kill);

        let exit = reap_blocking(pid).unwrap();
        assert!(exit.killed_by(Signal::SIGKILL));
        assert!(!is_alive(pid.as_raw()));
    }

    #[test]
    fn terminating_a_reaped_worker_is_a_noop() {
        let pid = match fork_worker().unwrap() {
            Forked::Child { .. } => unsafe { libc::_exit(7) },
            Forked::Parent { child } => child,
        };
        assert_eq!(reap_blocking(pid).unwrap(), WorkerExit::Exited(7));

        let report = terminate_worker(pid, false);
        assert!(!report.kill_sent);
        assert!(report.already_exited);
    }

    #[test]
    fn killing_an_unreaped_exited_worker_records_early_exit() {
        let pid = match fork_worker().unwrap() {
            Forked::Child { .. } => unsafe { libc::_exit(5) },
            Forked::Parent { child } => child,
        };
        // Let it become a zombie without reaping it.
        std::thread::sleep(Duration::from_millis(200));
        assert!(is_alive(pid.as_raw()));

        let mut report = terminate_worker(pid, false);
        assert!(report.kill_sent);
        assert!(!report.already_exited);

        let exit = reap_blocking(pid).unwrap();
        report.record_exit(exit);
        assert_eq!(exit, WorkerExit::Exited(5));
        assert!(report.already_exited);
        assert_eq!(report.notes.len(), 1);
    }

    #[test]
    fn record_exit_leaves_killed_worker_alone() {
        let mut report = KillReport {
            kill_sent: true,
            ..KillReport::default()
        };
        report.record_exit(WorkerExit::Signaled(Signal::SIGKILL as i32));
        assert!(!report.already_exited);
        assert!(report.notes.is_empty());

        report.record_exit(WorkerExit::Signaled(Signal::SIGSEGV as i32));
        assert!(report.already_exited);
    }

    #[test]
    fn millis_saturate_instead_of_wrapping() {
        assert_eq!(millis_u64(Duration::from_millis(1_500)), 1_500);
        assert_eq!(millis_u64(Duration::from_secs(u64::MAX)), u64::MAX);
    }

    #[test]
    fn try_reap_reports_running_worker() {
        let pid = spawn_sleeper();
        assert_eq!(try_reap(pid).unwrap(), None);
        terminate_worker(pid, true);
        reap_blocking(pid).unwrap();
    }
}
