use crate::config::types::{ExecutorConfig, Result};
use crate::config::validator::validate_deadline;
use crate::exec::channel::{self, Received};
use crate::exec::work::{WorkFn, WorkItem};
use crate::exec::worker::{run_worker_main, WorkerReport};
use crate::kernel::process::{
    fork_worker, millis_u64, place_in_own_group, reap_blocking, terminate_worker, try_reap,
    Forked, KillReport, WorkerExit,
};
use crate::observability::events;
use chrono::{DateTime, Utc};
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Why a worker ended without producing a value, other than the caller's deadline
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FaultReason {
    /// The work function returned an error
    WorkFailed(String),
    /// The work function panicked
    Panicked(String),
    /// The worker process exited with this code before writing a report
    ExitedWithoutResult(i32),
    /// Something other than the caller killed the worker
    KilledBySignal(i32),
    /// The worker was reaped by someone else
    Vanished,
    CorruptReport(String),
    OversizedReport(usize),
}

impl fmt::Display for FaultReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultReason::WorkFailed(err) => write!(f, "work failed: {}", err),
            FaultReason::Panicked(msg) => write!(f, "work panicked: {}", msg),
            FaultReason::ExitedWithoutResult(code) => {
                write!(f, "worker exited with code {} without a result", code)
            }
            FaultReason::KilledBySignal(sig) => write!(f, "worker killed by signal {}", sig),
            FaultReason::Vanished => write!(f, "worker was reaped elsewhere"),
            FaultReason::CorruptReport(err) => write!(f, "worker report did not decode: {}", err),
            FaultReason::OversizedReport(n) => write!(f, "worker report too large ({} bytes)", n),
        }
    }
}

/// Result of one bounded invocation
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BoundedOutcome {
    Completed { value: Value },
    TimedOut,
    WorkerFault { reason: FaultReason },
}

impl BoundedOutcome {
    pub fn value(&self) -> Option<&Value> {
        match self {
            BoundedOutcome::Completed { value } => Some(value),
            _ => None,
        }
    }

    /// The value, or absent for both timeout and fault
    pub fn into_value(self) -> Option<Value> {
        match self {
            BoundedOutcome::Completed { value } => Some(value),
            _ => None,
        }
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, BoundedOutcome::TimedOut)
    }

    pub fn label(&self) -> &'static str {
        match self {
            BoundedOutcome::Completed { .. } => "completed",
            BoundedOutcome::TimedOut => "timed_out",
            BoundedOutcome::WorkerFault { .. } => "worker_fault",
        }
    }
}

/// Everything observed about one bounded invocation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BoundedRun {
    pub run_id: String,
    pub work: String,
    pub worker_pid: i32,
    pub started_at: DateTime<Utc>,
    pub deadline_ms: u64,
    pub wall_time_ms: u64,
    pub exit: WorkerExit,
    pub kill_report: Option<KillReport>,
    pub outcome: BoundedOutcome,
}

impl BoundedRun {
    pub fn value(&self) -> Option<&Value> {
        self.outcome.value()
    }
}

/// Map what was observed to an outcome. A deadline kill always wins, even if
/// the worker managed to finish between the last poll and the kill.
pub fn classify_outcome(
    timed_out: bool,
    exit: WorkerExit,
    received: Received<WorkerReport>,
) -> BoundedOutcome {
    if timed_out {
        return BoundedOutcome::TimedOut;
    }

    let reason = match (received, exit) {
        (Received::Value(WorkerReport::Completed { value }), _) => {
            return BoundedOutcome::Completed { value }
        }
        (Received::Value(WorkerReport::Failed { error }), _) => FaultReason::WorkFailed(error),
        (Received::Value(WorkerReport::Panicked { message }), _) => FaultReason::Panicked(message),
        (_, WorkerExit::Signaled(sig)) => FaultReason::KilledBySignal(sig),
        (Received::Oversized(n), _) => FaultReason::OversizedReport(n),
        (Received::Corrupt(err), _) => FaultReason::CorruptReport(err),
        (Received::Empty, WorkerExit::Exited(code)) => FaultReason::ExitedWithoutResult(code),
        (Received::Empty, WorkerExit::Vanished) => FaultReason::Vanished,
    };
    BoundedOutcome::WorkerFault { reason }
}

/// Kills and reaps the worker on any early return.
struct WorkerGuard {
    pid: Pid,
    whole_group: bool,
    armed: bool,
}

impl WorkerGuard {
    fn new(pid: Pid, whole_group: bool) -> Self {
        Self {
            pid,
            whole_group,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        if self.armed {
            log::warn!("Reclaiming worker {} on error path", self.pid);
            let _ = terminate_worker(self.pid, self.whole_group);
            let _ = reap_blocking(self.pid);
        }
    }
}

/// Run `item` in a forked worker and wait at most `deadline` for its value.
///
/// The worker is always reaped before this returns, whatever the outcome.
pub fn launch_bounded(
    work: Arc<WorkFn>,
    item: &WorkItem,
    deadline: Duration,
    config: &ExecutorConfig,
) -> Result<BoundedRun> {
    validate_deadline(deadline)?;

    let run_id = Uuid::new_v4().to_string();
    let (sender, mut receiver) = channel::open(config.max_report_bytes)?;
    let child_item = item.clone();

    let started_at = Utc::now();
    let started = Instant::now();

    let pid = match fork_worker()? {
        Forked::Child { parent } => run_worker_main(parent, work, child_item, sender),
        Forked::Parent { child } => {
            drop(sender);
            drop(child_item);
            child
        }
    };

    let mut guard = WorkerGuard::new(pid, config.kill_process_group);
    place_in_own_group(pid)?;
    events::worker_spawned(&run_id, &item.name, pid.as_raw(), deadline.as_millis());

    let poll_interval = config.poll_interval();
    let mut kill_report: Option<KillReport> = None;

    let exit = loop {
        receiver.drain()?;

        if let Some(exit) = try_reap(pid)? {
            break exit;
        }

        let elapsed = started.elapsed();
        if elapsed >= deadline {
            events::deadline_exceeded(&run_id, &item.name, pid.as_raw(), deadline.as_millis());
            let mut report = terminate_worker(pid, config.kill_process_group);
            let exit = reap_blocking(pid)?;
            report.record_exit(exit);
            events::forced_kill(
                &run_id,
                &item.name,
                pid.as_raw(),
                report.group_kill,
                &report.notes,
            );
            kill_report = Some(report);
            break exit;
        }

        std::thread::sleep(poll_interval.min(deadline - elapsed));
    };
    guard.disarm();

    let wall_time = started.elapsed();
    events::worker_reaped(&run_id, &item.name, pid.as_raw(), &format!("{:?}", exit));

    receiver.drain()?;
    let outcome = classify_outcome(
        kill_report.is_some(),
        exit,
        receiver.finish::<WorkerReport>(),
    );

    match &outcome {
        BoundedOutcome::Completed { .. } => {
            events::worker_completed(&run_id, &item.name, pid.as_raw(), wall_time.as_millis())
        }
        BoundedOutcome::WorkerFault { reason } => {
            events::worker_fault(&run_id, &item.name, pid.as_raw(), &reason.to_string())
        }
        BoundedOutcome::TimedOut => {}
    }

    Ok(BoundedRun {
        run_id,
        work: item.name.clone(),
        worker_pid: pid.as_raw(),
        started_at,
        deadline_ms: millis_u64(deadline),
        wall_time_ms: millis_u64(wall_time),
        exit,
        kill_report,
        outcome,
    })
}
