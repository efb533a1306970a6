use crate::exec::channel::ReportSender;
use crate::exec::work::{WorkFn, WorkItem};
use crate::kernel::fd::isolate_report_fd;
use crate::kernel::process::{join_own_group, set_parent_death_signal};
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Worker exit codes. Only `EXIT_COMPLETED` accompanies a usable value.
pub const EXIT_COMPLETED: i32 = 0;
pub const EXIT_WORK_FAILED: i32 = 70;
pub const EXIT_REPORT_FAILED: i32 = 71;
pub const EXIT_ORPHANED: i32 = 72;

/// The single document a worker writes to its result channel.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkerReport {
    Completed { value: Value },
    Failed { error: String },
    Panicked { message: String },
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Run the work function and fold every way it can end into a report.
pub fn invoke(work: &WorkFn, item: &WorkItem) -> WorkerReport {
    match catch_unwind(AssertUnwindSafe(|| work(&item.work_args()))) {
        Ok(Ok(value)) => WorkerReport::Completed { value },
        Ok(Err(err)) => WorkerReport::Failed {
            error: err.to_string(),
        },
        Err(payload) => WorkerReport::Panicked {
            message: panic_message(payload.as_ref()),
        },
    }
}

fn exit_now(code: i32) -> ! {
    // SAFETY: _exit skips atexit handlers and stdio flushing that belong to the parent.
    unsafe { libc::_exit(code) }
}

/// Worker entrypoint, called in the forked child. Never returns.
pub(crate) fn run_worker_main(
    parent: Pid,
    work: Arc<WorkFn>,
    item: WorkItem,
    sender: ReportSender,
) -> ! {
    join_own_group();
    if !set_parent_death_signal(parent) {
        exit_now(EXIT_ORPHANED);
    }

    let sender = match isolate_report_fd(sender.into_raw_fd()) {
        // SAFETY: isolate_report_fd left exactly this slot open for us.
        Ok(fd) => unsafe { ReportSender::from_raw_fd(fd) },
        Err(_) => exit_now(EXIT_REPORT_FAILED),
    };

    let report = invoke(work.as_ref(), &item);
    let code = match sender.send(&report) {
        Err(_) => EXIT_REPORT_FAILED,
        Ok(()) if matches!(report, WorkerReport::Completed { .. }) => EXIT_COMPLETED,
        Ok(()) => EXIT_WORK_FAILED,
    };
    exit_now(code)
}
