//! Structured lifecycle events for bounded runs
//! Each event is one JSON line logged under the `lynnkit::audit` target, correlated by run id.

use chrono::{DateTime, Utc};
use log::Level;
use serde::{Deserialize, Serialize};

pub const AUDIT_TARGET: &str = "lynnkit::audit";

/// Types of lifecycle events we track
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunEventType {
    WorkerSpawned,
    WorkerCompleted,
    DeadlineExceeded,
    ForcedKill,
    WorkerFault,
    WorkerReaped,
}

impl RunEventType {
    pub fn level(&self) -> Level {
        match self {
            RunEventType::WorkerSpawned
            | RunEventType::WorkerCompleted
            | RunEventType::WorkerReaped => Level::Debug,
            RunEventType::DeadlineExceeded | RunEventType::ForcedKill => Level::Info,
            RunEventType::WorkerFault => Level::Warn,
        }
    }
}

/// Individual lifecycle event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEvent {
    pub event_type: RunEventType,
    pub timestamp: DateTime<Utc>,
    pub run_id: String,
    pub work: String,
    pub worker_pid: Option<i32>,
    pub details: String,
}

impl RunEvent {
    pub fn new(event_type: RunEventType, run_id: &str, work: &str, details: String) -> Self {
        Self {
            event_type,
            timestamp: Utc::now(),
            run_id: run_id.to_string(),
            work: work.to_string(),
            worker_pid: None,
            details,
        }
    }

    pub fn with_worker_pid(mut self, pid: i32) -> Self {
        self.worker_pid = Some(pid);
        self
    }

    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{:?}", self))
    }
}

/// Log an event. Never called from inside a worker.
pub fn log_run_event(event: RunEvent) {
    let level = event.event_type.level();
    if log::log_enabled!(target: AUDIT_TARGET, level) {
        log::log!(target: AUDIT_TARGET, level, "{}", event.to_json_line());
    }
}

pub fn worker_spawned(run_id: &str, work: &str, pid: i32, deadline_ms: u128) {
    log_run_event(
        RunEvent::new(
            RunEventType::WorkerSpawned,
            run_id,
            work,
            format!("worker started with a {}ms deadline", deadline_ms),
        )
        .with_worker_pid(pid),
    );
}

pub fn worker_completed(run_id: &str, work: &str, pid: i32, wall_ms: u128) {
    log_run_event(
        RunEvent::new(
            RunEventType::WorkerCompleted,
            run_id,
            work,
            format!("worker produced a value after {}ms", wall_ms),
        )
        .with_worker_pid(pid),
    );
}

pub fn deadline_exceeded(run_id: &str, work: &str, pid: i32, deadline_ms: u128) {
    log_run_event(
        RunEvent::new(
            RunEventType::DeadlineExceeded,
            run_id,
            work,
            format!("deadline of {}ms elapsed with worker still running", deadline_ms),
        )
        .with_worker_pid(pid),
    );
}

pub fn forced_kill(run_id: &str, work: &str, pid: i32, group: bool, notes: &[String]) {
    let scope = if group { "process group" } else { "worker" };
    let details = if notes.is_empty() {
        format!("SIGKILL sent to {}", scope)
    } else {
        format!("SIGKILL sent to {} ({})", scope, notes.join("; "))
    };
    log_run_event(RunEvent::new(RunEventType::ForcedKill, run_id, work, details).with_worker_pid(pid));
}

pub fn worker_fault(run_id: &str, work: &str, pid: i32, reason: &str) {
    log_run_event(
        RunEvent::new(RunEventType::WorkerFault, run_id, work, reason.to_string())
            .with_worker_pid(pid),
    );
}

pub fn worker_reaped(run_id: &str, work: &str, pid: i32, exit: &str) {
    log_run_event(
        RunEvent::new(RunEventType::WorkerReaped, run_id, work, exit.to_string())
            .with_worker_pid(pid),
    );
}
