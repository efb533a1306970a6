//! Integration tests for bounded execution
//!
//! Each test forks real workers and checks that results, timeouts and
//! process cleanup hold end to end.

use lynnkit::kernel::process::is_alive;
use lynnkit::{
    builtin_registry, run_with_limited_time, BoundedExecutor, BoundedOutcome, ExecutorConfig,
    FaultReason, KitError, WorkArgs, WorkError, WorkItem, WorkRegistry,
};
use serde_json::{json, Map, Value};
use std::time::{Duration, Instant};

fn executor() -> BoundedExecutor {
    BoundedExecutor::with_defaults(builtin_registry()).unwrap()
}

/// Dead, or a zombie waiting on someone else's reap
fn is_gone(pid: i32) -> bool {
    if !is_alive(pid) {
        return true;
    }
    std::fs::read_to_string(format!("/proc/{}/stat", pid))
        .map(|stat| {
            stat.rsplit_once(") ")
                .map(|(_, rest)| rest.starts_with('Z') || rest.starts_with('X'))
                .unwrap_or(false)
        })
        .unwrap_or(true)
}

fn wait_until_gone(pid: i32, within: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < within {
        if is_gone(pid) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    is_gone(pid)
}

#[test]
fn test_add_within_deadline() {
    let value = executor()
        .run_value(&WorkItem::new("add").arg(1).arg(2), Duration::from_secs(5))
        .unwrap();
    assert_eq!(value, Some(json!(3)));
}

#[test]
fn test_add_with_named_argument() {
    let value = executor()
        .run_value(
            &WorkItem::new("add").arg(1).arg(2).kwarg("z", 3),
            Duration::from_secs(5),
        )
        .unwrap();
    assert_eq!(value, Some(json!(6)));
}

#[test]
fn test_zero_argument_work() {
    let value = executor()
        .run_value(&WorkItem::new("constant"), Duration::from_secs(5))
        .unwrap();
    assert_eq!(value, Some(json!("no args")));
}

#[test]
fn test_sleep_past_deadline_is_absent_and_worker_is_gone() {
    let start = Instant::now();
    let run = executor()
        .run(&WorkItem::new("sleep").arg(10), Duration::from_secs(1))
        .unwrap();

    assert_eq!(run.outcome, BoundedOutcome::TimedOut);
    assert_eq!(run.value(), None);
    assert!(!is_alive(run.worker_pid), "worker {} still exists", run.worker_pid);
    assert!(start.elapsed() < Duration::from_secs(5));

    let kill = run.kill_report.expect("timed out run carries a kill report");
    assert!(kill.kill_sent);
    assert!(kill.group_kill);
}

#[test]
fn test_free_function_form() {
    let value = run_with_limited_time(
        &builtin_registry(),
        "sleep",
        vec![json!(10)],
        Map::new(),
        Duration::from_millis(300),
    )
    .unwrap();
    assert_eq!(value, None);
}

#[test]
fn test_invalid_deadline_and_unknown_work_fail_fast() {
    let executor = executor();
    assert!(matches!(
        executor.run(&WorkItem::new("add"), Duration::ZERO),
        Err(KitError::InvalidArgument(_))
    ));
    assert!(matches!(
        executor.run(&WorkItem::new(""), Duration::from_secs(1)),
        Err(KitError::Setup(_))
    ));
    assert!(matches!(
        executor.run(&WorkItem::new("nope"), Duration::from_secs(1)),
        Err(KitError::Setup(_))
    ));
}

#[test]
fn test_bad_arguments_surface_as_fault() {
    let run = executor()
        .run(&WorkItem::new("add").arg(1), Duration::from_secs(5))
        .unwrap();
    assert_eq!(
        run.outcome,
        BoundedOutcome::WorkerFault {
            reason: FaultReason::WorkFailed("missing required argument 'y'".to_string())
        }
    );
    assert!(!is_alive(run.worker_pid));
}

#[test]
fn test_concurrent_runs_do_not_wait_on_each_other() {
    let executor = executor();
    let start = Instant::now();

    let slow = {
        let executor = executor.clone();
        std::thread::spawn(move || {
            executor
                .run(&WorkItem::new("sleep").arg(3), Duration::from_secs(10))
                .unwrap()
        })
    };

    let mut fast = Vec::new();
    for i in 0..4 {
        let executor = executor.clone();
        fast.push(std::thread::spawn(move || {
            executor
                .run_value(&WorkItem::new("add").arg(i).arg(i), Duration::from_secs(5))
                .unwrap()
        }));
    }

    for (i, handle) in fast.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), Some(json!(2 * i as i64)));
    }
    assert!(
        start.elapsed() < Duration::from_millis(2_500),
        "fast runs were held up by the slow one: {:?}",
        start.elapsed()
    );

    let slow = slow.join().unwrap();
    assert_eq!(slow.value().and_then(Value::as_f64), Some(3.0));
}

fn spawn_background_sleeper(_: &WorkArgs<'_>) -> Result<Value, WorkError> {
    let child = std::process::Command::new("sleep")
        .arg("30")
        .spawn()
        .map_err(|e| WorkError::Failed(e.to_string()))?;
    Ok(json!(child.id()))
}

fn spawn_and_hang(args: &WorkArgs<'_>) -> Result<Value, WorkError> {
    let path: String = args.get(0, "path")?;
    let child = std::process::Command::new("sleep")
        .arg("30")
        .spawn()
        .map_err(|e| WorkError::Failed(e.to_string()))?;
    std::fs::write(&path, child.id().to_string()).map_err(|e| WorkError::Failed(e.to_string()))?;
    std::thread::sleep(Duration::from_secs(30));
    Ok(json!(null))
}

fn process_registry() -> WorkRegistry {
    let mut registry = WorkRegistry::new();
    registry
        .register("background", spawn_background_sleeper)
        .register("hang", spawn_and_hang);
    registry
}

#[test]
fn test_lingering_grandchild_does_not_delay_result() {
    let executor = BoundedExecutor::with_defaults(process_registry()).unwrap();
    let start = Instant::now();
    let run = executor
        .run(&WorkItem::new("background"), Duration::from_secs(10))
        .unwrap();
    let elapsed = start.elapsed();

    let grandchild = run
        .value()
        .and_then(Value::as_i64)
        .expect("worker reports the pid it spawned") as i32;
    unsafe {
        libc::kill(grandchild, libc::SIGKILL);
    }

    assert!(elapsed < Duration::from_secs(5), "took {:?}", elapsed);
}

#[test]
fn test_timeout_kills_whole_process_group() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("grandchild.pid");

    let executor = BoundedExecutor::with_defaults(process_registry()).unwrap();
    let run = executor
        .run(
            &WorkItem::new("hang").arg(path.to_string_lossy().to_string()),
            Duration::from_secs(1),
        )
        .unwrap();
    assert!(run.outcome.is_timed_out());

    let grandchild: i32 = std::fs::read_to_string(&path)
        .expect("worker wrote its child's pid before the deadline")
        .trim()
        .parse()
        .unwrap();
    assert!(
        wait_until_gone(grandchild, Duration::from_secs(2)),
        "grandchild {} survived the group kill",
        grandchild
    );
}

#[test]
fn test_config_file_drives_executor() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    std::io::Write::write_all(
        &mut file,
        br#"{"poll_interval_ms": 2, "max_report_bytes": 2048}"#,
    )
    .unwrap();

    let config = ExecutorConfig::load(file.path()).unwrap();
    let executor = BoundedExecutor::new(builtin_registry(), config).unwrap();

    let ok = executor
        .run_value(&WorkItem::new("echo").arg("small"), Duration::from_secs(5))
        .unwrap();
    assert_eq!(ok, Some(json!({"args": ["small"], "kwargs": {}})));

    let big = executor
        .run(&WorkItem::new("echo").arg("x".repeat(4096)), Duration::from_secs(5))
        .unwrap();
    assert!(matches!(
        big.outcome,
        BoundedOutcome::WorkerFault {
            reason: FaultReason::OversizedReport(_)
        }
    ));
}
