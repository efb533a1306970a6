//! Stock work functions used by the CLI, tests and benchmarks.

use crate::exec::work::{WorkArgs, WorkError, WorkRegistry};
use serde_json::{json, Value};
use std::time::Duration;

type WorkResult = Result<Value, WorkError>;

/// `add(x, y, z=0)` over integers, or floats if any argument is one
fn add(args: &WorkArgs<'_>) -> WorkResult {
    args.check_signature(&["x", "y", "z"])?;
    let x: Value = args.get(0, "x")?;
    let y: Value = args.get(1, "y")?;
    let z: Value = args.get_or(2, "z", json!(0))?;

    let operands = [("x", &x), ("y", &y), ("z", &z)];
    if operands.iter().all(|(_, v)| v.is_i64()) {
        let sum = operands
            .iter()
            .filter_map(|(_, v)| v.as_i64())
            .try_fold(0i64, |acc, v| acc.checked_add(v))
            .ok_or_else(|| WorkError::Failed("integer overflow".to_string()))?;
        return Ok(json!(sum));
    }

    let mut sum = 0.0;
    for (name, value) in operands {
        sum += value.as_f64().ok_or_else(|| WorkError::InvalidArgument {
            name: name.to_string(),
            reason: format!("expected a number, got {}", value),
        })?;
    }
    Ok(json!(sum))
}

/// `sleep(seconds)`, returns the seconds slept
fn sleep(args: &WorkArgs<'_>) -> WorkResult {
    args.check_signature(&["seconds"])?;
    let seconds: f64 = args.get(0, "seconds")?;
    let duration = Duration::try_from_secs_f64(seconds).map_err(|e| WorkError::InvalidArgument {
        name: "seconds".to_string(),
        reason: e.to_string(),
    })?;
    std::thread::sleep(duration);
    Ok(json!(seconds))
}

fn constant(args: &WorkArgs<'_>) -> WorkResult {
    args.check_signature(&[])?;
    Ok(json!("no args"))
}

fn fail(args: &WorkArgs<'_>) -> WorkResult {
    args.check_signature(&["message"])?;
    let message: String = args.get_or(0, "message", "failed on request".to_string())?;
    Err(WorkError::Failed(message))
}

/// Returns its arguments unchanged
fn echo(args: &WorkArgs<'_>) -> WorkResult {
    Ok(json!({
        "args": args.positional(),
        "kwargs": args.named(),
    }))
}

pub fn builtin_registry() -> WorkRegistry {
    let mut registry = WorkRegistry::new();
    registry
        .register("add", add)
        .register("sleep", sleep)
        .register("constant", constant)
        .register("fail", fail)
        .register("echo", echo);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::work::WorkItem;

    fn call(item: WorkItem) -> WorkResult {
        let registry = builtin_registry();
        let work = registry.resolve(&item).unwrap();
        work(&item.work_args())
    }

    #[test]
    fn add_with_default_and_named() {
        assert_eq!(call(WorkItem::new("add").arg(1).arg(2)), Ok(json!(3)));
        assert_eq!(call(WorkItem::new("add").arg(1).arg(2).kwarg("z", 3)), Ok(json!(6)));
        assert_eq!(call(WorkItem::new("add").kwarg("y", 2).kwarg("x", 1)), Ok(json!(3)));
    }

    #[test]
    fn add_promotes_to_float() {
        assert_eq!(call(WorkItem::new("add").arg(1).arg(0.5)), Ok(json!(1.5)));
    }

    #[test]
    fn add_rejects_bad_calls() {
        assert_eq!(
            call(WorkItem::new("add").arg(1)),
            Err(WorkError::MissingArgument("y".to_string()))
        );
        assert!(matches!(
            call(WorkItem::new("add").arg(1).arg("two")),
            Err(WorkError::InvalidArgument { .. })
        ));
        assert_eq!(
            call(WorkItem::new("add").arg(1).arg(2).kwarg("x", 1)),
            Err(WorkError::DuplicateArgument("x".to_string()))
        );
    }

    #[test]
    fn constant_takes_no_arguments() {
        assert_eq!(call(WorkItem::new("constant")), Ok(json!("no args")));
        assert!(matches!(
            call(WorkItem::new("constant").arg(1)),
            Err(WorkError::TooManyArguments { expected: 0, given: 1 })
        ));
    }

    #[test]
    fn sleep_rejects_negative() {
        assert!(matches!(
            call(WorkItem::new("sleep").arg(-1.0)),
            Err(WorkError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn echo_returns_arguments() {
        assert_eq!(
            call(WorkItem::new("echo").arg("a").kwarg("k", true)),
            Ok(json!({"args": ["a"], "kwargs": {"k": true}}))
        );
    }

    #[test]
    fn registry_lists_all() {
        let names: Vec<_> = builtin_registry().names().map(str::to_string).collect();
        assert_eq!(names, ["add", "constant", "echo", "fail", "sleep"]);
    }
}
