use crate::config::types::{ExecutorConfig, KitError, Result};
use crate::config::validator::{validate_config, validate_deadline};
use crate::exec::supervisor::{launch_bounded, BoundedRun};
use crate::exec::work::{WorkItem, WorkRegistry};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::time::Duration;

/// Runs registered work in a separate process under a wall-clock deadline
#[derive(Debug, Clone)]
pub struct BoundedExecutor {
    registry: WorkRegistry,
    config: ExecutorConfig,
}

impl BoundedExecutor {
    /// Create an executor. Invalid config is rejected here, warnings are logged.
    pub fn new(registry: WorkRegistry, config: ExecutorConfig) -> Result<Self> {
        let validation = validate_config(&config)?;
        for warning in validation.warnings {
            log::warn!("Configuration warning: {}", warning);
        }
        Ok(Self { registry, config })
    }

    pub fn with_defaults(registry: WorkRegistry) -> Result<Self> {
        Self::new(registry, ExecutorConfig::default())
    }

    pub fn registry(&self) -> &WorkRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run `item` and wait at most `deadline` for it.
    ///
    /// Argument and registry errors are returned before anything is spawned.
    /// Timeouts and worker faults are outcomes, not errors.
    pub fn run(&self, item: &WorkItem, deadline: Duration) -> Result<BoundedRun> {
        validate_deadline(deadline)?;
        let work = self.registry.resolve(item)?;

        log::debug!("Running '{}' with a {:?} deadline", item.name, deadline);
        let run = launch_bounded(work, item, deadline, &self.config)?;
        log::debug!(
            "'{}' finished as {} after {}ms",
            item.name,
            run.outcome.label(),
            run.wall_time_ms
        );
        Ok(run)
    }

    /// The value, or `None` for both a timeout and a worker fault
    pub fn run_value(&self, item: &WorkItem, deadline: Duration) -> Result<Option<Value>> {
        Ok(self.run(item, deadline)?.outcome.into_value())
    }

    /// Like [`run_value`](Self::run_value), decoding the value into `T`
    pub fn run_as<T: DeserializeOwned>(
        &self,
        item: &WorkItem,
        deadline: Duration,
    ) -> Result<Option<T>> {
        match self.run_value(item, deadline)? {
            Some(value) => serde_json::from_value(value).map(Some).map_err(|e| {
                KitError::TypeMismatch(format!("value of '{}' did not decode: {}", item.name, e))
            }),
            None => Ok(None),
        }
    }
}

/// One-shot form: run `name` from `registry` with default config
pub fn run_with_limited_time(
    registry: &WorkRegistry,
    name: &str,
    args: Vec<Value>,
    kwargs: Map<String, Value>,
    deadline: Duration,
) -> Result<Option<Value>> {
    let item = WorkItem::with_args(name, args, kwargs);
    validate_deadline(deadline)?;
    let work = registry.resolve(&item)?;
    let run = launch_bounded(work, &item, deadline, &ExecutorConfig::default())?;
    Ok(run.outcome.into_value())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::builtin::builtin_registry;
    use serde_json::json;

    fn executor() -> BoundedExecutor {
        BoundedExecutor::with_defaults(builtin_registry()).unwrap()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = ExecutorConfig {
            poll_interval_ms: 0,
            ..ExecutorConfig::default()
        };
        let err = BoundedExecutor::new(builtin_registry(), config).unwrap_err();
        assert!(matches!(err, KitError::Config(_)));
    }

    #[test]
    fn unknown_work_is_a_setup_error() {
        let err = executor()
            .run(&WorkItem::new("missing"), Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, KitError::Setup(_)));
    }

    #[test]
    fn zero_deadline_is_checked_before_lookup() {
        let err = executor()
            .run(&WorkItem::new("missing"), Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, KitError::InvalidArgument(_)));
    }

    #[test]
    fn run_as_decodes_value() {
        let sum: Option<i64> = executor()
            .run_as(&WorkItem::new("add").arg(20).arg(22), Duration::from_secs(5))
            .unwrap();
        assert_eq!(sum, Some(42));
    }

    #[test]
    fn run_as_rejects_wrong_type() {
        let err = executor()
            .run_as::<String>(&WorkItem::new("add").arg(1).arg(1), Duration::from_secs(5))
            .unwrap_err();
        assert!(matches!(err, KitError::TypeMismatch(_)));
    }

    #[test]
    fn free_function_matches_executor() {
        let mut kwargs = Map::new();
        kwargs.insert("z".to_string(), json!(3));
        let value = run_with_limited_time(
            &builtin_registry(),
            "add",
            vec![json!(1), json!(2)],
            kwargs,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(value, Some(json!(6)));
    }

    #[test]
    fn fault_and_timeout_both_read_as_absent() {
        let executor = executor();
        let failed = executor
            .run_value(&WorkItem::new("fail").arg("bad"), Duration::from_secs(5))
            .unwrap();
        let slow = executor
            .run_value(&WorkItem::new("sleep").arg(5), Duration::from_millis(100))
            .unwrap();
        assert_eq!(failed, None);
        assert_eq!(slow, None);
    }
}
