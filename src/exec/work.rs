//! Work items and the registry that resolves them.
//!
//! A [`WorkItem`] is a registered name plus JSON arguments. Only the item is
//! handed to a worker; the function it names is looked up in a
//! [`WorkRegistry`] that was populated before the worker was forked, so no
//! closure ever has to cross the process boundary.

use crate::config::types::{KitError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by work functions inside the worker
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkError {
    #[error("missing required argument '{0}'")]
    MissingArgument(String),

    #[error("got multiple values for argument '{0}'")]
    DuplicateArgument(String),

    #[error("unexpected argument '{0}'")]
    UnexpectedArgument(String),

    #[error("takes {expected} positional arguments but {given} were given")]
    TooManyArguments { expected: usize, given: usize },

    #[error("argument '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("{0}")]
    Failed(String),
}

/// Signature every registered unit of work has
pub type WorkFn = dyn Fn(&WorkArgs<'_>) -> std::result::Result<Value, WorkError> + Send + Sync;

/// Callable reference + positional arguments + named arguments
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkItem {
    pub name: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

impl WorkItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            kwargs: Map::new(),
        }
    }

    pub fn with_args(name: impl Into<String>, args: Vec<Value>, kwargs: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            args,
            kwargs,
        }
    }

    /// Append a positional argument
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Set a named argument
    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    pub fn work_args(&self) -> WorkArgs<'_> {
        WorkArgs {
            positional: &self.args,
            named: &self.kwargs,
        }
    }
}

/// Borrowed view of a work item's arguments, handed to the work function
#[derive(Clone, Copy, Debug)]
pub struct WorkArgs<'a> {
    positional: &'a [Value],
    named: &'a Map<String, Value>,
}

impl<'a> WorkArgs<'a> {
    pub fn positional(&self) -> &'a [Value] {
        self.positional
    }

    pub fn named(&self) -> &'a Map<String, Value> {
        self.named
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    fn lookup(&self, index: usize, name: &str) -> std::result::Result<Option<&'a Value>, WorkError> {
        match (self.positional.get(index), self.named.get(name)) {
            (Some(_), Some(_)) => Err(WorkError::DuplicateArgument(name.to_string())),
            (Some(value), None) | (None, Some(value)) => Ok(Some(value)),
            (None, None) => Ok(None),
        }
    }

    fn decode<T: DeserializeOwned>(name: &str, value: &Value) -> std::result::Result<T, WorkError> {
        serde_json::from_value(value.clone()).map_err(|e| WorkError::InvalidArgument {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }

    /// Parameter `name` at position `index`, given either positionally or by name
    pub fn get<T: DeserializeOwned>(&self, index: usize, name: &str) -> std::result::Result<T, WorkError> {
        match self.lookup(index, name)? {
            Some(value) => Self::decode(name, value),
            None => Err(WorkError::MissingArgument(name.to_string())),
        }
    }

    /// Like [`WorkArgs::get`] but falls back to `default` when the parameter is absent
    pub fn get_or<T: DeserializeOwned>(
        &self,
        index: usize,
        name: &str,
        default: T,
    ) -> std::result::Result<T, WorkError> {
        match self.lookup(index, name)? {
            Some(value) => Self::decode(name, value),
            None => Ok(default),
        }
    }

    /// Reject arguments that do not fit the parameter list `params`
    pub fn check_signature(&self, params: &[&str]) -> std::result::Result<(), WorkError> {
        if self.positional.len() > params.len() {
            return Err(WorkError::TooManyArguments {
                expected: params.len(),
                given: self.positional.len(),
            });
        }
        for key in self.named.keys() {
            match params.iter().position(|p| *p == key.as_str()) {
                None => return Err(WorkError::UnexpectedArgument(key.clone())),
                Some(index) if index < self.positional.len() => {
                    return Err(WorkError::DuplicateArgument(key.clone()))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// Name -> work function table
#[derive(Clone, Default)]
pub struct WorkRegistry {
    entries: BTreeMap<String, Arc<WorkFn>>,
}

impl WorkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `work` under `name`, replacing any previous entry
    pub fn register<F>(&mut self, name: impl Into<String>, work: F) -> &mut Self
    where
        F: Fn(&WorkArgs<'_>) -> std::result::Result<Value, WorkError> + Send + Sync + 'static,
    {
        self.entries.insert(name.into(), Arc::new(work));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Resolve a work item before anything is spawned
    pub fn resolve(&self, item: &WorkItem) -> Result<Arc<WorkFn>> {
        if item.name.trim().is_empty() {
            return Err(KitError::Setup("work item has an empty name".to_string()));
        }
        self.entries.get(&item.name).cloned().ok_or_else(|| {
            KitError::Setup(format!(
                "work '{}' is not registered; it cannot be sent to a worker",
                item.name
            ))
        })
    }
}

impl std::fmt::Debug for WorkRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkRegistry")
            .field("names", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
