//! Core types shared across lynnkit: the error taxonomy and executor configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Executor configuration
///
/// Every field has a default so a partial JSON file is accepted.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutorConfig {
    /// How often the caller polls the worker for exit (milliseconds)
    pub poll_interval_ms: u64,
    /// Upper bound on the encoded worker report (bytes)
    pub max_report_bytes: usize,
    /// Kill the worker's whole process group instead of the worker alone
    pub kill_process_group: bool,
    /// Deadline used by the CLI when none is given on the command line
    pub default_deadline_ms: Option<u64>,
}

impl ExecutorConfig {
    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            KitError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| KitError::Config(format!("failed to parse {}: {}", path.display(), e)))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn default_deadline(&self) -> Option<Duration> {
        self.default_deadline_ms.map(Duration::from_millis)
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
            max_report_bytes: 16 * 1024 * 1024, // 16MB
            kill_process_group: true,
            default_deadline_ms: None,
        }
    }
}

/// Custom error types for lynnkit
#[derive(Error, Debug)]
pub enum KitError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A value was well-typed but not acceptable (bad style token, bad deadline)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A value had the wrong type altogether (null or non-string style token)
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// A work item cannot be transferred to a worker
    #[error("Setup error: {0}")]
    Setup(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl KitError {
    /// Short stable label for logs
    pub fn as_label(&self) -> &'static str {
        match self {
            KitError::Io(_) => "io",
            KitError::InvalidArgument(_) => "invalid_argument",
            KitError::TypeMismatch(_) => "type_mismatch",
            KitError::Setup(_) => "setup",
            KitError::Config(_) => "config",
            KitError::Process(_) => "process",
            KitError::Serialization(_) => "serialization",
        }
    }
}

pub type Result<T> = std::result::Result<T, KitError>;
