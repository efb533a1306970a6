// Config and argument validation
// Everything here runs before any worker or pipe is allocated and fails fast.

use crate::config::types::{ExecutorConfig, KitError, Result};
use std::time::Duration;

/// Validation result with detailed errors
#[derive(Debug)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: String) {
        self.valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate executor config. Errors are fatal, warnings are returned to the caller.
pub fn validate_config(config: &ExecutorConfig) -> Result<ValidationResult> {
    let mut result = ValidationResult::new();

    if config.poll_interval_ms == 0 {
        result.add_error("poll_interval_ms cannot be zero".to_string());
    } else if config.poll_interval_ms > 1000 {
        result.add_warning(format!(
            "poll_interval_ms {} is above 1s; deadlines will overshoot by up to that much",
            config.poll_interval_ms
        ));
    }

    if config.max_report_bytes < 1024 {
        result.add_error(format!(
            "max_report_bytes {} is below the 1KB minimum",
            config.max_report_bytes
        ));
    }

    if !config.kill_process_group {
        result.add_warning(
            "kill_process_group disabled; processes spawned by work may outlive a timeout"
                .to_string(),
        );
    }

    if config.default_deadline_ms == Some(0) {
        result.add_error("default_deadline_ms cannot be zero".to_string());
    }

    if !result.is_valid() {
        return Err(KitError::Config(format!(
            "Config validation failed:\n{}",
            result.errors.join("\n")
        )));
    }

    Ok(result)
}

/// A deadline must be strictly positive
pub fn validate_deadline(deadline: Duration) -> Result<()> {
    if deadline.is_zero() {
        return Err(KitError::InvalidArgument(
            "deadline must be positive, got 0".to_string(),
        ));
    }
    Ok(())
}

/// Convert a deadline given in (possibly fractional) seconds
pub fn deadline_from_secs_f64(secs: f64) -> Result<Duration> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(KitError::InvalidArgument(format!(
            "deadline must be a positive number of seconds, got {}",
            secs
        )));
    }
    let deadline = Duration::try_from_secs_f64(secs)
        .map_err(|e| KitError::InvalidArgument(format!("deadline {} out of range: {}", secs, e)))?;
    validate_deadline(deadline)?;
    Ok(deadline)
}
