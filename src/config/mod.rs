//! Configuration and validation
//!
//! Error taxonomy, executor configuration, and fail-fast argument checks.

pub mod types;
pub mod validator;
