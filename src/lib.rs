//! lynnkit: small terminal toolkit with a deadline-bounded executor
//!
//! # Architecture
//!
//! ## Styling ([`style`])
//! - [`style::registry`]: ANSI style tokens, validation, application and stripping
//! - [`style::cursor`]: Cursor positioning, visibility and line erasure
//!
//! ## Console Input ([`input`])
//! - [`input::prompt`]: Prompt for a line and coerce it to a typed value
//! - [`input::helpers`]: Float detection and membership constraints
//!
//! ## Bounded Execution ([`exec`])
//! - [`exec::executor`]: `BoundedExecutor`, the public entrypoint
//! - [`exec::supervisor`]: Fork, poll, kill-on-deadline and reap loop
//! - [`exec::worker`]: Worker-side entrypoint and report
//! - [`exec::channel`]: One-shot result pipe
//! - [`exec::work`]: Work items and the registry that names them
//! - [`exec::builtin`]: Stock works for the CLI and tests
//!
//! ## Kernel Primitives ([`kernel`])
//! - [`kernel::process`]: fork, process groups, kill and reap
//! - [`kernel::fd`]: Pipes and inherited descriptor closure
//!
//! ## Observability ([`observability`])
//! - [`observability::events`]: Structured run lifecycle events
//!
//! ## Configuration ([`config`])
//! - [`config::types`]: Error taxonomy and executor config
//! - [`config::validator`]: Config and deadline validation
//!
//! # Guarantees
//!
//! 1. **One worker per run** - each call forks exactly one worker, in its own process group
//! 2. **Always reaped** - every exit path waits on the worker, no zombies remain
//! 3. **Never blocked by the channel** - the result pipe is drained without waiting for EOF
//! 4. **Validation first** - bad arguments fail before anything is allocated

// Styling
pub mod style;

// Console Input
pub mod input;

// Kernel Primitives
pub mod kernel;

// Bounded Execution
pub mod exec;

// Observability
pub mod observability;

// Configuration
pub mod config;

// CLI entrypoint for the lynnkit binary
pub mod cli;

// Re-export commonly used types for convenience
pub use config::types::{ExecutorConfig, KitError, Result};
pub use exec::builtin::builtin_registry;
pub use exec::executor::{run_with_limited_time, BoundedExecutor};
pub use exec::supervisor::{BoundedOutcome, BoundedRun, FaultReason};
pub use exec::work::{WorkArgs, WorkError, WorkItem, WorkRegistry};
pub use input::{constrained, is_float, FromInput, TypeTag, TypedPrompt, TypedValue};
pub use style::{styled, styled_values, unstyled, StyleRegistry, StyleToken};
