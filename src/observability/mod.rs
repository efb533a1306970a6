//! Observability
//!
//! Structured run lifecycle events.

pub mod events;
