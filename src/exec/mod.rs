//! Bounded execution
//!
//! Runs registered work in a forked worker under a wall-clock deadline and
//! always reclaims the worker.

pub mod builtin;
pub mod channel;
pub mod executor;
pub mod supervisor;
pub mod work;
pub mod worker;
