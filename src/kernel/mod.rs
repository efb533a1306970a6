//! Thin wrappers around Unix process and descriptor primitives.
//!
//! Most of the executor's `unsafe` code lives here.

pub mod fd;
pub mod process;
