//! Console input
//!
//! Line-oriented prompts coerced to typed values.

pub mod helpers;
pub mod prompt;

pub use helpers::{constrained, is_float};
pub use prompt::{FromInput, TypeTag, TypedPrompt, TypedValue};
