//! Terminal styling
//!
//! ANSI style tokens, their validation and stripping, and cursor control.

pub mod cursor;
pub mod registry;

pub use cursor::Cursor;
pub use registry::{styled, styled_tokens, styled_values, unstyled, Attribute, Color, StyleRegistry, StyleToken, RESET};
