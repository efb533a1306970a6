//! Typed console input.
//!
//! [`TypedPrompt`] writes a prompt, reads one line and coerces it to a
//! requested type. A line that does not parse is `Ok(None)`; running out of
//! input is an error.

use crate::config::types::{KitError, Result};
use crate::input::helpers::parse_float;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, BufRead, Write};

/// Types a line can be coerced to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeTag {
    Bool,
    Int,
    UInt,
    Float,
    Text,
    Char,
}

impl TypeTag {
    pub fn name(&self) -> &'static str {
        match self {
            TypeTag::Bool => "bool",
            TypeTag::Int => "int",
            TypeTag::UInt => "uint",
            TypeTag::Float => "float",
            TypeTag::Text => "text",
            TypeTag::Char => "char",
        }
    }
}

impl std::str::FromStr for TypeTag {
    type Err = KitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bool" => Ok(TypeTag::Bool),
            "int" => Ok(TypeTag::Int),
            "uint" => Ok(TypeTag::UInt),
            "float" => Ok(TypeTag::Float),
            "text" | "str" => Ok(TypeTag::Text),
            "char" => Ok(TypeTag::Char),
            other => Err(KitError::InvalidArgument(format!("unknown input type '{}'", other))),
        }
    }
}

/// A coerced line
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypedValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Char(char),
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Bool(v) => write!(f, "{}", v),
            TypedValue::Int(v) => write!(f, "{}", v),
            TypedValue::UInt(v) => write!(f, "{}", v),
            TypedValue::Float(v) => write!(f, "{}", v),
            TypedValue::Text(v) => write!(f, "{}", v),
            TypedValue::Char(v) => write!(f, "{}", v),
        }
    }
}

/// Types that can be read from one line of console input
pub trait FromInput: Sized {
    const NAME: &'static str;

    fn from_input(line: &str) -> Option<Self>;
}

/// `true`, `yes`, `y` in any case, or any number other than zero
fn truthy(line: &str) -> bool {
    matches!(line.to_lowercase().as_str(), "true" | "yes" | "y")
        || parse_float(line).is_some_and(|f| f != 0.0)
}

impl FromInput for bool {
    const NAME: &'static str = "bool";

    fn from_input(line: &str) -> Option<Self> {
        Some(truthy(line))
    }
}

macro_rules! numeric_from_input {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl FromInput for $ty {
                const NAME: &'static str = $name;

                fn from_input(line: &str) -> Option<Self> {
                    line.trim().parse().ok()
                }
            }
        )*
    };
}

numeric_from_input!(
    i32 => "i32",
    i64 => "int",
    u32 => "u32",
    u64 => "uint",
    usize => "usize",
    f32 => "f32",
    f64 => "float",
);

impl FromInput for String {
    const NAME: &'static str = "text";

    fn from_input(line: &str) -> Option<Self> {
        Some(line.to_string())
    }
}

impl FromInput for char {
    const NAME: &'static str = "char";

    fn from_input(line: &str) -> Option<Self> {
        let mut chars = line.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(c),
            _ => None,
        }
    }
}

fn strip_line_ending(line: &mut String) {
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
}

/// Prompt-and-parse over any line source and sink
#[derive(Debug)]
pub struct TypedPrompt<R: BufRead, W: Write> {
    input: R,
    output: W,
}

impl TypedPrompt<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> TypedPrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_parts(self) -> (R, W) {
        (self.input, self.output)
    }

    /// Write `prompt` and read one line without its terminator
    pub fn read_line(&mut self, prompt: &str) -> Result<String> {
        self.output.write_all(prompt.as_bytes())?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(KitError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "input closed before a line was read",
            )));
        }
        strip_line_ending(&mut line);
        Ok(line)
    }

    pub fn read_as<T: FromInput>(&mut self, prompt: &str) -> Result<Option<T>> {
        let line = self.read_line(prompt)?;
        let parsed = T::from_input(&line);
        if parsed.is_some() {
            log::debug!("{:?} is a valid {}", line, T::NAME);
        } else {
            log::debug!("{:?} is not a valid {}", line, T::NAME);
        }
        Ok(parsed)
    }

    pub fn read(&mut self, prompt: &str, tag: TypeTag) -> Result<Option<TypedValue>> {
        Ok(match tag {
            TypeTag::Bool => self.read_as::<bool>(prompt)?.map(TypedValue::Bool),
            TypeTag::Int => self.read_as::<i64>(prompt)?.map(TypedValue::Int),
            TypeTag::UInt => self.read_as::<u64>(prompt)?.map(TypedValue::UInt),
            TypeTag::Float => self.read_as::<f64>(prompt)?.map(TypedValue::Float),
            TypeTag::Text => self.read_as::<String>(prompt)?.map(TypedValue::Text),
            TypeTag::Char => self.read_as::<char>(prompt)?.map(TypedValue::Char),
        })
    }

    /// Prompt again until a line parses. Ends with an error if input runs out.
    pub fn read_until<T: FromInput>(&mut self, prompt: &str) -> Result<T> {
        loop {
            if let Some(value) = self.read_as::<T>(prompt)? {
                return Ok(value);
            }
        }
    }
}
