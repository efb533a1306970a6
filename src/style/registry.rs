//! ANSI style tokens and the registry that validates and strips them.
//!
//! A style token is either one of the closed set rendered by [`StyleToken`]
//! or a 24-bit color sequence `ESC[38;2;R;G;Bm` / `ESC[48;2;R;G;Bm` with one
//! to three ASCII digits per component.

use crate::config::types::{KitError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

pub const ESC: char = '\x1b';
pub const RESET: &str = "\x1b[0m";

const RGB_COMPONENTS: &str = "([0-9]{1,3});([0-9]{1,3});([0-9]{1,3})";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Color {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    Default,
    BrightBlack,
    BrightRed,
    BrightGreen,
    BrightYellow,
    BrightBlue,
    BrightMagenta,
    BrightCyan,
    BrightWhite,
}

impl Color {
    pub const ALL: [Color; 17] = [
        Color::Black,
        Color::Red,
        Color::Green,
        Color::Yellow,
        Color::Blue,
        Color::Magenta,
        Color::Cyan,
        Color::White,
        Color::Default,
        Color::BrightBlack,
        Color::BrightRed,
        Color::BrightGreen,
        Color::BrightYellow,
        Color::BrightBlue,
        Color::BrightMagenta,
        Color::BrightCyan,
        Color::BrightWhite,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Color::Black => "black",
            Color::Red => "red",
            Color::Green => "green",
            Color::Yellow => "yellow",
            Color::Blue => "blue",
            Color::Magenta => "magenta",
            Color::Cyan => "cyan",
            Color::White => "white",
            Color::Default => "default",
            Color::BrightBlack => "bright_black",
            Color::BrightRed => "bright_red",
            Color::BrightGreen => "bright_green",
            Color::BrightYellow => "bright_yellow",
            Color::BrightBlue => "bright_blue",
            Color::BrightMagenta => "bright_magenta",
            Color::BrightCyan => "bright_cyan",
            Color::BrightWhite => "bright_white",
        }
    }

    /// SGR code as a foreground color (30-37, 39, 90-97)
    pub fn foreground_code(&self) -> u8 {
        match self {
            Color::Black => 30,
            Color::Red => 31,
            Color::Green => 32,
            Color::Yellow => 33,
            Color::Blue => 34,
            Color::Magenta => 35,
            Color::Cyan => 36,
            Color::White => 37,
            Color::Default => 39,
            Color::BrightBlack => 90,
            Color::BrightRed => 91,
            Color::BrightGreen => 92,
            Color::BrightYellow => 93,
            Color::BrightBlue => 94,
            Color::BrightMagenta => 95,
            Color::BrightCyan => 96,
            Color::BrightWhite => 97,
        }
    }

    /// Background codes sit 10 above the foreground ones
    pub fn background_code(&self) -> u8 {
        self.foreground_code() + 10
    }
}

/// Text attributes. Each has a matching unset code 20 above it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Attribute {
    Bold,
    Faint,
    Italic,
    Underline,
    Blinking,
    Inverse,
    Hidden,
    Strikethrough,
}

impl Attribute {
    pub const ALL: [Attribute; 8] = [
        Attribute::Bold,
        Attribute::Faint,
        Attribute::Italic,
        Attribute::Underline,
        Attribute::Blinking,
        Attribute::Inverse,
        Attribute::Hidden,
        Attribute::Strikethrough,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Attribute::Bold => "bold",
            Attribute::Faint => "faint",
            Attribute::Italic => "italic",
            Attribute::Underline => "underline",
            Attribute::Blinking => "blinking",
            Attribute::Inverse => "inverse",
            Attribute::Hidden => "hidden",
            Attribute::Strikethrough => "strikethrough",
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Attribute::Bold => 1,
            Attribute::Faint => 2,
            Attribute::Italic => 3,
            Attribute::Underline => 4,
            Attribute::Blinking => 5,
            Attribute::Inverse => 7,
            Attribute::Hidden => 8,
            Attribute::Strikethrough => 9,
        }
    }

    pub fn unset_code(&self) -> u8 {
        self.code() + 20
    }
}

/// One renderable style
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StyleToken {
    Reset,
    Set(Attribute),
    Unset(Attribute),
    Foreground(Color),
    Background(Color),
    /// Components hold the parsed value, so up to 999 is representable.
    /// Leading zeros are not kept: `07` renders back as `7`. Applying a raw
    /// sequence emits it as written.
    Rgb { r: u16, g: u16, b: u16 },
    RgbBackground { r: u16, g: u16, b: u16 },
}

impl StyleToken {
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        StyleToken::Rgb {
            r: r.into(),
            g: g.into(),
            b: b.into(),
        }
    }

    pub fn rgb_background(r: u8, g: u8, b: u8) -> Self {
        StyleToken::RgbBackground {
            r: r.into(),
            g: g.into(),
            b: b.into(),
        }
    }

    /// Every token in the closed table, RGB excluded
    pub fn table() -> impl Iterator<Item = StyleToken> {
        std::iter::once(StyleToken::Reset)
            .chain(Attribute::ALL.into_iter().map(StyleToken::Set))
            .chain(Attribute::ALL.into_iter().map(StyleToken::Unset))
            .chain(Color::ALL.into_iter().map(StyleToken::Foreground))
            .chain(Color::ALL.into_iter().map(StyleToken::Background))
    }

    /// Look a token up by a human name such as `bold`, `bold_unset`,
    /// `bright_red` or `bg_blue`. Case and `-`/`_` are not significant.
    pub fn from_name(name: &str) -> Option<StyleToken> {
        let name = name.trim().to_ascii_lowercase().replace('-', "_");
        if name == "reset" {
            return Some(StyleToken::Reset);
        }
        if let Some(attr) = name.strip_suffix("_unset") {
            return Attribute::ALL
                .into_iter()
                .find(|a| a.name() == attr)
                .map(StyleToken::Unset);
        }
        if let Some(color) = name.strip_prefix("bg_").or_else(|| name.strip_prefix("on_")) {
            return Color::ALL
                .into_iter()
                .find(|c| c.name() == color)
                .map(StyleToken::Background);
        }
        Attribute::ALL
            .into_iter()
            .find(|a| a.name() == name)
            .map(StyleToken::Set)
            .or_else(|| {
                Color::ALL
                    .into_iter()
                    .find(|c| c.name() == name)
                    .map(StyleToken::Foreground)
            })
    }

    /// Parse a raw escape sequence. The empty string is valid and yields `None`.
    pub fn parse(raw: &str) -> Result<Option<StyleToken>> {
        StyleRegistry::global().parse(raw)
    }
}

impl fmt::Display for StyleToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StyleToken::Reset => write!(f, "{}[0m", ESC),
            StyleToken::Set(attr) => write!(f, "{}[{}m", ESC, attr.code()),
            StyleToken::Unset(attr) => write!(f, "{}[{}m", ESC, attr.unset_code()),
            StyleToken::Foreground(color) => write!(f, "{}[{}m", ESC, color.foreground_code()),
            StyleToken::Background(color) => write!(f, "{}[{}m", ESC, color.background_code()),
            StyleToken::Rgb { r, g, b } => write!(f, "{}[38;2;{};{};{}m", ESC, r, g, b),
            StyleToken::RgbBackground { r, g, b } => {
                write!(f, "{}[48;2;{};{};{}m", ESC, r, g, b)
            }
        }
    }
}

/// Validates, applies and strips style tokens
#[derive(Debug)]
pub struct StyleRegistry {
    literals: HashMap<String, StyleToken>,
    rgb: Regex,
    rgb_background: Regex,
    any_token: Regex,
}

static REGISTRY: Lazy<StyleRegistry> = Lazy::new(StyleRegistry::new);

impl StyleRegistry {
    fn new() -> Self {
        let literals: HashMap<String, StyleToken> =
            StyleToken::table().map(|token| (token.to_string(), token)).collect();

        let mut codes: Vec<String> = literals
            .keys()
            .map(|raw| raw.trim_start_matches("\x1b[").trim_end_matches('m').to_string())
            .collect();
        codes.sort();
        let any_token = format!(
            r"\x1b\[(?:{}|[34]8;2;[0-9]{{1,3}};[0-9]{{1,3}};[0-9]{{1,3}})m",
            codes.join("|")
        );

        Self {
            literals,
            rgb: Regex::new(&format!(r"\A\x1b\[38;2;{}m\z", RGB_COMPONENTS))
                .expect("valid RGB foreground regex"),
            rgb_background: Regex::new(&format!(r"\A\x1b\[48;2;{}m\z", RGB_COMPONENTS))
                .expect("valid RGB background regex"),
            any_token: Regex::new(&any_token).expect("valid style token regex"),
        }
    }

    pub fn global() -> &'static StyleRegistry {
        &REGISTRY
    }

    pub fn is_valid(&self, raw: &str) -> bool {
        self.parse(raw).is_ok()
    }

    pub fn parse(&self, raw: &str) -> Result<Option<StyleToken>> {
        if raw.is_empty() {
            return Ok(None);
        }
        if let Some(token) = self.literals.get(raw) {
            return Ok(Some(*token));
        }
        if let Some((r, g, b)) = rgb_components(&self.rgb, raw) {
            return Ok(Some(StyleToken::Rgb { r, g, b }));
        }
        if let Some((r, g, b)) = rgb_components(&self.rgb_background, raw) {
            return Ok(Some(StyleToken::RgbBackground { r, g, b }));
        }
        Err(KitError::InvalidArgument(format!(
            "Style {} is not a valid style.\nUse the lynnkit::style tables for valid styles.",
            raw.replace(ESC, "\\033")
        )))
    }

    /// Wrap `text` in `styles` followed by a single reset.
    ///
    /// Every token is checked before any output is built. With no non-empty
    /// token the text comes back unchanged.
    pub fn apply(&self, text: &str, styles: &[&str]) -> Result<String> {
        for style in styles {
            self.parse(style)?;
        }
        if styles.iter().all(|s| s.is_empty()) {
            return Ok(text.to_string());
        }

        let mut out = String::with_capacity(text.len() + RESET.len() + styles.len() * 8);
        for style in styles.iter().filter(|s| !s.is_empty()) {
            out.push_str(style);
        }
        out.push_str(text);
        out.push_str(RESET);
        Ok(out)
    }

    /// [`apply`](Self::apply) for dynamically typed tokens. Null or
    /// non-string tokens are a type mismatch.
    pub fn apply_values(&self, text: &str, styles: &[Value]) -> Result<String> {
        let mut raw = Vec::with_capacity(styles.len());
        for style in styles {
            match style {
                Value::String(s) => raw.push(s.as_str()),
                Value::Null => {
                    return Err(KitError::TypeMismatch("Style must not be null.".to_string()))
                }
                other => {
                    return Err(KitError::TypeMismatch(format!(
                        "Style must be a string, got {}.",
                        other
                    )))
                }
            }
        }
        self.apply(text, &raw)
    }

    pub fn apply_tokens(&self, text: &str, styles: &[StyleToken]) -> String {
        if styles.is_empty() {
            return text.to_string();
        }
        let mut out: String = styles.iter().map(StyleToken::to_string).collect();
        out.push_str(text);
        out.push_str(RESET);
        out
    }

    /// Remove every known token. Repeats until nothing matches, so tokens
    /// that only form once an inner one is removed are also stripped.
    pub fn strip(&self, text: &str) -> String {
        let mut out = text.to_string();
        while self.any_token.is_match(&out) {
            out = self.any_token.replace_all(&out, "").into_owned();
        }
        out
    }
}

fn rgb_components(pattern: &Regex, raw: &str) -> Option<(u16, u16, u16)> {
    let caps = pattern.captures(raw)?;
    let component = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u16>().ok());
    Some((component(1)?, component(2)?, component(3)?))
}

/// Apply raw style tokens to `text`
pub fn styled(text: &str, styles: &[&str]) -> Result<String> {
    StyleRegistry::global().apply(text, styles)
}

pub fn styled_values(text: &str, styles: &[Value]) -> Result<String> {
    StyleRegistry::global().apply_values(text, styles)
}

pub fn styled_tokens(text: &str, styles: &[StyleToken]) -> String {
    StyleRegistry::global().apply_tokens(text, styles)
}

/// Strip every known style token from `text`
pub fn unstyled(text: &str) -> String {
    StyleRegistry::global().strip(text)
}
