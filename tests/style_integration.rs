//! Integration tests for styling
//!
//! Apply/strip behaviour across the whole token table.

use lynnkit::style::{Attribute, Color, Cursor};
use lynnkit::{styled, styled_values, unstyled, KitError, StyleRegistry, StyleToken};
use serde_json::json;

#[test]
fn test_red_sample() {
    let red = StyleToken::Foreground(Color::Red).to_string();
    assert_eq!(styled("test", &[red.as_str()]).unwrap(), "\x1b[31mtest\x1b[0m");
}

#[test]
fn test_strip_inverts_apply_for_every_table_token() {
    let text = "multi\nline text with ünïcode and [brackets]m";
    for token in StyleToken::table() {
        let raw = token.to_string();
        let applied = styled(text, &[raw.as_str()]).unwrap();
        assert_eq!(unstyled(&applied), text, "token {:?}", token);
    }
}

#[test]
fn test_strip_inverts_apply_for_stacked_and_rgb_tokens() {
    let tokens = [
        StyleToken::Set(Attribute::Bold).to_string(),
        StyleToken::Unset(Attribute::Faint).to_string(),
        StyleToken::Background(Color::BrightBlue).to_string(),
        StyleToken::rgb(10, 20, 30).to_string(),
        StyleToken::rgb_background(255, 255, 255).to_string(),
        "\x1b[38;2;007;0;999m".to_string(),
    ];
    let refs: Vec<&str> = tokens.iter().map(String::as_str).collect();
    let applied = styled("test", &refs).unwrap();
    assert!(applied.ends_with("test\x1b[0m"));
    assert_eq!(unstyled(&applied), "test");
}

#[test]
fn test_empty_tokens_are_identity() {
    assert_eq!(styled("S", &[]).unwrap(), "S");
    assert_eq!(styled("S", &[""]).unwrap(), "S");
}

#[test]
fn test_not_a_color_is_invalid_argument() {
    assert!(matches!(
        styled("S", &["not-a-color"]),
        Err(KitError::InvalidArgument(_))
    ));
}

#[test]
fn test_dynamic_null_and_number_are_type_mismatch() {
    assert!(matches!(
        styled_values("S", &[json!(null)]),
        Err(KitError::TypeMismatch(_))
    ));
    assert!(matches!(
        styled_values("S", &[json!(1)]),
        Err(KitError::TypeMismatch(_))
    ));
}

#[test]
fn test_validation_precedes_output() {
    // A valid token before an invalid one must not produce partial output.
    let result = styled("S", &["\x1b[1m", "\x1b[38;2;1;2;3;4m"]);
    assert!(result.is_err());
}

#[test]
fn test_strip_is_idempotent_on_plain_text() {
    let plain = "no escapes here \x1b[2K except cursor ones";
    assert_eq!(unstyled(plain), plain);
    assert_eq!(unstyled(&unstyled(plain)), plain);
}

#[test]
fn test_registry_validity_matches_parse() {
    let registry = StyleRegistry::global();
    assert!(registry.is_valid(""));
    assert!(registry.is_valid("\x1b[0m"));
    assert!(registry.is_valid("\x1b[48;2;1;22;133m"));
    assert!(!registry.is_valid("\x1b[6m"));
    assert!(!registry.is_valid("\x1b[48;2;1;22;1333m"));
}

#[test]
fn test_cursor_writes_to_any_sink() {
    let mut cursor = Cursor::new(Vec::new());
    cursor.hide(true).unwrap();
    cursor.put_char('#', 4, 9).unwrap();
    cursor.hide(false).unwrap();
    let out = String::from_utf8(cursor.into_inner()).unwrap();
    assert_eq!(out, "\x1b[?25l\x1b[9;4f#\x1b[?25h");
}
