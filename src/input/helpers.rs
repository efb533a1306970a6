/// Parse `text` as a float the way console input is read: surrounding
/// whitespace ignored, `inf` and `nan` accepted.
pub fn parse_float(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok()
}

pub fn is_float(text: &str) -> bool {
    parse_float(text).is_some()
}

/// `value` if it is one of `allowed`, otherwise `None`
pub fn constrained<T: PartialEq>(value: T, allowed: &[T]) -> Option<T> {
    if allowed.contains(&value) {
        Some(value)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_detection() {
        assert!(is_float("1"));
        assert!(is_float(" -2.5e3 "));
        assert!(is_float("nan"));
        assert!(is_float("inf"));
        assert!(!is_float("a"));
        assert!(!is_float(""));
    }

    #[test]
    fn constrained_filters() {
        assert_eq!(constrained(3, &[1, 2, 3]), Some(3));
        assert_eq!(constrained(4, &[1, 2, 3]), None);
        assert_eq!(constrained("y", &["y", "n"]), Some("y"));
    }
}
