use regex::Regex;

use crate::error::ExtractionError;

pub const DEFAULT_GROUP_INDEX: usize = 1;

/// Extracts the integer captured by `group` from `body`.
///
/// Parsing is lenient: leading whitespace and trailing garbage after the
/// digits are ignored, so a capture of `"42%"` yields 42.
pub fn extract(pattern: &Regex, body: &str, group: usize) -> Result<i64, ExtractionError> {
    let captures = pattern
        .captures(body)
        .ok_or_else(|| ExtractionError::PatternMismatch {
            body: body.to_string(),
        })?;
    let text = captures
        .get(group)
        .ok_or(ExtractionError::MissingCaptureGroup(group))?
        .as_str();
    parse_leading_integer(text).ok_or_else(|| ExtractionError::NotANumber(text.to_string()))
}

/// Power status is a plain match check: a matching body means "on".
pub fn matches(pattern: &Regex, body: &str) -> bool {
    pattern.is_match(body)
}

fn parse_leading_integer(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let (sign, digits) = match text.as_bytes().first() {
        Some(b'-') => (-1, &text[1..]),
        Some(b'+') => (1, &text[1..]),
        _ => (1, text),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    digits[..end].parse::<i64>().ok().map(|value| sign * value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number_pattern() -> Regex {
        Regex::new("([0-9]{1,3})").unwrap()
    }

    #[test]
    fn extracts_first_group() {
        assert_eq!(extract(&number_pattern(), "brightness=42", 1), Ok(42));
    }

    #[test]
    fn reports_pattern_mismatch() {
        assert_eq!(
            extract(&number_pattern(), "no-number-here", 1),
            Err(ExtractionError::PatternMismatch {
                body: "no-number-here".to_string()
            })
        );
    }

    #[test]
    fn reports_missing_group() {
        let pattern = Regex::new("level=[0-9]+").unwrap();
        assert_eq!(
            extract(&pattern, "level=12", 1),
            Err(ExtractionError::MissingCaptureGroup(1))
        );
        assert_eq!(
            extract(&number_pattern(), "12", 3),
            Err(ExtractionError::MissingCaptureGroup(3))
        );
    }

    #[test]
    fn optional_group_that_did_not_participate_is_missing() {
        let pattern = Regex::new("on|(off)=([0-9]+)").unwrap();
        assert_eq!(
            extract(&pattern, "on", 2),
            Err(ExtractionError::MissingCaptureGroup(2))
        );
    }

    #[test]
    fn reports_non_numeric_capture() {
        let pattern = Regex::new("state=(\\w+)").unwrap();
        assert_eq!(
            extract(&pattern, "state=dim", 1),
            Err(ExtractionError::NotANumber("dim".to_string()))
        );
    }

    #[test]
    fn selects_configured_group() {
        let pattern = Regex::new(r#""hue":\s*(\d+),\s*"sat":\s*(\d+)"#).unwrap();
        let body = r#"{"hue": 210, "sat": 64}"#;
        assert_eq!(extract(&pattern, body, 1), Ok(210));
        assert_eq!(extract(&pattern, body, 2), Ok(64));
    }

    #[test]
    fn parses_leniently() {
        let pattern = Regex::new("value=(.*)").unwrap();
        assert_eq!(extract(&pattern, "value= 42%", 1), Ok(42));
        assert_eq!(extract(&pattern, "value=-7", 1), Ok(-7));
        assert_eq!(
            extract(&pattern, "value=-", 1),
            Err(ExtractionError::NotANumber("-".to_string()))
        );
    }

    #[test]
    fn power_status_is_a_match_test() {
        let pattern = Regex::new("1").unwrap();
        assert!(matches(&pattern, "1"));
        assert!(!matches(&pattern, "0"));
    }
}
