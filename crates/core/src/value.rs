#![forbid(unsafe_code)]

use serde_json::Value;

const TRUE_WORDS: &[&str] = &["true", "da", "yes", "y", "1", "on", "x"];

/// Interprets a session value as a boolean.
///
/// | value                                   | result   |
/// |-----------------------------------------|----------|
/// | `Bool(b)`                               | `b`      |
/// | number                                  | `n != 0` |
/// | string `true`/`da`/`yes`/`y`/`1`/`on`/`x` (trimmed, any case) | `true` |
/// | any other string                        | `false`  |
/// | `null`, array, object                   | `false`  |
pub fn coerce_boolean(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => {
            let text = text.trim().to_lowercase();
            TRUE_WORDS.iter().any(|word| *word == text)
        }
        Value::Null | Value::Array(_) | Value::Object(_) => false,
    }
}

pub fn coerce_boolean_opt(value: Option<&Value>) -> bool {
    value.is_some_and(coerce_boolean)
}

/// Null, whitespace-only strings and empty containers count as "not filled in".
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

pub fn is_blank_opt(value: Option<&Value>) -> bool {
    value.is_none_or(is_blank)
}

/// Parses points and similar numeric inputs. Accepts a decimal comma.
pub fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => {
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            text.replace(',', ".").parse::<f64>().ok().filter(|n| n.is_finite())
        }
        _ => None,
    }
}

/// Renders a number without a trailing `.0` when it is integral.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Plain text form of a scalar, used for literal comparisons and placeholders.
pub fn display_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.trim().to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    }
}

/// Compares a session value against a literal from the schema or rules table.
pub fn matches_literal(current: Option<&Value>, literal: &Value) -> bool {
    match literal {
        Value::Bool(expected) => coerce_boolean_opt(current) == *expected,
        Value::Number(expected) => current
            .and_then(parse_number)
            .zip(expected.as_f64())
            .is_some_and(|(a, b)| a == b),
        Value::Null => is_blank_opt(current),
        other => current.is_some_and(|current| {
            display_text(current).to_lowercase() == display_text(other).to_lowercase()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coerce_boolean_truth_table() {
        for truthy in [
            json!(true),
            json!(1),
            json!(2.5),
            json!("da"),
            json!(" DA "),
            json!("true"),
            json!("True"),
            json!("1"),
            json!("yes"),
            json!("on"),
        ] {
            assert!(coerce_boolean(&truthy), "{truthy} should be true");
        }
        for falsy in [
            json!(false),
            json!(0),
            json!(0.0),
            json!("ne"),
            json!("false"),
            json!(""),
            json!(null),
            json!([true]),
            json!({"a": true}),
        ] {
            assert!(!coerce_boolean(&falsy), "{falsy} should be false");
        }
    }

    #[test]
    fn blank_values() {
        assert!(is_blank(&json!(null)));
        assert!(is_blank(&json!("   ")));
        assert!(is_blank(&json!([])));
        assert!(is_blank(&json!({})));
        assert!(!is_blank(&json!(false)));
        assert!(!is_blank(&json!(0)));
        assert!(is_blank_opt(None));
    }

    #[test]
    fn numbers_parse_with_decimal_comma() {
        assert_eq!(parse_number(&json!("12,5")), Some(12.5));
        assert_eq!(parse_number(&json!(" 40 ")), Some(40.0));
        assert_eq!(parse_number(&json!(-3)), Some(-3.0));
        assert_eq!(parse_number(&json!("abc")), None);
        assert_eq!(parse_number(&json!(true)), None);
        assert_eq!(format_number(90.0), "90");
        assert_eq!(format_number(12.5), "12.5");
    }

    #[test]
    fn literal_matching_follows_literal_type() {
        assert!(matches_literal(Some(&json!("da")), &json!(true)));
        assert!(matches_literal(None, &json!(false)));
        assert!(matches_literal(Some(&json!("Okvirni sporazum")), &json!("okvirni sporazum")));
        assert!(matches_literal(Some(&json!("3")), &json!(3)));
        assert!(!matches_literal(Some(&json!("blago")), &json!("storitve")));
    }
}
