//! Transformer chain application.
//!
//! A value flows through transformers in declaration order, each one
//! re-coercing the `serde_json::Value` in place.

use crate::config::{Transformer, TransformerKind};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use url::Url;

static NON_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\d]").unwrap());
static NON_NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\d.\-]").unwrap());

/// Apply `transformers` in order to `value`. `base_url` is required for
/// `to_absolute_url` and is a no-op when absent, matching the original's
/// "keep as-is" fallback.
#[must_use]
pub fn apply_transformers(value: Option<Value>, transformers: &[Transformer], base_url: Option<&str>) -> Option<Value> {
    let mut current = value?;
    if matches!(&current, Value::Null) {
        return None;
    }

    for t in transformers {
        current = match t.name {
            TransformerKind::Strip => match current {
                Value::String(s) => Value::String(s.trim().to_string()),
                other => other,
            },
            TransformerKind::ToFloat => Value::from(to_float(&current, t)),
            TransformerKind::ToInt => Value::from(to_int(&current)),
            TransformerKind::Regex => match apply_regex(&current, t) {
                Some(v) => v,
                None => return None,
            },
            TransformerKind::Replace => Value::String(apply_replace(&current, t)),
            TransformerKind::ToAbsoluteUrl => match (base_url, current.as_str()) {
                (Some(base), Some(s)) => Url::parse(base)
                    .and_then(|b| b.join(s))
                    .map(|u| Value::String(u.to_string()))
                    .unwrap_or(current),
                _ => current,
            },
        };
    }
    Some(current)
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn to_float(value: &Value, t: &Transformer) -> f64 {
    let decimal_sep = t.args.first().and_then(Value::as_str).unwrap_or(".");
    let thousand_sep = t.args.get(1).and_then(Value::as_str).unwrap_or(",");

    let mut s = stringify(value).trim().to_string();
    if !thousand_sep.is_empty() {
        s = s.replace(thousand_sep, "");
    }
    if decimal_sep != "." {
        s = s.replace(decimal_sep, ".");
    }
    let cleaned = NON_NUMERIC.replace_all(&s, "");
    cleaned.parse::<f64>().unwrap_or(0.0)
}

fn to_int(value: &Value) -> i64 {
    let s = stringify(value);
    let cleaned = NON_DIGIT.replace_all(&s, "");
    cleaned.parse::<i64>().unwrap_or(0)
}

fn apply_regex(value: &Value, t: &Transformer) -> Option<Value> {
    let pattern = t.args.first().and_then(Value::as_str)?;
    let re = Regex::new(pattern).ok()?;
    let s = stringify(value);
    let captures = re.captures(&s)?;
    let matched = captures
        .get(1)
        .or_else(|| captures.get(0))
        .map(|m| m.as_str().to_string())?;
    Some(Value::String(matched))
}

fn apply_replace(value: &Value, t: &Transformer) -> String {
    let from = t.args.first().and_then(Value::as_str).unwrap_or("");
    let to = t.args.get(1).and_then(Value::as_str).unwrap_or("");
    stringify(value).replace(from, to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Transformer;
    use serde_json::json;

    fn transformer(name: TransformerKind, args: Vec<Value>) -> Transformer {
        Transformer { name, args }
    }

    #[test]
    fn strip_trims_whitespace() {
        let result = apply_transformers(
            Some(json!("  hello  ")),
            &[transformer(TransformerKind::Strip, vec![])],
            None,
        );
        assert_eq!(result, Some(json!("hello")));
    }

    #[test]
    fn to_float_handles_locale_separators() {
        let result = apply_transformers(
            Some(json!("1.234,56")),
            &[transformer(TransformerKind::ToFloat, vec![json!(","), json!(".")])],
            None,
        );
        assert_eq!(result, Some(json!(1234.56)));
    }

    #[test]
    fn to_int_strips_non_digits() {
        let result = apply_transformers(
            Some(json!("$1,234 USD")),
            &[transformer(TransformerKind::ToInt, vec![])],
            None,
        );
        assert_eq!(result, Some(json!(1234)));
    }

    #[test]
    fn regex_without_match_yields_none() {
        let result = apply_transformers(
            Some(json!("no numbers here")),
            &[transformer(TransformerKind::Regex, vec![json!(r"\d+")])],
            None,
        );
        assert_eq!(result, None);
    }

    #[test]
    fn regex_prefers_first_capture_group() {
        let result = apply_transformers(
            Some(json!("price: 42")),
            &[transformer(TransformerKind::Regex, vec![json!(r"price: (\d+)")])],
            None,
        );
        assert_eq!(result, Some(json!("42")));
    }

    #[test]
    fn to_absolute_url_resolves_relative_path() {
        let result = apply_transformers(
            Some(json!("/widgets/1")),
            &[transformer(TransformerKind::ToAbsoluteUrl, vec![])],
            Some("https://shop.example.com/catalog"),
        );
        assert_eq!(result, Some(json!("https://shop.example.com/widgets/1")));
    }

    #[test]
    fn null_input_short_circuits() {
        let result = apply_transformers(
            Some(Value::Null),
            &[transformer(TransformerKind::Strip, vec![])],
            None,
        );
        assert_eq!(result, None);
    }
}
