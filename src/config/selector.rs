//! Selector type with shorthand-string normalization.
//!
//! A bare JSON string normalizes to `{kind: css, value: <s>}`.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorKind {
    Css,
    Xpath,
    JsonPath,
    Regex,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selector {
    #[serde(rename = "type")]
    pub kind: SelectorKind,
    pub value: String,
}

impl Selector {
    #[must_use]
    pub fn css(value: impl Into<String>) -> Self {
        Self {
            kind: SelectorKind::Css,
            value: value.into(),
        }
    }
}

impl<'de> Deserialize<'de> for Selector {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Shorthand {
            Bare(String),
            Full {
                #[serde(rename = "type")]
                kind: SelectorKind,
                value: String,
            },
        }

        match Shorthand::deserialize(deserializer)? {
            Shorthand::Bare(value) => Ok(Selector::css(value)),
            Shorthand::Full { kind, value } => Ok(Selector { kind, value }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_string_normalizes_to_css() {
        let sel: Selector = serde_json::from_str("\"h1.title\"").unwrap();
        assert_eq!(sel.kind, SelectorKind::Css);
        assert_eq!(sel.value, "h1.title");
    }

    #[test]
    fn full_object_round_trips() {
        let sel: Selector = serde_json::from_str(r#"{"type":"xpath","value":"//a"}"#).unwrap();
        assert_eq!(sel.kind, SelectorKind::Xpath);
        assert_eq!(sel.value, "//a");
    }
}
