//! Transformer spec with shorthand-string normalization.
//!
//! A bare string (`"strip"`) normalizes to `{name: "strip", args: []}`.

use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformerKind {
    Strip,
    ToFloat,
    ToInt,
    Regex,
    Replace,
    ToAbsoluteUrl,
}

#[derive(Debug, Clone, Serialize)]
pub struct Transformer {
    pub name: TransformerKind,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl<'de> Deserialize<'de> for Transformer {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Shorthand {
            Bare(String),
            Full {
                name: TransformerKind,
                #[serde(default)]
                args: Vec<Value>,
            },
        }

        match Shorthand::deserialize(deserializer)? {
            Shorthand::Bare(name) => {
                let name = match name.as_str() {
                    "strip" => TransformerKind::Strip,
                    "to_float" => TransformerKind::ToFloat,
                    "to_int" => TransformerKind::ToInt,
                    "regex" => TransformerKind::Regex,
                    "replace" => TransformerKind::Replace,
                    "to_absolute_url" => TransformerKind::ToAbsoluteUrl,
                    other => {
                        return Err(serde::de::Error::custom(format!(
                            "unknown transformer shorthand '{other}'"
                        )));
                    }
                };
                Ok(Transformer {
                    name,
                    args: Vec::new(),
                })
            }
            Shorthand::Full { name, args } => Ok(Transformer { name, args }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_shorthand_normalizes() {
        let t: Transformer = serde_json::from_str("\"strip\"").unwrap();
        assert_eq!(t.name, TransformerKind::Strip);
        assert!(t.args.is_empty());
    }

    #[test]
    fn full_object_round_trips() {
        let t: Transformer =
            serde_json::from_str(r#"{"name":"replace","args":["a","b"]}"#).unwrap();
        assert_eq!(t.name, TransformerKind::Replace);
        assert_eq!(t.args.len(), 2);
    }
}
