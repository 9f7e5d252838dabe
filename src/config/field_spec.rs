//! `FieldSpec` — the recursive field tree that drives extraction.

use super::selector::Selector;
use super::transformer::Transformer;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct FieldSpec {
    pub name: String,
    pub selectors: Vec<Selector>,
    pub is_list: bool,
    pub attribute: Option<String>,
    pub transformers: Vec<Transformer>,
    pub children: Option<Vec<FieldSpec>>,
    pub follow_url: bool,
    pub nested_fields: Option<Vec<FieldSpec>>,
}

/// Raw wire shape. `selector` (singular, object or array) and `selectors`
/// (plural) are both accepted and merged, matching the original's
/// `normalize_selectors` model validator — a singular `selector` is
/// prepended to any `selectors` list.
#[derive(Deserialize)]
struct RawFieldSpec {
    name: String,
    #[serde(default)]
    selector: Option<SingleOrMany>,
    #[serde(default)]
    selectors: Vec<Selector>,
    #[serde(default)]
    is_list: bool,
    #[serde(default)]
    attribute: Option<String>,
    #[serde(default)]
    transformers: Vec<Transformer>,
    children: Option<Vec<FieldSpec>>,
    #[serde(default)]
    follow_url: bool,
    nested_fields: Option<Vec<FieldSpec>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SingleOrMany {
    One(Selector),
    Many(Vec<Selector>),
}

impl<'de> Deserialize<'de> for FieldSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::de::Deserializer<'de>,
    {
        let raw = RawFieldSpec::deserialize(deserializer)?;

        let mut selectors = match raw.selector {
            Some(SingleOrMany::One(sel)) => vec![sel],
            Some(SingleOrMany::Many(mut sels)) => {
                sels.extend(raw.selectors);
                return Ok(FieldSpec {
                    name: raw.name,
                    selectors: sels,
                    is_list: raw.is_list,
                    attribute: normalize_attribute(raw.attribute),
                    transformers: raw.transformers,
                    children: raw.children,
                    follow_url: raw.follow_url,
                    nested_fields: raw.nested_fields,
                });
            }
            None => Vec::new(),
        };
        selectors.extend(raw.selectors);

        Ok(FieldSpec {
            name: raw.name,
            selectors,
            is_list: raw.is_list,
            attribute: normalize_attribute(raw.attribute),
            transformers: raw.transformers,
            children: raw.children,
            follow_url: raw.follow_url,
            nested_fields: raw.nested_fields,
        })
    }
}

fn normalize_attribute(raw: Option<String>) -> Option<String> {
    raw.and_then(|s| {
        let trimmed = s.trim().to_lowercase();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}

impl FieldSpec {
    /// Construct a leaf field spec with a single CSS selector; convenience
    /// used by tests and programmatic config building.
    #[must_use]
    pub fn leaf(name: impl Into<String>, selector: Selector) -> Self {
        Self {
            name: name.into(),
            selectors: vec![selector],
            is_list: false,
            attribute: None,
            transformers: Vec::new(),
            children: None,
            follow_url: false,
            nested_fields: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelectorKind;

    #[test]
    fn shorthand_selectors_parse() {
        let spec: FieldSpec =
            serde_json::from_str(r#"{"name":"title","selectors":["h1"]}"#).unwrap();
        assert_eq!(spec.selectors.len(), 1);
        assert_eq!(spec.selectors[0].kind, SelectorKind::Css);
    }

    #[test]
    fn singular_selector_merges_with_plural() {
        let spec: FieldSpec = serde_json::from_str(
            r#"{"name":"title","selector":"h1","selectors":["h2"]}"#,
        )
        .unwrap();
        assert_eq!(spec.selectors.len(), 2);
        assert_eq!(spec.selectors[0].value, "h1");
        assert_eq!(spec.selectors[1].value, "h2");
    }

    #[test]
    fn attribute_is_trimmed_and_lowercased() {
        let spec: FieldSpec =
            serde_json::from_str(r#"{"name":"link","selectors":["a"],"attribute":" HREF "}"#)
                .unwrap();
        assert_eq!(spec.attribute.as_deref(), Some("href"));
    }

    #[test]
    fn nested_children_parse_recursively() {
        let json = r#"{
            "name": "rows",
            "selectors": ["tr"],
            "is_list": true,
            "children": [
                {"name": "cell", "selectors": ["td"]}
            ]
        }"#;
        let spec: FieldSpec = serde_json::from_str(json).unwrap();
        assert!(spec.is_list);
        let children = spec.children.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name, "cell");
    }
}
