//! HTML/JSON field resolution.
//!
//! `HtmlResolver` and `JsonResolver` are expressed against `scraper::Html`
//! and `serde_json::Value` respectively. CSS is the only HTML selector
//! kind with a real engine here; XPath is a declared scope cut and
//! resolves to `EngineError::Parse`. `json_path` is a minimal
//! dotted/bracket evaluator, not a full JSONPath grammar.

use crate::config::{FieldSpec, ResponseType, Selector, SelectorKind};
use crate::error::EngineError;
use crate::transform::apply_transformers;
use regex::Regex;
use scraper::{ElementRef, Html, Selector as CssSelector};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Extract one record from a fetched body, dispatching on the job's
/// configured response type. The single entry point the expander and
/// drivers use so neither has to know about `HtmlResolver`/`JsonResolver`
/// directly.
pub fn extract(response_type: ResponseType, body: &str, fields: &[FieldSpec]) -> Result<Map<String, Value>, EngineError> {
    match response_type {
        ResponseType::Html => HtmlResolver::new(body).extract_record(fields),
        ResponseType::Json => JsonResolver::new(body).extract_record(fields),
    }
}

fn compile_regex(pattern: &str) -> Result<Regex, EngineError> {
    Regex::new(pattern).map_err(|e| EngineError::Parse(format!("invalid regex '{pattern}': {e}")))
}

/// Resolves a full `FieldSpec` tree against one parsed HTML document,
/// producing one `Record` (a JSON object keyed by field name).
pub struct HtmlResolver {
    document: Html,
    raw_content: String,
}

impl HtmlResolver {
    #[must_use]
    pub fn new(html: &str) -> Self {
        Self {
            document: Html::parse_document(html),
            raw_content: html.to_string(),
        }
    }

    pub fn extract_record(&self, fields: &[FieldSpec]) -> Result<Map<String, Value>, EngineError> {
        let root = self.document.root_element();
        let mut record = Map::new();
        for field in fields {
            let value = self.resolve_field(field, root)?;
            record.insert(field.name.clone(), value.unwrap_or(Value::Null));
        }
        Ok(record)
    }

    fn resolve_field(&self, field: &FieldSpec, scope: ElementRef<'_>) -> Result<Option<Value>, EngineError> {
        let mut elements: Vec<ElementRef<'_>> = Vec::new();
        let mut raw_matches: Vec<String> = Vec::new();

        for selector in &field.selectors {
            match selector.kind {
                SelectorKind::Regex => {
                    let re = compile_regex(&selector.value)?;
                    let mut seen = HashSet::new();
                    for cap in re.find_iter(&self.raw_content) {
                        if seen.insert(cap.as_str().to_string()) {
                            raw_matches.push(cap.as_str().to_string());
                        }
                    }
                    if !raw_matches.is_empty() {
                        break;
                    }
                }
                SelectorKind::Xpath => {
                    return Err(EngineError::Parse(
                        "xpath selectors are not supported by this resolver".into(),
                    ));
                }
                SelectorKind::Css => {
                    let found = select_css(scope, &selector.value)?;
                    if !found.is_empty() {
                        elements = found;
                        break;
                    }
                }
                SelectorKind::JsonPath => {
                    return Err(EngineError::Parse(
                        "json_path selectors are not valid against HTML documents".into(),
                    ));
                }
            }
        }

        if let Some(children) = &field.children {
            if !elements.is_empty() {
                return Ok(Some(self.resolve_children(field, &elements, children)?));
            }
            return Ok(None);
        }

        if !raw_matches.is_empty() {
            return Ok(self.finish_scalar_or_list(field, raw_matches.into_iter().map(Value::String).collect()));
        }

        let mut values = Vec::new();
        for el in &elements {
            if let Some(v) = self.extract_value(*el, field)? {
                values.push(v);
            }
        }
        Ok(self.finish_scalar_or_list(field, values))
    }

    fn resolve_child_field(
        &self,
        field: &FieldSpec,
        scope: ElementRef<'_>,
    ) -> Result<Option<Value>, EngineError> {
        let mut elements = Vec::new();
        for selector in &field.selectors {
            if selector.kind == SelectorKind::Xpath {
                return Err(EngineError::Parse(
                    "xpath selectors are not supported by this resolver".into(),
                ));
            }
            if selector.kind != SelectorKind::Css {
                continue;
            }
            let found = select_css(scope, &selector.value)?;
            if !found.is_empty() {
                elements = found;
                break;
            }
        }

        if let Some(children) = &field.children {
            if !elements.is_empty() {
                return Ok(Some(self.resolve_children(field, &elements, children)?));
            }
            return Ok(None);
        }

        let mut values = Vec::new();
        for el in &elements {
            if let Some(v) = self.extract_value(*el, field)? {
                values.push(v);
            }
        }
        Ok(self.finish_scalar_or_list(field, values))
    }

    fn resolve_children(
        &self,
        parent: &FieldSpec,
        elements: &[ElementRef<'_>],
        children: &[FieldSpec],
    ) -> Result<Value, EngineError> {
        let mut rows = Vec::new();
        for el in elements {
            let mut row = Map::new();
            for child in children {
                let value = self.resolve_child_field(child, *el)?;
                row.insert(child.name.clone(), value.unwrap_or(Value::Null));
            }
            rows.push(Value::Object(row));
        }
        if parent.is_list {
            Ok(Value::Array(rows))
        } else {
            Ok(rows.into_iter().next().unwrap_or(Value::Null))
        }
    }

    fn extract_value(&self, element: ElementRef<'_>, field: &FieldSpec) -> Result<Option<Value>, EngineError> {
        let raw = match &field.attribute {
            Some(attr) => element.value().attr(attr).map(str::to_string),
            None => Some(element.text().collect::<String>()),
        };
        Ok(apply_transformers(raw.map(Value::String), &field.transformers, None))
    }

    fn finish_scalar_or_list(&self, field: &FieldSpec, values: Vec<Value>) -> Option<Value> {
        if field.is_list {
            Some(Value::Array(values))
        } else {
            values.into_iter().next()
        }
    }
}

fn select_css<'a>(scope: ElementRef<'a>, css: &str) -> Result<Vec<ElementRef<'a>>, EngineError> {
    let selector = CssSelector::parse(css)
        .map_err(|e| EngineError::Parse(format!("invalid css selector '{css}': {e:?}")))?;
    Ok(scope.select(&selector).collect())
}

/// Resolves a `FieldSpec` tree against a `serde_json::Value` document.
pub struct JsonResolver {
    data: Value,
    raw_content: String,
}

impl JsonResolver {
    #[must_use]
    pub fn new(content: &str) -> Self {
        let data = serde_json::from_str(content).unwrap_or(Value::Null);
        Self {
            data,
            raw_content: content.to_string(),
        }
    }

    pub fn extract_record(&self, fields: &[FieldSpec]) -> Result<Map<String, Value>, EngineError> {
        let mut record = Map::new();
        for field in fields {
            let value = self.resolve_field(field, &self.data)?;
            record.insert(field.name.clone(), value.unwrap_or(Value::Null));
        }
        Ok(record)
    }

    fn resolve_field(&self, field: &FieldSpec, scope: &Value) -> Result<Option<Value>, EngineError> {
        let mut values = Vec::new();

        for selector in &field.selectors {
            match selector.kind {
                SelectorKind::Regex => {
                    let re = compile_regex(&selector.value)?;
                    let mut seen = HashSet::new();
                    for cap in re.find_iter(&self.raw_content) {
                        if seen.insert(cap.as_str().to_string()) {
                            values.push(Value::String(cap.as_str().to_string()));
                        }
                    }
                }
                SelectorKind::JsonPath => {
                    values.extend(eval_json_path(scope, &selector.value));
                }
                SelectorKind::Css | SelectorKind::Xpath => {
                    return Err(EngineError::Parse(
                        "css/xpath selectors are not valid against JSON documents".into(),
                    ));
                }
            }
        }

        if let Some(children) = &field.children {
            if !values.is_empty() {
                return Ok(Some(self.resolve_children(field, &values, children)?));
            }
            return Ok(None);
        }

        if field.is_list {
            return Ok(Some(Value::Array(values)));
        }
        let scalar = values.into_iter().next();
        Ok(apply_transformers(scalar, &field.transformers, None))
    }

    fn resolve_children(&self, parent: &FieldSpec, items: &[Value], children: &[FieldSpec]) -> Result<Value, EngineError> {
        let mut rows = Vec::new();
        for item in items {
            let mut row = Map::new();
            for child in children {
                let value = self.resolve_field(child, item)?;
                row.insert(child.name.clone(), value.unwrap_or(Value::Null));
            }
            rows.push(Value::Object(row));
        }
        if parent.is_list {
            Ok(Value::Array(rows))
        } else {
            Ok(rows.into_iter().next().unwrap_or(Value::Null))
        }
    }
}

/// `a.b[0].c` dotted/bracket path evaluator. Returns every leaf reached,
/// matching `jsonpath_ng`'s "all matches" semantics for the subset of
/// syntax this supports.
fn eval_json_path(root: &Value, path: &str) -> Vec<Value> {
    let path = path.trim_start_matches('$').trim_start_matches('.');
    let mut current = vec![root.clone()];

    for segment in split_path(path) {
        let mut next = Vec::new();
        for value in &current {
            match &segment {
                PathSegment::Key(key) => {
                    if let Some(v) = value.get(key) {
                        next.push(v.clone());
                    }
                }
                PathSegment::Index(idx) => {
                    if let Some(v) = value.get(*idx) {
                        next.push(v.clone());
                    }
                }
                PathSegment::Wildcard => {
                    if let Value::Array(items) = value {
                        next.extend(items.iter().cloned());
                    } else if let Value::Object(map) = value {
                        next.extend(map.values().cloned());
                    }
                }
            }
        }
        current = next;
    }
    current
}

enum PathSegment {
    Key(String),
    Index(usize),
    Wildcard,
}

fn split_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        if part.is_empty() {
            continue;
        }
        let mut key_part = part;
        while let Some(open) = key_part.find('[') {
            if open > 0 {
                segments.push(PathSegment::Key(key_part[..open].to_string()));
            }
            let close = key_part[open..].find(']').map(|i| i + open);
            if let Some(close) = close {
                let inside = &key_part[open + 1..close];
                if inside == "*" {
                    segments.push(PathSegment::Wildcard);
                } else if let Ok(idx) = inside.parse::<usize>() {
                    segments.push(PathSegment::Index(idx));
                }
                key_part = &key_part[close + 1..];
            } else {
                break;
            }
        }
        if !key_part.is_empty() {
            segments.push(PathSegment::Key(key_part.to_string()));
        }
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldSpec, Selector};

    #[test]
    fn html_resolver_extracts_scalar_text() {
        let resolver = HtmlResolver::new("<html><body><h1>Widget</h1></body></html>");
        let field = FieldSpec::leaf("title", Selector::css("h1"));
        let record = resolver.extract_record(&[field]).unwrap();
        assert_eq!(record.get("title"), Some(&Value::String("Widget".into())));
    }

    #[test]
    fn html_resolver_list_field_collects_all_matches() {
        let resolver = HtmlResolver::new("<ul><li>a</li><li>b</li></ul>");
        let mut field = FieldSpec::leaf("items", Selector::css("li"));
        field.is_list = true;
        let record = resolver.extract_record(&[field]).unwrap();
        assert_eq!(record.get("items"), Some(&Value::Array(vec![Value::String("a".into()), Value::String("b".into())])));
    }

    #[test]
    fn html_resolver_attribute_extraction() {
        let resolver = HtmlResolver::new(r#"<a href="/x">link</a>"#);
        let mut field = FieldSpec::leaf("href", Selector::css("a"));
        field.attribute = Some("href".to_string());
        let record = resolver.extract_record(&[field]).unwrap();
        assert_eq!(record.get("href"), Some(&Value::String("/x".into())));
    }

    #[test]
    fn html_resolver_xpath_is_a_parse_error() {
        let resolver = HtmlResolver::new("<html></html>");
        let field = FieldSpec::leaf("x", Selector { kind: SelectorKind::Xpath, value: "//a".into() });
        assert!(matches!(resolver.extract_record(&[field]), Err(EngineError::Parse(_))));
    }

    #[test]
    fn json_resolver_dotted_path() {
        let resolver = JsonResolver::new(r#"{"product":{"name":"Widget"}}"#);
        let field = FieldSpec::leaf(
            "name",
            Selector { kind: SelectorKind::JsonPath, value: "product.name".into() },
        );
        let record = resolver.extract_record(&[field]).unwrap();
        assert_eq!(record.get("name"), Some(&Value::String("Widget".into())));
    }

    #[test]
    fn json_resolver_bracket_index() {
        let resolver = JsonResolver::new(r#"{"items":[{"id":1},{"id":2}]}"#);
        let field = FieldSpec::leaf(
            "first_id",
            Selector { kind: SelectorKind::JsonPath, value: "items[0].id".into() },
        );
        let record = resolver.extract_record(&[field]).unwrap();
        assert_eq!(record.get("first_id"), Some(&Value::Number(1.into())));
    }
}
