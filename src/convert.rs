//! Offline JSONL → JSON/CSV conversion.
//!
//! Pure streaming: each function reads the input one line at a time and
//! writes its output incrementally, never holding more than one record in
//! memory.

use serde_json::Value;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Stream a JSONL file into a single JSON array.
pub async fn jsonl_to_json(input: &Path, output: &Path) -> std::io::Result<u64> {
    let reader = BufReader::new(File::open(input).await?);
    let mut lines = reader.lines();
    let mut out = File::create(output).await?;

    out.write_all(b"[").await?;
    let mut count = 0u64;
    let mut first = true;

    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(trimmed)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        if !first {
            out.write_all(b",").await?;
        }
        first = false;
        out.write_all(serde_json::to_vec(&value)?.as_slice()).await?;
        count += 1;
    }

    out.write_all(b"]").await?;
    out.flush().await?;
    Ok(count)
}

/// Stream a JSONL file into CSV. The header is taken from the first
/// record's keys in declaration order; later records are matched against
/// that header by key, with missing keys emitted empty and extra keys
/// dropped (there is no way to widen a CSV header after rows have already
/// been written without buffering the whole file, which streaming rules
/// out).
pub async fn jsonl_to_csv(input: &Path, output: &Path) -> std::io::Result<u64> {
    let reader = BufReader::new(File::open(input).await?);
    let mut lines = reader.lines();
    let mut out = File::create(output).await?;

    let mut header: Option<Vec<String>> = None;
    let mut count = 0u64;

    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(trimmed)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let Value::Object(map) = value else {
            continue;
        };

        let columns = header.get_or_insert_with(|| map.keys().cloned().collect());
        if count == 0 {
            out.write_all(render_csv_row(columns).as_bytes()).await?;
        }

        let row: Vec<String> = columns
            .iter()
            .map(|key| map.get(key).map(csv_cell).unwrap_or_default())
            .collect();
        out.write_all(render_csv_row(&row).as_bytes()).await?;
        count += 1;
    }

    out.flush().await?;
    Ok(count)
}

fn csv_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn render_csv_row(fields: &[String]) -> String {
    let escaped: Vec<String> = fields.iter().map(|f| escape_csv_field(f)).collect();
    format!("{}\r\n", escaped.join(","))
}

fn escape_csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn jsonl_to_json_produces_array() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.jsonl");
        tokio::fs::write(&input, "{\"a\":1}\n{\"a\":2}\n").await.unwrap();

        let output = dir.path().join("out.json");
        let count = jsonl_to_json(&input, &output).await.unwrap();
        assert_eq!(count, 2);

        let contents = tokio::fs::read_to_string(&output).await.unwrap();
        let parsed: Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed, serde_json::json!([{"a": 1}, {"a": 2}]));
    }

    #[tokio::test]
    async fn jsonl_to_csv_uses_first_record_header() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.jsonl");
        tokio::fs::write(&input, "{\"name\":\"a\",\"price\":1}\n{\"name\":\"b\",\"price\":2}\n")
            .await
            .unwrap();

        let output = dir.path().join("out.csv");
        let count = jsonl_to_csv(&input, &output).await.unwrap();
        assert_eq!(count, 2);

        let contents = tokio::fs::read_to_string(&output).await.unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("name,price"));
        assert_eq!(lines.next(), Some("a,1"));
        assert_eq!(lines.next(), Some("b,2"));
    }

    #[tokio::test]
    async fn csv_field_containing_comma_is_quoted() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.jsonl");
        tokio::fs::write(&input, "{\"note\":\"a, b\"}\n").await.unwrap();

        let output = dir.path().join("out.csv");
        jsonl_to_csv(&input, &output).await.unwrap();

        let contents = tokio::fs::read_to_string(&output).await.unwrap();
        assert!(contents.contains("\"a, b\""));
    }

    #[tokio::test]
    async fn blank_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.jsonl");
        tokio::fs::write(&input, "{\"a\":1}\n\n{\"a\":2}\n").await.unwrap();

        let output = dir.path().join("out.json");
        let count = jsonl_to_json(&input, &output).await.unwrap();
        assert_eq!(count, 2);
    }
}
