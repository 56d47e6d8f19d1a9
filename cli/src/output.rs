//! Output formatting for command results.
//!
//! Supports multiple output formats: table (human-readable), JSON, and toon.

use clap::ValueEnum;
use litequery::{QueryResult, Value};
use serde::Serialize;

/// Output format for command results
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// Token-efficient toon format
    Toon,
}

/// Trait for types that can be formatted for output
pub trait Outputable: Serialize {
    /// Format as a human-readable table
    fn to_table(&self) -> String;

    /// Format according to the specified output format
    fn format(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Table => self.to_table(),
            OutputFormat::Json => serde_json::to_string_pretty(self).unwrap_or_default(),
            OutputFormat::Toon => {
                let json_value = serde_json::to_value(self).unwrap_or_default();
                toon::encode(&json_value, None)
            }
        }
    }
}

/// Render headers and rows as a left-aligned, space-padded grid.
pub fn format_grid(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, text) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(text.chars().count());
            }
        }
    }

    let render = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(text, width)| format!("{:<width$}", text, width = *width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![render(headers)];
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    lines.extend(rows.iter().map(|row| render(row)));
    lines.join("\n")
}

impl Outputable for QueryResult {
    fn to_table(&self) -> String {
        if self.headers.is_empty() {
            return "No columns returned.".to_string();
        }
        let rows: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(Value::to_string).collect())
            .collect();
        let mut out = format_grid(&self.headers, &rows);
        out.push_str(&format!("\n\n{} row(s)", self.rows.len()));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn result() -> QueryResult {
        QueryResult {
            headers: vec!["id".into(), "name".into(), "data".into()],
            rows: vec![
                vec![Value::Integer(1), Value::Text("ada".into()), Value::Blob(vec![0, 255])],
                vec![Value::Integer(22), Value::Null, Value::Null],
            ],
        }
    }

    #[rstest]
    fn test_table_format(result: QueryResult) {
        let expected = "\
id  name  data
--  ----  -------
1   ada   x'00ff'
22  NULL  NULL

2 row(s)";
        assert_eq!(result.to_table(), expected);
    }

    #[rstest]
    fn test_json_format(result: QueryResult) {
        let json: serde_json::Value =
            serde_json::from_str(&result.format(OutputFormat::Json)).unwrap();
        assert_eq!(json["headers"], serde_json::json!(["id", "name", "data"]));
        assert_eq!(json["rows"][1][1], serde_json::Value::Null);
    }

    #[rstest]
    fn test_toon_format_mentions_headers(result: QueryResult) {
        let output = result.format(OutputFormat::Toon);
        assert!(output.contains("headers"), "{}", output);
    }

    #[rstest]
    fn test_no_columns() {
        assert_eq!(QueryResult::default().to_table(), "No columns returned.");
    }
}
