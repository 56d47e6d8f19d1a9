//! Output formatting for tables command results.

use super::execute::TablesResult;
use crate::output::{format_grid, Outputable};

impl Outputable for TablesResult {
    fn to_table(&self) -> String {
        if self.tables.is_empty() {
            return "No tables found.".to_string();
        }
        let headers = vec!["name".to_string(), "type".to_string(), "rows".to_string()];
        let rows: Vec<Vec<String>> = self
            .tables
            .iter()
            .map(|t| vec![t.name.clone(), t.kind.clone(), t.rows.to_string()])
            .collect();
        format_grid(&headers, &rows)
    }
}
