//! Output formatting tests for tables command.

#[cfg(test)]
mod tests {
    use super::super::execute::{TableEntry, TablesResult};
    use crate::output::Outputable;
    use rstest::rstest;

    #[rstest]
    fn test_table_output() {
        let result = TablesResult {
            tables: vec![
                TableEntry {
                    name: "posts".into(),
                    kind: "table".into(),
                    rows: 4,
                },
                TableEntry {
                    name: "popular".into(),
                    kind: "view".into(),
                    rows: 12,
                },
            ],
        };
        let expected = "\
name     type   rows
-------  -----  ----
posts    table  4
popular  view   12";
        assert_eq!(result.to_table(), expected);
    }

    #[rstest]
    fn test_empty() {
        assert_eq!(TablesResult { tables: vec![] }.to_table(), "No tables found.");
    }
}
