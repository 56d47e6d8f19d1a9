//! Output formatting for exec command results.

use super::execute::ExecResult;
use crate::output::Outputable;

impl Outputable for ExecResult {
    fn to_table(&self) -> String {
        if self.changes == 0 {
            return "OK, no rows changed.".to_string();
        }
        format!(
            "OK, {} row(s) changed (last insert rowid {}).",
            self.changes, self.last_insert_rowid
        )
    }
}
