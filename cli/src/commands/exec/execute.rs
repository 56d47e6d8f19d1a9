use std::error::Error;

use litequery::Connection;
use serde::Serialize;

use super::ExecCmd;
use crate::commands::Execute;

/// Effect of an `exec` run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecResult {
    /// Rows inserted, updated or deleted across all statements.
    pub changes: usize,
    pub last_insert_rowid: i64,
}

impl Execute for ExecCmd {
    type Output = ExecResult;

    fn execute(self, conn: &Connection) -> Result<Self::Output, Box<dyn Error>> {
        let before = conn.total_changes();
        conn.execute_batch(&self.sql)?;
        Ok(ExecResult {
            changes: conn.total_changes() - before,
            last_insert_rowid: conn.last_insert_rowid(),
        })
    }
}
