use std::error::Error;

use litequery::{run_query, Connection, QueryResult};

use super::QueryCmd;
use crate::commands::Execute;

impl Execute for QueryCmd {
    type Output = QueryResult;

    fn execute(self, conn: &Connection) -> Result<Self::Output, Box<dyn Error>> {
        Ok(run_query(conn, &self.sql, &self.params)?)
    }
}
