use std::error::Error;

use litequery::{run_query, Connection, Query, QueryResult};

use super::DumpCmd;
use crate::commands::Execute;

impl Execute for DumpCmd {
    type Output = QueryResult;

    fn execute(self, conn: &Connection) -> Result<Self::Output, Box<dyn Error>> {
        let compiled = Query::table(&self.table).limit(self.limit).compile();
        Ok(run_query(conn, &compiled.sql, &compiled.bindings)?)
    }
}
