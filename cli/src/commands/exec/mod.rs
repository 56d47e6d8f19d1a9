mod execute;
mod output;

#[cfg(test)]
mod execute_tests;

use std::error::Error;

use clap::Args;
use litequery::Connection;

use crate::commands::{CommandRunner, Execute};
use crate::output::{OutputFormat, Outputable};

/// Run one or more SQL statements, discarding any rows
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  litequery exec 'CREATE TABLE t (x)'
  litequery exec 'INSERT INTO t VALUES (1); INSERT INTO t VALUES (2)'
")]
pub struct ExecCmd {
    /// SQL text; may contain several statements separated by `;`
    pub sql: String,
}

impl CommandRunner for ExecCmd {
    fn run(self, conn: &Connection, format: OutputFormat) -> Result<String, Box<dyn Error>> {
        let result = self.execute(conn)?;
        Ok(result.format(format))
    }
}
