mod execute;

#[cfg(test)]
mod execute_tests;

use std::error::Error;

use clap::Args;
use litequery::Connection;

use crate::commands::{CommandRunner, Execute};
use crate::output::{OutputFormat, Outputable};

/// Print the rows of a table or view
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  litequery dump posts
  litequery dump posts --limit 10 -o json
")]
pub struct DumpCmd {
    /// Table or view name
    pub table: String,

    /// Maximum number of rows to print
    #[arg(short, long, default_value_t = 100, value_parser = clap::value_parser!(i64).range(0..))]
    pub limit: i64,
}

impl CommandRunner for DumpCmd {
    fn run(self, conn: &Connection, format: OutputFormat) -> Result<String, Box<dyn Error>> {
        let result = self.execute(conn)?;
        Ok(result.format(format))
    }
}
