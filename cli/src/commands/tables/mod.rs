mod execute;
mod output;

#[cfg(test)]
mod cli_tests;
#[cfg(test)]
mod output_tests;

use std::error::Error;

use clap::Args;
use litequery::Connection;

use crate::commands::{CommandRunner, Execute};
use crate::output::{OutputFormat, Outputable};

/// List tables and views with their row counts
#[derive(Args, Debug)]
pub struct TablesCmd {
    /// Include views
    #[arg(long)]
    pub views: bool,
}

impl CommandRunner for TablesCmd {
    fn run(self, conn: &Connection, format: OutputFormat) -> Result<String, Box<dyn Error>> {
        let result = self.execute(conn)?;
        Ok(result.format(format))
    }
}
