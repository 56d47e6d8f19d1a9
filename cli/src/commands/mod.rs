//! Subcommands.
//!
//! Each command lives in its own module with an `execute` step that talks to
//! the database and returns a serializable result, and an `output` step that
//! renders it through [`Outputable`](crate::output::Outputable).

mod dump;
mod exec;
mod query;
mod tables;

use std::error::Error;

use clap::Subcommand;
use litequery::Connection;

use crate::output::OutputFormat;

pub use dump::DumpCmd;
pub use exec::ExecCmd;
pub use query::QueryCmd;
pub use tables::TablesCmd;

#[derive(Subcommand, Debug)]
pub enum Command {
    Exec(ExecCmd),
    Query(QueryCmd),
    Tables(TablesCmd),
    Dump(DumpCmd),
}

/// Runs a command and renders its result.
pub trait CommandRunner {
    fn run(self, conn: &Connection, format: OutputFormat) -> Result<String, Box<dyn Error>>;
}

/// Produces a command's result from the database.
pub trait Execute {
    type Output;

    fn execute(self, conn: &Connection) -> Result<Self::Output, Box<dyn Error>>;
}

impl CommandRunner for Command {
    fn run(self, conn: &Connection, format: OutputFormat) -> Result<String, Box<dyn Error>> {
        match self {
            Command::Exec(cmd) => cmd.run(conn, format),
            Command::Query(cmd) => cmd.run(conn, format),
            Command::Tables(cmd) => cmd.run(conn, format),
            Command::Dump(cmd) => cmd.run(conn, format),
        }
    }
}
