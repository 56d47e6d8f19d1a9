use clap::Parser;
use tracing::Level;

mod cli;
mod commands;
pub mod output;

use cli::Args;
use commands::CommandRunner;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let (config, options) = cli::resolve_database(args.db.as_deref())?;
    let conn = config.connect_with(&options)?;
    let output = args.command.run(&conn, args.format)?;
    println!("{}", output);
    Ok(())
}
