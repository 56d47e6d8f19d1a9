//! CLI argument definitions.
//!
//! This module contains the top-level CLI structure and database resolution.
//! Individual command definitions are in the `commands` module.

use std::error::Error;

use clap::Parser;
use litequery::{ConfigFile, ConnectionOptions, DatabaseConfig};
use tracing::debug;

use crate::commands::Command;
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Database URL or file path (`:memory:`, `sqlite://path?mode=ro`, `./app.sqlite`)
    ///
    /// If not specified, uses in order:
    ///   1. ./.litequery.json (project-local config)
    ///   2. LITEQUERY_DATABASE_URL or DATABASE_URL
    ///   3. ~/.litequery.json (user-global config)
    ///   4. ./litequery.sqlite
    #[arg(long, global = true)]
    pub db: Option<String>,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    pub format: OutputFormat,

    /// Log to stderr; repeat for more detail
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Resolve which database to open and how, checking locations in order of preference.
pub fn resolve_database(
    explicit: Option<&str>,
) -> Result<(DatabaseConfig, ConnectionOptions), Box<dyn Error>> {
    let local = ConfigFile::load_default()?;
    let options = local.as_ref().map(|c| c.options.clone()).unwrap_or_default();

    if let Some(url) = explicit {
        return Ok((DatabaseConfig::from_url(url)?, options));
    }

    if let Some(file) = local {
        debug!("using ./{}", litequery::config::CONFIG_FILE_NAME);
        return Ok((file.database, file.options));
    }

    if let Some(config) = DatabaseConfig::from_env()? {
        return Ok((config, options));
    }

    if let Some(home_dir) = home::home_dir() {
        let global = home_dir.join(litequery::config::CONFIG_FILE_NAME);
        if global.exists() {
            debug!(path = %global.display(), "using user-global config");
            let file = ConfigFile::load(&global)?;
            return Ok((file.database, file.options));
        }
    }

    Ok((DatabaseConfig::from_url(litequery::config::DEFAULT_DATABASE)?, options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::long(&["litequery", "--db", ":memory:", "tables"], Some(":memory:"))]
    #[case::after_subcommand(&["litequery", "tables", "--db", "x.db"], Some("x.db"))]
    #[case::absent(&["litequery", "tables"], None)]
    fn test_db_flag(#[case] argv: &[&str], #[case] expected: Option<&str>) {
        let args = Args::try_parse_from(argv).unwrap();
        assert_eq!(args.db.as_deref(), expected);
    }

    #[rstest]
    #[case(&["litequery", "tables"], 0)]
    #[case(&["litequery", "-v", "tables"], 1)]
    #[case(&["litequery", "tables", "-vvv"], 3)]
    fn test_verbosity(#[case] argv: &[&str], #[case] expected: u8) {
        let args = Args::try_parse_from(argv).unwrap();
        assert_eq!(args.verbose, expected);
    }

    #[rstest]
    fn test_format_flag() {
        let args = Args::try_parse_from(["litequery", "-o", "json", "tables"]).unwrap();
        assert!(matches!(args.format, OutputFormat::Json));
    }

    #[rstest]
    fn test_requires_subcommand() {
        assert!(Args::try_parse_from(["litequery"]).is_err());
    }

    #[rstest]
    fn test_explicit_db_wins() {
        let (config, _) = resolve_database(Some(":memory:")).unwrap();
        assert_eq!(config, DatabaseConfig::Memory);
    }
}
