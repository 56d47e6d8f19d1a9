mod execute;

#[cfg(test)]
mod execute_tests;

use std::error::Error;

use clap::Args;
use litequery::{Connection, Value};

use crate::commands::{CommandRunner, Execute};
use crate::output::{OutputFormat, Outputable};

/// Run a single SQL query and print its rows
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  litequery query 'SELECT * FROM posts'
  litequery query 'SELECT * FROM posts WHERE views > ?' --param 100
  litequery query 'SELECT ?, ?' --param null --param 'it''s'   # NULL and text
")]
pub struct QueryCmd {
    /// SQL text of one statement, with `?` placeholders
    pub sql: String,

    /// Positional parameter; integers and reals are detected, `null` is NULL,
    /// anything else is text
    #[arg(short, long = "param", value_parser = parse_param)]
    pub params: Vec<Value>,
}

/// Interpret a command-line parameter as the narrowest matching value.
pub fn parse_param(raw: &str) -> Result<Value, String> {
    if raw.eq_ignore_ascii_case("null") {
        return Ok(Value::Null);
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Ok(Value::Integer(i));
    }
    if let Ok(f) = raw.parse::<f64>() {
        if f.is_finite() {
            return Ok(Value::Real(f));
        }
    }
    Ok(Value::Text(raw.to_string()))
}

impl CommandRunner for QueryCmd {
    fn run(self, conn: &Connection, format: OutputFormat) -> Result<String, Box<dyn Error>> {
        let result = self.execute(conn)?;
        Ok(result.format(format))
    }
}
