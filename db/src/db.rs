//! Error type and top-level convenience entry points.
//!
//! # Error taxonomy
//!
//! - **Engine** errors carry the native result code and the message read from
//!   the connection at the point of failure.
//! - **Closed** errors report use of a finalized statement or closed connection.
//! - **StatementCreation** covers a prepare that succeeded without a handle.
//! - Binding-contract errors (`NoPrimaryKey`, `BindingCount`, `ColumnMismatch`)
//!   are raised before anything reaches the engine.
//!
//! Nothing in this crate retries; busy/locked handling is left to the caller.

use std::path::Path;

use rusqlite::ffi;
use serde::Serialize;
use thiserror::Error;

use crate::connection::Connection;
use crate::value::{ColumnType, Value};

/// Crate-wide result alias.
pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DbError {
    #[error("SQLite error {code} ({extended_code}): {message}{}", sql_suffix(.sql))]
    Engine {
        code: i32,
        extended_code: i32,
        message: String,
        sql: Option<String>,
    },

    #[error("{resource} is closed")]
    Closed { resource: &'static str },

    #[error("Failed to create statement for: {sql}")]
    StatementCreation { sql: String },

    #[error("Table '{table}' has no primary key")]
    NoPrimaryKey { table: String },

    #[error("Update of '{table}' assigns no columns")]
    NoAssignments { table: String },

    #[error("Statement expects {expected} bindings, got {actual}")]
    BindingCount { expected: usize, actual: usize },

    #[error("Row {row} has {actual} columns, expected {expected}")]
    ColumnMismatch {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Missing column '{name}' in query result")]
    MissingColumn { name: String },

    #[error("Column '{column}' holds {actual}, expected {expected}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        actual: ColumnType,
    },

    #[error("Failed to open database '{path}': {message}")]
    OpenFailed { path: String, message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Invalid string argument: {message}")]
    InvalidString { message: String },

    #[error("Function '{name}' failed: {message}")]
    Function { name: String, message: String },
}

fn sql_suffix(sql: &Option<String>) -> String {
    sql.as_ref().map(|s| format!(" (in: {})", s)).unwrap_or_default()
}

impl DbError {
    /// Primary result code for engine errors.
    pub fn code(&self) -> Option<i32> {
        match self {
            DbError::Engine { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.code(), Some(ffi::SQLITE_BUSY) | Some(ffi::SQLITE_LOCKED))
    }

    pub fn is_interrupt(&self) -> bool {
        self.code() == Some(ffi::SQLITE_INTERRUPT)
    }

    pub fn is_constraint(&self) -> bool {
        self.code() == Some(ffi::SQLITE_CONSTRAINT)
    }
}

/// Column headers plus fully materialized rows.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryResult {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Open (or create) a database file.
pub fn open_db(path: &Path) -> Result<Connection> {
    Connection::open(path)
}

/// Create an in-memory database.
///
/// Used by tests to avoid disk I/O and temp file management.
pub fn open_mem_db() -> Result<Connection> {
    Connection::open_in_memory()
}

/// Run a single statement with positional parameters and collect every row.
pub fn run_query(conn: &Connection, sql: &str, params: &[Value]) -> Result<QueryResult> {
    let mut stmt = conn.prepare(sql)?;
    stmt.bind(params)?;
    let headers = stmt.column_names().to_vec();
    let rows = stmt
        .into_cursor(|s| Ok(s.row().into_values()))
        .collect::<Result<Vec<_>>>()?;
    Ok(QueryResult { headers, rows })
}

/// Run a query with no parameters.
pub fn run_query_no_params(conn: &Connection, sql: &str) -> Result<QueryResult> {
    run_query(conn, sql, &[])
}

/// Try to create a table, returning Ok(true) if created, Ok(false) if it
/// already existed.
pub fn try_create_table(conn: &Connection, ddl: &str) -> Result<bool> {
    match conn.execute_batch(ddl) {
        Ok(()) => Ok(true),
        Err(DbError::Engine { message, .. }) if message.contains("already exists") => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn conn() -> Connection {
        open_mem_db().expect("Failed to create in-memory DB")
    }

    #[rstest]
    fn test_run_query_returns_headers_and_rows(conn: Connection) {
        let result = run_query(&conn, "SELECT ? AS x, ? AS y", &[1.into(), "a".into()])
            .expect("Query should succeed");
        assert_eq!(result.headers, vec!["x", "y"]);
        assert_eq!(result.rows, vec![vec![Value::Integer(1), Value::Text("a".into())]]);
    }

    #[rstest]
    fn test_run_query_no_params(conn: Connection) {
        let result = run_query_no_params(&conn, "SELECT 1 UNION ALL SELECT 2").unwrap();
        assert_eq!(result.rows.len(), 2);
    }

    #[rstest]
    fn test_try_create_table_reports_existing(conn: Connection) {
        let ddl = "CREATE TABLE t (id INTEGER PRIMARY KEY)";
        assert!(try_create_table(&conn, ddl).unwrap());
        assert!(!try_create_table(&conn, ddl).unwrap());
    }

    #[rstest]
    fn test_engine_error_display_includes_sql(conn: Connection) {
        let err = run_query_no_params(&conn, "SELECT * FROM missing").unwrap_err();
        let text = err.to_string();
        assert!(text.contains("no such table"), "got: {}", text);
        assert!(text.contains("SELECT * FROM missing"), "got: {}", text);
    }

    #[rstest]
    fn test_error_classification() {
        let busy = DbError::Engine {
            code: ffi::SQLITE_BUSY,
            extended_code: ffi::SQLITE_BUSY,
            message: "database is locked".into(),
            sql: None,
        };
        assert!(busy.is_busy());
        assert!(!busy.is_interrupt());
        assert_eq!(DbError::Closed { resource: "statement" }.code(), None);
    }
}
