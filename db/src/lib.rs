//! Typed access layer over SQLite.
//!
//! Typed expressions and an immutable clause builder render parameterized
//! SQL; prepared statements and lazy cursors run it against a connection
//! that owns the native handle.
//!
//! ```
//! use litequery::expr::column;
//! use litequery::{Connection, Query};
//!
//! let conn = Connection::open_in_memory().unwrap();
//! conn.execute_batch("CREATE TABLE users (id INTEGER PRIMARY KEY, age INTEGER)").unwrap();
//! conn.execute_batch("INSERT INTO users (age) VALUES (17), (42)").unwrap();
//!
//! let age = column::<i64>("age");
//! let adults = Query::table("users").filter(age.greater_or_equal(18));
//! assert_eq!(conn.count(&adults).unwrap(), 1);
//! ```

pub mod config;
pub mod db;
pub mod engine;
pub mod escape;
pub mod expr;
pub mod query;
pub mod schema;
pub mod value;

mod connection;
mod cursor;
mod row;
mod statement;

pub mod fixtures;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export commonly used items
pub use config::{ConfigFile, ConnectionOptions, DatabaseConfig};
pub use connection::{Connection, InterruptHandle, OpenMode, Operation, TransactionMode};
pub use cursor::{Cursor, CursorState};
pub use db::{
    open_db, open_mem_db, run_query, run_query_no_params, try_create_table, DbError, QueryResult,
    Result,
};
pub use engine::Capabilities;
pub use expr::{Column, Expr, IntoExpr, OrderTerm, Window};
pub use query::{CompiledQuery, Cte, JoinLayout, OnConflict, Query, QueryType, Setter};
pub use row::{FromRow, Row, RowIndex};
pub use schema::{ColumnDef, Table};
pub use statement::Statement;
pub use value::{ColumnType, FromValue, Value};
