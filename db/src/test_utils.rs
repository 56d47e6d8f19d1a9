//! Shared test utilities for unit and integration tests.
//!
//! This module provides common helpers for setting up test databases with fixture data.

use std::path::PathBuf;

use tempfile::TempDir;

use crate::connection::Connection;
use crate::db::open_mem_db;
use crate::expr::types::SqlType;
use crate::fixtures;
use crate::schema::{ColumnDef, ForeignKeyAction, Table};

/// Create an in-memory database and run `sql` against it.
pub fn setup_test_db(sql: &str) -> Connection {
    let conn = open_mem_db().expect("Failed to create in-memory DB");
    conn.execute_batch(sql).expect("Fixture SQL should load");
    conn
}

/// Create an empty in-memory database.
pub fn setup_empty_test_db() -> Connection {
    open_mem_db().expect("Failed to create in-memory DB")
}

/// Database loaded with the blog fixture.
///
/// Use for: joins, aggregates, typed queries
pub fn blog_db() -> Connection {
    setup_test_db(fixtures::BLOG)
}

/// Database loaded with the notes fixture.
///
/// Use for: value round-trips, NULL handling
pub fn notes_db() -> Connection {
    setup_test_db(fixtures::NOTES)
}

/// A path for a database file inside a fresh temporary directory.
///
/// The directory (and the file) are removed when the returned guard drops.
pub fn temp_db_path(name: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join(name);
    (dir, path)
}

fn column<T: SqlType>(name: &str) -> ColumnDef {
    ColumnDef::typed::<T>(name)
}

/// Definitions matching the `authors` fixture table.
pub fn authors_table() -> Table {
    Table::new(
        "authors",
        vec![
            column::<i64>("id").primary_key(),
            column::<String>("name").unique(),
        ],
    )
}

/// Definitions matching the `posts` fixture table.
pub fn posts_table() -> Table {
    Table::new(
        "posts",
        vec![
            column::<i64>("id").primary_key(),
            column::<i64>("author_id").references("authors", "id"),
            column::<String>("title"),
            column::<i64>("views").default(0),
        ],
    )
}

/// Definitions matching the `comments` fixture table.
pub fn comments_table() -> Table {
    Table::new(
        "comments",
        vec![
            column::<i64>("id").primary_key(),
            column::<i64>("post_id")
                .references("posts", "id")
                .on_delete(ForeignKeyAction::Cascade),
            column::<String>("body"),
        ],
    )
}
