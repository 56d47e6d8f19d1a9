//! Database connections.
//!
//! A [`Connection`] owns one native database handle, opened in serialized
//! (full mutex) mode. Statements borrow the connection, so the borrow checker
//! guarantees none outlives it; [`Connection::close`] therefore never leaves
//! statements behind.

mod functions;
mod hooks;
mod transaction;

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::path::Path;
use std::ptr;
use std::sync::{Arc, Mutex};

use rusqlite::ffi;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use hooks::Operation;
pub use transaction::TransactionMode;

use crate::cursor::Cursor;
use crate::db::{DbError, Result};
use crate::engine::Capabilities;
use crate::query::{CompiledQuery, Query};
use crate::row::{FromRow, Row};
use crate::statement::Statement;
use crate::value::{FromValue, Value};

/// How a database file is opened. Serialized with the `mode=` URL names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OpenMode {
    /// Read-write, creating the file if missing.
    #[default]
    #[serde(rename = "rwc")]
    ReadWriteCreate,
    /// Read-write; the file must already exist.
    #[serde(rename = "rw")]
    ReadWrite,
    #[serde(rename = "ro")]
    ReadOnly,
}

impl OpenMode {
    fn flags(&self) -> c_int {
        let base = match self {
            OpenMode::ReadWriteCreate => ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE,
            OpenMode::ReadWrite => ffi::SQLITE_OPEN_READWRITE,
            OpenMode::ReadOnly => ffi::SQLITE_OPEN_READONLY,
        };
        base | ffi::SQLITE_OPEN_FULLMUTEX | ffi::SQLITE_OPEN_URI
    }
}

/// A database handle that may cross threads.
struct RawDb(*mut ffi::sqlite3);

// SAFETY: the handle is opened with SQLITE_OPEN_FULLMUTEX, and the only
// cross-thread use is sqlite3_interrupt, which is documented as thread-safe.
unsafe impl Send for RawDb {}

/// Interrupts long-running statements on a connection from another thread.
///
/// Remains valid after the connection closes; interrupting then does nothing.
#[derive(Clone)]
pub struct InterruptHandle {
    db: Arc<Mutex<RawDb>>,
}

impl InterruptHandle {
    pub fn interrupt(&self) {
        let db = self.db.lock().unwrap_or_else(|e| e.into_inner());
        if !db.0.is_null() {
            unsafe { ffi::sqlite3_interrupt(db.0) };
        }
    }
}

pub struct Connection {
    db: *mut ffi::sqlite3,
    path: String,
    interrupt: Arc<Mutex<RawDb>>,
    hooks: RefCell<hooks::Hooks>,
}

// SAFETY: the handle is serialized by SQLite's own mutex, and every installed
// callback is required to be Send.
unsafe impl Send for Connection {}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("path", &self.path)
            .field("closed", &self.db.is_null())
            .finish()
    }
}

impl Connection {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_flags(path, OpenMode::default())
    }

    /// A private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::open_with_flags(":memory:", OpenMode::default())
    }

    /// A private on-disk database deleted when the connection closes.
    pub fn open_temporary() -> Result<Self> {
        Self::open_with_flags("", OpenMode::default())
    }

    pub fn open_with_flags(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self> {
        let display = path.as_ref().display().to_string();
        let c_path = path_to_cstring(path.as_ref())?;
        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        let rc = unsafe { ffi::sqlite3_open_v2(c_path.as_ptr(), &mut db, mode.flags(), ptr::null()) };
        if rc != ffi::SQLITE_OK {
            let message = if db.is_null() {
                errstr(rc)
            } else {
                let message = errmsg(db);
                unsafe { ffi::sqlite3_close_v2(db) };
                message
            };
            return Err(DbError::OpenFailed {
                path: display,
                message,
            });
        }
        let opened_path = &display;
        debug!(path = %opened_path, ?mode, "opened database");
        Ok(Self {
            db,
            path: display,
            interrupt: Arc::new(Mutex::new(RawDb(db))),
            hooks: RefCell::new(hooks::Hooks::default()),
        })
    }

    /// Path (or `:memory:`) the connection was opened with.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.db.is_null()
    }

    pub(crate) fn raw(&self) -> Result<*mut ffi::sqlite3> {
        if self.db.is_null() {
            Err(DbError::Closed {
                resource: "connection",
            })
        } else {
            Ok(self.db)
        }
    }

    /// Build an engine error from the connection's current error state.
    pub(crate) fn engine_error(&self, rc: c_int, sql: Option<&str>) -> DbError {
        let (extended_code, message) = if self.db.is_null() {
            (rc, errstr(rc))
        } else {
            (unsafe { ffi::sqlite3_extended_errcode(self.db) }, errmsg(self.db))
        };
        DbError::Engine {
            code: rc & 0xff,
            extended_code,
            message,
            sql: sql.map(str::to_string),
        }
    }

    /// Close the handle. Idempotent; operations afterwards fail with
    /// [`DbError::Closed`].
    pub fn close(&mut self) -> Result<()> {
        if self.db.is_null() {
            return Ok(());
        }
        self.uninstall_hooks();
        {
            let mut shared = self.interrupt.lock().unwrap_or_else(|e| e.into_inner());
            shared.0 = ptr::null_mut();
        }
        let rc = unsafe { ffi::sqlite3_close_v2(self.db) };
        let db = std::mem::replace(&mut self.db, ptr::null_mut());
        if rc != ffi::SQLITE_OK {
            return Err(DbError::Engine {
                code: rc & 0xff,
                extended_code: rc,
                message: errmsg(db),
                sql: None,
            });
        }
        debug!(path = %self.path, "closed database");
        Ok(())
    }

    /// Compile the first statement in `sql`.
    pub fn prepare(&self, sql: &str) -> Result<Statement<'_>> {
        let db = self.raw()?;
        let len = c_int::try_from(sql.len()).map_err(|_| DbError::InvalidString {
            message: "SQL text too long".into(),
        })?;
        let mut raw: *mut ffi::sqlite3_stmt = ptr::null_mut();
        let rc = unsafe {
            ffi::sqlite3_prepare_v2(db, sql.as_ptr() as *const c_char, len, &mut raw, ptr::null_mut())
        };
        if rc != ffi::SQLITE_OK {
            return Err(self.engine_error(rc, Some(sql)));
        }
        if raw.is_null() {
            return Err(DbError::StatementCreation { sql: sql.to_string() });
        }
        debug!(sql, "prepared statement");
        Ok(Statement::new(self, raw, sql))
    }

    /// Run every statement in `sql`, in order, discarding rows.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        let db = self.raw()?;
        let c_sql = CString::new(sql).map_err(|e| DbError::InvalidString {
            message: e.to_string(),
        })?;
        let mut tail: *const c_char = c_sql.as_ptr();
        loop {
            let rest = unsafe { CStr::from_ptr(tail) };
            if rest.to_bytes().iter().all(u8::is_ascii_whitespace) {
                return Ok(());
            }
            let mut raw: *mut ffi::sqlite3_stmt = ptr::null_mut();
            let mut next: *const c_char = ptr::null();
            let rc = unsafe { ffi::sqlite3_prepare_v2(db, tail, -1, &mut raw, &mut next) };
            let text = rest.to_string_lossy();
            if rc != ffi::SQLITE_OK {
                return Err(self.engine_error(rc, Some(text.trim())));
            }
            // A comment-only remainder prepares to no statement.
            if !raw.is_null() {
                let consumed = (next as usize).saturating_sub(tail as usize);
                let statement_sql = text.get(..consumed).unwrap_or(&text).trim().to_string();
                Statement::new(self, raw, &statement_sql).execute()?;
            }
            if next.is_null() || next == tail {
                return Ok(());
            }
            tail = next;
        }
    }

    /// Run one statement with positional parameters; returns the number of
    /// changed rows. The statement is finalized on every path.
    pub fn exec(&self, sql: &str, params: &[Value]) -> Result<usize> {
        let mut stmt = self.prepare(sql)?;
        let outcome = if params.is_empty() {
            stmt.execute()
        } else {
            stmt.update(params)
        };
        stmt.finalize();
        outcome.map(|_| self.changes())
    }

    /// Prepare a compiled query with its bindings applied.
    pub fn prepare_query(&self, query: &CompiledQuery) -> Result<Statement<'_>> {
        let mut stmt = self.prepare(&query.sql)?;
        stmt.bind(&query.bindings)?;
        Ok(stmt)
    }

    /// A lazy cursor of rows.
    pub fn query(&self, sql: &str, params: &[Value]) -> Result<Cursor<'_, Row>> {
        let mut stmt = self.prepare(sql)?;
        stmt.bind(params)?;
        Ok(stmt.into_rows())
    }

    pub fn query_rows(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.query(sql, params)?.collect()
    }

    pub fn query_as<T: FromRow>(&self, sql: &str, params: &[Value]) -> Result<Vec<T>> {
        self.query(sql, params)?
            .map(|row| row.and_then(|row| T::from_row(&row)))
            .collect()
    }

    /// Every row of a built query.
    pub fn fetch(&self, query: &Query) -> Result<Vec<Row>> {
        self.prepare_query(&query.compile())?.into_rows().collect()
    }

    /// The first column of every row.
    pub fn pluck<T: FromValue>(&self, sql: &str, params: &[Value]) -> Result<Vec<T>> {
        let mut stmt = self.prepare(sql)?;
        stmt.bind(params)?;
        stmt.into_cursor(|s| s.get::<T>(0)).collect()
    }

    /// First column of the first row, `None` when there are no rows.
    pub fn scalar<T: FromValue>(&self, sql: &str, params: &[Value]) -> Result<Option<T>> {
        self.prepare(sql)?.scalar(params)
    }

    /// Number of rows a query returns.
    pub fn count(&self, query: &Query) -> Result<i64> {
        let counted = query.count().compile();
        Ok(self
            .prepare(&counted.sql)?
            .scalar::<i64>(&counted.bindings)?
            .unwrap_or(0))
    }

    /// Run a compiled write; returns the number of changed rows.
    pub fn run(&self, query: &CompiledQuery) -> Result<usize> {
        self.exec(&query.sql, &query.bindings)
    }

    /// Run a compiled insert; returns the new row's rowid.
    pub fn run_insert(&self, query: &CompiledQuery) -> Result<i64> {
        self.run(query)?;
        Ok(self.last_insert_rowid())
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle {
            db: Arc::clone(&self.interrupt),
        }
    }

    pub fn set_busy_timeout(&self, millis: u32) -> Result<()> {
        let db = self.raw()?;
        let millis = c_int::try_from(millis).unwrap_or(c_int::MAX);
        let rc = unsafe { ffi::sqlite3_busy_timeout(db, millis) };
        if rc != ffi::SQLITE_OK {
            return Err(self.engine_error(rc, None));
        }
        Ok(())
    }

    /// Rowid of the most recent successful insert; 0 when closed or none.
    pub fn last_insert_rowid(&self) -> i64 {
        self.raw().map(|db| unsafe { ffi::sqlite3_last_insert_rowid(db) }).unwrap_or(0)
    }

    /// Rows changed by the most recent INSERT, UPDATE or DELETE.
    pub fn changes(&self) -> usize {
        self.raw()
            .map(|db| unsafe { ffi::sqlite3_changes(db) }.max(0) as usize)
            .unwrap_or(0)
    }

    pub fn total_changes(&self) -> usize {
        self.raw()
            .map(|db| unsafe { ffi::sqlite3_total_changes(db) }.max(0) as usize)
            .unwrap_or(0)
    }

    /// False while a transaction is open.
    pub fn is_autocommit(&self) -> bool {
        self.raw()
            .map(|db| unsafe { ffi::sqlite3_get_autocommit(db) } != 0)
            .unwrap_or(true)
    }

    pub fn is_readonly(&self) -> Result<bool> {
        let db = self.raw()?;
        let rc = unsafe { ffi::sqlite3_db_readonly(db, c"main".as_ptr()) };
        Ok(rc == 1)
    }

    pub fn user_version(&self) -> Result<i64> {
        Ok(self.scalar::<i64>("PRAGMA user_version", &[])?.unwrap_or(0))
    }

    pub fn set_user_version(&self, version: i64) -> Result<()> {
        self.execute_batch(&format!("PRAGMA user_version = {}", version))
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::current()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, path = %self.path, "failed to close database");
        }
    }
}

fn errmsg(db: *mut ffi::sqlite3) -> String {
    let msg = unsafe { ffi::sqlite3_errmsg(db) };
    if msg.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned()
}

fn errstr(rc: c_int) -> String {
    let msg = unsafe { ffi::sqlite3_errstr(rc) };
    if msg.is_null() {
        return format!("error code {}", rc);
    }
    unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned()
}

fn path_to_cstring(path: &Path) -> Result<CString> {
    let text = path.to_str().ok_or_else(|| DbError::InvalidString {
        message: format!("path is not valid UTF-8: {}", path.display()),
    })?;
    CString::new(text).map_err(|e| DbError::InvalidString {
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_mem_db;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn conn() -> Connection {
        open_mem_db().expect("Failed to create in-memory DB")
    }

    #[rstest]
    fn test_close_is_idempotent(mut conn: Connection) {
        conn.close().unwrap();
        conn.close().unwrap();
        assert!(conn.is_closed());
        assert_eq!(
            conn.prepare("SELECT 1").unwrap_err(),
            DbError::Closed { resource: "connection" }
        );
        assert_eq!(conn.changes(), 0);
    }

    #[rstest]
    fn test_execute_batch_runs_every_statement(conn: Connection) {
        conn.execute_batch(
            "CREATE TABLE t (x INTEGER);\n INSERT INTO t VALUES (1);\n INSERT INTO t VALUES (2); -- trailing comment\n",
        )
        .unwrap();
        assert_eq!(conn.scalar::<i64>("SELECT sum(x) FROM t", &[]).unwrap(), Some(3));
    }

    #[rstest]
    fn test_execute_batch_reports_failing_statement(conn: Connection) {
        let err = conn.execute_batch("CREATE TABLE a (x); SELEC 1;").unwrap_err();
        assert!(matches!(err, DbError::Engine { ref sql, .. } if sql.as_deref() == Some("SELEC 1;")));
    }

    #[rstest]
    fn test_empty_statement_has_no_handle(conn: Connection) {
        assert_eq!(
            conn.prepare("  -- nothing").unwrap_err(),
            DbError::StatementCreation { sql: "  -- nothing".into() }
        );
    }

    #[rstest]
    fn test_exec_counts_changes(conn: Connection) {
        conn.execute_batch("CREATE TABLE t (x INTEGER)").unwrap();
        assert_eq!(conn.exec("INSERT INTO t VALUES (?), (?)", &[1.into(), 2.into()]).unwrap(), 2);
        assert_eq!(conn.exec("UPDATE t SET x = x + 1", &[]).unwrap(), 2);
        assert_eq!(conn.last_insert_rowid(), 2);
        assert_eq!(conn.total_changes(), 4);
    }

    #[rstest]
    fn test_query_helpers(conn: Connection) {
        conn.execute_batch("CREATE TABLE t (id INTEGER, name TEXT); INSERT INTO t VALUES (1, 'a'), (2, 'b');")
            .unwrap();
        let names: Vec<String> = conn.pluck("SELECT name FROM t ORDER BY id", &[]).unwrap();
        assert_eq!(names, vec!["a", "b"]);
        let pairs: Vec<(i64, String)> = conn.query_as("SELECT id, name FROM t WHERE id > ?", &[1.into()]).unwrap();
        assert_eq!(pairs, vec![(2, "b".to_string())]);
        assert_eq!(conn.count(&Query::table("t")).unwrap(), 2);
        assert_eq!(conn.scalar::<i64>("SELECT id FROM t WHERE id > 5", &[]).unwrap(), None);
    }

    #[rstest]
    fn test_read_only_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ro.sqlite");
        Connection::open(&path).unwrap().execute_batch("CREATE TABLE t (x)").unwrap();

        let ro = Connection::open_with_flags(&path, OpenMode::ReadOnly).unwrap();
        assert!(ro.is_readonly().unwrap());
        let err = ro.exec("INSERT INTO t VALUES (1)", &[]).unwrap_err();
        assert_eq!(err.code(), Some(ffi::SQLITE_READONLY));
    }

    #[rstest]
    fn test_open_missing_file_read_write_fails() {
        let dir = TempDir::new().unwrap();
        let err = Connection::open_with_flags(dir.path().join("nope.sqlite"), OpenMode::ReadWrite).unwrap_err();
        assert!(matches!(err, DbError::OpenFailed { .. }));
    }

    #[rstest]
    fn test_user_version(conn: Connection) {
        assert_eq!(conn.user_version().unwrap(), 0);
        conn.set_user_version(7).unwrap();
        assert_eq!(conn.user_version().unwrap(), 7);
    }

    #[rstest]
    fn test_interrupt_handle_outlives_connection(mut conn: Connection) {
        let handle = conn.interrupt_handle();
        conn.close().unwrap();
        handle.interrupt();
    }

    #[rstest]
    fn test_temporary_database() {
        let conn = Connection::open_temporary().unwrap();
        conn.execute_batch("CREATE TABLE t (x)").unwrap();
        assert_eq!(conn.path(), "");
    }
}
