//! Prepared statements.
//!
//! A [`Statement`] owns one native statement handle. The handle moves
//! through bind, step and reset any number of times and is finalized exactly
//! once: explicitly through [`Statement::finalize`] or when the statement is
//! dropped. After finalization every operation except `finalize` itself
//! fails with [`DbError::Closed`].

use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_void};
use std::ptr;
use std::sync::Arc;

use rusqlite::ffi;
use tracing::trace;

use crate::connection::Connection;
use crate::cursor::Cursor;
use crate::db::{DbError, Result};
use crate::row::{ColumnIndex, Row, RowIndex};
use crate::value::{raw_bytes, ColumnType, FromValue, RawValue, Value};

/// One column of the row a statement is positioned on. Only built while the
/// statement is live and stepped onto a row.
struct ColumnCell {
    raw: *mut ffi::sqlite3_stmt,
    index: c_int,
}

impl RawValue for ColumnCell {
    fn type_code(&self) -> c_int {
        unsafe { ffi::sqlite3_column_type(self.raw, self.index) }
    }

    fn integer(&self) -> i64 {
        unsafe { ffi::sqlite3_column_int64(self.raw, self.index) }
    }

    fn real(&self) -> f64 {
        unsafe { ffi::sqlite3_column_double(self.raw, self.index) }
    }

    fn text(&self) -> &[u8] {
        unsafe {
            let data = ffi::sqlite3_column_text(self.raw, self.index);
            raw_bytes(data, ffi::sqlite3_column_bytes(self.raw, self.index))
        }
    }

    fn blob(&self) -> &[u8] {
        unsafe {
            let data = ffi::sqlite3_column_blob(self.raw, self.index) as *const u8;
            raw_bytes(data, ffi::sqlite3_column_bytes(self.raw, self.index))
        }
    }
}

pub struct Statement<'conn> {
    conn: &'conn Connection,
    raw: *mut ffi::sqlite3_stmt,
    sql: String,
    columns: Arc<ColumnIndex>,
}

impl std::fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("sql", &self.sql)
            .field("finalized", &self.raw.is_null())
            .finish()
    }
}

impl<'conn> Statement<'conn> {
    /// Wrap a freshly prepared, non-null handle.
    pub(crate) fn new(conn: &'conn Connection, raw: *mut ffi::sqlite3_stmt, sql: &str) -> Self {
        let count = unsafe { ffi::sqlite3_column_count(raw) }.max(0);
        let names = (0..count)
            .map(|i| {
                let name = unsafe { ffi::sqlite3_column_name(raw, i) };
                if name.is_null() {
                    String::new()
                } else {
                    unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned()
                }
            })
            .collect();
        Self {
            conn,
            raw,
            sql: sql.to_string(),
            columns: Arc::new(ColumnIndex::new(names)),
        }
    }

    fn live(&self) -> Result<*mut ffi::sqlite3_stmt> {
        if self.raw.is_null() {
            Err(DbError::Closed {
                resource: "statement",
            })
        } else {
            Ok(self.raw)
        }
    }

    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }

    /// SQL text as prepared.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// SQL text with the current bindings substituted as literals.
    pub fn expanded_sql(&self) -> Option<String> {
        let raw = self.live().ok()?;
        let expanded = unsafe { ffi::sqlite3_expanded_sql(raw) };
        if expanded.is_null() {
            return None;
        }
        let sql = unsafe { CStr::from_ptr(expanded) }.to_string_lossy().into_owned();
        unsafe { ffi::sqlite3_free(expanded as *mut c_void) };
        Some(sql)
    }

    pub fn is_finalized(&self) -> bool {
        self.raw.is_null()
    }

    pub fn bind_parameter_count(&self) -> usize {
        match self.live() {
            Ok(raw) => unsafe { ffi::sqlite3_bind_parameter_count(raw) }.max(0) as usize,
            Err(_) => 0,
        }
    }

    pub fn column_count(&self) -> usize {
        self.columns.names().len()
    }

    pub fn column_names(&self) -> &[String] {
        self.columns.names()
    }

    /// Bind `values` to positions `1..=n`, replacing any previous bindings.
    ///
    /// The statement is reset first, so a statement that was stepped (or
    /// failed) can be rebound directly.
    pub fn bind(&mut self, values: &[Value]) -> Result<()> {
        let raw = self.live()?;
        let expected = self.bind_parameter_count();
        if values.len() != expected {
            return Err(DbError::BindingCount {
                expected,
                actual: values.len(),
            });
        }
        unsafe {
            ffi::sqlite3_reset(raw);
            ffi::sqlite3_clear_bindings(raw);
        }
        for (i, value) in values.iter().enumerate() {
            let position = (i + 1) as c_int;
            let rc = bind_value(raw, position, value)?;
            if rc != ffi::SQLITE_OK {
                return Err(self.conn.engine_error(rc, Some(&self.sql)));
            }
        }
        trace!(sql = %self.sql, count = values.len(), "bound parameters");
        Ok(())
    }

    /// Advance to the next row. `Ok(true)` when a row is available,
    /// `Ok(false)` when the statement has run to completion.
    pub fn step(&mut self) -> Result<bool> {
        let raw = self.live()?;
        match unsafe { ffi::sqlite3_step(raw) } {
            ffi::SQLITE_ROW => Ok(true),
            ffi::SQLITE_DONE => Ok(false),
            rc => {
                trace!(sql = %self.sql, rc, "step failed");
                Err(self.conn.engine_error(rc, Some(&self.sql)))
            }
        }
    }

    /// Return to the pre-execution state, releasing any lock held by a
    /// partially stepped or failed execution. No-op once finalized.
    pub fn reset(&mut self, clear_bindings: bool) {
        if self.raw.is_null() {
            return;
        }
        unsafe {
            // The return code repeats the last step's error; the reset itself
            // cannot fail.
            ffi::sqlite3_reset(self.raw);
            if clear_bindings {
                ffi::sqlite3_clear_bindings(self.raw);
            }
        }
    }

    /// Release the native handle. Idempotent.
    pub fn finalize(&mut self) {
        if self.raw.is_null() {
            return;
        }
        unsafe {
            ffi::sqlite3_reset(self.raw);
            ffi::sqlite3_finalize(self.raw);
        }
        self.raw = ptr::null_mut();
        trace!(sql = %self.sql, "finalized statement");
    }

    /// Storage class of column `index` in the current row.
    pub fn column_type(&self, index: usize) -> ColumnType {
        match self.live() {
            Ok(raw) if index < self.column_count() => {
                ColumnType::from_code(unsafe { ffi::sqlite3_column_type(raw, index as c_int) })
            }
            _ => ColumnType::Null,
        }
    }

    /// Value of column `index` in the current row; NULL for an index out of range.
    pub fn column_value(&self, index: usize) -> Value {
        let raw = match self.live() {
            Ok(raw) if index < self.column_count() => raw,
            _ => return Value::Null,
        };
        Value::from_raw(&ColumnCell {
            raw,
            index: index as c_int,
        })
    }

    /// The current row, materialized.
    pub fn row(&self) -> Row {
        let values = (0..self.column_count()).map(|i| self.column_value(i)).collect();
        Row::new(Arc::clone(&self.columns), values)
    }

    /// Typed value of a column in the current row.
    pub fn get<T: FromValue>(&self, index: impl RowIndex) -> Result<T> {
        let i = index.position(self.columns.names(), |n| self.columns.position(n))?;
        let value = self.column_value(i);
        T::from_value(&value).ok_or_else(|| DbError::TypeMismatch {
            column: self.columns.names()[i].clone(),
            expected: T::EXPECTED,
            actual: value.column_type(),
        })
    }

    /// Bind and run to completion, discarding rows. The statement is reset
    /// afterwards whether or not execution failed.
    pub fn update(&mut self, params: &[Value]) -> Result<()> {
        let outcome = self.bind(params).and_then(|_| self.step_to_end());
        self.reset(false);
        outcome
    }

    /// Like [`update`](Self::update), returning the number of changed rows.
    pub fn run(&mut self, params: &[Value]) -> Result<usize> {
        self.update(params)?;
        Ok(self.conn.changes())
    }

    /// First column of the first row, or `None` when there are no rows.
    pub fn scalar<T: FromValue>(&mut self, params: &[Value]) -> Result<Option<T>> {
        let outcome = self.bind(params).and_then(|_| {
            if self.step()? {
                self.get::<T>(0).map(Some)
            } else {
                Ok(None)
            }
        });
        self.reset(false);
        outcome
    }

    /// Run to completion with the current bindings, then reset.
    pub(crate) fn execute(&mut self) -> Result<()> {
        let outcome = self.step_to_end();
        self.reset(false);
        outcome
    }

    fn step_to_end(&mut self) -> Result<()> {
        while self.step()? {}
        Ok(())
    }

    /// A cursor that owns this statement and materializes each row with `materialize`.
    pub fn into_cursor<T, F>(self, materialize: F) -> Cursor<'conn, T>
    where
        F: FnMut(&Statement<'conn>) -> Result<T> + 'conn,
    {
        Cursor::new(self, Box::new(materialize))
    }

    /// A cursor yielding [`Row`]s.
    pub fn into_rows(self) -> Cursor<'conn, Row> {
        self.into_cursor(|s| Ok(s.row()))
    }
}

impl Drop for Statement<'_> {
    fn drop(&mut self) {
        self.finalize();
    }
}

fn c_len(len: usize) -> Result<c_int> {
    c_int::try_from(len).map_err(|_| DbError::InvalidString {
        message: format!("value of {} bytes is too large to bind", len),
    })
}

/// Bind one value; returns the native result code.
fn bind_value(raw: *mut ffi::sqlite3_stmt, position: c_int, value: &Value) -> Result<c_int> {
    let rc = unsafe {
        match value {
            Value::Integer(i) => ffi::sqlite3_bind_int64(raw, position, *i),
            Value::Real(f) => ffi::sqlite3_bind_double(raw, position, *f),
            Value::Text(s) => ffi::sqlite3_bind_text(
                raw,
                position,
                s.as_ptr() as *const c_char,
                c_len(s.len())?,
                ffi::SQLITE_TRANSIENT(),
            ),
            // An empty blob is not NULL.
            Value::Blob(b) if b.is_empty() => ffi::sqlite3_bind_zeroblob(raw, position, 0),
            Value::Blob(b) => ffi::sqlite3_bind_blob(
                raw,
                position,
                b.as_ptr() as *const c_void,
                c_len(b.len())?,
                ffi::SQLITE_TRANSIENT(),
            ),
            Value::Null => ffi::sqlite3_bind_null(raw, position),
        }
    };
    Ok(rc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_mem_db;
    use rstest::{fixture, rstest};

    #[fixture]
    fn conn() -> Connection {
        open_mem_db().expect("Failed to create in-memory DB")
    }

    #[rstest]
    #[case(Value::Integer(i64::MIN))]
    #[case(Value::Real(-2.5))]
    #[case(Value::Text("héllo 'q'".into()))]
    #[case(Value::Blob(vec![0, 255, 7]))]
    #[case(Value::Blob(Vec::new()))]
    #[case(Value::Null)]
    fn test_value_round_trip(conn: Connection, #[case] value: Value) {
        let mut stmt = conn.prepare("SELECT ?").unwrap();
        stmt.bind(&[value.clone()]).unwrap();
        assert!(stmt.step().unwrap());
        assert_eq!(stmt.column_type(0), value.column_type());
        assert_eq!(stmt.column_value(0), value);
    }

    #[rstest]
    fn test_empty_blob_is_not_null(conn: Connection) {
        let mut stmt = conn.prepare("SELECT ? IS NULL, typeof(?)").unwrap();
        stmt.bind(&[Value::Blob(Vec::new()), Value::Blob(Vec::new())]).unwrap();
        assert!(stmt.step().unwrap());
        assert_eq!(stmt.get::<bool>(0).unwrap(), false);
        assert_eq!(stmt.get::<String>(1).unwrap(), "blob");
    }

    #[rstest]
    fn test_mismatched_accessor_is_absent(conn: Connection) {
        let mut stmt = conn.prepare("SELECT 'text'").unwrap();
        assert!(stmt.step().unwrap());
        assert_eq!(stmt.column_value(0).as_integer(), None);
        assert!(matches!(stmt.get::<i64>(0), Err(DbError::TypeMismatch { .. })));
    }

    #[rstest]
    fn test_out_of_range_column_is_null(conn: Connection) {
        let mut stmt = conn.prepare("SELECT 1").unwrap();
        assert!(stmt.step().unwrap());
        assert_eq!(stmt.column_value(5), Value::Null);
        assert_eq!(stmt.column_type(5), ColumnType::Null);
    }

    #[rstest]
    fn test_binding_count_is_checked(conn: Connection) {
        let mut stmt = conn.prepare("SELECT ?, ?").unwrap();
        assert_eq!(
            stmt.bind(&[Value::Integer(1)]).unwrap_err(),
            DbError::BindingCount { expected: 2, actual: 1 }
        );
    }

    #[rstest]
    fn test_finalize_is_idempotent_and_closes(conn: Connection) {
        let mut stmt = conn.prepare("SELECT 1").unwrap();
        stmt.finalize();
        stmt.finalize();
        assert!(stmt.is_finalized());
        assert_eq!(stmt.step().unwrap_err(), DbError::Closed { resource: "statement" });
        assert_eq!(stmt.bind(&[]).unwrap_err(), DbError::Closed { resource: "statement" });
        assert_eq!(stmt.column_value(0), Value::Null);
        stmt.reset(true);
    }

    #[rstest]
    fn test_rebinding_after_step(conn: Connection) {
        let mut stmt = conn.prepare("SELECT ? * 2").unwrap();
        assert_eq!(stmt.scalar::<i64>(&[Value::Integer(2)]).unwrap(), Some(4));
        assert_eq!(stmt.scalar::<i64>(&[Value::Integer(5)]).unwrap(), Some(10));
    }

    #[rstest]
    fn test_update_resets_after_error(conn: Connection) {
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY)").unwrap();
        let mut insert = conn.prepare("INSERT INTO t (id) VALUES (?)").unwrap();
        insert.update(&[Value::Integer(1)]).unwrap();
        let err = insert.update(&[Value::Integer(1)]).unwrap_err();
        assert!(err.is_constraint(), "got {:?}", err);
        assert_eq!(insert.run(&[Value::Integer(2)]).unwrap(), 1);
    }

    #[rstest]
    fn test_expanded_sql(conn: Connection) {
        let mut stmt = conn.prepare("SELECT ?, ?").unwrap();
        stmt.bind(&[Value::Integer(3), Value::Text("it's".into())]).unwrap();
        assert_eq!(stmt.expanded_sql().as_deref(), Some("SELECT 3, 'it''s'"));
        assert_eq!(stmt.sql(), "SELECT ?, ?");
    }

    #[rstest]
    fn test_column_names(conn: Connection) {
        let stmt = conn.prepare("SELECT 1 AS a, 2 AS b").unwrap();
        assert_eq!(stmt.column_names(), &["a".to_string(), "b".to_string()]);
        assert_eq!(stmt.bind_parameter_count(), 0);
    }
}
