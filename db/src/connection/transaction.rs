//! Transactions, savepoints and the connection mutex.

use rusqlite::ffi;
use tracing::{debug, warn};

use super::Connection;
use crate::db::DbError;
use crate::escape::quote_identifier;

/// How `BEGIN` acquires locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionMode {
    /// Run the body without a transaction.
    None,
    #[default]
    Deferred,
    Immediate,
    Exclusive,
}

impl TransactionMode {
    fn begin_sql(&self) -> Option<&'static str> {
        match self {
            TransactionMode::None => None,
            TransactionMode::Deferred => Some("BEGIN DEFERRED TRANSACTION"),
            TransactionMode::Immediate => Some("BEGIN IMMEDIATE TRANSACTION"),
            TransactionMode::Exclusive => Some("BEGIN EXCLUSIVE TRANSACTION"),
        }
    }
}

/// Holds the connection's native mutex until dropped.
struct MutexGuard(*mut ffi::sqlite3_mutex);

impl MutexGuard {
    fn enter(db: *mut ffi::sqlite3) -> Self {
        let mutex = unsafe { ffi::sqlite3_db_mutex(db) };
        if !mutex.is_null() {
            unsafe { ffi::sqlite3_mutex_enter(mutex) };
        }
        Self(mutex)
    }
}

impl Drop for MutexGuard {
    fn drop(&mut self) {
        if !self.0.is_null() {
            unsafe { ffi::sqlite3_mutex_leave(self.0) };
        }
    }
}

impl Connection {
    /// Run `body` inside `BEGIN <mode> TRANSACTION`.
    ///
    /// Commits when `body` returns `Ok`. On `Err` the transaction is rolled
    /// back and the body's error returned; a rollback that itself fails is
    /// logged and does not replace it. [`TransactionMode::None`] runs `body`
    /// directly.
    ///
    /// ```
    /// use litequery::{Connection, DbError, TransactionMode};
    ///
    /// let conn = Connection::open_in_memory().unwrap();
    /// conn.execute_batch("CREATE TABLE t (x)").unwrap();
    /// let outcome: Result<(), DbError> = conn.transaction(TransactionMode::Deferred, |c| {
    ///     c.exec("INSERT INTO t VALUES (1)", &[])?;
    ///     c.exec("INSERT INTO nope VALUES (1)", &[])?;
    ///     Ok(())
    /// });
    /// assert!(outcome.is_err());
    /// assert_eq!(conn.scalar::<i64>("SELECT count(*) FROM t", &[]).unwrap(), Some(0));
    /// ```
    pub fn transaction<T, E, F>(&self, mode: TransactionMode, body: F) -> Result<T, E>
    where
        E: From<DbError>,
        F: FnOnce(&Connection) -> Result<T, E>,
    {
        let Some(begin) = mode.begin_sql() else {
            return body(self);
        };
        self.execute_batch(begin)?;
        debug!(?mode, "began transaction");
        match body(self) {
            Ok(value) => {
                if let Err(e) = self.execute_batch("COMMIT TRANSACTION") {
                    self.rollback_quietly("ROLLBACK TRANSACTION");
                    return Err(e.into());
                }
                debug!("committed transaction");
                Ok(value)
            }
            Err(e) => {
                self.rollback_quietly("ROLLBACK TRANSACTION");
                debug!("rolled back transaction");
                Err(e)
            }
        }
    }

    /// Run `body` inside a named savepoint, which nests inside an open
    /// transaction or starts one.
    pub fn savepoint<T, E, F>(&self, name: &str, body: F) -> Result<T, E>
    where
        E: From<DbError>,
        F: FnOnce(&Connection) -> Result<T, E>,
    {
        let name = quote_identifier(name);
        self.execute_batch(&format!("SAVEPOINT {}", name))?;
        debug!(savepoint = %name, "opened savepoint");
        match body(self) {
            Ok(value) => {
                self.execute_batch(&format!("RELEASE SAVEPOINT {}", name))?;
                debug!(savepoint = %name, "released savepoint");
                Ok(value)
            }
            Err(e) => {
                self.rollback_quietly(&format!(
                    "ROLLBACK TRANSACTION TO SAVEPOINT {name}; RELEASE SAVEPOINT {name}"
                ));
                debug!(savepoint = %name, "rolled back savepoint");
                Err(e)
            }
        }
    }

    /// Run `body` while holding the connection's native mutex, so that no
    /// other thread using the same handle interleaves with it.
    pub fn mutex<T, E, F>(&self, body: F) -> Result<T, E>
    where
        E: From<DbError>,
        F: FnOnce(&Connection) -> Result<T, E>,
    {
        let db = self.raw()?;
        let _guard = MutexGuard::enter(db);
        body(self)
    }

    fn rollback_quietly(&self, sql: &str) {
        if let Err(e) = self.execute_batch(sql) {
            warn!(error = %e, sql, "rollback failed");
        }
    }
}
