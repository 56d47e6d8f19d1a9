//! Trace and update-notification hooks.
//!
//! SQLite holds a single slot for each hook per connection. The boxed
//! callback lives in [`Hooks`] and its address is handed to SQLite as the
//! hook's context pointer; the box is only dropped after SQLite has been
//! pointed at its replacement (or at nothing).

use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_uint, c_void};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;

use rusqlite::ffi;
use tracing::debug;

use super::Connection;
use crate::db::Result;

type TraceCallback = Box<dyn FnMut(&str) + Send>;
type UpdateCallback = Box<dyn FnMut(Operation, i64, &str, &str) + Send>;

/// Kind of row change reported to an update hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Insert,
    Delete,
    Update,
}

impl Operation {
    fn from_code(code: c_int) -> Option<Self> {
        match code {
            ffi::SQLITE_INSERT => Some(Operation::Insert),
            ffi::SQLITE_DELETE => Some(Operation::Delete),
            ffi::SQLITE_UPDATE => Some(Operation::Update),
            _ => None,
        }
    }
}

#[derive(Default)]
pub(crate) struct Hooks {
    trace: Option<Box<TraceCallback>>,
    update: Option<Box<UpdateCallback>>,
}

unsafe extern "C" fn trace_trampoline(
    _mask: c_uint,
    ctx: *mut c_void,
    stmt: *mut c_void,
    text: *mut c_void,
) -> c_int {
    if ctx.is_null() {
        return 0;
    }
    let sql = unsafe {
        let expanded = ffi::sqlite3_expanded_sql(stmt as *mut ffi::sqlite3_stmt);
        if expanded.is_null() {
            if text.is_null() {
                return 0;
            }
            CStr::from_ptr(text as *const c_char).to_string_lossy().into_owned()
        } else {
            let sql = CStr::from_ptr(expanded).to_string_lossy().into_owned();
            ffi::sqlite3_free(expanded as *mut c_void);
            sql
        }
    };
    let callback = unsafe { &mut *(ctx as *mut TraceCallback) };
    let _ = catch_unwind(AssertUnwindSafe(|| callback(&sql)));
    0
}

unsafe extern "C" fn update_trampoline(
    ctx: *mut c_void,
    op: c_int,
    db_name: *const c_char,
    table: *const c_char,
    rowid: ffi::sqlite3_int64,
) {
    let Some(operation) = Operation::from_code(op) else {
        return;
    };
    if ctx.is_null() {
        return;
    }
    let (db_name, table) = unsafe { (lossy(db_name), lossy(table)) };
    let callback = unsafe { &mut *(ctx as *mut UpdateCallback) };
    let _ = catch_unwind(AssertUnwindSafe(|| callback(operation, rowid, &db_name, &table)));
}

unsafe fn lossy(text: *const c_char) -> String {
    if text.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(text) }.to_string_lossy().into_owned()
    }
}

impl Connection {
    /// Install a callback receiving the expanded SQL of every statement as
    /// it starts executing. `None` removes the current one.
    pub fn trace<F>(&self, callback: Option<F>) -> Result<()>
    where
        F: FnMut(&str) + Send + 'static,
    {
        let db = self.raw()?;
        let mut hooks = self.hooks.borrow_mut();
        match callback {
            Some(f) => {
                let mut boxed: Box<TraceCallback> = Box::new(Box::new(f));
                let ctx = &mut *boxed as *mut TraceCallback as *mut c_void;
                unsafe {
                    ffi::sqlite3_trace_v2(db, ffi::SQLITE_TRACE_STMT as c_uint, Some(trace_trampoline), ctx);
                }
                hooks.trace = Some(boxed);
                debug!("installed trace hook");
            }
            None => {
                unsafe { ffi::sqlite3_trace_v2(db, 0, None, ptr::null_mut()) };
                hooks.trace = None;
            }
        }
        Ok(())
    }

    /// Install a callback notified of every row inserted, updated or
    /// deleted in a rowid table, with the row id, database name and table
    /// name. `None` removes the current one.
    pub fn update_hook<F>(&self, callback: Option<F>) -> Result<()>
    where
        F: FnMut(Operation, i64, &str, &str) + Send + 'static,
    {
        let db = self.raw()?;
        let mut hooks = self.hooks.borrow_mut();
        match callback {
            Some(f) => {
                let mut boxed: Box<UpdateCallback> = Box::new(Box::new(f));
                let ctx = &mut *boxed as *mut UpdateCallback as *mut c_void;
                unsafe { ffi::sqlite3_update_hook(db, Some(update_trampoline), ctx) };
                hooks.update = Some(boxed);
                debug!("installed update hook");
            }
            None => {
                unsafe { ffi::sqlite3_update_hook(db, None, ptr::null_mut()) };
                hooks.update = None;
            }
        }
        Ok(())
    }

    /// Detach both hooks from the native handle and drop their callbacks.
    pub(crate) fn uninstall_hooks(&self) {
        let mut hooks = self.hooks.borrow_mut();
        if let Ok(db) = self.raw() {
            unsafe {
                if hooks.trace.is_some() {
                    ffi::sqlite3_trace_v2(db, 0, None, ptr::null_mut());
                }
                if hooks.update.is_some() {
                    ffi::sqlite3_update_hook(db, None, ptr::null_mut());
                }
            }
        }
        hooks.trace = None;
        hooks.update = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_mem_db;
    use crate::value::Value;
    use std::sync::{Arc, Mutex};

    type Changes = Arc<Mutex<Vec<(Operation, i64, String, String)>>>;

    fn record_changes(conn: &Connection) -> Changes {
        let seen: Changes = Arc::default();
        let sink = Arc::clone(&seen);
        conn.update_hook(Some(move |op, rowid, db: &str, table: &str| {
            sink.lock().unwrap().push((op, rowid, db.to_string(), table.to_string()));
        }))
        .unwrap();
        seen
    }

    #[test]
    fn test_trace_sees_expanded_sql() {
        let conn = open_mem_db().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        conn.trace(Some(move |sql: &str| sink.lock().unwrap().push(sql.to_string())))
            .unwrap();
        conn.exec("SELECT ?", &[Value::Text("it's".into())]).unwrap();
        assert_eq!(seen.lock().unwrap().as_slice(), ["SELECT 'it''s'"]);
    }

    #[test]
    fn test_trace_uninstall() {
        let conn = open_mem_db().unwrap();
        let seen = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&seen);
        conn.trace(Some(move |_: &str| *sink.lock().unwrap() += 1)).unwrap();
        conn.execute_batch("SELECT 1").unwrap();
        conn.trace(None::<fn(&str)>).unwrap();
        conn.execute_batch("SELECT 2").unwrap();
        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[test]
    fn test_update_hook_reports_each_change() {
        let conn = open_mem_db().unwrap();
        conn.execute_batch("CREATE TABLE t (x)").unwrap();
        let seen = record_changes(&conn);
        conn.execute_batch(
            "INSERT INTO t VALUES (1); UPDATE t SET x = 2 WHERE rowid = 1; DELETE FROM t WHERE x = 2;",
        )
        .unwrap();
        let seen = seen.lock().unwrap();
        let ops: Vec<_> = seen.iter().map(|(op, rowid, _, _)| (*op, *rowid)).collect();
        assert_eq!(
            ops,
            vec![(Operation::Insert, 1), (Operation::Update, 1), (Operation::Delete, 1)]
        );
        assert_eq!((seen[0].2.as_str(), seen[0].3.as_str()), ("main", "t"));
    }

    #[test]
    fn test_new_update_hook_replaces_old() {
        let conn = open_mem_db().unwrap();
        conn.execute_batch("CREATE TABLE t (x)").unwrap();
        let first = record_changes(&conn);
        let second = record_changes(&conn);
        conn.execute_batch("INSERT INTO t VALUES (1)").unwrap();
        assert!(first.lock().unwrap().is_empty());
        assert_eq!(second.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_close_drops_hooks() {
        let mut conn = open_mem_db().unwrap();
        let seen = record_changes(&conn);
        conn.close().unwrap();
        assert_eq!(Arc::strong_count(&seen), 1);
        assert!(conn.update_hook(None::<fn(Operation, i64, &str, &str)>).is_err());
    }
}
