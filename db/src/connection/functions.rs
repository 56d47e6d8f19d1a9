//! Application-defined scalar SQL functions.

use std::ffi::CString;
use std::os::raw::{c_char, c_int, c_void};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Mutex;

use regex::Regex;
use rusqlite::ffi;
use tracing::debug;

use super::Connection;
use crate::db::{DbError, Result};
use crate::value::{raw_bytes, RawValue, Value};

type ScalarFn = Box<dyn Fn(&[Value]) -> Result<Value> + Send>;

struct UserFunction {
    name: String,
    call: ScalarFn,
}

/// One argument of the function call in progress.
struct Argument(*mut ffi::sqlite3_value);

impl RawValue for Argument {
    fn type_code(&self) -> c_int {
        unsafe { ffi::sqlite3_value_type(self.0) }
    }

    fn integer(&self) -> i64 {
        unsafe { ffi::sqlite3_value_int64(self.0) }
    }

    fn real(&self) -> f64 {
        unsafe { ffi::sqlite3_value_double(self.0) }
    }

    fn text(&self) -> &[u8] {
        unsafe {
            let data = ffi::sqlite3_value_text(self.0);
            raw_bytes(data, ffi::sqlite3_value_bytes(self.0))
        }
    }

    fn blob(&self) -> &[u8] {
        unsafe {
            let data = ffi::sqlite3_value_blob(self.0) as *const u8;
            raw_bytes(data, ffi::sqlite3_value_bytes(self.0))
        }
    }
}

unsafe fn set_result(ctx: *mut ffi::sqlite3_context, value: &Value) {
    unsafe {
        match value {
            Value::Integer(i) => ffi::sqlite3_result_int64(ctx, *i),
            Value::Real(f) => ffi::sqlite3_result_double(ctx, *f),
            Value::Text(s) => match c_int::try_from(s.len()) {
                Ok(len) => ffi::sqlite3_result_text(
                    ctx,
                    s.as_ptr() as *const c_char,
                    len,
                    ffi::SQLITE_TRANSIENT(),
                ),
                Err(_) => ffi::sqlite3_result_error_toobig(ctx),
            },
            Value::Blob(b) if b.is_empty() => ffi::sqlite3_result_zeroblob(ctx, 0),
            Value::Blob(b) => match c_int::try_from(b.len()) {
                Ok(len) => ffi::sqlite3_result_blob(
                    ctx,
                    b.as_ptr() as *const c_void,
                    len,
                    ffi::SQLITE_TRANSIENT(),
                ),
                Err(_) => ffi::sqlite3_result_error_toobig(ctx),
            },
            Value::Null => ffi::sqlite3_result_null(ctx),
        }
    }
}

unsafe fn set_error(ctx: *mut ffi::sqlite3_context, message: &str) {
    let len = c_int::try_from(message.len()).unwrap_or(c_int::MAX);
    unsafe { ffi::sqlite3_result_error(ctx, message.as_ptr() as *const c_char, len) };
}

unsafe extern "C" fn call_trampoline(
    ctx: *mut ffi::sqlite3_context,
    argc: c_int,
    argv: *mut *mut ffi::sqlite3_value,
) {
    let function = unsafe { &*(ffi::sqlite3_user_data(ctx) as *const UserFunction) };
    let args: Vec<Value> = (0..argc.max(0) as usize)
        .map(|i| Value::from_raw(&Argument(unsafe { *argv.add(i) })))
        .collect();
    match catch_unwind(AssertUnwindSafe(|| (function.call)(&args))) {
        Ok(Ok(value)) => unsafe { set_result(ctx, &value) },
        Ok(Err(e)) => unsafe { set_error(ctx, &e.to_string()) },
        Err(_) => unsafe { set_error(ctx, &format!("function '{}' panicked", function.name)) },
    }
}

unsafe extern "C" fn destroy_trampoline(data: *mut c_void) {
    if !data.is_null() {
        drop(unsafe { Box::from_raw(data as *mut UserFunction) });
    }
}

impl Connection {
    /// Register a scalar function callable from SQL as `name(...)`.
    ///
    /// `argc` is the number of arguments, or `-1` for any. Mark pure
    /// functions `deterministic` so SQLite may use them in indexes and
    /// factor repeated calls. An `Err` returned from `f` fails the statement
    /// with the error's text.
    pub fn create_function<F>(&self, name: &str, argc: i32, deterministic: bool, f: F) -> Result<()>
    where
        F: Fn(&[Value]) -> Result<Value> + Send + 'static,
    {
        let db = self.raw()?;
        let c_name = CString::new(name).map_err(|e| DbError::InvalidString {
            message: e.to_string(),
        })?;
        let mut flags = ffi::SQLITE_UTF8;
        if deterministic {
            flags |= ffi::SQLITE_DETERMINISTIC;
        }
        let data = Box::into_raw(Box::new(UserFunction {
            name: name.to_string(),
            call: Box::new(f),
        }));
        // SQLite invokes the destructor itself when registration fails.
        let rc = unsafe {
            ffi::sqlite3_create_function_v2(
                db,
                c_name.as_ptr(),
                argc,
                flags,
                data as *mut c_void,
                Some(call_trampoline),
                None,
                None,
                Some(destroy_trampoline),
            )
        };
        if rc != ffi::SQLITE_OK {
            return Err(self.engine_error(rc, None));
        }
        debug!(function = name, argc, "registered function");
        Ok(())
    }

    /// Register `regexp(pattern, text)` so that `text REGEXP pattern` works.
    ///
    /// The most recently compiled pattern is cached; NULL in either
    /// argument yields NULL.
    pub fn enable_regexp(&self) -> Result<()> {
        let cache: Mutex<Option<Regex>> = Mutex::new(None);
        self.create_function("regexp", 2, true, move |args| {
            let (pattern, text) = match (&args[0], &args[1]) {
                (Value::Null, _) | (_, Value::Null) => return Ok(Value::Null),
                (Value::Text(p), Value::Text(t)) => (p.as_str(), t.as_str()),
                (p, t) => {
                    return Err(DbError::Function {
                        name: "regexp".into(),
                        message: format!(
                            "expected text arguments, got {} and {}",
                            p.column_type(),
                            t.column_type()
                        ),
                    });
                }
            };
            let mut cached = cache.lock().unwrap_or_else(|e| e.into_inner());
            let regex = match cached.take() {
                Some(regex) if regex.as_str() == pattern => regex,
                _ => Regex::new(pattern).map_err(|e| DbError::Function {
                    name: "regexp".into(),
                    message: e.to_string(),
                })?,
            };
            let matched = regex.is_match(text);
            *cached = Some(regex);
            Ok(Value::Integer(matched as i64))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_mem_db;
    use rstest::{fixture, rstest};

    #[fixture]
    fn conn() -> Connection {
        let conn = open_mem_db().expect("Failed to create in-memory DB");
        conn.enable_regexp().unwrap();
        conn
    }

    #[rstest]
    #[case::matches("SELECT 'abc123' REGEXP '^[a-z]+[0-9]+$'", Value::Integer(1))]
    #[case::no_match("SELECT 'abc' REGEXP '^[0-9]+$'", Value::Integer(0))]
    #[case::null_text("SELECT NULL REGEXP 'a'", Value::Null)]
    #[case::null_pattern("SELECT 'a' REGEXP NULL", Value::Null)]
    fn test_regexp(conn: Connection, #[case] sql: &str, #[case] expected: Value) {
        let value: Option<Value> = conn.scalar(sql, &[]).unwrap();
        assert_eq!(value, Some(expected));
    }

    #[rstest]
    fn test_regexp_bad_pattern(conn: Connection) {
        let err = conn.scalar::<i64>("SELECT 'a' REGEXP '('", &[]).unwrap_err();
        assert!(err.to_string().contains("regexp"), "got {}", err);
    }

    #[rstest]
    fn test_round_trips_every_variant(conn: Connection) {
        conn.create_function("echo", 1, true, |args| Ok(args[0].clone()))
            .unwrap();
        for value in [
            Value::Integer(-3),
            Value::Real(1.5),
            Value::Text("héllo".into()),
            Value::Blob(vec![0, 1, 2]),
            Value::Blob(Vec::new()),
            Value::Null,
        ] {
            let back: Option<Value> = conn.scalar("SELECT echo(?)", &[value.clone()]).unwrap();
            assert_eq!(back, Some(value));
        }
    }

    #[rstest]
    fn test_variadic(conn: Connection) {
        conn.create_function("argc", -1, true, |args| Ok(Value::Integer(args.len() as i64)))
            .unwrap();
        let n: Option<i64> = conn.scalar("SELECT argc(1, 2, 3)", &[]).unwrap();
        assert_eq!(n, Some(3));
    }

    #[rstest]
    fn test_wrong_arity_is_engine_error(conn: Connection) {
        let err = conn.scalar::<i64>("SELECT regexp('a')", &[]).unwrap_err();
        assert_eq!(err.code(), Some(ffi::SQLITE_ERROR));
    }

    #[rstest]
    fn test_interior_nul_name(conn: Connection) {
        let err = conn
            .create_function("bad\0name", 0, false, |_| Ok(Value::Null))
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidString { .. }));
    }
}
