//! The value model shared by bindings and result rows.
//!
//! SQLite stores every cell in one of five storage classes. `Value` mirrors
//! those classes exactly; typed access goes through the `as_*` accessors or
//! the [`FromValue`] trait, both of which report a mismatch as "no value"
//! rather than an error because mismatches are ordinary under dynamic typing.

use std::cmp::Ordering;
use std::fmt;
use std::os::raw::c_int;

use serde::{Serialize, Serializer};

use crate::escape::{quote_blob, quote_string};

/// Storage class of a column value as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    Blob,
    Null,
}

impl ColumnType {
    /// Declared type name used in DDL.
    pub fn sql_name(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
            ColumnType::Blob => "BLOB",
            ColumnType::Null => "NULL",
        }
    }

    /// Map a native `SQLITE_*` type code to a storage class.
    pub(crate) fn from_code(code: i32) -> Self {
        use rusqlite::ffi;
        match code {
            ffi::SQLITE_INTEGER => ColumnType::Integer,
            ffi::SQLITE_FLOAT => ColumnType::Real,
            ffi::SQLITE_TEXT => ColumnType::Text,
            ffi::SQLITE_BLOB => ColumnType::Blob,
            _ => ColumnType::Null,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name())
    }
}

/// Read access to one native value: a result column of a stepped statement
/// or an argument of a function call. Implementors wrap pointers the engine
/// keeps valid while the accessor is alive.
pub(crate) trait RawValue {
    /// The `SQLITE_*` storage class code.
    fn type_code(&self) -> c_int;
    fn integer(&self) -> i64;
    fn real(&self) -> f64;
    /// UTF-8 payload of a text value.
    fn text(&self) -> &[u8];
    fn blob(&self) -> &[u8];
}

/// `len` bytes at `data`; empty for a NULL pointer or non-positive length.
///
/// # Safety
///
/// `data` must be NULL or valid for reads of `len` bytes for `'a`.
pub(crate) unsafe fn raw_bytes<'a>(data: *const u8, len: c_int) -> &'a [u8] {
    if data.is_null() || len <= 0 {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(data, len as usize) }
    }
}

/// A single SQL value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    #[default]
    Null,
}

impl Value {
    /// Decode a native value by its storage class. Invalid UTF-8 in text is
    /// replaced rather than rejected.
    pub(crate) fn from_raw(raw: &impl RawValue) -> Value {
        match ColumnType::from_code(raw.type_code()) {
            ColumnType::Integer => Value::Integer(raw.integer()),
            ColumnType::Real => Value::Real(raw.real()),
            ColumnType::Text => Value::Text(String::from_utf8_lossy(raw.text()).into_owned()),
            ColumnType::Blob => Value::Blob(raw.blob().to_vec()),
            ColumnType::Null => Value::Null,
        }
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            Value::Integer(_) => ColumnType::Integer,
            Value::Real(_) => ColumnType::Real,
            Value::Text(_) => ColumnType::Text,
            Value::Blob(_) => ColumnType::Blob,
            Value::Null => ColumnType::Null,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Real(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(b) => Some(b),
            _ => None,
        }
    }

    /// Extract as i64 with a default value.
    pub fn as_integer_or(&self, default: i64) -> i64 {
        self.as_integer().unwrap_or(default)
    }

    /// Extract as String with a default value.
    pub fn as_text_or(&self, default: &str) -> String {
        self.as_text().unwrap_or(default).to_string()
    }

    /// Render as a SQL literal for places where a placeholder is not allowed
    /// (column `DEFAULT` clauses, expanded trace output).
    pub fn to_sql_literal(&self) -> String {
        match self {
            Value::Integer(i) => i.to_string(),
            Value::Real(f) if f.is_nan() => "NULL".to_string(),
            Value::Real(f) if f.is_infinite() => {
                if *f > 0.0 { "9e999".to_string() } else { "-9e999".to_string() }
            }
            Value::Real(f) => format!("{:?}", f),
            Value::Text(s) => quote_string(s),
            Value::Blob(b) => quote_blob(b),
            Value::Null => "NULL".to_string(),
        }
    }

    fn class_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Integer(_) | Value::Real(_) => 1,
            Value::Text(_) => 2,
            Value::Blob(_) => 3,
        }
    }
}

/// Orders values the way SQLite does: NULL, then numbers, then text, then
/// blobs. An integer and a real of equal magnitude sort integer first so the
/// order stays consistent with variant-aware equality.
impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Real(a), Value::Real(b)) => a.partial_cmp(b),
            (Value::Integer(a), Value::Real(b)) => {
                (*a as f64).partial_cmp(b).map(|o| o.then(Ordering::Less))
            }
            (Value::Real(a), Value::Integer(b)) => {
                a.partial_cmp(&(*b as f64)).map(|o| o.then(Ordering::Greater))
            }
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Blob(a), Value::Blob(b)) => Some(a.cmp(b)),
            (a, b) => Some(a.class_rank().cmp(&b.class_rank())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(s) => f.write_str(s),
            Value::Blob(b) => write!(f, "x'{}'", hex::encode(b)),
            Value::Null => f.write_str("NULL"),
        }
    }
}

/// Blobs serialize as hex strings so rows stay readable as JSON.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Real(f) => serializer.serialize_f64(*f),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Blob(b) => serializer.serialize_str(&hex::encode(b)),
            Value::Null => serializer.serialize_none(),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => |$v:ident| $body:expr),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from($v: $ty) -> Self {
                    $body
                }
            }
        )*
    };
}

value_from! {
    i64 => |v| Value::Integer(v),
    i32 => |v| Value::Integer(v as i64),
    u32 => |v| Value::Integer(v as i64),
    f64 => |v| Value::Real(v),
    bool => |v| Value::Integer(v as i64),
    String => |v| Value::Text(v),
    &str => |v| Value::Text(v.to_string()),
    Vec<u8> => |v| Value::Blob(v),
    &[u8] => |v| Value::Blob(v.to_vec()),
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Typed extraction from a [`Value`].
///
/// Returns `None` when the value's storage class cannot represent `Self`.
/// `Option<T>` accepts NULL as `Some(None)`.
pub trait FromValue: Sized {
    /// Name of the expected type, used in mismatch errors.
    const EXPECTED: &'static str;

    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for Value {
    const EXPECTED: &'static str = "any";

    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromValue for i64 {
    const EXPECTED: &'static str = "integer";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_integer()
    }
}

impl FromValue for i32 {
    const EXPECTED: &'static str = "integer";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_integer().and_then(|i| i32::try_from(i).ok())
    }
}

impl FromValue for bool {
    const EXPECTED: &'static str = "integer";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_integer().map(|i| i != 0)
    }
}

/// Integers widen to f64: aggregates over REAL columns may come back as
/// integers when every input was integral.
impl FromValue for f64 {
    const EXPECTED: &'static str = "real";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Real(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl FromValue for String {
    const EXPECTED: &'static str = "text";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_text().map(str::to_string)
    }
}

impl FromValue for Vec<u8> {
    const EXPECTED: &'static str = "blob";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_blob().map(<[u8]>::to_vec)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    const EXPECTED: &'static str = T::EXPECTED;

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}
