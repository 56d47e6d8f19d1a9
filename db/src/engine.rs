//! Facts about the linked SQLite library.

use std::ffi::CStr;

use rusqlite::ffi;

/// First release accepting row values (`(a, b) IN (VALUES ...)`).
pub const ROW_VALUES_MIN_VERSION: i32 = 3_015_000;

/// SQL features whose availability depends on the engine version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub row_values: bool,
}

impl Capabilities {
    /// Capabilities of a library reporting `version` as `sqlite3_libversion_number`.
    pub fn from_version(version: i32) -> Self {
        Self {
            row_values: version >= ROW_VALUES_MIN_VERSION,
        }
    }

    /// Capabilities of the library this crate is linked against.
    pub fn current() -> Self {
        Self::from_version(version_number())
    }
}

/// `3.45.1` is reported as `3045001`.
pub fn version_number() -> i32 {
    unsafe { ffi::sqlite3_libversion_number() }
}

pub fn version() -> String {
    unsafe { CStr::from_ptr(ffi::sqlite3_libversion()) }
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(3_008_003, false)]
    #[case(3_014_999, false)]
    #[case(3_015_000, true)]
    #[case(3_045_001, true)]
    fn test_row_value_gate(#[case] version: i32, #[case] expected: bool) {
        assert_eq!(Capabilities::from_version(version).row_values, expected);
    }

    #[rstest]
    fn test_bundled_library_is_modern() {
        assert!(Capabilities::current().row_values);
        assert!(version().starts_with("3."));
    }
}
