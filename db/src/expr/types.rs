//! Logical SQL types as Rust types.
//!
//! An expression's type parameter never exists at runtime; it only stops
//! incompatible expressions from being composed. Non-null types are the
//! [`BaseType`]s (`i64`, `f64`, `String`, `Vec<u8>`, `bool`); wrapping one in
//! `Option` makes it nullable.

use crate::value::ColumnType;

mod private {
    pub trait Sealed {}
}

/// Any logical type an expression can have.
pub trait SqlType: private::Sealed + 'static {
    /// The non-null type underneath (`i64` for both `i64` and `Option<i64>`).
    type Base: BaseType;

    /// Same nullability as `Self`, different base (`Option<i64>` → `Option<U>`).
    type Swap<U: BaseType>: SqlType;

    const NULLABLE: bool;

    /// Storage class used by `CAST` and column declarations.
    const DECLARED: ColumnType;
}

/// Non-null logical types.
pub trait BaseType: SqlType {}

/// Types supporting arithmetic.
pub trait Numeric: SqlType {}

/// Integer types supporting `%` and bitwise operators.
pub trait Integral: Numeric {}

/// Text types supporting string functions and pattern matching.
pub trait Textual: SqlType {}

macro_rules! base_type {
    ($($ty:ty => $declared:ident),* $(,)?) => {
        $(
            impl private::Sealed for $ty {}
            impl SqlType for $ty {
                type Base = $ty;
                type Swap<U: BaseType> = U;
                const NULLABLE: bool = false;
                const DECLARED: ColumnType = ColumnType::$declared;
            }
            impl BaseType for $ty {}
        )*
    };
}

base_type! {
    i64 => Integer,
    f64 => Real,
    String => Text,
    Vec<u8> => Blob,
    bool => Integer,
}

impl<T: BaseType> private::Sealed for Option<T> {}

impl<T: BaseType> SqlType for Option<T> {
    type Base = T;
    type Swap<U: BaseType> = Option<U>;
    const NULLABLE: bool = true;
    const DECLARED: ColumnType = T::DECLARED;
}

impl Numeric for i64 {}
impl Numeric for f64 {}
impl Numeric for Option<i64> {}
impl Numeric for Option<f64> {}

impl Integral for i64 {}
impl Integral for Option<i64> {}

impl Textual for String {}
impl Textual for Option<String> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn declared<T: SqlType>() -> ColumnType {
        T::DECLARED
    }

    fn nullable<T: SqlType>() -> bool {
        T::NULLABLE
    }

    #[test]
    fn test_declared_types() {
        assert_eq!(declared::<i64>(), ColumnType::Integer);
        assert_eq!(declared::<bool>(), ColumnType::Integer);
        assert_eq!(declared::<Option<f64>>(), ColumnType::Real);
        assert_eq!(declared::<Vec<u8>>(), ColumnType::Blob);
    }

    #[test]
    fn test_nullability() {
        assert!(!nullable::<String>());
        assert!(nullable::<Option<String>>());
    }
}
