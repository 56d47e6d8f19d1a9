//! Typed SQL expressions.
//!
//! An expression is a SQL template with `?` placeholders plus the values bound
//! to them, in placeholder order. Every combinator builds a new expression
//! whose bindings are the operands' bindings concatenated in the order their
//! text is emitted, so the i-th binding always belongs to the i-th `?`.
//!
//! # Example
//!
//! ```
//! use litequery::expr::column;
//! use litequery::Value;
//!
//! let age = column::<i64>("age");
//! let name = column::<Option<String>>("name");
//! let predicate = age.greater_than(18).and(&name.not_equals(None));
//!
//! assert_eq!(predicate.sql(), r#"(("age" > ?) AND ("name" IS NOT NULL))"#);
//! assert_eq!(predicate.bindings(), &[Value::Integer(18)]);
//! ```

mod functions;
mod ops;
pub mod types;

use std::fmt;
use std::iter::Peekable;
use std::marker::PhantomData;
use std::ops::Deref;
use std::str::Chars;

pub use functions::{
    count_star, cume_dist, dense_rank, ntile, percent_rank, random, rank, row_number,
};
pub use ops::in_rows;
pub use types::{BaseType, Integral, Numeric, SqlType, Textual};

use crate::escape::{quote_identifier, quote_qualified};
use crate::value::Value;

/// An untyped SQL template and its bindings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fragment {
    sql: String,
    bindings: Vec<Value>,
}

impl Fragment {
    pub fn new(sql: impl Into<String>, bindings: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            bindings,
        }
    }

    /// Raw SQL with no bindings (keywords, `*`, static clauses).
    pub fn literal(sql: impl Into<String>) -> Self {
        Self::new(sql, Vec::new())
    }

    /// A single placeholder bound to `value`.
    pub fn value(value: impl Into<Value>) -> Self {
        Self::new("?", vec![value.into()])
    }

    pub fn identifier(name: &str) -> Self {
        Self::literal(quote_identifier(name))
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn bindings(&self) -> &[Value] {
        &self.bindings
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.bindings)
    }

    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    /// True for a bare placeholder bound to NULL.
    pub fn is_null_literal(&self) -> bool {
        self.sql == "?" && matches!(self.bindings.as_slice(), [Value::Null])
    }

    /// Join fragments with a separator, concatenating bindings in order.
    pub fn join<I>(parts: I, separator: &str) -> Fragment
    where
        I: IntoIterator<Item = Fragment>,
    {
        let mut out = Fragment::default();
        for (i, part) in parts.into_iter().enumerate() {
            if i > 0 {
                out.sql.push_str(separator);
            }
            out.append(part);
        }
        out
    }

    /// Append another fragment's text and bindings.
    pub fn append(&mut self, other: Fragment) {
        self.sql.push_str(&other.sql);
        self.bindings.extend(other.bindings);
    }

    pub fn push_sql(&mut self, sql: &str) {
        self.sql.push_str(sql);
    }

    /// `prefix` + self + `suffix`, bindings unchanged.
    pub fn wrapped(&self, prefix: &str, suffix: &str) -> Fragment {
        Fragment::new(format!("{}{}{}", prefix, self.sql, suffix), self.bindings.clone())
    }

    /// Parameter slots SQLite will allocate for this text.
    pub fn placeholder_count(&self) -> usize {
        count_placeholders(&self.sql)
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Largest `?NNN` index SQLite accepts with its default limits.
const MAX_PARAMETER_NUMBER: usize = 32766;

/// Number of parameter slots SQLite allocates for `sql`, as
/// `sqlite3_bind_parameter_count` reports it.
///
/// Quoted text and comments are skipped. A bare `?` takes the slot after
/// the highest seen so far, `?NNN` takes slot NNN, and each distinct
/// `:name`, `@name` or `$name` takes a new slot. Out-of-range `?NNN` is
/// ignored here; SQLite refuses to prepare it.
pub(crate) fn count_placeholders(sql: &str) -> usize {
    let mut chars = sql.chars().peekable();
    let mut highest = 0;
    let mut names: Vec<String> = Vec::new();
    let mut previous: Option<char> = None;
    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '`' | '[' => {
                let close = if c == '[' { ']' } else { c };
                for d in chars.by_ref() {
                    if d == close {
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                for d in chars.by_ref() {
                    if d == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut star = false;
                for d in chars.by_ref() {
                    if star && d == '/' {
                        break;
                    }
                    star = d == '*';
                }
            }
            '?' => {
                let digits = take_while(&mut chars, |d| d.is_ascii_digit());
                if digits.is_empty() {
                    highest += 1;
                } else if let Ok(n) = digits.parse::<usize>() {
                    if (1..=MAX_PARAMETER_NUMBER).contains(&n) {
                        highest = highest.max(n);
                    }
                }
            }
            ':' | '@' | '$' if !previous.is_some_and(is_identifier_char) => {
                let name = take_while(&mut chars, is_identifier_char);
                if !name.is_empty() && !names.contains(&name) {
                    highest += 1;
                    names.push(name);
                }
            }
            _ => {}
        }
        previous = Some(c);
    }
    highest
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn take_while(chars: &mut Peekable<Chars<'_>>, keep: impl Fn(char) -> bool) -> String {
    let mut out = String::new();
    while let Some(&c) = chars.peek() {
        if !keep(c) {
            break;
        }
        out.push(c);
        chars.next();
    }
    out
}

/// A SQL expression whose result has logical type `T`.
pub struct Expr<T> {
    fragment: Fragment,
    _type: PhantomData<fn() -> T>,
}

impl<T> Clone for Expr<T> {
    fn clone(&self) -> Self {
        Self::from_fragment(self.fragment.clone())
    }
}

impl<T> fmt::Debug for Expr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expr")
            .field("sql", &self.fragment.sql)
            .field("bindings", &self.fragment.bindings)
            .finish()
    }
}

impl<T> PartialEq for Expr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.fragment == other.fragment
    }
}

impl<T> Expr<T> {
    pub(crate) fn from_fragment(fragment: Fragment) -> Self {
        Self {
            fragment,
            _type: PhantomData,
        }
    }

    /// Raw template with explicit bindings. The caller keeps placeholder and
    /// binding counts in step.
    pub fn new(sql: impl Into<String>, bindings: Vec<Value>) -> Self {
        Self::from_fragment(Fragment::new(sql, bindings))
    }

    /// Static SQL such as a keyword or constant.
    pub fn literal(sql: impl Into<String>) -> Self {
        Self::from_fragment(Fragment::literal(sql))
    }

    /// A quoted identifier.
    pub fn identifier(name: &str) -> Self {
        Self::from_fragment(Fragment::identifier(name))
    }

    pub fn sql(&self) -> &str {
        self.fragment.sql()
    }

    pub fn bindings(&self) -> &[Value] {
        self.fragment.bindings()
    }

    pub fn fragment(&self) -> &Fragment {
        &self.fragment
    }

    pub fn into_fragment(self) -> Fragment {
        self.fragment
    }

    /// `expr AS "name"`, for select lists.
    pub fn aliased(&self, name: &str) -> Expr<T> {
        Expr::from_fragment(self.fragment.wrapped("", &format!(" AS {}", quote_identifier(name))))
    }

    pub(crate) fn retype<U>(self) -> Expr<U> {
        Expr::from_fragment(self.fragment)
    }
}

impl<T: SqlType> Expr<T> {
    /// A single bound value.
    pub fn value(value: impl Into<Value>) -> Self {
        Self::from_fragment(Fragment::value(value))
    }
}

impl<T: BaseType> Expr<Option<T>> {
    /// A bound NULL.
    pub fn null() -> Self {
        Self::from_fragment(Fragment::value(Value::Null))
    }
}

impl<T> From<Expr<T>> for Fragment {
    fn from(expr: Expr<T>) -> Self {
        expr.fragment
    }
}

impl<T> From<&Expr<T>> for Fragment {
    fn from(expr: &Expr<T>) -> Self {
        expr.fragment.clone()
    }
}

/// A named column, usable anywhere an `Expr<T>` is.
pub struct Column<T> {
    name: String,
    expr: Expr<T>,
}

impl<T> Clone for Column<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            expr: self.expr.clone(),
        }
    }
}

impl<T> fmt::Debug for Column<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("name", &self.name)
            .field("sql", &self.expr.sql())
            .finish()
    }
}

impl<T> Column<T> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            expr: Expr::identifier(name),
        }
    }

    /// A column qualified by a table name or alias: `"users"."id"`.
    pub fn qualified(namespace: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            expr: Expr::literal(quote_qualified(Some(namespace), name)),
        }
    }

    /// Unqualified column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expr(&self) -> &Expr<T> {
        &self.expr
    }
}

impl<T> Deref for Column<T> {
    type Target = Expr<T>;

    fn deref(&self) -> &Expr<T> {
        &self.expr
    }
}

impl<T> From<Column<T>> for Fragment {
    fn from(column: Column<T>) -> Self {
        column.expr.fragment
    }
}

impl<T> From<&Column<T>> for Fragment {
    fn from(column: &Column<T>) -> Self {
        column.expr.fragment.clone()
    }
}

/// Shorthand for an unqualified [`Column`].
pub fn column<T: SqlType>(name: &str) -> Column<T> {
    Column::new(name)
}

/// Conversion into an expression of logical type `T`.
///
/// Implemented for expressions, columns and plain Rust values; a value becomes
/// one placeholder with one binding.
pub trait IntoExpr<T> {
    fn into_expr(self) -> Expr<T>;
}

impl<T> IntoExpr<T> for Expr<T> {
    fn into_expr(self) -> Expr<T> {
        self
    }
}

impl<T> IntoExpr<T> for &Expr<T> {
    fn into_expr(self) -> Expr<T> {
        self.clone()
    }
}

impl<T> IntoExpr<T> for Column<T> {
    fn into_expr(self) -> Expr<T> {
        self.expr
    }
}

impl<T> IntoExpr<T> for &Column<T> {
    fn into_expr(self) -> Expr<T> {
        self.expr.clone()
    }
}

macro_rules! literal_into_expr {
    ($($rust:ty => $sql:ty),* $(,)?) => {
        $(
            impl IntoExpr<$sql> for $rust {
                fn into_expr(self) -> Expr<$sql> {
                    Expr::value(self)
                }
            }
            impl IntoExpr<Option<$sql>> for $rust {
                fn into_expr(self) -> Expr<Option<$sql>> {
                    Expr::value(self)
                }
            }
        )*
    };
}

literal_into_expr! {
    i64 => i64,
    i32 => i64,
    f64 => f64,
    bool => bool,
    &str => String,
    String => String,
    Vec<u8> => Vec<u8>,
    &[u8] => Vec<u8>,
}

macro_rules! option_into_expr {
    ($($rust:ty),* $(,)?) => {
        $(
            impl IntoExpr<Option<$rust>> for Option<$rust> {
                fn into_expr(self) -> Expr<Option<$rust>> {
                    Expr::value(self)
                }
            }
        )*
    };
}

option_into_expr!(i64, f64, bool, String, Vec<u8>);

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Placement of NULLs within an ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nulls {
    First,
    Last,
}

/// One term of an `ORDER BY` list.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTerm {
    expr: Fragment,
    direction: Option<Direction>,
    nulls: Option<Nulls>,
}

impl OrderTerm {
    pub fn new(expr: impl Into<Fragment>, direction: Option<Direction>) -> Self {
        Self {
            expr: expr.into(),
            direction,
            nulls: None,
        }
    }

    pub fn nulls_first(mut self) -> Self {
        self.nulls = Some(Nulls::First);
        self
    }

    pub fn nulls_last(mut self) -> Self {
        self.nulls = Some(Nulls::Last);
        self
    }

    pub fn to_fragment(&self) -> Fragment {
        let mut out = self.expr.clone();
        match self.direction {
            Some(Direction::Asc) => out.push_sql(" ASC"),
            Some(Direction::Desc) => out.push_sql(" DESC"),
            None => {}
        }
        match self.nulls {
            Some(Nulls::First) => out.push_sql(" NULLS FIRST"),
            Some(Nulls::Last) => out.push_sql(" NULLS LAST"),
            None => {}
        }
        out
    }
}

impl<T> From<Expr<T>> for OrderTerm {
    fn from(expr: Expr<T>) -> Self {
        OrderTerm::new(expr, None)
    }
}

impl<T> From<&Expr<T>> for OrderTerm {
    fn from(expr: &Expr<T>) -> Self {
        OrderTerm::new(expr, None)
    }
}

impl<T> From<&Column<T>> for OrderTerm {
    fn from(column: &Column<T>) -> Self {
        OrderTerm::new(column, None)
    }
}

/// Collating sequence for `COLLATE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Collation {
    Binary,
    NoCase,
    RTrim,
    /// A user-registered collation, rendered quoted.
    Custom(String),
}

impl Collation {
    pub fn to_sql(&self) -> String {
        match self {
            Collation::Binary => "BINARY".to_string(),
            Collation::NoCase => "NOCASE".to_string(),
            Collation::RTrim => "RTRIM".to_string(),
            Collation::Custom(name) => quote_identifier(name),
        }
    }
}

/// A window definition for `OVER (...)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Window {
    partition: Vec<Fragment>,
    order: Vec<OrderTerm>,
}

impl Window {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn partition_by(&self, expr: impl Into<Fragment>) -> Self {
        let mut next = self.clone();
        next.partition.push(expr.into());
        next
    }

    pub fn order_by(&self, term: impl Into<OrderTerm>) -> Self {
        let mut next = self.clone();
        next.order.push(term.into());
        next
    }

    /// `OVER (PARTITION BY .. ORDER BY ..)`.
    pub fn to_fragment(&self) -> Fragment {
        let mut parts = Vec::new();
        if !self.partition.is_empty() {
            let by = Fragment::join(self.partition.iter().cloned(), ", ");
            parts.push(by.wrapped("PARTITION BY ", ""));
        }
        if !self.order.is_empty() {
            let by = Fragment::join(self.order.iter().map(OrderTerm::to_fragment), ", ");
            parts.push(by.wrapped("ORDER BY ", ""));
        }
        Fragment::join(parts, " ").wrapped("OVER (", ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_value_is_one_placeholder() {
        let e: Expr<i64> = Expr::value(5);
        assert_eq!(e.sql(), "?");
        assert_eq!(e.bindings(), &[Value::Integer(5)]);
    }

    #[rstest]
    fn test_identifier_has_no_bindings() {
        let e: Expr<String> = Expr::identifier("na\"me");
        assert_eq!(e.sql(), "\"na\"\"me\"");
        assert!(e.bindings().is_empty());
    }

    #[rstest]
    fn test_literal_fragment() {
        let e: Expr<i64> = Expr::literal("LIMIT 5");
        assert_eq!(e.sql(), "LIMIT 5");
        assert_eq!(e.fragment().placeholder_count(), 0);
    }

    #[rstest]
    #[case("SELECT ?", 1)]
    #[case("SELECT '?', \"a?\", ?", 1)]
    #[case("(? + ?) * [w?]", 2)]
    #[case("x = 'it''s ?' AND y = ?", 1)]
    #[case::line_comment("SELECT ? -- why?\n + ?", 2)]
    #[case::block_comment("SELECT /* ? ** ? */ ?", 1)]
    #[case::unterminated_comment("SELECT ? /* ?", 1)]
    #[case::numbered("SELECT ?1, ?1", 1)]
    #[case::numbered_gap("SELECT ?5", 5)]
    #[case::bare_after_numbered("SELECT ?2, ?", 3)]
    #[case::out_of_range("SELECT ?0, ?99999", 0)]
    #[case::named("SELECT :a, @b, :a, $c", 3)]
    #[case::dollar_in_identifier("SELECT a$b FROM t", 0)]
    fn test_count_placeholders(#[case] sql: &str, #[case] expected: usize) {
        assert_eq!(count_placeholders(sql), expected);
    }

    #[rstest]
    fn test_join_preserves_binding_order() {
        let joined = Fragment::join(
            vec![Fragment::value(1), Fragment::literal("x"), Fragment::value("b")],
            ", ",
        );
        assert_eq!(joined.sql(), "?, x, ?");
        assert_eq!(joined.bindings(), &[Value::Integer(1), Value::Text("b".into())]);
    }

    #[rstest]
    fn test_qualified_column() {
        let id = Column::<i64>::qualified("users", "id");
        assert_eq!(id.sql(), "\"users\".\"id\"");
        assert_eq!(id.name(), "id");
    }

    #[rstest]
    fn test_aliased() {
        let e = column::<i64>("a").plus(1).aliased("total");
        assert_eq!(e.sql(), "(\"a\" + ?) AS \"total\"");
    }

    #[rstest]
    fn test_order_terms() {
        let name = column::<String>("name");
        assert_eq!(name.asc().to_fragment().sql(), "\"name\" ASC");
        assert_eq!(name.desc().nulls_last().to_fragment().sql(), "\"name\" DESC NULLS LAST");
        assert_eq!(OrderTerm::from(&name).to_fragment().sql(), "\"name\"");
    }

    #[rstest]
    fn test_window_rendering() {
        let w = Window::new()
            .partition_by(&column::<String>("dept"))
            .order_by(column::<i64>("salary").desc());
        assert_eq!(
            w.to_fragment().sql(),
            "OVER (PARTITION BY \"dept\" ORDER BY \"salary\" DESC)"
        );
        assert_eq!(Window::new().to_fragment().sql(), "OVER ()");
    }

    #[rstest]
    fn test_null_literal_detection() {
        assert!(Expr::<Option<i64>>::null().fragment().is_null_literal());
        assert!(!Expr::<i64>::value(0).fragment().is_null_literal());
    }
}
