//! Operator combinators.
//!
//! Infix operators render as `(lhs OP rhs)` and unary ones as `OP(operand)`,
//! so the result never depends on SQL's precedence table.

use super::{Collation, Direction, Expr, Fragment, IntoExpr, OrderTerm};
use super::types::{BaseType, Integral, Numeric, SqlType, Textual};
use crate::db::{DbError, Result};
use crate::engine::Capabilities;
use crate::query::Query;
use crate::value::Value;

pub(crate) fn infix<U>(lhs: &Fragment, op: &str, rhs: Fragment) -> Expr<U> {
    let mut out = Fragment::literal("(");
    out.append(lhs.clone());
    out.push_sql(" ");
    out.push_sql(op);
    out.push_sql(" ");
    out.append(rhs);
    out.push_sql(")");
    Expr::from_fragment(out)
}

pub(crate) fn unary<U>(op: &str, operand: &Fragment) -> Expr<U> {
    Expr::from_fragment(operand.wrapped(&format!("{}(", op), ")"))
}

fn postfix<U>(operand: &Fragment, op: &str) -> Expr<U> {
    Expr::from_fragment(operand.wrapped("(", &format!(" {})", op)))
}

/// `name(arg1, arg2, ...)`, bindings in argument order.
pub(crate) fn call<U>(function: &str, args: Vec<Fragment>) -> Expr<U> {
    Expr::from_fragment(Fragment::join(args, ", ").wrapped(&format!("{}(", function), ")"))
}

fn list(values: Vec<Fragment>) -> Fragment {
    Fragment::join(values, ", ").wrapped("(", ")")
}

impl<T: SqlType> Expr<T> {
    /// `=`; comparing with a NULL literal renders `IS NULL`.
    pub fn equals(&self, rhs: impl IntoExpr<T>) -> Expr<bool> {
        let rhs = rhs.into_expr();
        if rhs.fragment().is_null_literal() {
            return postfix(self.fragment(), "IS NULL");
        }
        infix(self.fragment(), "=", rhs.into_fragment())
    }

    /// `<>`; comparing with a NULL literal renders `IS NOT NULL`.
    pub fn not_equals(&self, rhs: impl IntoExpr<T>) -> Expr<bool> {
        let rhs = rhs.into_expr();
        if rhs.fragment().is_null_literal() {
            return postfix(self.fragment(), "IS NOT NULL");
        }
        infix(self.fragment(), "<>", rhs.into_fragment())
    }

    pub fn less_than(&self, rhs: impl IntoExpr<T>) -> Expr<bool> {
        infix(self.fragment(), "<", rhs.into_expr().into_fragment())
    }

    pub fn less_or_equal(&self, rhs: impl IntoExpr<T>) -> Expr<bool> {
        infix(self.fragment(), "<=", rhs.into_expr().into_fragment())
    }

    pub fn greater_than(&self, rhs: impl IntoExpr<T>) -> Expr<bool> {
        infix(self.fragment(), ">", rhs.into_expr().into_fragment())
    }

    pub fn greater_or_equal(&self, rhs: impl IntoExpr<T>) -> Expr<bool> {
        infix(self.fragment(), ">=", rhs.into_expr().into_fragment())
    }

    /// Null-safe equality.
    pub fn is(&self, rhs: impl IntoExpr<T>) -> Expr<bool> {
        infix(self.fragment(), "IS", rhs.into_expr().into_fragment())
    }

    pub fn is_not(&self, rhs: impl IntoExpr<T>) -> Expr<bool> {
        infix(self.fragment(), "IS NOT", rhs.into_expr().into_fragment())
    }

    pub fn is_null(&self) -> Expr<bool> {
        postfix(self.fragment(), "IS NULL")
    }

    pub fn is_not_null(&self) -> Expr<bool> {
        postfix(self.fragment(), "IS NOT NULL")
    }

    /// `(x BETWEEN low AND high)`.
    pub fn between(&self, low: impl IntoExpr<T>, high: impl IntoExpr<T>) -> Expr<bool> {
        let mut range = low.into_expr().into_fragment();
        range.push_sql(" AND ");
        range.append(high.into_expr().into_fragment());
        infix(self.fragment(), "BETWEEN", range)
    }

    pub fn in_list<I, V>(&self, values: I) -> Expr<bool>
    where
        I: IntoIterator<Item = V>,
        V: IntoExpr<T>,
    {
        let values = values.into_iter().map(|v| v.into_expr().into_fragment()).collect();
        infix(self.fragment(), "IN", list(values))
    }

    pub fn not_in_list<I, V>(&self, values: I) -> Expr<bool>
    where
        I: IntoIterator<Item = V>,
        V: IntoExpr<T>,
    {
        let values = values.into_iter().map(|v| v.into_expr().into_fragment()).collect();
        infix(self.fragment(), "NOT IN", list(values))
    }

    /// `(x IN (SELECT ...))`.
    pub fn in_query(&self, query: &Query) -> Expr<bool> {
        infix(self.fragment(), "IN", query.to_fragment().wrapped("(", ")"))
    }

    pub fn collate(&self, collation: Collation) -> Expr<T> {
        postfix(self.fragment(), &format!("COLLATE {}", collation.to_sql()))
    }

    /// `CAST(x AS <type>)`.
    pub fn cast<U: SqlType>(&self) -> Expr<U> {
        Expr::from_fragment(
            self.fragment()
                .wrapped("CAST(", &format!(" AS {})", U::DECLARED.sql_name())),
        )
    }

    /// `coalesce(x, a, b, ...)`.
    pub fn coalesce<I, V>(&self, others: I) -> Expr<T>
    where
        I: IntoIterator<Item = V>,
        V: IntoExpr<T>,
    {
        let mut args = vec![self.fragment().clone()];
        args.extend(others.into_iter().map(|v| v.into_expr().into_fragment()));
        call("coalesce", args)
    }

    /// `ifnull(x, default)`: strips nullability.
    pub fn if_null(&self, default: impl IntoExpr<T::Base>) -> Expr<T::Base> {
        call("ifnull", vec![self.fragment().clone(), default.into_expr().into_fragment()])
    }

    pub fn asc(&self) -> OrderTerm {
        OrderTerm::new(self.fragment().clone(), Some(Direction::Asc))
    }

    pub fn desc(&self) -> OrderTerm {
        OrderTerm::new(self.fragment().clone(), Some(Direction::Desc))
    }
}

impl<T: BaseType> Expr<T> {
    /// View a non-null expression as nullable, for comparisons with nullable columns.
    pub fn nullable(&self) -> Expr<Option<T>> {
        self.clone().retype()
    }
}

impl<T: Numeric> Expr<T> {
    pub fn plus(&self, rhs: impl IntoExpr<T>) -> Expr<T> {
        infix(self.fragment(), "+", rhs.into_expr().into_fragment())
    }

    pub fn minus(&self, rhs: impl IntoExpr<T>) -> Expr<T> {
        infix(self.fragment(), "-", rhs.into_expr().into_fragment())
    }

    pub fn times(&self, rhs: impl IntoExpr<T>) -> Expr<T> {
        infix(self.fragment(), "*", rhs.into_expr().into_fragment())
    }

    pub fn divided_by(&self, rhs: impl IntoExpr<T>) -> Expr<T> {
        infix(self.fragment(), "/", rhs.into_expr().into_fragment())
    }

    pub fn negate(&self) -> Expr<T> {
        unary("-", self.fragment())
    }

    pub fn abs(&self) -> Expr<T> {
        call("abs", vec![self.fragment().clone()])
    }

    /// `round(x)` or `round(x, digits)`; always real-valued.
    pub fn round(&self, digits: Option<i64>) -> Expr<T::Swap<f64>> {
        let mut args = vec![self.fragment().clone()];
        if let Some(digits) = digits {
            args.push(Fragment::value(digits));
        }
        call("round", args)
    }
}

impl<T: Integral> Expr<T> {
    pub fn modulo(&self, rhs: impl IntoExpr<T>) -> Expr<T> {
        infix(self.fragment(), "%", rhs.into_expr().into_fragment())
    }

    pub fn bit_and(&self, rhs: impl IntoExpr<T>) -> Expr<T> {
        infix(self.fragment(), "&", rhs.into_expr().into_fragment())
    }

    pub fn bit_or(&self, rhs: impl IntoExpr<T>) -> Expr<T> {
        infix(self.fragment(), "|", rhs.into_expr().into_fragment())
    }

    pub fn shift_left(&self, rhs: impl IntoExpr<T>) -> Expr<T> {
        infix(self.fragment(), "<<", rhs.into_expr().into_fragment())
    }

    pub fn shift_right(&self, rhs: impl IntoExpr<T>) -> Expr<T> {
        infix(self.fragment(), ">>", rhs.into_expr().into_fragment())
    }

    pub fn bit_not(&self) -> Expr<T> {
        unary("~", self.fragment())
    }
}

impl<T: Textual> Expr<T> {
    /// `(a || b)`.
    pub fn concat(&self, rhs: impl IntoExpr<T>) -> Expr<T> {
        infix(self.fragment(), "||", rhs.into_expr().into_fragment())
    }

    /// `(x LIKE pattern)`, optionally with `ESCAPE`.
    pub fn like(&self, pattern: impl IntoExpr<String>, escape: Option<char>) -> Expr<bool> {
        let mut rhs = pattern.into_expr().into_fragment();
        if let Some(escape) = escape {
            rhs.push_sql(" ESCAPE ");
            rhs.append(Fragment::value(escape.to_string()));
        }
        infix(self.fragment(), "LIKE", rhs)
    }

    pub fn glob(&self, pattern: impl IntoExpr<String>) -> Expr<bool> {
        infix(self.fragment(), "GLOB", pattern.into_expr().into_fragment())
    }

    /// Full-text `MATCH`.
    pub fn matches(&self, pattern: impl IntoExpr<String>) -> Expr<bool> {
        infix(self.fragment(), "MATCH", pattern.into_expr().into_fragment())
    }

    /// `REGEXP`; needs a `regexp()` function on the connection, see
    /// `Connection::enable_regexp`.
    pub fn regexp(&self, pattern: impl IntoExpr<String>) -> Expr<bool> {
        infix(self.fragment(), "REGEXP", pattern.into_expr().into_fragment())
    }

    pub fn lower(&self) -> Expr<T> {
        call("lower", vec![self.fragment().clone()])
    }

    pub fn upper(&self) -> Expr<T> {
        call("upper", vec![self.fragment().clone()])
    }

    pub fn length(&self) -> Expr<T::Swap<i64>> {
        call("length", vec![self.fragment().clone()])
    }

    pub fn trim(&self, characters: Option<&str>) -> Expr<T> {
        self.trim_with("trim", characters)
    }

    pub fn ltrim(&self, characters: Option<&str>) -> Expr<T> {
        self.trim_with("ltrim", characters)
    }

    pub fn rtrim(&self, characters: Option<&str>) -> Expr<T> {
        self.trim_with("rtrim", characters)
    }

    fn trim_with(&self, function: &str, characters: Option<&str>) -> Expr<T> {
        let mut args = vec![self.fragment().clone()];
        if let Some(characters) = characters {
            args.push(Fragment::value(characters));
        }
        call(function, args)
    }

    pub fn replace(
        &self,
        pattern: impl IntoExpr<String>,
        replacement: impl IntoExpr<String>,
    ) -> Expr<T> {
        call(
            "replace",
            vec![
                self.fragment().clone(),
                pattern.into_expr().into_fragment(),
                replacement.into_expr().into_fragment(),
            ],
        )
    }

    /// `substr(x, start)` or `substr(x, start, length)`; `start` is 1-based.
    pub fn substr(&self, start: i64, length: Option<i64>) -> Expr<T> {
        let mut args = vec![self.fragment().clone(), Fragment::value(start)];
        if let Some(length) = length {
            args.push(Fragment::value(length));
        }
        call("substr", args)
    }

    pub fn instr(&self, needle: impl IntoExpr<String>) -> Expr<T::Swap<i64>> {
        call("instr", vec![self.fragment().clone(), needle.into_expr().into_fragment()])
    }
}

impl Expr<bool> {
    pub fn and(&self, rhs: impl IntoExpr<bool>) -> Expr<bool> {
        infix(self.fragment(), "AND", rhs.into_expr().into_fragment())
    }

    pub fn or(&self, rhs: impl IntoExpr<bool>) -> Expr<bool> {
        infix(self.fragment(), "OR", rhs.into_expr().into_fragment())
    }

    pub fn not(&self) -> Expr<bool> {
        unary("NOT ", self.fragment())
    }
}

/// Membership of a composite key in a set of key tuples.
///
/// With row-value support this renders `(("a", "b") IN (VALUES (?, ?), ...))`;
/// otherwise it expands to `(("a" = ? AND "b" = ?) OR ...)`. An empty key
/// set renders the constant `0`.
pub fn in_rows<I, C>(columns: I, rows: &[Vec<Value>], capabilities: Capabilities) -> Result<Expr<bool>>
where
    I: IntoIterator<Item = C>,
    C: Into<Fragment>,
{
    let columns: Vec<Fragment> = columns.into_iter().map(Into::into).collect();
    for (i, row) in rows.iter().enumerate() {
        if row.len() != columns.len() {
            return Err(DbError::ColumnMismatch {
                row: i,
                expected: columns.len(),
                actual: row.len(),
            });
        }
    }
    if rows.is_empty() {
        return Ok(Expr::literal("0"));
    }

    if capabilities.row_values {
        let tuple = list(columns);
        let values = rows
            .iter()
            .map(|row| list(row.iter().cloned().map(Fragment::value).collect()))
            .collect::<Vec<_>>();
        let values = Fragment::join(values, ", ").wrapped("(VALUES ", ")");
        return Ok(infix(&tuple, "IN", values));
    }

    let alternatives = rows
        .iter()
        .map(|row| {
            let terms = columns
                .iter()
                .zip(row)
                .map(|(column, value)| {
                    let mut term = Fragment::literal("(");
                    term.append(column.clone());
                    term.push_sql(" = ");
                    term.append(Fragment::value(value.clone()));
                    term.push_sql(")");
                    term
                })
                .collect::<Vec<_>>();
            Fragment::join(terms, " AND ").wrapped("(", ")")
        })
        .collect::<Vec<_>>();
    Ok(Expr::from_fragment(Fragment::join(alternatives, " OR ").wrapped("(", ")")))
}
