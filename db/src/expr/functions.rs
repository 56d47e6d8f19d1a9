//! Built-in SQL functions: scalar helpers, aggregates and window functions.

use super::ops::call;
use super::types::{BaseType, Numeric, SqlType, Textual};
use super::{Expr, Fragment, IntoExpr, Window};
use crate::escape::quote_string;

impl<T: SqlType> Expr<T> {
    /// `typeof(x)`: the storage class name of the value.
    pub fn type_of(&self) -> Expr<String> {
        call("typeof", vec![self.fragment().clone()])
    }

    pub fn hex(&self) -> Expr<String> {
        call("hex", vec![self.fragment().clone()])
    }

    /// `count(x)`: non-null values in the group.
    pub fn count(&self) -> Expr<i64> {
        call("count", vec![self.fragment().clone()])
    }

    pub fn count_distinct(&self) -> Expr<i64> {
        Expr::from_fragment(self.fragment().wrapped("count(DISTINCT ", ")"))
    }

    /// Aggregate maximum; NULL over an empty group.
    pub fn max(&self) -> Expr<Option<T::Base>> {
        call("max", vec![self.fragment().clone()])
    }

    pub fn min(&self) -> Expr<Option<T::Base>> {
        call("min", vec![self.fragment().clone()])
    }

    /// `group_concat(x)` or `group_concat(x, 'sep')`.
    pub fn group_concat(&self, separator: Option<&str>) -> Expr<Option<String>> {
        let mut args = vec![self.fragment().clone()];
        if let Some(separator) = separator {
            args.push(Fragment::literal(quote_string(separator)));
        }
        call("group_concat", args)
    }

    /// Window form: `expr OVER (...)`.
    pub fn over(&self, window: &Window) -> Expr<T> {
        let mut out = self.fragment().clone();
        out.push_sql(" ");
        out.append(window.to_fragment());
        Expr::from_fragment(out)
    }

    pub fn first_value(&self) -> Expr<T> {
        call("first_value", vec![self.fragment().clone()])
    }

    pub fn last_value(&self) -> Expr<T> {
        call("last_value", vec![self.fragment().clone()])
    }

    /// `nth_value(x, n)`; NULL when the frame is shorter than `n`.
    pub fn nth_value(&self, n: i64) -> Expr<Option<T::Base>> {
        call("nth_value", vec![self.fragment().clone(), Fragment::value(n)])
    }

    /// `lag(x, offset, default)`.
    pub fn lag(&self, offset: i64, default: Option<Expr<T>>) -> Expr<Option<T::Base>> {
        self.shifted("lag", offset, default)
    }

    pub fn lead(&self, offset: i64, default: Option<Expr<T>>) -> Expr<Option<T::Base>> {
        self.shifted("lead", offset, default)
    }

    fn shifted(&self, function: &str, offset: i64, default: Option<Expr<T>>) -> Expr<Option<T::Base>> {
        let mut args = vec![self.fragment().clone(), Fragment::value(offset)];
        if let Some(default) = default {
            args.push(default.into_fragment());
        }
        call(function, args)
    }
}

impl<T: Numeric> Expr<T> {
    /// `sum(x)`: NULL over an empty group.
    pub fn sum(&self) -> Expr<Option<T::Base>> {
        call("sum", vec![self.fragment().clone()])
    }

    /// `total(x)`: like `sum` but always real and 0.0 over an empty group.
    pub fn total(&self) -> Expr<f64> {
        call("total", vec![self.fragment().clone()])
    }

    pub fn avg(&self) -> Expr<Option<f64>> {
        call("avg", vec![self.fragment().clone()])
    }
}

impl<T: BaseType> Expr<T> {
    /// `max(a, b, ...)` in its scalar form.
    pub fn greatest<I, V>(&self, others: I) -> Expr<T>
    where
        I: IntoIterator<Item = V>,
        V: IntoExpr<T>,
    {
        let mut args = vec![self.fragment().clone()];
        args.extend(others.into_iter().map(|v| v.into_expr().into_fragment()));
        call("max", args)
    }

    pub fn least<I, V>(&self, others: I) -> Expr<T>
    where
        I: IntoIterator<Item = V>,
        V: IntoExpr<T>,
    {
        let mut args = vec![self.fragment().clone()];
        args.extend(others.into_iter().map(|v| v.into_expr().into_fragment()));
        call("min", args)
    }
}

impl<T: Textual> Expr<T> {
    /// `printf`-style formatting with this expression as the format string.
    pub fn format<I>(&self, args: I) -> Expr<T>
    where
        I: IntoIterator<Item = Fragment>,
    {
        let mut all = vec![self.fragment().clone()];
        all.extend(args);
        call("printf", all)
    }
}

/// `count(*)`.
pub fn count_star() -> Expr<i64> {
    Expr::literal("count(*)")
}

/// `random()`: a pseudo-random 64-bit integer.
pub fn random() -> Expr<i64> {
    Expr::literal("random()")
}

pub fn row_number() -> Expr<i64> {
    Expr::literal("row_number()")
}

pub fn rank() -> Expr<i64> {
    Expr::literal("rank()")
}

pub fn dense_rank() -> Expr<i64> {
    Expr::literal("dense_rank()")
}

pub fn percent_rank() -> Expr<f64> {
    Expr::literal("percent_rank()")
}

pub fn cume_dist() -> Expr<f64> {
    Expr::literal("cume_dist()")
}

/// `ntile(n)`: bucket number in `1..=n`.
pub fn ntile(buckets: i64) -> Expr<i64> {
    call("ntile", vec![Fragment::value(buckets)])
}
