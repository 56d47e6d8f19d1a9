//! INSERT, UPSERT, UPDATE and DELETE against a query's source.

use super::{CompiledQuery, FromItem, Query};
use crate::db::{DbError, Result};
use crate::escape::{quote_identifier, quote_qualified};
use crate::expr::{Column, Fragment, IntoExpr};

/// One `"column" = value` assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Setter {
    column: String,
    value: Fragment,
}

impl Setter {
    pub fn new(column: &str, value: impl Into<Fragment>) -> Self {
        Self {
            column: column.to_string(),
            value: value.into(),
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn value(&self) -> &Fragment {
        &self.value
    }

    fn assignment(&self) -> Fragment {
        self.value.wrapped(&format!("{} = ", quote_identifier(&self.column)), "")
    }
}

impl<T> Column<T> {
    /// Assign a value to this column in an insert or update.
    pub fn set(&self, value: impl IntoExpr<T>) -> Setter {
        Setter::new(self.name(), value.into_expr())
    }
}

/// Conflict resolution for `INSERT OR <action>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnConflict {
    Abort,
    Fail,
    Ignore,
    Replace,
    Rollback,
}

impl OnConflict {
    fn keyword(&self) -> &'static str {
        match self {
            OnConflict::Abort => "ABORT",
            OnConflict::Fail => "FAIL",
            OnConflict::Ignore => "IGNORE",
            OnConflict::Replace => "REPLACE",
            OnConflict::Rollback => "ROLLBACK",
        }
    }
}

impl Query {
    /// `INSERT INTO t ("a", "b") VALUES (?, ?)`; no setters gives `DEFAULT VALUES`.
    pub fn insert(&self, setters: &[Setter]) -> CompiledQuery {
        self.render_insert("INSERT INTO", setters).into()
    }

    pub fn insert_or(&self, on_conflict: OnConflict, setters: &[Setter]) -> CompiledQuery {
        let verb = format!("INSERT OR {} INTO", on_conflict.keyword());
        self.render_insert(&verb, setters).into()
    }

    /// One statement inserting several rows. Every row must assign the same
    /// columns in the same order as the first.
    pub fn insert_many(&self, rows: &[Vec<Setter>]) -> Result<CompiledQuery> {
        let Some(first) = rows.first() else {
            return Err(DbError::ColumnMismatch {
                row: 0,
                expected: 1,
                actual: 0,
            });
        };
        for (i, row) in rows.iter().enumerate().skip(1) {
            let same_columns = row.len() == first.len()
                && row.iter().zip(first).all(|(a, b)| a.column == b.column);
            if !same_columns {
                return Err(DbError::ColumnMismatch {
                    row: i,
                    expected: first.len(),
                    actual: row.len(),
                });
            }
        }
        if first.is_empty() {
            // DEFAULT VALUES inserts exactly one row.
            if rows.len() > 1 {
                return Err(DbError::ColumnMismatch {
                    row: 0,
                    expected: 1,
                    actual: 0,
                });
            }
            return Ok(self.insert(&[]));
        }

        let mut out = self.insert_head("INSERT INTO", first);
        out.push_sql(" VALUES ");
        let tuples = rows.iter().map(|row| values_tuple(row));
        out.append(Fragment::join(tuples, ", "));
        Ok(out.into())
    }

    /// Insert, updating the conflicting row on a key collision:
    /// `ON CONFLICT("k") DO UPDATE SET "c" = excluded."c"` for every non-key
    /// column, `DO NOTHING` when all inserted columns are keys.
    pub fn upsert(&self, setters: &[Setter], keys: &[&str]) -> Result<CompiledQuery> {
        if keys.is_empty() {
            return Err(DbError::NoPrimaryKey {
                table: self.target_name(),
            });
        }
        let mut out = self.render_insert("INSERT INTO", setters);
        let conflict: Vec<_> = keys.iter().map(|k| quote_identifier(k)).collect();
        out.push_sql(&format!(" ON CONFLICT({})", conflict.join(", ")));

        let updates: Vec<_> = setters
            .iter()
            .filter(|s| !keys.contains(&s.column.as_str()))
            .map(|s| {
                let column = quote_identifier(&s.column);
                format!("{} = excluded.{}", column, column)
            })
            .collect();
        if updates.is_empty() {
            out.push_sql(" DO NOTHING");
        } else {
            out.push_sql(" DO UPDATE SET ");
            out.push_sql(&updates.join(", "));
        }
        Ok(out.into())
    }

    /// `UPDATE t SET ... WHERE <filter>`; bindings are the SET values then the filter's.
    ///
    /// # Errors
    ///
    /// [`DbError::NoAssignments`] when `setters` is empty.
    pub fn update(&self, setters: &[Setter]) -> Result<CompiledQuery> {
        if setters.is_empty() {
            return Err(DbError::NoAssignments {
                table: self.target_name(),
            });
        }
        let mut out = Fragment::literal(format!("UPDATE {} SET ", self.target()));
        out.append(Fragment::join(setters.iter().map(Setter::assignment), ", "));
        self.append_where(&mut out);
        Ok(out.into())
    }

    /// `DELETE FROM t WHERE <filter>`.
    pub fn delete(&self) -> CompiledQuery {
        let mut out = Fragment::literal(format!("DELETE FROM {}", self.target()));
        self.append_where(&mut out);
        out.into()
    }

    fn render_insert(&self, verb: &str, setters: &[Setter]) -> Fragment {
        if setters.is_empty() {
            return Fragment::literal(format!("{} {} DEFAULT VALUES", verb, self.target_unaliased()));
        }
        let mut out = self.insert_head(verb, setters);
        out.push_sql(" VALUES ");
        out.append(values_tuple(setters));
        out
    }

    fn insert_head(&self, verb: &str, setters: &[Setter]) -> Fragment {
        let columns: Vec<_> = setters.iter().map(|s| quote_identifier(&s.column)).collect();
        Fragment::literal(format!(
            "{} {} ({})",
            verb,
            self.target_unaliased(),
            columns.join(", ")
        ))
    }

    fn append_where(&self, out: &mut Fragment) {
        if let Some(filter) = &self.filter {
            out.push_sql(" WHERE ");
            out.append(filter.clone());
        }
    }

    fn target_name(&self) -> String {
        self.source.qualifier().to_string()
    }

    fn target_unaliased(&self) -> String {
        match &self.source.from {
            FromItem::Named { name, schema, .. } => quote_qualified(schema.as_deref(), name),
            FromItem::Subquery(_) => quote_identifier(self.source.qualifier()),
        }
    }

    /// UPDATE and DELETE accept `"t" AS "alias"`, so filters built from
    /// alias-qualified columns stay valid.
    fn target(&self) -> String {
        match (&self.source.from, &self.source.alias) {
            (FromItem::Named { .. }, Some(alias)) => {
                format!("{} AS {}", self.target_unaliased(), quote_identifier(alias))
            }
            _ => self.target_unaliased(),
        }
    }
}

fn values_tuple(setters: &[Setter]) -> Fragment {
    Fragment::join(setters.iter().map(|s| s.value.clone()), ", ").wrapped("(", ")")
}
