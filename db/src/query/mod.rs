//! Clause accumulator for SELECT queries and the writes derived from them.
//!
//! A [`Query`] is an immutable value. Every builder call returns a copy with
//! one clause set or extended, so a partially built query can be reused from
//! several branches:
//!
//! ```
//! use litequery::query::Query;
//!
//! let users = Query::table("users");
//! let active = users.filter(users.column::<bool>("active").equals(true));
//! let recent = active.order([users.column::<i64>("id").desc()]).limit(10);
//!
//! assert_eq!(
//!     recent.compile().sql,
//!     r#"SELECT * FROM "users" WHERE ("users"."active" = ?) ORDER BY "users"."id" DESC LIMIT 10"#
//! );
//! assert_eq!(active.compile().sql, r#"SELECT * FROM "users" WHERE ("users"."active" = ?)"#);
//! ```
//!
//! Rendering always emits clauses in SQL order (WITH, SELECT, JOIN, WHERE,
//! GROUP BY, UNION, ORDER BY, LIMIT) whatever order they were added in.

mod join;
mod render;
mod write;

use serde::Serialize;

pub use join::JoinLayout;
pub use write::{OnConflict, Setter};

use crate::expr::{count_placeholders, count_star, Column, Expr, Fragment, IntoExpr, OrderTerm, SqlType};
use crate::value::Value;

/// The kind of named relation a query reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryType {
    #[default]
    Table,
    View,
    VirtualTable,
}

impl QueryType {
    /// Keyword used in `CREATE`/`DROP` statements.
    pub fn keyword(&self) -> &'static str {
        match self {
            QueryType::Table => "TABLE",
            QueryType::View => "VIEW",
            QueryType::VirtualTable => "VIRTUAL TABLE",
        }
    }

    /// Whether rows can be written through this relation.
    pub fn is_writable(&self) -> bool {
        !matches!(self, QueryType::View)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FromItem {
    Named {
        kind: QueryType,
        name: String,
        schema: Option<String>,
    },
    Subquery(Box<Query>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Source {
    pub(crate) from: FromItem,
    pub(crate) alias: Option<String>,
    /// Column names, when known from table metadata.
    pub(crate) columns: Option<Vec<String>>,
}

impl Source {
    /// Name used to qualify this source's columns.
    pub(crate) fn qualifier(&self) -> &str {
        match (&self.alias, &self.from) {
            (Some(alias), _) => alias,
            (None, FromItem::Named { name, .. }) => name,
            (None, FromItem::Subquery(_)) => "subquery",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Select {
    pub(crate) distinct: bool,
    pub(crate) columns: Vec<Fragment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Cross,
}

impl JoinType {
    fn keyword(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Cross => "CROSS JOIN",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Join {
    pub(crate) kind: JoinType,
    pub(crate) source: Source,
    pub(crate) on: Option<Fragment>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Group {
    pub(crate) by: Vec<Fragment>,
    pub(crate) having: Option<Fragment>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Limit {
    pub(crate) limit: i64,
    pub(crate) offset: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Union {
    pub(crate) all: bool,
    pub(crate) query: Query,
}

/// A common table expression for `WITH`.
#[derive(Debug, Clone, PartialEq)]
pub struct Cte {
    name: String,
    columns: Vec<String>,
    query: Query,
    recursive: bool,
    materialized: Option<bool>,
}

impl Cte {
    pub fn new(name: &str, query: &Query) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
            query: query.clone(),
            recursive: false,
            materialized: None,
        }
    }

    /// Explicit column list: `"name"("a", "b")`.
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.columns = columns.into_iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    /// Render `WITH RECURSIVE`.
    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    /// `AS MATERIALIZED` (true) or `AS NOT MATERIALIZED` (false).
    pub fn materialized(mut self, materialized: bool) -> Self {
        self.materialized = Some(materialized);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A query reading from this CTE by name.
    pub fn query(&self) -> Query {
        let query = Query::table(&self.name);
        if self.columns.is_empty() {
            query
        } else {
            query.with_columns(&self.columns)
        }
    }
}

/// SQL text plus its positional bindings, ready to prepare.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    pub sql: String,
    pub bindings: Vec<Value>,
}

impl CompiledQuery {
    /// Parameter slots in `sql`; builder output always has one binding per slot.
    pub fn param_count(&self) -> usize {
        count_placeholders(&self.sql)
    }
}

impl From<Fragment> for CompiledQuery {
    fn from(fragment: Fragment) -> Self {
        let (sql, bindings) = fragment.into_parts();
        Self { sql, bindings }
    }
}

/// Accumulated clauses of a SELECT.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub(crate) source: Source,
    pub(crate) select: Option<Select>,
    pub(crate) joins: Vec<Join>,
    pub(crate) filter: Option<Fragment>,
    pub(crate) group: Option<Group>,
    pub(crate) order: Vec<OrderTerm>,
    pub(crate) limit: Option<Limit>,
    pub(crate) unions: Vec<Union>,
    pub(crate) with: Vec<Cte>,
}

impl Query {
    pub fn new(kind: QueryType, name: &str) -> Self {
        Self::from_source(Source {
            from: FromItem::Named {
                kind,
                name: name.to_string(),
                schema: None,
            },
            alias: None,
            columns: None,
        })
    }

    pub fn table(name: &str) -> Self {
        Self::new(QueryType::Table, name)
    }

    pub fn view(name: &str) -> Self {
        Self::new(QueryType::View, name)
    }

    pub fn virtual_table(name: &str) -> Self {
        Self::new(QueryType::VirtualTable, name)
    }

    /// Select from a parenthesized subquery: `FROM (SELECT ...) AS "alias"`.
    pub fn from_query(query: &Query, alias: &str) -> Self {
        Self::from_source(Source {
            from: FromItem::Subquery(Box::new(query.clone())),
            alias: Some(alias.to_string()),
            columns: None,
        })
    }

    fn from_source(source: Source) -> Self {
        Self {
            source,
            select: None,
            joins: Vec::new(),
            filter: None,
            group: None,
            order: Vec::new(),
            limit: None,
            unions: Vec::new(),
            with: Vec::new(),
        }
    }

    pub fn kind(&self) -> Option<QueryType> {
        match &self.source.from {
            FromItem::Named { kind, .. } => Some(*kind),
            FromItem::Subquery(_) => None,
        }
    }

    /// Relation name; `None` for a subquery source.
    pub fn name(&self) -> Option<&str> {
        match &self.source.from {
            FromItem::Named { name, .. } => Some(name),
            FromItem::Subquery(_) => None,
        }
    }

    /// A column of this query's source, qualified by its alias or name.
    pub fn column<T: SqlType>(&self, name: &str) -> Column<T> {
        Column::qualified(self.source.qualifier(), name)
    }

    /// Known column names, if the query was built from table metadata.
    pub fn columns(&self) -> Option<&[String]> {
        self.source.columns.as_deref()
    }

    pub fn alias(&self, alias: &str) -> Query {
        let mut next = self.clone();
        next.source.alias = Some(alias.to_string());
        next
    }

    /// Attached database the relation lives in (`"aux"."users"`).
    pub fn schema(&self, schema: &str) -> Query {
        let mut next = self.clone();
        if let FromItem::Named { schema: s, .. } = &mut next.source.from {
            *s = Some(schema.to_string());
        }
        next
    }

    /// Record the source's column names; enables explicit column lists and
    /// [`JoinLayout`]s.
    pub fn with_columns<I, S>(&self, columns: I) -> Query
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut next = self.clone();
        next.source.columns = Some(columns.into_iter().map(|c| c.as_ref().to_string()).collect());
        next
    }

    /// Replace the result column list.
    pub fn select<I, F>(&self, columns: I) -> Query
    where
        I: IntoIterator<Item = F>,
        F: Into<Fragment>,
    {
        self.with_select(false, columns)
    }

    pub fn select_distinct<I, F>(&self, columns: I) -> Query
    where
        I: IntoIterator<Item = F>,
        F: Into<Fragment>,
    {
        self.with_select(true, columns)
    }

    fn with_select<I, F>(&self, distinct: bool, columns: I) -> Query
    where
        I: IntoIterator<Item = F>,
        F: Into<Fragment>,
    {
        let mut next = self.clone();
        next.select = Some(Select {
            distinct,
            columns: columns.into_iter().map(Into::into).collect(),
        });
        next
    }

    /// Add a WHERE predicate, AND-ed with any existing one.
    pub fn filter(&self, predicate: impl IntoExpr<bool>) -> Query {
        let mut next = self.clone();
        next.filter = Some(conjoin(next.filter.take(), predicate.into_expr().into_fragment()));
        next
    }

    /// Inner join. The joined query's own WHERE is folded into the ON clause.
    pub fn join(&self, other: &Query, on: impl IntoExpr<bool>) -> Query {
        self.add_join(JoinType::Inner, other, Some(on.into_expr().into_fragment()))
    }

    pub fn left_join(&self, other: &Query, on: impl IntoExpr<bool>) -> Query {
        self.add_join(JoinType::Left, other, Some(on.into_expr().into_fragment()))
    }

    pub fn cross_join(&self, other: &Query) -> Query {
        self.add_join(JoinType::Cross, other, None)
    }

    fn add_join(&self, kind: JoinType, other: &Query, on: Option<Fragment>) -> Query {
        let on = match (on, other.filter.clone()) {
            (Some(on), Some(filter)) => Some(conjoin(Some(on), filter)),
            (on, filter) => on.or(filter),
        };
        let mut next = self.clone();
        next.joins.push(Join {
            kind,
            source: other.source.clone(),
            on,
        });
        next.joins.extend(other.joins.iter().cloned());
        next
    }

    pub fn group_by<I, F>(&self, by: I) -> Query
    where
        I: IntoIterator<Item = F>,
        F: Into<Fragment>,
    {
        let mut next = self.clone();
        next.group = Some(Group {
            by: by.into_iter().map(Into::into).collect(),
            having: None,
        });
        next
    }

    pub fn group_by_having<I, F>(&self, by: I, having: impl IntoExpr<bool>) -> Query
    where
        I: IntoIterator<Item = F>,
        F: Into<Fragment>,
    {
        let mut next = self.group_by(by);
        if let Some(group) = next.group.as_mut() {
            group.having = Some(having.into_expr().into_fragment());
        }
        next
    }

    /// Append ORDER BY terms.
    pub fn order<I, O>(&self, terms: I) -> Query
    where
        I: IntoIterator<Item = O>,
        O: Into<OrderTerm>,
    {
        let mut next = self.clone();
        next.order.extend(terms.into_iter().map(Into::into));
        next
    }

    pub fn limit(&self, limit: i64) -> Query {
        let mut next = self.clone();
        next.limit = Some(Limit { limit, offset: None });
        next
    }

    pub fn limit_offset(&self, limit: i64, offset: i64) -> Query {
        let mut next = self.clone();
        next.limit = Some(Limit {
            limit,
            offset: Some(offset),
        });
        next
    }

    /// `UNION` (duplicates removed).
    pub fn union(&self, other: &Query) -> Query {
        self.add_union(false, other)
    }

    pub fn union_all(&self, other: &Query) -> Query {
        self.add_union(true, other)
    }

    fn add_union(&self, all: bool, other: &Query) -> Query {
        let mut next = self.clone();
        next.unions.push(Union {
            all,
            query: other.clone(),
        });
        next
    }

    pub fn with(&self, cte: Cte) -> Query {
        let mut next = self.clone();
        next.with.push(cte);
        next
    }

    /// A query counting this query's rows.
    pub fn count(&self) -> Query {
        let distinct = self.select.as_ref().is_some_and(|s| s.distinct);
        if distinct || self.group.is_some() || self.limit.is_some() || !self.unions.is_empty() {
            return Query::from_query(self, "counted").select([count_star()]);
        }
        let mut next = self.select([count_star()]);
        next.order.clear();
        next
    }

    /// `EXISTS (SELECT ...)`.
    pub fn exists(&self) -> Expr<bool> {
        Expr::from_fragment(self.to_fragment().wrapped("EXISTS (", ")"))
    }

    /// This query as a scalar subquery `(SELECT ...)`.
    pub fn as_expr<T: SqlType>(&self) -> Expr<T> {
        Expr::from_fragment(self.to_fragment().wrapped("(", ")"))
    }

    /// Result layout of a multi-table query, when every source's columns are
    /// known and no explicit select list replaces them.
    pub fn layout(&self) -> Option<JoinLayout> {
        if self.select.is_some() {
            return None;
        }
        let mut layout = JoinLayout::new();
        for source in self.sources() {
            layout.push(source.qualifier(), source.columns.as_ref()?.len());
        }
        Some(layout)
    }

    pub(crate) fn sources(&self) -> impl Iterator<Item = &Source> {
        std::iter::once(&self.source).chain(self.joins.iter().map(|j| &j.source))
    }
}

/// `(lhs AND rhs)`, or `rhs` alone.
fn conjoin(lhs: Option<Fragment>, rhs: Fragment) -> Fragment {
    match lhs {
        Some(lhs) => Expr::<bool>::from_fragment(lhs).and(Expr::<bool>::from_fragment(rhs)).into_fragment(),
        None => rhs,
    }
}
