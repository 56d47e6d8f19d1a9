//! SELECT rendering.

use super::{CompiledQuery, Cte, FromItem, Query, Source};
use crate::escape::{quote_identifier, quote_qualified};
use crate::expr::{Fragment, OrderTerm};

impl Query {
    /// Render to SQL text and bindings.
    pub fn compile(&self) -> CompiledQuery {
        self.to_fragment().into()
    }

    /// The full statement as a fragment, for embedding as a subquery.
    pub fn to_fragment(&self) -> Fragment {
        let mut clauses = Vec::new();
        if !self.with.is_empty() {
            clauses.push(render_with(&self.with));
        }
        clauses.push(self.core());
        for union in &self.unions {
            push_union(&mut clauses, union.all, &union.query);
        }
        if !self.order.is_empty() {
            let terms = self.order.iter().map(OrderTerm::to_fragment);
            clauses.push(Fragment::join(terms, ", ").wrapped("ORDER BY ", ""));
        }
        if let Some(limit) = self.limit {
            let sql = match limit.offset {
                Some(offset) => format!("LIMIT {} OFFSET {}", limit.limit, offset),
                None => format!("LIMIT {}", limit.limit),
            };
            clauses.push(Fragment::literal(sql));
        }
        Fragment::join(clauses, " ")
    }

    /// SELECT .. FROM .. JOIN .. WHERE .. GROUP BY: the part a UNION repeats.
    fn core(&self) -> Fragment {
        let mut clauses = vec![self.select_list(), source_fragment(&self.source).wrapped("FROM ", "")];
        for join in &self.joins {
            let mut clause = source_fragment(&join.source).wrapped(&format!("{} ", join.kind.keyword()), "");
            if let Some(on) = &join.on {
                clause.push_sql(" ON ");
                clause.append(on.clone());
            }
            clauses.push(clause);
        }
        if let Some(filter) = &self.filter {
            clauses.push(filter.wrapped("WHERE ", ""));
        }
        if let Some(group) = &self.group {
            clauses.push(Fragment::join(group.by.iter().cloned(), ", ").wrapped("GROUP BY ", ""));
            if let Some(having) = &group.having {
                clauses.push(having.wrapped("HAVING ", ""));
            }
        }
        Fragment::join(clauses, " ")
    }

    fn select_list(&self) -> Fragment {
        let (distinct, columns) = match &self.select {
            Some(select) => (select.distinct, Fragment::join(select.columns.iter().cloned(), ", ")),
            None => (false, self.default_columns()),
        };
        if distinct {
            columns.wrapped("SELECT DISTINCT ", "")
        } else {
            columns.wrapped("SELECT ", "")
        }
    }

    /// Known columns of every source, qualified when joining; `*` otherwise.
    fn default_columns(&self) -> Fragment {
        let qualify = !self.joins.is_empty();
        let mut names = Vec::new();
        for source in self.sources() {
            let Some(columns) = &source.columns else {
                return Fragment::literal("*");
            };
            for column in columns {
                names.push(if qualify {
                    quote_qualified(Some(source.qualifier()), column)
                } else {
                    quote_identifier(column)
                });
            }
        }
        if names.is_empty() {
            return Fragment::literal("*");
        }
        Fragment::literal(names.join(", "))
    }
}

/// Append `UNION [ALL] <operand>`.
///
/// An operand is spliced in flat when that keeps the result unchanged: it has
/// no WITH, ORDER BY or LIMIT of its own and every union inside it uses the
/// same operator. Anything else is wrapped as `SELECT * FROM (...)`, since
/// SQLite rejects parenthesized compound operands.
fn push_union(clauses: &mut Vec<Fragment>, all: bool, operand: &Query) {
    clauses.push(Fragment::literal(if all { "UNION ALL" } else { "UNION" }));
    let flat = operand.with.is_empty()
        && operand.order.is_empty()
        && operand.limit.is_none()
        && operand.unions.iter().all(|u| u.all == all);
    if flat {
        clauses.push(operand.core());
        for nested in &operand.unions {
            push_union(clauses, nested.all, &nested.query);
        }
    } else {
        clauses.push(operand.to_fragment().wrapped("SELECT * FROM (", ")"));
    }
}

/// `"schema"."name" AS "alias"` or `(SELECT ...) AS "alias"`.
pub(crate) fn source_fragment(source: &Source) -> Fragment {
    let mut out = match &source.from {
        FromItem::Named { name, schema, .. } => Fragment::literal(quote_qualified(schema.as_deref(), name)),
        FromItem::Subquery(query) => query.to_fragment().wrapped("(", ")"),
    };
    if let Some(alias) = &source.alias {
        out.push_sql(" AS ");
        out.push_sql(&quote_identifier(alias));
    }
    out
}

fn render_with(ctes: &[Cte]) -> Fragment {
    let recursive = ctes.iter().any(|c| c.recursive);
    let parts = ctes.iter().map(|cte| {
        let mut head = quote_identifier(&cte.name);
        if !cte.columns.is_empty() {
            let columns: Vec<_> = cte.columns.iter().map(|c| quote_identifier(c)).collect();
            head.push_str(&format!("({})", columns.join(", ")));
        }
        head.push_str(match cte.materialized {
            Some(true) => " AS MATERIALIZED (",
            Some(false) => " AS NOT MATERIALIZED (",
            None => " AS (",
        });
        cte.query.to_fragment().wrapped(&head, ")")
    });
    let keyword = if recursive { "WITH RECURSIVE " } else { "WITH " };
    Fragment::join(parts, ", ").wrapped(keyword, "")
}
