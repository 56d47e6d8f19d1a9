use std::error::Error;

use litequery::expr::column;
use litequery::{Connection, Query};
use serde::Serialize;

use super::TablesCmd;
use crate::commands::Execute;

/// One schema object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableEntry {
    pub name: String,
    pub kind: String,
    pub rows: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TablesResult {
    pub tables: Vec<TableEntry>,
}

/// User tables (and optionally views) from the schema table, by name.
fn schema_query(include_views: bool) -> Query {
    let name = column::<String>("name");
    let kind = column::<String>("type");
    let kinds: &[&str] = if include_views {
        &["table", "view"]
    } else {
        &["table"]
    };
    Query::table("sqlite_master")
        .select([&name, &kind])
        .filter(kind.in_list(kinds.iter().copied()))
        .filter(name.like("sqlite\\_%", Some('\\')).not())
        .order([name.asc()])
}

impl Execute for TablesCmd {
    type Output = TablesResult;

    fn execute(self, conn: &Connection) -> Result<Self::Output, Box<dyn Error>> {
        let compiled = schema_query(self.views).compile();
        let objects: Vec<(String, String)> = conn.query_as(&compiled.sql, &compiled.bindings)?;
        let mut tables = Vec::with_capacity(objects.len());
        for (name, kind) in objects {
            let rows = conn.count(&Query::table(&name))?;
            tables.push(TableEntry { name, kind, rows });
        }
        Ok(TablesResult { tables })
    }
}
