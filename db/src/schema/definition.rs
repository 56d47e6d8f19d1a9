//! Column and table metadata.
//!
//! Metadata is supplied by the caller; nothing here reads the database
//! schema back. A [`Table`] derives its DDL, its canonical SELECT and the
//! primary-key driven row writes from its [`ColumnDef`]s.

use crate::db::{DbError, Result};
use crate::escape::{quote_identifier, quote_qualified};
use crate::expr::{Column, Expr, Fragment, SqlType};
use crate::query::{CompiledQuery, Query, Setter};
use crate::value::{ColumnType, Value};

/// Action taken on the child row when a referenced parent row changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeignKeyAction {
    NoAction,
    Restrict,
    SetNull,
    SetDefault,
    Cascade,
}

impl ForeignKeyAction {
    pub fn sql(&self) -> &'static str {
        match self {
            ForeignKeyAction::NoAction => "NO ACTION",
            ForeignKeyAction::Restrict => "RESTRICT",
            ForeignKeyAction::SetNull => "SET NULL",
            ForeignKeyAction::SetDefault => "SET DEFAULT",
            ForeignKeyAction::Cascade => "CASCADE",
        }
    }
}

/// A `REFERENCES` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
    pub on_delete: Option<ForeignKeyAction>,
    pub on_update: Option<ForeignKeyAction>,
}

/// Represents a column of a table.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
    pub primary_key: bool,
    pub autoincrement: bool,
    pub unique: bool,
    pub not_null: bool,
    /// Rendered as a literal in `DEFAULT`.
    pub default: Option<Value>,
    /// Whether a separate index is created for this column.
    pub indexed: bool,
    pub references: Option<ForeignKey>,
}

impl ColumnDef {
    pub fn new(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            column_type,
            primary_key: false,
            autoincrement: false,
            unique: false,
            not_null: false,
            default: None,
            indexed: false,
            references: None,
        }
    }

    /// A column whose declared type and nullability follow the logical type `T`.
    pub fn typed<T: SqlType>(name: &str) -> Self {
        Self {
            not_null: !T::NULLABLE,
            ..Self::new(name, T::DECLARED)
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// `INTEGER PRIMARY KEY AUTOINCREMENT`; implies primary key.
    pub fn autoincrement(mut self) -> Self {
        self.primary_key = true;
        self.autoincrement = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    pub fn references(mut self, table: &str, column: &str) -> Self {
        self.references = Some(ForeignKey {
            table: table.to_string(),
            column: column.to_string(),
            on_delete: None,
            on_update: None,
        });
        self
    }

    pub fn on_delete(mut self, action: ForeignKeyAction) -> Self {
        if let Some(fk) = self.references.as_mut() {
            fk.on_delete = Some(action);
        }
        self
    }

    pub fn on_update(mut self, action: ForeignKeyAction) -> Self {
        if let Some(fk) = self.references.as_mut() {
            fk.on_update = Some(action);
        }
        self
    }

    /// Column definition as it appears inside `CREATE TABLE`.
    /// `inline_primary_key` is false when the table declares a composite key.
    pub fn to_sql(&self, inline_primary_key: bool) -> String {
        let mut sql = format!("{} {}", quote_identifier(&self.name), self.column_type.sql_name());
        if self.primary_key && inline_primary_key {
            sql.push_str(" PRIMARY KEY");
            if self.autoincrement {
                sql.push_str(" AUTOINCREMENT");
            }
        }
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(default) = &self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&default.to_sql_literal());
        }
        if let Some(fk) = &self.references {
            sql.push_str(&format!(
                " REFERENCES {}({})",
                quote_identifier(&fk.table),
                quote_identifier(&fk.column)
            ));
            if let Some(action) = fk.on_delete {
                sql.push_str(" ON DELETE ");
                sql.push_str(action.sql());
            }
            if let Some(action) = fk.on_update {
                sql.push_str(" ON UPDATE ");
                sql.push_str(action.sql());
            }
        }
        sql
    }
}

/// Represents a complete table.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub schema: Option<String>,
    pub columns: Vec<ColumnDef>,
    pub without_rowid: bool,
}

impl Table {
    pub fn new(name: &str, columns: Vec<ColumnDef>) -> Self {
        Self {
            name: name.to_string(),
            schema: None,
            columns,
            without_rowid: false,
        }
    }

    pub fn in_schema(mut self, schema: &str) -> Self {
        self.schema = Some(schema.to_string());
        self
    }

    pub fn without_rowid(mut self) -> Self {
        self.without_rowid = true;
        self
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn primary_key(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| c.primary_key)
    }

    /// A column qualified by this table's name.
    pub fn column<T: SqlType>(&self, name: &str) -> Column<T> {
        Column::qualified(&self.name, name)
    }

    fn qualified_name(&self) -> String {
        quote_qualified(self.schema.as_deref(), &self.name)
    }

    pub fn create(&self) -> String {
        self.render_create(false)
    }

    pub fn create_if_not_exists(&self) -> String {
        self.render_create(true)
    }

    fn render_create(&self, if_not_exists: bool) -> String {
        let keys: Vec<_> = self.primary_key().collect();
        let inline = keys.len() <= 1;
        let mut parts: Vec<_> = self.columns.iter().map(|c| c.to_sql(inline)).collect();
        if !inline {
            let names: Vec<_> = keys.iter().map(|c| quote_identifier(&c.name)).collect();
            parts.push(format!("PRIMARY KEY ({})", names.join(", ")));
        }
        format!(
            "CREATE TABLE {}{} ({}){}",
            if if_not_exists { "IF NOT EXISTS " } else { "" },
            self.qualified_name(),
            parts.join(", "),
            if self.without_rowid { " WITHOUT ROWID" } else { "" }
        )
    }

    pub fn drop(&self) -> String {
        format!("DROP TABLE {}", self.qualified_name())
    }

    pub fn drop_if_exists(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", self.qualified_name())
    }

    pub fn add_column(&self, column: &ColumnDef) -> String {
        format!("ALTER TABLE {} ADD COLUMN {}", self.qualified_name(), column.to_sql(true))
    }

    pub fn rename(&self, new_name: &str) -> String {
        format!("ALTER TABLE {} RENAME TO {}", self.qualified_name(), quote_identifier(new_name))
    }

    pub fn create_index(&self, name: &str, columns: &[&str], unique: bool) -> String {
        let columns: Vec<_> = columns.iter().map(|c| quote_identifier(c)).collect();
        format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
            if unique { "UNIQUE " } else { "" },
            quote_qualified(self.schema.as_deref(), name),
            quote_identifier(&self.name),
            columns.join(", ")
        )
    }

    pub fn drop_index(&self, name: &str) -> String {
        format!("DROP INDEX IF EXISTS {}", quote_qualified(self.schema.as_deref(), name))
    }

    /// Index statements for every column flagged `indexed`, named `<table>_<column>_idx`.
    pub fn index_statements(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.indexed)
            .map(|c| self.create_index(&format!("{}_{}_idx", self.name, c.name), &[&c.name], false))
            .collect()
    }

    /// `SELECT <columns> FROM <name>`.
    pub fn query(&self) -> Query {
        let query = Query::table(&self.name).with_columns(self.column_names());
        match &self.schema {
            Some(schema) => query.schema(schema),
            None => query,
        }
    }

    fn setters(&self, values: &[Value]) -> Result<Vec<Setter>> {
        if values.len() != self.columns.len() {
            return Err(DbError::ColumnMismatch {
                row: 0,
                expected: self.columns.len(),
                actual: values.len(),
            });
        }
        Ok(self
            .columns
            .iter()
            .zip(values)
            .map(|(c, v)| Setter::new(&c.name, Fragment::value(v.clone())))
            .collect())
    }

    fn key_filter(&self, key: &[Value]) -> Result<Query> {
        let keys: Vec<_> = self.primary_key().collect();
        if keys.is_empty() {
            return Err(DbError::NoPrimaryKey {
                table: self.name.clone(),
            });
        }
        if keys.len() != key.len() {
            return Err(DbError::ColumnMismatch {
                row: 0,
                expected: keys.len(),
                actual: key.len(),
            });
        }
        Ok(keys.iter().zip(key).fold(self.query(), |query, (def, value)| {
            // Key values are dynamically typed; `equals` is used for its
            // NULL handling, so a NULL key matches with `IS NULL`.
            let key_column = Column::<Option<i64>>::new(&def.name);
            query.filter(key_column.equals(Expr::<Option<i64>>::value(value.clone())))
        }))
    }

    /// Insert a full row given in column order.
    pub fn insert_row(&self, values: &[Value]) -> Result<CompiledQuery> {
        Ok(self.query().insert(&self.setters(values)?))
    }

    /// Insert a full row, or update its non-key columns when the key exists.
    pub fn upsert_row(&self, values: &[Value]) -> Result<CompiledQuery> {
        let keys: Vec<_> = self.primary_key().map(|c| c.name.as_str()).collect();
        self.query().upsert(&self.setters(values)?, &keys)
    }

    /// Update every non-key column of the row whose key matches `values`.
    ///
    /// # Errors
    ///
    /// [`DbError::NoAssignments`] when every column is part of the key.
    pub fn update_row(&self, values: &[Value]) -> Result<CompiledQuery> {
        let setters = self.setters(values)?;
        let key: Vec<_> = self
            .columns
            .iter()
            .zip(values)
            .filter(|(c, _)| c.primary_key)
            .map(|(_, v)| v.clone())
            .collect();
        let filtered = self.key_filter(&key)?;
        let changes: Vec<_> = self
            .columns
            .iter()
            .zip(setters)
            .filter(|(c, _)| !c.primary_key)
            .map(|(_, s)| s)
            .collect();
        filtered.update(&changes)
    }

    /// Delete the row with the given primary key value(s).
    pub fn delete_row(&self, key: &[Value]) -> Result<CompiledQuery> {
        Ok(self.key_filter(key)?.delete())
    }
}
