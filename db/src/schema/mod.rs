//! Schema metadata for tables built by hand or by application code.

pub mod definition;

pub use definition::{ColumnDef, ForeignKey, ForeignKeyAction, Table};
