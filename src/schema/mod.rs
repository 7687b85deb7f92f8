//! Table and index definitions, and the catalog that hands them out.

mod index_def;
mod memory_schema;
mod table_def;

use std::sync::Arc;

use crate::common::Result;

pub use index_def::*;
pub use memory_schema::*;
pub use table_def::*;

/// Read access to the database schema.
pub trait Schema: Send + Sync {
    /// Looks up a table definition; fails with `TableNotFound`.
    fn table(&self, name: &str) -> Result<Arc<TableDef>>;

    /// Every index on `table_name`, implicit ones included.
    fn indexes(&self, table_name: &str) -> Vec<Arc<IndexDef>>;

    fn index(&self, name: &str) -> Option<Arc<IndexDef>>;
}
