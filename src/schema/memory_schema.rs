use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::common::{Result, RowStoreError};
use crate::storage::btree::{BtreeEngine, TreeKind};

use super::{IndexDef, Schema, TableDef};

/// Schema catalog held in memory.
///
/// Creating a table or index allocates its tree in the engine and records the
/// root page on the stored definition.
#[derive(Debug, Default)]
pub struct MemorySchema {
    tables: RwLock<BTreeMap<String, Arc<TableDef>>>,
    indexes: RwLock<BTreeMap<String, Arc<IndexDef>>>,
}

impl MemorySchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `def`, creating its table tree and one index tree per
    /// implicit index.
    pub fn create_table<E: BtreeEngine>(&self, engine: &E, mut def: TableDef) -> Result<Arc<TableDef>> {
        let mut tables = self.tables.write();
        if tables.contains_key(def.name()) {
            return Err(RowStoreError::misuse(format!(
                "table {} already exists",
                def.name()
            )));
        }

        def.set_root(engine.create_tree(TreeKind::Table)?);

        let mut indexes = self.indexes.write();
        for index_name in def.implicit_index_names() {
            let mut index = IndexDef::implicit(index_name, def.name());
            index.set_root(engine.create_tree(TreeKind::Index)?);
            indexes.insert(index_name.to_string(), Arc::new(index));
        }

        debug!(table = def.name(), root = %def.root(), "created table");
        let def = Arc::new(def);
        tables.insert(def.name().to_string(), Arc::clone(&def));
        Ok(def)
    }

    /// Registers an explicit index. The table must exist and every key column
    /// must belong to it.
    pub fn create_index<E: BtreeEngine>(&self, engine: &E, mut def: IndexDef) -> Result<Arc<IndexDef>> {
        let table = self.table(def.table_name())?;
        let mut indexes = self.indexes.write();
        if indexes.contains_key(def.name()) {
            return Err(RowStoreError::misuse(format!(
                "index {} already exists",
                def.name()
            )));
        }
        if def.columns().is_empty() {
            return Err(RowStoreError::invalid(format!(
                "index {} has no columns",
                def.name()
            )));
        }
        if let Some(missing) = def
            .columns()
            .iter()
            .find(|c| table.column_index(c).is_none())
        {
            return Err(RowStoreError::invalid(format!(
                "table {} has no column named {}",
                table.name(),
                missing
            )));
        }

        def.set_root(engine.create_tree(TreeKind::Index)?);
        debug!(index = def.name(), table = def.table_name(), root = %def.root(), "created index");
        let def = Arc::new(def);
        indexes.insert(def.name().to_string(), Arc::clone(&def));
        Ok(def)
    }
}

impl Schema for MemorySchema {
    fn table(&self, name: &str) -> Result<Arc<TableDef>> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| RowStoreError::TableNotFound(name.to_string()))
    }

    fn indexes(&self, table_name: &str) -> Vec<Arc<IndexDef>> {
        self.indexes
            .read()
            .values()
            .filter(|idx| idx.table_name() == table_name)
            .cloned()
            .collect()
    }

    fn index(&self, name: &str) -> Option<Arc<IndexDef>> {
        self.indexes.read().get(name).cloned()
    }
}
