use std::sync::Arc;

use bytes::Bytes;
use tracing::trace;

use crate::common::{Result, RowId, RowStoreError, TextEncoding};
use crate::schema::IndexDef;
use crate::storage::btree::{BtreeCursor, BtreeEngine};
use crate::table::BtreeTable;
use crate::tuple::{decode_record, encode_record, Value};

/// One secondary index B-tree.
///
/// Every entry is a record of the indexed values followed by the rowid of the
/// row they came from, so entries sharing a key still differ and the tree
/// itself never rejects a duplicate. Uniqueness is the owning table's job.
pub struct IndexTable<C: BtreeCursor> {
    def: Arc<IndexDef>,
    btree: BtreeTable<C>,
    encoding: TextEncoding,
}

impl<C: BtreeCursor> IndexTable<C> {
    pub fn open<E>(engine: &E, def: Arc<IndexDef>, write: bool) -> Result<Self>
    where
        E: BtreeEngine<Cursor = C>,
    {
        let btree = BtreeTable::open(engine, def.name(), def.root(), write)?;
        Ok(Self {
            def,
            btree,
            encoding: engine.options().encoding,
        })
    }

    /// Opens a second handle on the same index with its own cursor.
    pub fn try_clone<E>(&self, engine: &E) -> Result<Self>
    where
        E: BtreeEngine<Cursor = C>,
    {
        Self::open(engine, Arc::clone(&self.def), self.btree.is_writable())
    }

    pub fn definition(&self) -> &Arc<IndexDef> {
        &self.def
    }

    pub fn name(&self) -> &str {
        self.def.name()
    }

    /// Finds the rowid stored with the first entry whose key equals `key`.
    ///
    /// With `prefer_next`, a miss falls through to the first entry sorting
    /// after `key`.
    pub fn lookup(&mut self, prefer_next: bool, key: &[Value]) -> Result<Option<RowId>> {
        if key.is_empty() {
            return Err(RowStoreError::misuse(format!(
                "empty key for index {}",
                self.def.name()
            )));
        }
        let probe = encode_record(key, self.encoding);
        if !self.btree.seek_key(&probe, prefer_next)? {
            return Ok(None);
        }
        self.current_rowid().map(Some)
    }

    /// Adds the entry for `rowid`.
    ///
    /// The entry is written as given. Callers inserting into a unique index
    /// (`allow_duplicates == false`) must have checked the key beforehand.
    pub fn insert(&mut self, rowid: RowId, allow_duplicates: bool, key: &[Value]) -> Result<()> {
        let entry = self.entry(rowid, key);
        self.btree.insert_key(&entry)?;
        trace!(index = self.def.name(), %rowid, unique = !allow_duplicates, "inserted index entry");
        Ok(())
    }

    /// Removes the entry for `rowid`; false when there was none.
    pub fn delete(&mut self, rowid: RowId, key: &[Value]) -> Result<bool> {
        let entry = self.entry(rowid, key);
        if !self.btree.seek_key(&entry, false)? {
            return Ok(false);
        }
        self.btree.delete()?;
        Ok(true)
    }

    /// Every `(key, rowid)` pair, in index order.
    pub fn entries(&mut self) -> Result<Vec<(Vec<Value>, RowId)>> {
        let mut entries = Vec::new();
        let mut more = self.btree.first()?;
        while more {
            let mut values = decode_record(&self.btree.key()?, self.encoding)?;
            let rowid = Self::split_rowid(self.def.name(), &mut values)?;
            entries.push((values, rowid));
            more = self.btree.next()?;
        }
        Ok(entries)
    }

    pub fn close(&mut self) -> Result<()> {
        self.btree.close()
    }

    fn entry(&self, rowid: RowId, key: &[Value]) -> Bytes {
        let mut values = key.to_vec();
        values.push(Value::Integer(rowid.get()));
        encode_record(&values, self.encoding)
    }

    fn current_rowid(&self) -> Result<RowId> {
        let mut values = decode_record(&self.btree.key()?, self.encoding)?;
        Self::split_rowid(self.def.name(), &mut values)
    }

    /// Pops the trailing rowid off a decoded index entry.
    fn split_rowid(name: &str, values: &mut Vec<Value>) -> Result<RowId> {
        values
            .pop()
            .and_then(|v| v.as_integer())
            .and_then(RowId::new)
            .ok_or_else(|| RowStoreError::corrupt(format!("index {} entry has no rowid", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::btree::{MemoryBtree, MemoryCursor, TreeKind};

    fn open_index(engine: &MemoryBtree) -> IndexTable<MemoryCursor> {
        let mut def = IndexDef::new("idx_name", "t").column("name");
        def.set_root(engine.create_tree(TreeKind::Index).unwrap());
        IndexTable::open(engine, Arc::new(def), true).unwrap()
    }

    fn rowid(id: i64) -> RowId {
        RowId::new(id).unwrap()
    }

    #[test]
    fn test_lookup() {
        let engine = MemoryBtree::default();
        let mut index = open_index(&engine);
        index.insert(rowid(2), true, &[Value::from("bob")]).unwrap();
        index.insert(rowid(1), true, &[Value::from("alice")]).unwrap();

        assert_eq!(index.lookup(false, &[Value::from("bob")]).unwrap(), Some(rowid(2)));
        assert_eq!(index.lookup(false, &[Value::from("carl")]).unwrap(), None);
        assert_eq!(index.lookup(true, &[Value::from("ann")]).unwrap(), Some(rowid(2)));
        assert_eq!(index.lookup(true, &[Value::from("zed")]).unwrap(), None);
        assert!(index.lookup(false, &[]).is_err());
    }

    #[test]
    fn test_duplicates_and_delete() {
        let engine = MemoryBtree::default();
        let mut index = open_index(&engine);
        index.insert(rowid(3), true, &[Value::from("x")]).unwrap();
        index.insert(rowid(1), true, &[Value::from("x")]).unwrap();
        index.insert(rowid(5), false, &[Value::Null]).unwrap();

        // lowest rowid first among equal keys
        assert_eq!(index.lookup(false, &[Value::from("x")]).unwrap(), Some(rowid(1)));
        assert!(index.delete(rowid(1), &[Value::from("x")]).unwrap());
        assert!(!index.delete(rowid(1), &[Value::from("x")]).unwrap());
        assert_eq!(index.lookup(false, &[Value::from("x")]).unwrap(), Some(rowid(3)));

        let entries = index.entries().unwrap();
        assert_eq!(
            entries,
            vec![
                (vec![Value::Null], rowid(5)),
                (vec![Value::from("x")], rowid(3)),
            ]
        );
    }

    #[test]
    fn test_insert_leaves_uniqueness_to_caller() {
        let engine = MemoryBtree::default();
        let mut index = open_index(&engine);
        index.insert(rowid(1), false, &[Value::from("x")]).unwrap();
        index.insert(rowid(2), false, &[Value::from("x")]).unwrap();
        assert_eq!(index.entries().unwrap().len(), 2);
        assert_eq!(index.lookup(false, &[Value::from("x")]).unwrap(), Some(rowid(1)));
    }

    #[test]
    fn test_clone_shares_tree() {
        let engine = MemoryBtree::default();
        let mut index = open_index(&engine);
        let mut copy = index.try_clone(&engine).unwrap();
        index.insert(rowid(9), true, &[Value::Integer(7)]).unwrap();
        assert_eq!(copy.lookup(false, &[Value::Integer(7)]).unwrap(), Some(rowid(9)));
        index.close().unwrap();
        assert!(copy.lookup(false, &[Value::Integer(7)]).is_ok());
    }
}
