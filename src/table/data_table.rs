use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::common::{Result, RowId, RowStoreError};
use crate::index::IndexTable;
use crate::schema::{IndexDef, Schema, TableDef};
use crate::storage::btree::{BtreeCursor, BtreeEngine};
use crate::tuple::{compare_keys, NamedFields, RecordCodec, Row, RowValues, Value};

use super::rowid::{allocate, RowIdPlan};
use super::BtreeTable;

/// Cursors owned by one table handle.
struct TableState<C: BtreeCursor> {
    table: BtreeTable<C>,
    indexes: BTreeMap<String, IndexTable<C>>,
}

/// A table together with every index declared on it.
///
/// Each public operation holds the handle's lock from start to finish, so
/// validation, the row write and the index fan-out of one call never
/// interleave with another call on the same handle. Mutations check every
/// uniqueness rule before writing anything; a rejected insert or update
/// leaves the rows and all indexes untouched.
///
/// When the table has an `INTEGER PRIMARY KEY`, the record stores NULL in
/// that column and reads substitute the rowid.
pub struct DataTable<E: BtreeEngine> {
    engine: Arc<E>,
    def: Arc<TableDef>,
    index_defs: Arc<BTreeMap<String, Arc<IndexDef>>>,

    /// Column positions of each index key, in key order
    key_columns: Arc<BTreeMap<String, Vec<usize>>>,

    codec: RecordCodec,
    write: bool,
    state: Mutex<TableState<E::Cursor>>,
}

impl<E: BtreeEngine> DataTable<E> {
    /// Opens `table_name` and every index on it.
    pub fn open<S>(engine: Arc<E>, schema: &S, table_name: &str, write: bool) -> Result<Self>
    where
        S: Schema + ?Sized,
    {
        let def = schema.table(table_name)?;

        let mut index_defs = BTreeMap::new();
        let mut key_columns = BTreeMap::new();
        for index in schema.indexes(table_name) {
            let columns = def
                .index_columns(&index)
                .iter()
                .map(|name| {
                    def.column_index(name).ok_or_else(|| {
                        RowStoreError::Internal(format!(
                            "index {} refers to missing column {}.{}",
                            index.name(),
                            def.name(),
                            name
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            if columns.is_empty() {
                return Err(RowStoreError::Internal(format!(
                    "index {} has no key columns",
                    index.name()
                )));
            }
            key_columns.insert(index.name().to_string(), columns);
            index_defs.insert(index.name().to_string(), index);
        }

        let state = Self::open_cursors(&engine, &def, &index_defs, write)?;
        let codec = RecordCodec::new(engine.options().encoding, def.column_count());
        debug!(table = def.name(), indexes = index_defs.len(), write, "opened table");

        Ok(Self {
            engine,
            def,
            index_defs: Arc::new(index_defs),
            key_columns: Arc::new(key_columns),
            codec,
            write,
            state: Mutex::new(state),
        })
    }

    fn open_cursors(
        engine: &E,
        def: &TableDef,
        index_defs: &BTreeMap<String, Arc<IndexDef>>,
        write: bool,
    ) -> Result<TableState<E::Cursor>> {
        let table = BtreeTable::open(engine, def.name(), def.root(), write)?;
        let mut indexes = BTreeMap::new();
        for (name, index) in index_defs {
            // cursors opened so far are released on drop if this fails
            indexes.insert(name.clone(), IndexTable::open(engine, Arc::clone(index), write)?);
        }
        Ok(TableState { table, indexes })
    }

    /// Opens a second handle on the same table with fresh cursors,
    /// positioned on the same row as this one.
    pub fn try_clone(&self) -> Result<Self> {
        let state = self.state.lock();
        let mut copy = TableState {
            table: BtreeTable::open(&*self.engine, self.def.name(), self.def.root(), self.write)?,
            indexes: BTreeMap::new(),
        };
        for (name, index) in &state.indexes {
            copy.indexes
                .insert(name.clone(), index.try_clone(&*self.engine)?);
        }
        if !state.table.eof() {
            copy.table.seek_rowid(state.table.row_id()?.get())?;
        }

        Ok(Self {
            engine: Arc::clone(&self.engine),
            def: Arc::clone(&self.def),
            index_defs: Arc::clone(&self.index_defs),
            key_columns: Arc::clone(&self.key_columns),
            codec: self.codec,
            write: self.write,
            state: Mutex::new(copy),
        })
    }

    /// Releases the table cursor, then every index cursor.
    ///
    /// Every cursor is closed even if an earlier one fails; the first
    /// failure is returned.
    pub fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        let mut first_err = state.table.close().err();
        for (name, index) in state.indexes.iter_mut() {
            if let Err(err) = index.close() {
                warn!(table = self.def.name(), index = %name, error = %err, "failed to close index");
                first_err.get_or_insert(err);
            }
        }
        debug!(table = self.def.name(), "closed table");
        first_err.map_or(Ok(()), Err)
    }

    pub fn definition(&self) -> &Arc<TableDef> {
        &self.def
    }

    /// Every index on the table, keyed by index name.
    pub fn index_definitions(&self) -> &BTreeMap<String, Arc<IndexDef>> {
        &self.index_defs
    }

    pub fn is_index_exists(&self, index_name: &str) -> bool {
        self.index_defs.contains_key(index_name)
    }

    pub fn is_rowid_primary_key(&self) -> bool {
        self.def.is_rowid_primary_key()
    }

    pub fn is_autoincrement(&self) -> bool {
        self.def.is_autoincrement()
    }

    /// Index backing the primary key, when the key does not alias the rowid.
    pub fn primary_key_index(&self) -> Option<&str> {
        self.def.primary_key_index()
    }

    pub fn is_writable(&self) -> bool {
        self.write
    }

    // ---------------------------------------------------------------------
    // Navigation
    // ---------------------------------------------------------------------

    /// Positions on `rowid`; false if no such row.
    pub fn go_to_row(&self, rowid: i64) -> Result<bool> {
        self.state.lock().table.seek_rowid(rowid)
    }

    pub fn row_id(&self) -> Result<RowId> {
        let state = self.state.lock();
        self.current_rowid(&state)
    }

    pub fn first(&self) -> Result<bool> {
        self.state.lock().table.first()
    }

    pub fn last(&self) -> Result<bool> {
        self.state.lock().table.last()
    }

    pub fn next(&self) -> Result<bool> {
        self.state.lock().table.next()
    }

    pub fn prev(&self) -> Result<bool> {
        self.state.lock().table.prev()
    }

    pub fn eof(&self) -> bool {
        self.state.lock().table.eof()
    }

    /// Positions on the row matching `key`.
    ///
    /// With an index name, `key` holds the indexed values and the index
    /// resolves it to a rowid. Without one, `key` must be a single integer
    /// rowid. `prefer_next` accepts the first row sorting after `key` on a
    /// miss.
    pub fn locate(&self, index_name: Option<&str>, prefer_next: bool, key: &[Value]) -> Result<bool> {
        let mut state = self.state.lock();
        match index_name {
            Some(name) => {
                self.check_key_width(name, key)?;
                let index = Self::index_mut(&mut state, name)?;
                match index.lookup(prefer_next, key)? {
                    Some(rowid) => state.table.seek_rowid(rowid.get()),
                    None => Ok(false),
                }
            }
            None => {
                let rowid = Self::rowid_key(key)?;
                if state.table.seek_rowid(rowid)? {
                    return Ok(true);
                }
                Ok(prefer_next && !state.table.eof() && state.table.row_id()?.get() > rowid)
            }
        }
    }

    /// Whether the current row carries `key` in the named index, or has
    /// rowid `key` when no index is named.
    pub fn check_index(&self, index_name: Option<&str>, key: &[Value]) -> Result<bool> {
        let state = self.state.lock();
        let rowid = self.current_rowid(&state)?;
        match index_name {
            Some(name) => {
                let columns = self
                    .key_columns
                    .get(name)
                    .ok_or_else(|| RowStoreError::IndexNotFound(name.to_string()))?;
                let values = self.current_values(&state)?;
                let current = Self::row_key(&values, columns);
                Ok(current.len() == key.len() && compare_keys(&current, key) == Ordering::Equal)
            }
            None => Ok(Self::rowid_key(key)? == rowid.get()),
        }
    }

    /// Finds the rowid stored under `key` in the named index.
    pub fn lookup_index(&self, index_name: &str, prefer_next: bool, key: &[Value]) -> Result<Option<RowId>> {
        self.check_key_width(index_name, key)?;
        let mut state = self.state.lock();
        Self::index_mut(&mut state, index_name)?.lookup(prefer_next, key)
    }

    /// Every `(key, rowid)` pair of the named index, in index order.
    pub fn index_entries(&self, index_name: &str) -> Result<Vec<(Vec<Value>, RowId)>> {
        let mut state = self.state.lock();
        Self::index_mut(&mut state, index_name)?.entries()
    }

    // ---------------------------------------------------------------------
    // Reading
    // ---------------------------------------------------------------------

    /// Values of the current row, in column order.
    pub fn values(&self) -> Result<Vec<Value>> {
        let state = self.state.lock();
        self.current_values(&state)
    }

    /// Value of one column of the current row.
    pub fn value(&self, field: &str) -> Result<Value> {
        let column = self.column(field)?;
        let mut values = self.values()?;
        Ok(values.swap_remove(column))
    }

    /// Integer value of one column of the current row; None unless the
    /// column holds an integer.
    pub fn integer(&self, field: &str) -> Result<Option<i64>> {
        Ok(self.value(field)?.as_integer())
    }

    /// The current row with its rowid.
    pub fn row(&self) -> Result<Row> {
        let state = self.state.lock();
        let rowid = self.current_rowid(&state)?;
        let values = self.current_values(&state)?;
        Ok(Row::new(rowid, Arc::clone(&self.def), values))
    }

    // ---------------------------------------------------------------------
    // Row conversion
    // ---------------------------------------------------------------------

    /// Projects a positional row onto column names, checking NOT NULL
    /// columns. Missing trailing values count as NULL.
    pub fn named_fields(&self, values: &[Value]) -> Result<NamedFields> {
        let row = self.full_row(RowValues::Positional(values.to_vec()))?;
        self.check_not_null(&row)?;
        Ok(self
            .def
            .columns()
            .zip(row)
            .map(|(col, value)| (col.name().to_string(), value))
            .collect())
    }

    /// Extracts the key of `index` from named fields. Absent fields are NULL.
    pub fn key_for_index(&self, fields: &NamedFields, index: &IndexDef) -> Vec<Value> {
        self.def
            .index_columns(index)
            .iter()
            .map(|name| fields.get(name).cloned().unwrap_or(Value::Null))
            .collect()
    }

    // ---------------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------------

    /// Inserts a row and returns its rowid.
    pub fn insert(&self, values: impl Into<RowValues>) -> Result<RowId> {
        self.check_writable()?;
        let mut row = self.full_row(values.into())?;
        self.check_not_null(&row)?;
        let plan = RowIdPlan::for_row(&self.def, &row)?;

        let mut state = self.state.lock();
        let rowid = match plan {
            RowIdPlan::Explicit(rowid) => {
                if state.table.seek_rowid(rowid.get())? {
                    return Err(self.primary_key_conflict("Insert"));
                }
                rowid
            }
            RowIdPlan::AutoAssign => allocate(&mut state.table, &self.def)?,
        };
        self.set_rowid_column(&mut row, rowid);

        let keys = self.index_keys(&row);
        self.check_unique(&mut state, &keys, None, "Insert")?;

        let payload = self.encode_row(&row)?;
        state
            .table
            .insert_row(rowid, &payload, plan == RowIdPlan::AutoAssign)?;
        for (name, key) in &keys {
            self.index_insert(&mut state, name, rowid, key)?;
        }

        debug!(table = self.def.name(), %rowid, indexes = keys.len(), "inserted row");
        Ok(rowid)
    }

    /// Replaces the row with the given rowid.
    pub fn update(&self, rowid: i64, values: impl Into<RowValues>) -> Result<()> {
        self.check_writable()?;
        let mut state = self.state.lock();
        if !state.table.seek_rowid(rowid)? {
            return Err(self.missing_row(rowid));
        }
        self.update_locked(&mut state, values.into())
    }

    /// Replaces the current row.
    pub fn update_current(&self, values: impl Into<RowValues>) -> Result<()> {
        self.check_writable()?;
        let mut state = self.state.lock();
        self.update_locked(&mut state, values.into())
    }

    /// Deletes the row with the given rowid and its index entries.
    pub fn delete(&self, rowid: i64) -> Result<()> {
        self.check_writable()?;
        let mut state = self.state.lock();
        if !state.table.seek_rowid(rowid)? {
            return Err(self.missing_row(rowid));
        }
        self.delete_locked(&mut state)
    }

    /// Deletes the current row. The table moves to the row that followed it.
    pub fn delete_current(&self) -> Result<()> {
        self.check_writable()?;
        let mut state = self.state.lock();
        self.delete_locked(&mut state)
    }

    fn update_locked(&self, state: &mut TableState<E::Cursor>, values: RowValues) -> Result<()> {
        let old_rowid = self.current_rowid(state)?;
        let old_row = self.current_values(state)?;

        let mut row = self.full_row(values)?;
        self.check_not_null(&row)?;
        let rowid = match RowIdPlan::for_row(&self.def, &row)? {
            RowIdPlan::Explicit(rowid) => rowid,
            RowIdPlan::AutoAssign => old_rowid,
        };
        if rowid != old_rowid && state.table.seek_rowid(rowid.get())? {
            state.table.seek_rowid(old_rowid.get())?;
            return Err(self.primary_key_conflict("Update"));
        }
        self.set_rowid_column(&mut row, rowid);

        let old_keys = self.index_keys(&old_row);
        let keys = self.index_keys(&row);
        self.check_unique(state, &keys, Some(old_rowid), "Update")?;

        let payload = self.encode_row(&row)?;
        for (name, key) in &old_keys {
            self.index_delete(state, name, old_rowid, key)?;
        }
        if rowid != old_rowid {
            if !state.table.seek_rowid(old_rowid.get())? {
                return Err(self.missing_row(old_rowid.get()));
            }
            state.table.delete()?;
        }
        state.table.insert_row(rowid, &payload, false)?;
        for (name, key) in &keys {
            self.index_insert(state, name, rowid, key)?;
        }

        debug!(table = self.def.name(), %old_rowid, %rowid, indexes = keys.len(), "updated row");
        Ok(())
    }

    fn delete_locked(&self, state: &mut TableState<E::Cursor>) -> Result<()> {
        let rowid = self.current_rowid(state)?;
        let row = self.current_values(state)?;
        let keys = self.index_keys(&row);
        for (name, key) in &keys {
            self.index_delete(state, name, rowid, key)?;
        }
        state.table.delete()?;
        debug!(table = self.def.name(), %rowid, indexes = keys.len(), "deleted row");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------

    fn check_writable(&self) -> Result<()> {
        if self.write {
            Ok(())
        } else {
            Err(RowStoreError::ReadOnly(self.def.name().to_string()))
        }
    }

    fn column(&self, field: &str) -> Result<usize> {
        self.def.column_index(field).ok_or_else(|| {
            RowStoreError::invalid(format!("table {} has no column named {}", self.def.name(), field))
        })
    }

    fn index_mut<'a>(state: &'a mut TableState<E::Cursor>, name: &str) -> Result<&'a mut IndexTable<E::Cursor>> {
        state
            .indexes
            .get_mut(name)
            .ok_or_else(|| RowStoreError::IndexNotFound(name.to_string()))
    }

    /// A lookup key may be a prefix of the index key but never longer.
    fn check_key_width(&self, index_name: &str, key: &[Value]) -> Result<()> {
        let columns = self
            .key_columns
            .get(index_name)
            .ok_or_else(|| RowStoreError::IndexNotFound(index_name.to_string()))?;
        if key.len() > columns.len() {
            return Err(RowStoreError::misuse(format!(
                "{} key values for the {} columns of index {}",
                key.len(),
                columns.len(),
                index_name
            )));
        }
        Ok(())
    }

    fn rowid_key(key: &[Value]) -> Result<i64> {
        match key {
            [Value::Integer(rowid)] => Ok(*rowid),
            _ => Err(RowStoreError::misuse(format!(
                "rowid key must be a single integer, got {} values",
                key.len()
            ))),
        }
    }

    fn missing_row(&self, rowid: i64) -> RowStoreError {
        RowStoreError::misuse(format!("row {} not found in table {}", rowid, self.def.name()))
    }

    fn primary_key_conflict(&self, action: &str) -> RowStoreError {
        RowStoreError::constraint(format!(
            "{} fails: PRIMARY KEY {}.{} must be unique",
            action,
            self.def.name(),
            self.def.rowid_column_name().unwrap_or("rowid")
        ))
    }

    fn current_rowid(&self, state: &TableState<E::Cursor>) -> Result<RowId> {
        if state.table.eof() {
            return Err(RowStoreError::misuse(format!(
                "table {} has no current row",
                self.def.name()
            )));
        }
        state.table.row_id()
    }

    /// Decodes the current row and fills the rowid alias column.
    fn current_values(&self, state: &TableState<E::Cursor>) -> Result<Vec<Value>> {
        let rowid = self.current_rowid(state)?;
        let mut values = self.codec.decode(&state.table.payload()?)?;
        self.set_rowid_column(&mut values, rowid);
        Ok(values)
    }

    /// Builds the full column-ordered row from caller input.
    fn full_row(&self, values: RowValues) -> Result<Vec<Value>> {
        let count = self.def.column_count();
        match values {
            RowValues::Positional(mut values) => {
                if values.len() > count {
                    return Err(RowStoreError::invalid(format!(
                        "{} values supplied for the {} columns of {}",
                        values.len(),
                        count,
                        self.def.name()
                    )));
                }
                values.resize(count, Value::Null);
                Ok(values)
            }
            RowValues::Named(fields) => {
                if let Some((name, _)) = fields.iter().find(|(name, _)| self.def.column_index(name).is_none()) {
                    return Err(RowStoreError::invalid(format!(
                        "table {} has no column named {}",
                        self.def.name(),
                        name
                    )));
                }
                Ok(self
                    .def
                    .columns()
                    .map(|col| fields.get(col.name()).cloned().unwrap_or(Value::Null))
                    .collect())
            }
        }
    }

    /// NOT NULL columns must hold a value. The rowid alias is exempt since
    /// NULL there means "assign one".
    fn check_not_null(&self, row: &[Value]) -> Result<()> {
        for (i, (col, value)) in self.def.columns().zip(row).enumerate() {
            if col.is_not_null() && value.is_null() && self.def.rowid_column() != Some(i) {
                return Err(RowStoreError::misuse(format!(
                    "NOT NULL constraint failed: {}.{}",
                    self.def.name(),
                    col.name()
                )));
            }
        }
        Ok(())
    }

    fn set_rowid_column(&self, row: &mut [Value], rowid: RowId) {
        if let Some(slot) = self.def.rowid_column().and_then(|i| row.get_mut(i)) {
            *slot = Value::Integer(rowid.get());
        }
    }

    /// Encodes a row for storage; the rowid alias column is stored as NULL.
    fn encode_row(&self, row: &[Value]) -> Result<Bytes> {
        match self.def.rowid_column() {
            Some(i) => {
                let mut stored = row.to_vec();
                stored[i] = Value::Null;
                self.codec.encode(&stored)
            }
            None => self.codec.encode(row),
        }
    }

    fn row_key(row: &[Value], columns: &[usize]) -> Vec<Value> {
        columns
            .iter()
            .map(|&i| row.get(i).cloned().unwrap_or(Value::Null))
            .collect()
    }

    /// The key of `row` in every index.
    fn index_keys(&self, row: &[Value]) -> Vec<(String, Vec<Value>)> {
        self.key_columns
            .iter()
            .map(|(name, columns)| (name.clone(), Self::row_key(row, columns)))
            .collect()
    }

    /// Fails if any unique index already holds one of `keys` for a row other
    /// than `own_rowid`. Keys with a NULL component never conflict.
    fn check_unique(
        &self,
        state: &mut TableState<E::Cursor>,
        keys: &[(String, Vec<Value>)],
        own_rowid: Option<RowId>,
        action: &str,
    ) -> Result<()> {
        for (name, key) in keys {
            if !self.index_defs.get(name).is_some_and(|d| d.is_unique()) {
                continue;
            }
            if key.iter().any(Value::is_null) {
                continue;
            }
            let existing = Self::index_mut(state, name)?.lookup(false, key)?;
            if matches!(existing, Some(found) if Some(found) != own_rowid) {
                return Err(RowStoreError::constraint(format!(
                    "{} fails: row is not unique in index {} on table {}",
                    action,
                    name,
                    self.def.name()
                )));
            }
        }
        Ok(())
    }

    fn index_insert(
        &self,
        state: &mut TableState<E::Cursor>,
        name: &str,
        rowid: RowId,
        key: &[Value],
    ) -> Result<()> {
        let unique = self.index_defs.get(name).is_some_and(|d| d.is_unique());
        Self::index_mut(state, name)?.insert(rowid, !unique, key)
    }

    fn index_delete(
        &self,
        state: &mut TableState<E::Cursor>,
        name: &str,
        rowid: RowId,
        key: &[Value],
    ) -> Result<()> {
        if !Self::index_mut(state, name)?.delete(rowid, key)? {
            warn!(table = self.def.name(), index = name, %rowid, "index entry missing");
        }
        Ok(())
    }
}
