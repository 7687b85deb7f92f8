use std::collections::HashMap;
use std::sync::Arc;

use crate::common::{Result, RowId, RowStoreError};
use crate::schema::TableDef;

use super::Value;

/// A row read back from a table: its rowid plus one value per column.
///
/// When the table has an `INTEGER PRIMARY KEY`, that column already holds the
/// rowid rather than the NULL stored in the record.
#[derive(Debug, Clone)]
pub struct Row {
    rowid: RowId,

    /// The definition of the table the row belongs to
    def: Arc<TableDef>,

    /// The values for each column (in table order)
    values: Vec<Value>,
}

impl Row {
    pub(crate) fn new(rowid: RowId, def: Arc<TableDef>, values: Vec<Value>) -> Self {
        Self { rowid, def, values }
    }

    pub fn rowid(&self) -> RowId {
        self.rowid
    }

    pub fn definition(&self) -> &Arc<TableDef> {
        &self.def
    }

    /// Returns the value at the given column index.
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Returns the value for the given column name.
    pub fn value_by_name(&self, name: &str) -> Option<&Value> {
        self.def.column_index(name).and_then(|i| self.values.get(i))
    }

    /// Returns all values in this row.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Returns the number of values in this row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Projects the row onto column names.
    pub fn to_named_fields(&self) -> NamedFields {
        self.def
            .columns()
            .zip(&self.values)
            .map(|(col, v)| (col.name().to_string(), v.clone()))
            .collect()
    }
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.rowid == other.rowid
            && self.def.name() == other.def.name()
            && self.values == other.values
    }
}

/// Column values keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedFields {
    fields: HashMap<String, Value>,
}

impl NamedFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field, replacing any earlier value under the same name.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for NamedFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// The two shapes a caller can hand row contents in.
///
/// Everything below the table boundary works on positional rows only; named
/// fields are resolved against the column order on entry.
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Values in column order; missing trailing values are NULL.
    Positional(Vec<Value>),

    /// Values keyed by column name; absent columns are NULL.
    Named(NamedFields),
}

impl From<Vec<Value>> for RowValues {
    fn from(values: Vec<Value>) -> Self {
        RowValues::Positional(values)
    }
}

impl From<NamedFields> for RowValues {
    fn from(fields: NamedFields) -> Self {
        RowValues::Named(fields)
    }
}

/// Builder for constructing positional rows fluently.
///
/// Values past the last column and names that match no column are remembered
/// and reported by [`RowBuilder::build`].
pub struct RowBuilder {
    def: Arc<TableDef>,
    values: Vec<Value>,
    current_index: usize,
    overflow: usize,
    unknown: Vec<String>,
}

impl RowBuilder {
    /// Creates a new row builder for the given table.
    pub fn new(def: Arc<TableDef>) -> Self {
        let count = def.column_count();
        Self {
            def,
            values: vec![Value::Null; count],
            current_index: 0,
            overflow: 0,
            unknown: Vec::new(),
        }
    }

    /// Sets the value at the current position and advances.
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        match self.values.get_mut(self.current_index) {
            Some(slot) => {
                *slot = value.into();
                self.current_index += 1;
            }
            None => self.overflow += 1,
        }
        self
    }

    /// Sets a null value at the current position and advances.
    pub fn null(self) -> Self {
        self.value(Value::Null)
    }

    /// Sets the value for a specific column by name.
    pub fn set(mut self, name: &str, value: impl Into<Value>) -> Self {
        match self.def.column_index(name) {
            Some(index) => self.values[index] = value.into(),
            None => self.unknown.push(name.to_string()),
        }
        self
    }

    /// Builds the row values.
    pub fn build(self) -> Result<Vec<Value>> {
        if let Some(name) = self.unknown.first() {
            return Err(RowStoreError::invalid(format!(
                "table {} has no column named {}",
                self.def.name(),
                name
            )));
        }
        if self.overflow > 0 {
            return Err(RowStoreError::invalid(format!(
                "{} values supplied for the {} columns of {}",
                self.values.len() + self.overflow,
                self.values.len(),
                self.def.name()
            )));
        }
        Ok(self.values)
    }
}
