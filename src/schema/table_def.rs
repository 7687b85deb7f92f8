use std::collections::HashMap;

use crate::common::{PageId, Result, RowStoreError, AUTOINDEX_PREFIX};

use super::IndexDef;

/// Constraint attached to a single column definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnConstraint {
    NotNull,
    PrimaryKey { autoincrement: bool },
    Unique,
}

/// Constraint declared after the column list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableConstraint {
    PrimaryKey(Vec<String>),
    Unique(Vec<String>),
}

/// Represents a single column in a table definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Column name
    name: String,

    /// Declared type, as written in CREATE TABLE
    type_name: Option<String>,

    constraints: Vec<ColumnConstraint>,

    /// Column position in the table (0-indexed)
    ordinal: usize,
}

impl ColumnDef {
    /// Creates a new untyped column definition without constraints.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: None,
            constraints: Vec::new(),
            ordinal: 0, // Will be set by TableDef
        }
    }

    pub fn type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn not_null(mut self) -> Self {
        self.constraints.push(ColumnConstraint::NotNull);
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.constraints
            .push(ColumnConstraint::PrimaryKey { autoincrement: false });
        self
    }

    /// Declares `PRIMARY KEY AUTOINCREMENT`.
    pub fn autoincrement(mut self) -> Self {
        self.constraints
            .push(ColumnConstraint::PrimaryKey { autoincrement: true });
        self
    }

    pub fn unique(mut self) -> Self {
        self.constraints.push(ColumnConstraint::Unique);
        self
    }

    /// Returns the column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_type(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    pub fn constraints(&self) -> &[ColumnConstraint] {
        &self.constraints
    }

    pub fn is_not_null(&self) -> bool {
        self.constraints.contains(&ColumnConstraint::NotNull)
    }

    fn primary_key_constraint(&self) -> Option<bool> {
        self.constraints.iter().find_map(|c| match c {
            ColumnConstraint::PrimaryKey { autoincrement } => Some(*autoincrement),
            _ => None,
        })
    }

    /// Only a column declared exactly `INTEGER` can alias the rowid.
    fn is_integer_typed(&self) -> bool {
        self.type_name
            .as_deref()
            .is_some_and(|t| t.trim().eq_ignore_ascii_case("INTEGER"))
    }

    /// Returns the column's ordinal position in the table.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }
}

/// An implicit index materializing a column-level UNIQUE or PRIMARY KEY.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnIndexConstraint {
    index_name: String,
    column: String,
}

impl ColumnIndexConstraint {
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn column(&self) -> &str {
        &self.column
    }
}

/// An implicit index materializing a table-level UNIQUE or PRIMARY KEY.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableIndexConstraint {
    index_name: String,
    columns: Vec<String>,
}

impl TableIndexConstraint {
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

/// Definition of a table: its columns in storage order and the constraints
/// that shape its rowid and implicit indexes.
#[derive(Debug, Clone)]
pub struct TableDef {
    name: String,

    /// Ordered list of columns
    columns: Vec<ColumnDef>,

    /// Map from column name to column index for fast lookup
    name_to_index: HashMap<String, usize>,

    constraints: Vec<TableConstraint>,

    /// Root page of the table B-tree, assigned by the schema
    root: PageId,

    /// Column aliasing the rowid (`INTEGER PRIMARY KEY`)
    rowid_column: Option<usize>,

    autoincrement: bool,

    primary_key_index: Option<String>,

    column_index_constraints: Vec<ColumnIndexConstraint>,

    table_index_constraints: Vec<TableIndexConstraint>,
}

impl TableDef {
    /// Creates a table definition builder for fluent construction.
    pub fn builder(name: impl Into<String>) -> TableDefBuilder {
        TableDefBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of columns in the table.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns the column at the given index.
    pub fn column(&self, index: usize) -> Option<&ColumnDef> {
        self.columns.get(index)
    }

    /// Returns the index of the column with the given name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// Returns an iterator over all columns.
    pub fn columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter()
    }

    pub fn constraints(&self) -> &[TableConstraint] {
        &self.constraints
    }

    pub fn root(&self) -> PageId {
        self.root
    }

    pub(crate) fn set_root(&mut self, root: PageId) {
        self.root = root;
    }

    pub fn is_rowid_primary_key(&self) -> bool {
        self.rowid_column.is_some()
    }

    /// Position of the `INTEGER PRIMARY KEY` column, if any.
    pub fn rowid_column(&self) -> Option<usize> {
        self.rowid_column
    }

    pub fn rowid_column_name(&self) -> Option<&str> {
        self.rowid_column.map(|i| self.columns[i].name())
    }

    pub fn is_autoincrement(&self) -> bool {
        self.autoincrement
    }

    /// Name of the index backing a PRIMARY KEY that does not alias the rowid.
    pub fn primary_key_index(&self) -> Option<&str> {
        self.primary_key_index.as_deref()
    }

    pub fn column_index_constraint(&self, index_name: &str) -> Option<&ColumnIndexConstraint> {
        self.column_index_constraints
            .iter()
            .find(|c| c.index_name == index_name)
    }

    pub fn table_index_constraint(&self, index_name: &str) -> Option<&TableIndexConstraint> {
        self.table_index_constraints
            .iter()
            .find(|c| c.index_name == index_name)
    }

    /// Names of every implicit index, in creation order.
    pub fn implicit_index_names(&self) -> impl Iterator<Item = &str> {
        self.column_index_constraints
            .iter()
            .map(|c| c.index_name.as_str())
            .chain(
                self.table_index_constraints
                    .iter()
                    .map(|c| c.index_name.as_str()),
            )
    }

    /// Key columns of `index`, resolving implicit indexes through the
    /// constraint that created them.
    pub fn index_columns(&self, index: &IndexDef) -> Vec<String> {
        if let Some(c) = self.column_index_constraint(index.name()) {
            vec![c.column.clone()]
        } else if let Some(c) = self.table_index_constraint(index.name()) {
            c.columns.clone()
        } else {
            index.columns().to_vec()
        }
    }
}

/// Builder for constructing table definitions fluently.
pub struct TableDefBuilder {
    name: String,
    columns: Vec<ColumnDef>,
    constraints: Vec<TableConstraint>,
}

impl TableDefBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// Adds a table-level `PRIMARY KEY (columns...)`.
    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.constraints.push(TableConstraint::PrimaryKey(
            columns.iter().map(|c| c.to_string()).collect(),
        ));
        self
    }

    /// Adds a table-level `UNIQUE (columns...)`.
    pub fn unique(mut self, columns: &[&str]) -> Self {
        self.constraints.push(TableConstraint::Unique(
            columns.iter().map(|c| c.to_string()).collect(),
        ));
        self
    }

    /// Validates the definition and derives the rowid alias and implicit
    /// indexes.
    pub fn build(self) -> Result<TableDef> {
        let TableDefBuilder {
            name,
            mut columns,
            constraints,
        } = self;

        if columns.is_empty() {
            return Err(RowStoreError::invalid(format!("table {} has no columns", name)));
        }

        let mut name_to_index = HashMap::new();
        for (i, col) in columns.iter_mut().enumerate() {
            col.ordinal = i;
            if name_to_index.insert(col.name.clone(), i).is_some() {
                return Err(RowStoreError::invalid(format!(
                    "duplicate column name: {}.{}",
                    name, col.name
                )));
            }
        }

        for constraint in &constraints {
            let (TableConstraint::PrimaryKey(cols) | TableConstraint::Unique(cols)) = constraint;
            if cols.is_empty() {
                return Err(RowStoreError::invalid(format!(
                    "empty constraint column list on table {}",
                    name
                )));
            }
            if let Some(missing) = cols.iter().find(|c| !name_to_index.contains_key(*c)) {
                return Err(RowStoreError::invalid(format!(
                    "table {} has no column named {}",
                    name, missing
                )));
            }
        }

        let column_pks: Vec<(usize, bool)> = columns
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.primary_key_constraint().map(|auto| (i, auto)))
            .collect();
        let table_pks = constraints
            .iter()
            .filter(|c| matches!(c, TableConstraint::PrimaryKey(_)))
            .count();
        if column_pks.len() + table_pks > 1 {
            return Err(RowStoreError::invalid(format!(
                "table {} has more than one primary key",
                name
            )));
        }

        let mut rowid_column = None;
        let mut autoincrement = false;
        if let Some(&(i, auto)) = column_pks.first() {
            if columns[i].is_integer_typed() {
                rowid_column = Some(i);
                autoincrement = auto;
            } else if auto {
                return Err(RowStoreError::invalid(
                    "AUTOINCREMENT is only allowed on an INTEGER PRIMARY KEY",
                ));
            }
        }
        for constraint in &constraints {
            if let TableConstraint::PrimaryKey(cols) = constraint {
                if cols.len() == 1 {
                    let i = name_to_index[&cols[0]];
                    if columns[i].is_integer_typed() {
                        rowid_column = Some(i);
                    }
                }
            }
        }

        let mut next_index = 1;
        let mut next_name = || {
            let n = format!("{}{}_{}", AUTOINDEX_PREFIX, name, next_index);
            next_index += 1;
            n
        };

        let mut primary_key_index = None;
        let mut column_index_constraints = Vec::new();
        for (i, col) in columns.iter().enumerate() {
            for constraint in &col.constraints {
                let is_pk = match constraint {
                    ColumnConstraint::PrimaryKey { .. } if rowid_column == Some(i) => continue,
                    ColumnConstraint::PrimaryKey { .. } => true,
                    ColumnConstraint::Unique => false,
                    ColumnConstraint::NotNull => continue,
                };
                let index_name = next_name();
                if is_pk {
                    primary_key_index = Some(index_name.clone());
                }
                column_index_constraints.push(ColumnIndexConstraint {
                    index_name,
                    column: col.name.clone(),
                });
            }
        }

        let mut table_index_constraints = Vec::new();
        for constraint in &constraints {
            let (cols, is_pk) = match constraint {
                TableConstraint::PrimaryKey(cols) => {
                    if rowid_column.is_some() && cols.len() == 1 {
                        continue;
                    }
                    (cols, true)
                }
                TableConstraint::Unique(cols) => (cols, false),
            };
            let index_name = next_name();
            if is_pk {
                primary_key_index = Some(index_name.clone());
            }
            table_index_constraints.push(TableIndexConstraint {
                index_name,
                columns: cols.clone(),
            });
        }

        Ok(TableDef {
            name,
            columns,
            name_to_index,
            constraints,
            root: PageId::new(0),
            rowid_column,
            autoincrement,
            primary_key_index,
            column_index_constraints,
            table_index_constraints,
        })
    }
}
