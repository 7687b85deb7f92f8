use crate::common::PageId;

/// Definition of a secondary index over one table.
///
/// Implicit indexes created for UNIQUE and PRIMARY KEY constraints carry no
/// column list of their own; their key columns come from the constraint
/// recorded on the owning [`TableDef`](super::TableDef).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    name: String,
    table_name: String,
    unique: bool,
    columns: Vec<String>,
    root: PageId,
}

impl IndexDef {
    /// Starts an explicit `CREATE INDEX name ON table`.
    pub fn new(name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table_name: table_name.into(),
            unique: false,
            columns: Vec::new(),
            root: PageId::new(0),
        }
    }

    pub(crate) fn implicit(name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            unique: true,
            ..Self::new(name, table_name)
        }
    }

    /// Appends a key column.
    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.columns.push(name.into());
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Columns listed in the index definition itself.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn root(&self) -> PageId {
        self.root
    }

    pub(crate) fn set_root(&mut self, root: PageId) {
        self.root = root;
    }
}
