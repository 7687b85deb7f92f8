//! Rowstore - the row-store layer of a SQLite-compatible B-tree database
//!
//! This crate turns a raw keyed B-tree cursor into tables and indexes: rows
//! are encoded in the SQLite record format, rowids are planned and
//! allocated, and every secondary index is kept consistent with the rows it
//! covers, with uniqueness checked before anything is written.
//!
//! # Architecture
//!
//! The crate is organized into several layers:
//!
//! - **Common** (`common`): errors, identifiers and store options
//!
//! - **Tuple** (`tuple`): values and rows
//!   - `Value`: the five SQLite storage classes and their ordering
//!   - `RecordCodec`: the on-disk record format
//!   - `RowValues` / `NamedFields`: positional or by-name row input
//!
//! - **Schema** (`schema`): table and index definitions
//!   - `TableDef`: columns, constraints, rowid alias and implicit indexes
//!   - `MemorySchema`: an in-memory catalog implementing `Schema`
//!
//! - **Storage** (`storage`): the B-tree engine interface
//!   - `BtreeEngine` / `BtreeCursor`: what the page engine must provide
//!   - `MemoryBtree`: an in-process engine
//!
//! - **Index** (`index`): `IndexTable`, one secondary index B-tree
//!
//! - **Table** (`table`): `BtreeTable` cursor adapter and `DataTable`
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use rowstore::schema::{ColumnDef, MemorySchema, TableDef};
//! use rowstore::storage::btree::MemoryBtree;
//! use rowstore::table::DataTable;
//! use rowstore::tuple::Value;
//!
//! let engine = Arc::new(MemoryBtree::default());
//! let schema = MemorySchema::new();
//! let def = TableDef::builder("users")
//!     .column(ColumnDef::new("id").type_name("INTEGER").primary_key())
//!     .column(ColumnDef::new("name").type_name("TEXT").unique())
//!     .build()
//!     .unwrap();
//! schema.create_table(&*engine, def).unwrap();
//!
//! let users = DataTable::open(engine, &schema, "users", true).unwrap();
//! let rowid = users.insert(vec![Value::Null, Value::from("alice")]).unwrap();
//! assert_eq!(rowid.get(), 1);
//! assert!(users.insert(vec![Value::Null, Value::from("alice")]).is_err());
//! ```

pub mod common;
pub mod index;
pub mod schema;
pub mod storage;
pub mod table;
pub mod tuple;

// Re-export commonly used types at the crate root
pub use common::{ErrorCode, PageId, Result, RowId, RowStoreError, StoreOptions};
