//! Tables over the B-tree engine: the cursor adapter, rowid planning and
//! the data table that keeps rows and indexes in step.

mod btree_table;
mod data_table;
mod rowid;

pub use btree_table::BtreeTable;
pub use data_table::DataTable;
pub use rowid::RowIdPlan;
