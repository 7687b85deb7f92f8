mod index_table;
mod key_comparator;

pub use index_table::IndexTable;
pub use key_comparator::{KeyComparator, RecordComparator};
