mod cursor;
mod memory;

pub use cursor::{BtreeCursor, BtreeEngine, TreeKind};
pub use memory::{MemoryBtree, MemoryCursor};
