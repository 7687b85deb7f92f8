//! Interface to the page-level B-tree engine.
//!
//! The row-store layer never touches pages. Everything it needs from the
//! engine goes through these two traits: an [`BtreeEngine`] that creates trees
//! and opens cursors, and a [`BtreeCursor`] positioned inside one tree.
//!
//! Two kinds of tree exist:
//!
//! - **Table trees** are keyed by a 64-bit rowid and carry a record payload.
//! - **Index trees** are keyed by a record (the indexed values followed by the
//!   rowid) and carry no payload.

use std::cmp::Ordering;

use bytes::Bytes;

use crate::common::{PageId, Result, StoreOptions};

/// Which of the two tree layouts a root page holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeKind {
    Table,
    Index,
}

/// A positioned handle into one B-tree.
///
/// A cursor is owned by exactly one table or index handle and is never
/// shared. Mutators fail with a misuse error when the cursor was opened
/// read-only.
pub trait BtreeCursor: Send {
    /// Seeks to `key` (index trees) or `rowid` (table trees).
    ///
    /// The returned ordering compares the entry the cursor lands on with the
    /// probe: `Equal` on an exact hit; `Greater` when the cursor rests on the
    /// first larger entry; `Less` when every entry is smaller, in which case
    /// the cursor rests on the last entry, or is at EOF if the tree is empty.
    ///
    /// For index trees `key` may hold fewer fields than the stored entries;
    /// only the leading fields are compared. With several entries matching
    /// such a prefix, `bias_right` selects the last of them instead of the
    /// first.
    fn move_to(&mut self, key: Option<&[u8]>, rowid: i64, bias_right: bool) -> Result<Ordering>;

    /// Moves to the first entry, returning false for an empty tree.
    fn first(&mut self) -> Result<bool>;

    /// Moves to the last entry, returning false for an empty tree.
    fn last(&mut self) -> Result<bool>;

    /// Advances; returns false once the cursor runs off the end.
    fn next(&mut self) -> Result<bool>;

    /// Steps back; returns false once the cursor runs off the start.
    fn prev(&mut self) -> Result<bool>;

    fn eof(&self) -> bool;

    /// Writes an entry, replacing an existing one with the same key.
    ///
    /// Table trees use `rowid` and `data`; index trees use `key` only.
    /// `append_bias` hints that the entry sorts after every existing one.
    /// Leaves the cursor on the new entry.
    fn insert(&mut self, key: Option<&[u8]>, rowid: i64, data: &[u8], append_bias: bool)
        -> Result<()>;

    /// Removes the entry under the cursor; the cursor moves to the entry that
    /// followed it.
    fn delete(&mut self) -> Result<()>;

    /// The rowid of a table entry, or the key length of an index entry.
    fn key_size(&self) -> Result<i64>;

    /// Key bytes of the current index entry.
    fn key(&self) -> Result<Bytes>;

    /// Payload of the current table entry.
    fn data(&self) -> Result<Bytes>;

    /// Releases the cursor. Further calls fail.
    fn close(&mut self) -> Result<()>;
}

/// The page engine, as seen from the row-store layer.
pub trait BtreeEngine: Send + Sync {
    type Cursor: BtreeCursor;

    /// Allocates a new empty tree and returns its root page.
    fn create_tree(&self, kind: TreeKind) -> Result<PageId>;

    /// Opens a cursor on the tree rooted at `root`.
    fn open_cursor(&self, root: PageId, writable: bool) -> Result<Self::Cursor>;

    /// Options the database was opened with.
    fn options(&self) -> StoreOptions;
}
