use std::cmp::Ordering;

use bytes::Bytes;

use crate::common::{PageId, Result, RowId, RowStoreError};
use crate::storage::btree::{BtreeCursor, BtreeEngine};

/// Positioned access to one B-tree through an owned cursor.
///
/// The adapter is the only holder of its cursor. Mutators need the adapter
/// to have been opened for writing; on a read-only adapter they fail with a
/// misuse error before reaching the engine.
pub struct BtreeTable<C: BtreeCursor> {
    /// Table or index name, for error messages
    name: String,
    root: PageId,
    cursor: Option<C>,
    write: bool,
}

impl<C: BtreeCursor> BtreeTable<C> {
    /// Opens a cursor on the tree rooted at `root`.
    pub fn open<E>(engine: &E, name: impl Into<String>, root: PageId, write: bool) -> Result<Self>
    where
        E: BtreeEngine<Cursor = C>,
    {
        let cursor = engine.open_cursor(root, write)?;
        Ok(Self {
            name: name.into(),
            root,
            cursor: Some(cursor),
            write,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> PageId {
        self.root
    }

    pub fn is_writable(&self) -> bool {
        self.write
    }

    pub fn is_open(&self) -> bool {
        self.cursor.is_some()
    }

    fn cursor(&self) -> Result<&C> {
        self.cursor
            .as_ref()
            .ok_or_else(|| RowStoreError::CursorClosed(self.name.clone()))
    }

    fn cursor_mut(&mut self) -> Result<&mut C> {
        self.cursor
            .as_mut()
            .ok_or_else(|| RowStoreError::CursorClosed(self.name.clone()))
    }

    fn writer(&mut self) -> Result<&mut C> {
        if !self.write {
            return Err(RowStoreError::ReadOnly(self.name.clone()));
        }
        self.cursor_mut()
    }

    /// Positions on `rowid`; true on an exact hit.
    pub fn seek_rowid(&mut self, rowid: i64) -> Result<bool> {
        let cmp = self.cursor_mut()?.move_to(None, rowid, false)?;
        Ok(cmp == Ordering::Equal)
    }

    /// Positions on the first entry whose leading fields equal `key`.
    ///
    /// With `prefer_next`, a miss leaves the cursor on the first larger entry
    /// and still counts as found if one exists.
    pub fn seek_key(&mut self, key: &[u8], prefer_next: bool) -> Result<bool> {
        let cursor = self.cursor_mut()?;
        match cursor.move_to(Some(key), 0, false)? {
            Ordering::Equal => Ok(true),
            Ordering::Greater => Ok(prefer_next),
            Ordering::Less => {
                // every entry sorts before the key
                if !cursor.eof() {
                    cursor.next()?;
                }
                Ok(false)
            }
        }
    }

    /// Writes a table row under `rowid`. `append` hints that the rowid is
    /// larger than every existing one.
    pub fn insert_row(&mut self, rowid: RowId, payload: &[u8], append: bool) -> Result<()> {
        self.writer()?.insert(None, rowid.get(), payload, append)
    }

    /// Writes an index entry.
    pub fn insert_key(&mut self, key: &[u8]) -> Result<()> {
        self.writer()?.insert(Some(key), 0, &[], false)
    }

    /// Removes the entry under the cursor.
    pub fn delete(&mut self) -> Result<()> {
        if self.eof() {
            return Err(RowStoreError::misuse(format!(
                "delete on {} without a current entry",
                self.name
            )));
        }
        self.writer()?.delete()
    }

    pub fn first(&mut self) -> Result<bool> {
        self.cursor_mut()?.first()
    }

    pub fn last(&mut self) -> Result<bool> {
        self.cursor_mut()?.last()
    }

    pub fn next(&mut self) -> Result<bool> {
        self.cursor_mut()?.next()
    }

    pub fn prev(&mut self) -> Result<bool> {
        self.cursor_mut()?.prev()
    }

    /// True when the cursor is past the last entry, or closed.
    pub fn eof(&self) -> bool {
        self.cursor.as_ref().map_or(true, |c| c.eof())
    }

    /// Rowid of the current table row.
    pub fn row_id(&self) -> Result<RowId> {
        let rowid = self.cursor()?.key_size()?;
        RowId::new(rowid).ok_or_else(|| {
            RowStoreError::corrupt(format!("{} holds invalid rowid {}", self.name, rowid))
        })
    }

    /// Record payload of the current table row.
    pub fn payload(&self) -> Result<Bytes> {
        self.cursor()?.data()
    }

    /// Key of the current index entry.
    pub fn key(&self) -> Result<Bytes> {
        self.cursor()?.key()
    }

    /// Releases the cursor. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        match self.cursor.take() {
            Some(mut cursor) => cursor.close(),
            None => Ok(()),
        }
    }
}

impl<C: BtreeCursor> Drop for BtreeTable<C> {
    fn drop(&mut self) {
        if let Some(mut cursor) = self.cursor.take() {
            let _ = cursor.close();
        }
    }
}
