use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound::{Excluded, Unbounded};
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tracing::trace;

use crate::common::{PageId, Result, RowStoreError, StoreOptions};
use crate::index::{KeyComparator, RecordComparator};

use super::{BtreeCursor, BtreeEngine, TreeKind};

/// Root page of the first tree; page 1 is reserved for the schema table.
const FIRST_ROOT_PAGE: u32 = 2;

enum Tree {
    /// rowid -> record payload
    Table(BTreeMap<i64, Bytes>),
    /// Encoded keys kept sorted by the record comparator
    Index(Vec<Bytes>),
}

type SharedTree = Arc<RwLock<Tree>>;

/// In-process B-tree engine.
///
/// Trees live in memory for the lifetime of the engine. Cursors on the same
/// root share the tree, so a write through one cursor is visible to every
/// other cursor on that root.
pub struct MemoryBtree {
    trees: RwLock<HashMap<PageId, SharedTree>>,
    next_root: AtomicU32,
    options: StoreOptions,
    comparator: RecordComparator,
}

impl MemoryBtree {
    pub fn new(options: StoreOptions) -> Self {
        Self {
            trees: RwLock::new(HashMap::new()),
            next_root: AtomicU32::new(FIRST_ROOT_PAGE),
            options,
            comparator: RecordComparator::new(options.encoding),
        }
    }

    /// Number of entries in the tree rooted at `root`.
    pub fn entry_count(&self, root: PageId) -> Result<usize> {
        let tree = self.tree(root)?;
        let tree = tree.read();
        Ok(match &*tree {
            Tree::Table(rows) => rows.len(),
            Tree::Index(keys) => keys.len(),
        })
    }

    fn tree(&self, root: PageId) -> Result<SharedTree> {
        self.trees
            .read()
            .get(&root)
            .cloned()
            .ok_or_else(|| RowStoreError::misuse(format!("no B-tree rooted at {}", root)))
    }
}

impl Default for MemoryBtree {
    fn default() -> Self {
        Self::new(StoreOptions::default())
    }
}

impl BtreeEngine for MemoryBtree {
    type Cursor = MemoryCursor;

    fn create_tree(&self, kind: TreeKind) -> Result<PageId> {
        let root = PageId::new(self.next_root.fetch_add(1, AtomicOrdering::SeqCst));
        let tree = match kind {
            TreeKind::Table => Tree::Table(BTreeMap::new()),
            TreeKind::Index => Tree::Index(Vec::new()),
        };
        self.trees.write().insert(root, Arc::new(RwLock::new(tree)));
        trace!(%root, ?kind, "created tree");
        Ok(root)
    }

    fn open_cursor(&self, root: PageId, writable: bool) -> Result<MemoryCursor> {
        Ok(MemoryCursor {
            root,
            tree: Some(self.tree(root)?),
            writable,
            comparator: self.comparator,
            position: Position::Eof,
        })
    }

    fn options(&self) -> StoreOptions {
        self.options
    }
}

#[derive(Debug, Clone)]
enum Position {
    Eof,
    Row(i64),
    Key(Bytes),
}

/// Cursor over one tree of a [`MemoryBtree`].
///
/// The position is remembered by key rather than by slot, so it stays
/// meaningful while other cursors modify the same tree.
pub struct MemoryCursor {
    root: PageId,
    tree: Option<SharedTree>,
    writable: bool,
    comparator: RecordComparator,
    position: Position,
}

impl MemoryCursor {
    fn shared(&self) -> Result<&SharedTree> {
        self.tree
            .as_ref()
            .ok_or_else(|| RowStoreError::CursorClosed(self.root.to_string()))
    }

    fn check_writable(&self) -> Result<()> {
        if self.writable {
            Ok(())
        } else {
            Err(RowStoreError::ReadOnly(self.root.to_string()))
        }
    }

    /// Index of the first key not less than `key`.
    fn lower_bound(&self, keys: &[Bytes], key: &[u8]) -> usize {
        keys.partition_point(|k| self.comparator.compare(k, key) == Ordering::Less)
    }

    /// Index one past the last key not greater than `key`.
    fn upper_bound(&self, keys: &[Bytes], key: &[u8]) -> usize {
        keys.partition_point(|k| self.comparator.compare(k, key) != Ordering::Greater)
    }

    fn seek_index(&self, keys: &[Bytes], key: &[u8], bias_right: bool) -> (Position, Ordering) {
        let Some(last) = keys.last() else {
            return (Position::Eof, Ordering::Less);
        };
        if bias_right {
            let end = self.upper_bound(keys, key);
            if end > 0 && self.comparator.compare(&keys[end - 1], key) == Ordering::Equal {
                return (Position::Key(keys[end - 1].clone()), Ordering::Equal);
            }
            if end < keys.len() {
                return (Position::Key(keys[end].clone()), Ordering::Greater);
            }
        } else {
            let start = self.lower_bound(keys, key);
            if start < keys.len() {
                let cmp = self.comparator.compare(&keys[start], key);
                return (Position::Key(keys[start].clone()), cmp);
            }
        }
        (Position::Key(last.clone()), Ordering::Less)
    }
}

impl BtreeCursor for MemoryCursor {
    fn move_to(&mut self, key: Option<&[u8]>, rowid: i64, bias_right: bool) -> Result<Ordering> {
        let tree = self.shared()?.clone();
        let tree = tree.read();
        let (position, cmp) = match (&*tree, key) {
            (Tree::Table(rows), None) => {
                if let Some((&found, _)) = rows.range(rowid..).next() {
                    (Position::Row(found), found.cmp(&rowid))
                } else if let Some((&last, _)) = rows.iter().next_back() {
                    (Position::Row(last), Ordering::Less)
                } else {
                    (Position::Eof, Ordering::Less)
                }
            }
            (Tree::Index(keys), Some(key)) => self.seek_index(keys, key, bias_right),
            (Tree::Table(_), Some(_)) => {
                return Err(RowStoreError::misuse("table B-tree seeks by rowid, not by key"))
            }
            (Tree::Index(_), None) => {
                return Err(RowStoreError::misuse("index B-tree seeks by key, not by rowid"))
            }
        };
        trace!(root = %self.root, rowid, ?cmp, "move_to");
        self.position = position;
        Ok(cmp)
    }

    fn first(&mut self) -> Result<bool> {
        let tree = self.shared()?.clone();
        let tree = tree.read();
        self.position = match &*tree {
            Tree::Table(rows) => rows.keys().next().map_or(Position::Eof, |&r| Position::Row(r)),
            Tree::Index(keys) => keys.first().map_or(Position::Eof, |k| Position::Key(k.clone())),
        };
        Ok(!self.eof())
    }

    fn last(&mut self) -> Result<bool> {
        let tree = self.shared()?.clone();
        let tree = tree.read();
        self.position = match &*tree {
            Tree::Table(rows) => rows
                .keys()
                .next_back()
                .map_or(Position::Eof, |&r| Position::Row(r)),
            Tree::Index(keys) => keys.last().map_or(Position::Eof, |k| Position::Key(k.clone())),
        };
        Ok(!self.eof())
    }

    fn next(&mut self) -> Result<bool> {
        let tree = self.shared()?.clone();
        let tree = tree.read();
        self.position = match (&*tree, &self.position) {
            (_, Position::Eof) => Position::Eof,
            (Tree::Table(rows), Position::Row(cur)) => rows
                .range((Excluded(*cur), Unbounded))
                .next()
                .map_or(Position::Eof, |(&r, _)| Position::Row(r)),
            (Tree::Index(keys), Position::Key(cur)) => {
                let next = self.upper_bound(keys, cur);
                keys.get(next).map_or(Position::Eof, |k| Position::Key(k.clone()))
            }
            _ => return Err(RowStoreError::Internal("cursor position kind mismatch".into())),
        };
        Ok(!self.eof())
    }

    fn prev(&mut self) -> Result<bool> {
        let tree = self.shared()?.clone();
        let tree = tree.read();
        self.position = match (&*tree, &self.position) {
            (_, Position::Eof) => Position::Eof,
            (Tree::Table(rows), Position::Row(cur)) => rows
                .range(..*cur)
                .next_back()
                .map_or(Position::Eof, |(&r, _)| Position::Row(r)),
            (Tree::Index(keys), Position::Key(cur)) => {
                let at = self.lower_bound(keys, cur);
                if at == 0 {
                    Position::Eof
                } else {
                    Position::Key(keys[at - 1].clone())
                }
            }
            _ => return Err(RowStoreError::Internal("cursor position kind mismatch".into())),
        };
        Ok(!self.eof())
    }

    fn eof(&self) -> bool {
        matches!(self.position, Position::Eof)
    }

    fn insert(
        &mut self,
        key: Option<&[u8]>,
        rowid: i64,
        data: &[u8],
        _append_bias: bool,
    ) -> Result<()> {
        self.check_writable()?;
        let tree = self.shared()?.clone();
        let mut tree = tree.write();
        self.position = match (&mut *tree, key) {
            (Tree::Table(rows), None) => {
                rows.insert(rowid, Bytes::copy_from_slice(data));
                Position::Row(rowid)
            }
            (Tree::Index(keys), Some(key)) => {
                let key = Bytes::copy_from_slice(key);
                let at = self.lower_bound(keys, &key);
                if at < keys.len() && self.comparator.compare(&keys[at], &key) == Ordering::Equal {
                    keys[at] = key.clone();
                } else {
                    keys.insert(at, key.clone());
                }
                Position::Key(key)
            }
            _ => return Err(RowStoreError::misuse("insert does not match the tree kind")),
        };
        trace!(root = %self.root, rowid, "insert");
        Ok(())
    }

    fn delete(&mut self) -> Result<()> {
        self.check_writable()?;
        let tree = self.shared()?.clone();
        let mut tree = tree.write();
        self.position = match (&mut *tree, &self.position) {
            (Tree::Table(rows), Position::Row(cur)) => {
                let cur = *cur;
                if rows.remove(&cur).is_none() {
                    return Err(RowStoreError::misuse(format!("row {} no longer exists", cur)));
                }
                rows.range((Excluded(cur), Unbounded))
                    .next()
                    .map_or(Position::Eof, |(&r, _)| Position::Row(r))
            }
            (Tree::Index(keys), Position::Key(cur)) => {
                let at = self.lower_bound(keys, cur);
                if at >= keys.len() || self.comparator.compare(&keys[at], cur) != Ordering::Equal {
                    return Err(RowStoreError::misuse("index entry no longer exists"));
                }
                keys.remove(at);
                keys.get(at).map_or(Position::Eof, |k| Position::Key(k.clone()))
            }
            _ => return Err(RowStoreError::misuse("delete on an unpositioned cursor")),
        };
        trace!(root = %self.root, "delete");
        Ok(())
    }

    fn key_size(&self) -> Result<i64> {
        self.shared()?;
        match &self.position {
            Position::Row(rowid) => Ok(*rowid),
            Position::Key(key) => Ok(key.len() as i64),
            Position::Eof => Err(RowStoreError::misuse("cursor is not positioned")),
        }
    }

    fn key(&self) -> Result<Bytes> {
        self.shared()?;
        match &self.position {
            Position::Key(key) => Ok(key.clone()),
            _ => Err(RowStoreError::misuse("cursor is not on an index entry")),
        }
    }

    fn data(&self) -> Result<Bytes> {
        let tree = self.shared()?.read();
        match (&*tree, &self.position) {
            (Tree::Table(rows), Position::Row(rowid)) => rows
                .get(rowid)
                .cloned()
                .ok_or_else(|| RowStoreError::misuse(format!("row {} no longer exists", rowid))),
            _ => Err(RowStoreError::misuse("cursor is not on a table row")),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.shared()?;
        self.tree = None;
        self.position = Position::Eof;
        Ok(())
    }
}
