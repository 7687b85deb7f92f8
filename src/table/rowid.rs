use rand::Rng;

use crate::common::{Result, RowId, RowStoreError, MAX_ROWID, NEW_ROWID_ATTEMPTS};
use crate::schema::TableDef;
use crate::storage::btree::BtreeCursor;
use crate::tuple::Value;

use super::BtreeTable;

/// Where the rowid of a row being written comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowIdPlan {
    /// The caller supplied it through the `INTEGER PRIMARY KEY` column.
    Explicit(RowId),
    /// The table picks one.
    AutoAssign,
}

impl RowIdPlan {
    /// Reads the rowid plan off a full positional row.
    ///
    /// Tables without a rowid alias always auto-assign. A NULL alias value
    /// auto-assigns too; anything else must be a positive integer.
    pub fn for_row(def: &TableDef, row: &[Value]) -> Result<Self> {
        let Some(column) = def.rowid_column() else {
            return Ok(RowIdPlan::AutoAssign);
        };
        let value = row.get(column).ok_or_else(|| {
            RowStoreError::Internal(format!(
                "primary key column {} outside the {} columns of {}",
                column,
                row.len(),
                def.name()
            ))
        })?;
        match value {
            Value::Null => Ok(RowIdPlan::AutoAssign),
            Value::Integer(id) => RowId::new(*id).map(RowIdPlan::Explicit).ok_or_else(|| {
                RowStoreError::misuse(format!(
                    "rowid of {} must be positive, got {}",
                    def.name(),
                    id
                ))
            }),
            other => Err(RowStoreError::invalid(format!(
                "{}.{} takes an integer rowid, got {}",
                def.name(),
                def.rowid_column_name().unwrap_or("rowid"),
                other.type_name()
            ))),
        }
    }
}

/// Picks a rowid for a new row: one past the current largest.
///
/// Once the largest possible rowid is in use, random rowids are probed
/// instead, except on AUTOINCREMENT tables, which never reuse rowids.
pub(crate) fn allocate<C: BtreeCursor>(table: &mut BtreeTable<C>, def: &TableDef) -> Result<RowId> {
    if !table.last()? {
        return Ok(RowId::FIRST);
    }
    let max = table.row_id()?.get();
    if max < MAX_ROWID {
        return RowId::new(max + 1)
            .ok_or_else(|| RowStoreError::corrupt(format!("{} holds rowid {}", def.name(), max)));
    }
    if def.is_autoincrement() {
        return Err(RowStoreError::Full(def.name().to_string()));
    }

    let mut rng = rand::thread_rng();
    for _ in 0..NEW_ROWID_ATTEMPTS {
        let candidate = rng.gen_range(1..=MAX_ROWID);
        if !table.seek_rowid(candidate)? {
            if let Some(rowid) = RowId::new(candidate) {
                return Ok(rowid);
            }
        }
    }
    Err(RowStoreError::Full(def.name().to_string()))
}
