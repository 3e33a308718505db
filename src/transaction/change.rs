// ============================================================================
// Transaction Change Tracking
// ============================================================================
//
// Each Change is a buffered row mutation. Changes are replayed onto committed
// data to build a transaction's view, applied to storage on COMMIT and
// discarded on ROLLBACK.
//
// ============================================================================

use crate::core::Row;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub enum Change {
    /// Insert a new row under a key reserved at insert time
    InsertRow { table: String, id: i64, row: Row },

    /// Replace an existing row
    UpdateRow { table: String, id: i64, row: Row },

    /// Delete an existing row
    DeleteRow { table: String, id: i64 },
}

impl Change {
    pub fn table_name(&self) -> &str {
        match self {
            Change::InsertRow { table, .. } => table,
            Change::UpdateRow { table, .. } => table,
            Change::DeleteRow { table, .. } => table,
        }
    }

    pub fn row_id(&self) -> i64 {
        match self {
            Change::InsertRow { id, .. }
            | Change::UpdateRow { id, .. }
            | Change::DeleteRow { id, .. } => *id,
        }
    }

    pub fn touches(&self, table: &str) -> bool {
        self.table_name().eq_ignore_ascii_case(table)
    }

    /// Replay this change onto a materialized copy of a table's rows.
    pub fn replay(&self, rows: &mut BTreeMap<i64, Row>) {
        match self {
            Change::InsertRow { id, row, .. } => {
                rows.insert(*id, row.clone());
            }
            Change::UpdateRow { id, row, .. } => {
                if let Some(existing) = rows.get_mut(id) {
                    *existing = row.clone();
                }
            }
            Change::DeleteRow { id, .. } => {
                rows.remove(id);
            }
        }
    }
}

/// Replay every change touching `table`, in order.
pub fn replay_all(changes: &[Change], table: &str, rows: &mut BTreeMap<i64, Row>) {
    for change in changes.iter().filter(|c| c.touches(table)) {
        change.replay(rows);
    }
}
