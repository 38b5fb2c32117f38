// ============================================================================
// Transaction Change Tracking
// ============================================================================
//
// Every mutation staged in a store transaction is recorded as a Change so
// a migration step's effect can be inspected before or after commit.
//
// ============================================================================

use crate::core::{Column, Row};

/// A single change staged in a transaction
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    CreateTable { table: String, columns: Vec<Column> },

    DropTable { table: String, rows: usize },

    AddColumn { table: String, column: Column },

    DropColumn { table: String, column: String },

    InsertRow { table: String, row: Row },

    UpdateRows { table: String, column: String, count: usize },

    DeleteRows { table: String, count: usize },

    PutValue { key: String, value: String },

    RemoveValue { key: String },
}

impl Change {
    /// Get the table name affected by this change
    pub fn table_name(&self) -> Option<&str> {
        match self {
            Change::CreateTable { table, .. }
            | Change::DropTable { table, .. }
            | Change::AddColumn { table, .. }
            | Change::DropColumn { table, .. }
            | Change::InsertRow { table, .. }
            | Change::UpdateRows { table, .. }
            | Change::DeleteRows { table, .. } => Some(table),
            Change::PutValue { .. } | Change::RemoveValue { .. } => None,
        }
    }

    /// Check if this is a schema (DDL) change
    pub fn is_ddl(&self) -> bool {
        matches!(
            self,
            Change::CreateTable { .. }
                | Change::DropTable { .. }
                | Change::AddColumn { .. }
                | Change::DropColumn { .. }
        )
    }

    /// Check if this is a row (DML) change
    pub fn is_dml(&self) -> bool {
        matches!(
            self,
            Change::InsertRow { .. } | Change::UpdateRows { .. } | Change::DeleteRows { .. }
        )
    }
}
