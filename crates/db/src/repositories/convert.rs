//! Conversions between `SeaORM` rows and core domain types.

use chrono::{DateTime, Utc};
use sea_orm::DbErr;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

use tally_core::inventory::{
    InventoryBalance, InventoryMovement, InventoryPostingLink, MovementStatus, MovementType,
    Product, StockLocation, BalanceKey,
};
use tally_core::ledger::{
    Account, AccountRef, Approval, ApprovalStatus, DocumentLink, EntityRef, EntityType,
    IntentLine, IssueSeverity, IssueStatus, JournalEntry, JournalLine, Override, PostingIntent,
    PostingRun, PostingRunStatus, ReversalLink, RunState, TransactionSet, TransactionSetStatus,
    TransactionSource, ValidationIssue,
};
use tally_core::store::{StoreError, StoreResult};

use crate::entities::sea_orm_active_enums::{
    ApprovalStatus as DbApprovalStatus, EntityType as DbEntityType,
    IssueSeverity as DbIssueSeverity, IssueStatus as DbIssueStatus,
    MovementStatus as DbMovementStatus, MovementType as DbMovementType,
    PostingRunStatus as DbPostingRunStatus, TransactionSetStatus as DbTransactionSetStatus,
    TransactionSource as DbTransactionSource,
};
use crate::entities::{
    accounts, approvals, document_links, inventory_balances, inventory_movements,
    inventory_posting_links, journal_entries, journal_lines, overrides, posting_intent_lines,
    posting_intents, posting_runs, products, reversal_links, transaction_sets, validation_issues,
};

/// Maps a database error to a store fault.
pub(crate) fn db_err(err: DbErr) -> StoreError {
    StoreError::Database(err.to_string())
}

fn corrupt(what: impl std::fmt::Display) -> StoreError {
    StoreError::Database(format!("corrupt row: {what}"))
}

pub(crate) fn utc(at: DateTimeWithTimeZone) -> DateTime<Utc> {
    at.with_timezone(&Utc)
}

pub(crate) fn line_no_to_db(line_no: u32) -> StoreResult<i32> {
    i32::try_from(line_no).map_err(|_| StoreError::Conflict(format!("line {line_no} out of range")))
}

fn line_no_from_db(line_no: i32) -> StoreResult<u32> {
    u32::try_from(line_no).map_err(|_| corrupt(format!("negative line number {line_no}")))
}

/// Two-way mapping between a database enum and its domain twin.
macro_rules! mirror_enum {
    ($db:ident, $domain:ident, [$($variant:ident),+ $(,)?]) => {
        impl From<$db> for $domain {
            fn from(value: $db) -> Self {
                match value {
                    $($db::$variant => Self::$variant,)+
                }
            }
        }

        impl From<$domain> for $db {
            fn from(value: $domain) -> Self {
                match value {
                    $($domain::$variant => Self::$variant,)+
                }
            }
        }
    };
}

mirror_enum!(DbTransactionSetStatus, TransactionSetStatus, [Draft, Review, Posted]);
mirror_enum!(DbTransactionSource, TransactionSource, [Manual, Integration, Inventory, Reversal]);
mirror_enum!(
    DbEntityType,
    EntityType,
    [TransactionSet, JournalEntry, PostingRun, ReversalLink, InventoryMovement]
);
mirror_enum!(DbApprovalStatus, ApprovalStatus, [Pending, Approved, Rejected]);
mirror_enum!(DbIssueSeverity, IssueSeverity, [Error, Warning]);
mirror_enum!(DbIssueStatus, IssueStatus, [Open, Resolved]);
mirror_enum!(DbPostingRunStatus, PostingRunStatus, [Started, Succeeded, Failed]);
mirror_enum!(DbMovementType, MovementType, [Receipt, Issue, Transfer, Adjustment]);
mirror_enum!(DbMovementStatus, MovementStatus, [Draft, Posted]);

fn entity_ref(entity_type: DbEntityType, entity_id: Uuid) -> EntityRef {
    EntityRef {
        entity_type: entity_type.into(),
        entity_id,
    }
}

fn location(warehouse_id: Option<Uuid>, location_id: Option<Uuid>) -> Option<StockLocation> {
    warehouse_id.map(|warehouse_id| StockLocation {
        warehouse_id: warehouse_id.into(),
        location_id: location_id.map(Into::into),
    })
}

impl From<transaction_sets::Model> for TransactionSet {
    fn from(row: transaction_sets::Model) -> Self {
        Self {
            id: row.id.into(),
            tenant_id: row.tenant_id.into(),
            status: row.status.into(),
            source: row.source.into(),
            business_date: row.business_date,
            note: row.note,
            created_by: row.created_by.into(),
            created_at: utc(row.created_at),
        }
    }
}

impl From<accounts::Model> for Account {
    fn from(row: accounts::Model) -> Self {
        Self {
            id: row.id.into(),
            tenant_id: row.tenant_id.into(),
            code: row.code,
            name: row.name,
            is_active: row.is_active,
        }
    }
}

impl From<approvals::Model> for Approval {
    fn from(row: approvals::Model) -> Self {
        Self {
            id: row.id.into(),
            tenant_id: row.tenant_id.into(),
            entity: entity_ref(row.entity_type, row.entity_id),
            status: row.status.into(),
        }
    }
}

impl From<validation_issues::Model> for ValidationIssue {
    fn from(row: validation_issues::Model) -> Self {
        Self {
            id: row.id.into(),
            tenant_id: row.tenant_id.into(),
            entity: entity_ref(row.entity_type, row.entity_id),
            severity: row.severity.into(),
            status: row.status.into(),
            message: row.message,
        }
    }
}

impl From<overrides::Model> for Override {
    fn from(row: overrides::Model) -> Self {
        Self {
            id: row.id.into(),
            tenant_id: row.tenant_id.into(),
            entity: entity_ref(row.entity_type, row.entity_id),
            validation_issue_id: row.validation_issue_id.map(Into::into),
            reason: row.reason,
            created_by: row.created_by.into(),
        }
    }
}

impl From<document_links::Model> for DocumentLink {
    fn from(row: document_links::Model) -> Self {
        Self {
            id: row.id.into(),
            tenant_id: row.tenant_id.into(),
            entity: entity_ref(row.entity_type, row.entity_id),
            document_ref: row.document_ref,
        }
    }
}

/// Assembles an intent from its header and lines in line order.
pub(crate) fn posting_intent(
    header: posting_intents::Model,
    lines: Vec<posting_intent_lines::Model>,
) -> StoreResult<PostingIntent> {
    let lines = lines
        .into_iter()
        .map(|line| {
            let account = match (line.account_id, line.account_code) {
                (Some(id), None) => AccountRef::ById(id.into()),
                (None, Some(code)) => AccountRef::ByCode(code),
                _ => {
                    return Err(corrupt(format!(
                        "intent line {} of transaction set {} needs exactly one account reference",
                        line.line_no, line.transaction_set_id
                    )));
                }
            };
            Ok(IntentLine {
                account,
                debit: line.debit,
                credit: line.credit,
                description: line.description,
            })
        })
        .collect::<StoreResult<Vec<_>>>()?;

    Ok(PostingIntent {
        tenant_id: header.tenant_id.into(),
        transaction_set_id: header.transaction_set_id.into(),
        posting_date: header.posting_date,
        memo: header.memo,
        lines,
    })
}

impl From<journal_entries::Model> for JournalEntry {
    fn from(row: journal_entries::Model) -> Self {
        Self {
            id: row.id.into(),
            tenant_id: row.tenant_id.into(),
            posting_date: row.posting_date,
            memo: row.memo,
            source_transaction_set_id: row.source_transaction_set_id.into(),
            created_by: row.created_by.into(),
            created_at: utc(row.created_at),
        }
    }
}

impl TryFrom<journal_lines::Model> for JournalLine {
    type Error = StoreError;

    fn try_from(row: journal_lines::Model) -> StoreResult<Self> {
        Ok(Self {
            journal_entry_id: row.journal_entry_id.into(),
            line_no: line_no_from_db(row.line_no)?,
            account_id: row.account_id.into(),
            debit: row.debit,
            credit: row.credit,
            description: row.description,
        })
    }
}

impl TryFrom<posting_runs::Model> for PostingRun {
    type Error = StoreError;

    fn try_from(row: posting_runs::Model) -> StoreResult<Self> {
        let state = match row.status {
            DbPostingRunStatus::Started => RunState::Started,
            DbPostingRunStatus::Succeeded => RunState::Succeeded {
                journal_entry_id: row
                    .journal_entry_id
                    .ok_or_else(|| corrupt(format!("succeeded run {} has no entry", row.id)))?
                    .into(),
            },
            DbPostingRunStatus::Failed => RunState::Failed {
                error: row.error.unwrap_or_default(),
            },
        };
        Ok(Self {
            id: row.id.into(),
            tenant_id: row.tenant_id.into(),
            transaction_set_id: row.transaction_set_id.into(),
            state,
            retry_of: row.retry_of.map(Into::into),
            started_by: row.started_by.into(),
            started_at: utc(row.started_at),
            finished_at: row.finished_at.map(utc),
        })
    }
}

impl From<reversal_links::Model> for ReversalLink {
    fn from(row: reversal_links::Model) -> Self {
        Self {
            id: row.id.into(),
            tenant_id: row.tenant_id.into(),
            original_journal_entry_id: row.original_journal_entry_id.into(),
            reversal_journal_entry_id: row.reversal_journal_entry_id.into(),
            reversal_transaction_set_id: row.reversal_transaction_set_id.into(),
            reason: row.reason,
            created_by: row.created_by.into(),
            created_at: utc(row.created_at),
        }
    }
}

impl From<inventory_movements::Model> for InventoryMovement {
    fn from(row: inventory_movements::Model) -> Self {
        Self {
            id: row.id.into(),
            tenant_id: row.tenant_id.into(),
            transaction_set_id: row.transaction_set_id.into(),
            product_id: row.product_id.into(),
            quantity: row.quantity,
            from: location(row.from_warehouse_id, row.from_location_id),
            to: location(row.to_warehouse_id, row.to_location_id),
            unit_cost: row.unit_cost,
            movement_type: row.movement_type.into(),
            status: row.status.into(),
        }
    }
}

impl From<inventory_balances::Model> for InventoryBalance {
    fn from(row: inventory_balances::Model) -> Self {
        Self {
            tenant_id: row.tenant_id.into(),
            key: BalanceKey {
                product_id: row.product_id.into(),
                location: StockLocation {
                    warehouse_id: row.warehouse_id.into(),
                    location_id: row.location_id.map(Into::into),
                },
            },
            on_hand: row.on_hand,
            reserved: row.reserved,
            available: row.available,
        }
    }
}

impl From<inventory_posting_links::Model> for InventoryPostingLink {
    fn from(row: inventory_posting_links::Model) -> Self {
        Self {
            id: row.id.into(),
            tenant_id: row.tenant_id.into(),
            transaction_set_id: row.transaction_set_id.into(),
            journal_entry_id: row.journal_entry_id.into(),
            movement_id: row.movement_id.into(),
        }
    }
}

impl From<products::Model> for Product {
    fn from(row: products::Model) -> Self {
        Self {
            id: row.id.into(),
            tenant_id: row.tenant_id.into(),
            sku: row.sku,
            standard_cost: row.standard_cost,
        }
    }
}
