//! The posting engine.
//!
//! [`PostingEngine`] coordinates the precondition gates, posting runs, the
//! journal writer and the audit sink. It keeps no state of its own; every
//! operation reads what it needs through [`LedgerStore`] and commits through
//! [`JournalWriter`].

mod inventory;
mod posting;
mod reversal;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tally_shared::config::PostingConfig;
use tally_shared::types::{
    JournalEntryId, MovementId, PostingRunId, TenantId, TransactionSetId,
};

use crate::audit::{AuditEvent, AuditSink};
use crate::inventory::{InventoryBalance, InventoryMovement};
use crate::ledger::{Account, AccountRef};
use crate::store::{JournalWriter, LedgerStore, StoreResult};

pub use inventory::InventoryPostingOptions;

/// Outcome of [`PostingEngine::post`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostingResult {
    /// The posted entry.
    pub journal_entry_id: JournalEntryId,
    /// The run that posted it.
    pub posting_run_id: PostingRunId,
    /// The posted transaction set.
    pub transaction_set_id: TransactionSetId,
    /// True if an earlier run had already posted the set.
    pub idempotent: bool,
}

/// Outcome of [`PostingEngine::reverse`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReversalResult {
    /// The reversed entry.
    pub original_journal_entry_id: JournalEntryId,
    /// The mirror entry.
    pub reversal_journal_entry_id: JournalEntryId,
    /// The transaction set carrying the mirror entry.
    pub reversal_transaction_set_id: TransactionSetId,
    /// True if the entry had already been reversed.
    pub idempotent: bool,
}

/// What happened to cost journalization during an inventory posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CostJournal {
    /// A cost entry was written.
    Posted {
        /// The cost entry.
        journal_entry_id: JournalEntryId,
    },
    /// The inventory or COGS account could not be resolved.
    SkippedMissingAccounts,
    /// No movement carried a nonzero cost.
    NoCostedMovements,
}

impl CostJournal {
    /// Returns the cost entry ID, if one was written.
    #[must_use]
    pub fn journal_entry_id(&self) -> Option<JournalEntryId> {
        match self {
            Self::Posted { journal_entry_id } => Some(*journal_entry_id),
            Self::SkippedMissingAccounts | Self::NoCostedMovements => None,
        }
    }
}

/// Outcome of [`PostingEngine::post_inventory_movements`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryPostingResult {
    /// The posted transaction set.
    pub transaction_set_id: TransactionSetId,
    /// Movements in `posted` status.
    pub movements: Vec<InventoryMovement>,
    /// Balance rows touched by the movements.
    pub balances: Vec<InventoryBalance>,
    /// Cost journalization outcome.
    pub cost_journal: CostJournal,
    /// Movements linked to the cost entry.
    pub costed_movements: Vec<MovementId>,
    /// True if the set had already been posted.
    pub idempotent: bool,
}

impl InventoryPostingResult {
    /// Returns the cost entry ID, if one was written.
    #[must_use]
    pub fn journal_entry_id(&self) -> Option<JournalEntryId> {
        self.cost_journal.journal_entry_id()
    }
}

/// Coordinates posting, reversal and inventory posting for all tenants.
#[derive(Clone)]
pub struct PostingEngine {
    store: Arc<dyn LedgerStore>,
    writer: Arc<dyn JournalWriter>,
    audit: Arc<dyn AuditSink>,
    config: PostingConfig,
}

impl PostingEngine {
    /// Creates an engine over the given store, writer and audit sink.
    #[must_use]
    pub fn new(
        store: Arc<dyn LedgerStore>,
        writer: Arc<dyn JournalWriter>,
        audit: Arc<dyn AuditSink>,
        config: PostingConfig,
    ) -> Self {
        Self {
            store,
            writer,
            audit,
            config,
        }
    }

    /// Returns the posting configuration.
    #[must_use]
    pub fn config(&self) -> &PostingConfig {
        &self.config
    }

    /// Sends an audit event. Failures are logged and swallowed.
    async fn emit(&self, event: AuditEvent) {
        let action = event.action;
        let entity_id = event.entity.entity_id;
        if let Err(err) = self.audit.log_audit_event(event).await {
            tracing::error!(
                target: "audit",
                action = action.as_str(),
                entity_id = %entity_id,
                error = %err,
                "failed to record audit event"
            );
        }
    }

    async fn emit_all(&self, events: Vec<AuditEvent>) {
        for event in events {
            self.emit(event).await;
        }
    }

    /// Resolves account references once each.
    async fn load_accounts<'a>(
        &self,
        tenant_id: TenantId,
        refs: impl IntoIterator<Item = &'a AccountRef>,
    ) -> StoreResult<HashMap<AccountRef, Account>> {
        let mut accounts = HashMap::new();
        for account_ref in refs {
            if accounts.contains_key(account_ref) {
                continue;
            }
            if let Some(account) = self.store.account(tenant_id, account_ref).await? {
                accounts.insert(account_ref.clone(), account);
            }
        }
        Ok(accounts)
    }
}

impl std::fmt::Debug for PostingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostingEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
