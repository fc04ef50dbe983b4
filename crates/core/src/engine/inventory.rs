//! Inventory movement posting.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::json;
use tally_shared::types::{ActorId, JournalEntryId, TenantId, TransactionSetId};

use super::{CostJournal, InventoryPostingResult, PostingEngine};
use crate::audit::{AuditAction, AuditEvent};
use crate::inventory::{
    BalanceKey, CostAccounts, InventoryMovement, MovementStatus, batch_deltas, movement_deltas,
    plan_cost_lines, validate_movement,
};
use crate::ledger::{
    AccountRef, BalancedEntry, EntityType, EntryHeader, PostingError, TransactionSet,
};
use crate::store::{CostJournalCommit, InventoryCommit, InventoryCommitted, StoreResult};

/// Per-call overrides for inventory posting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryPostingOptions {
    /// Memo of the cost entry.
    pub memo: Option<String>,
    /// Inventory account code; defaults to `posting.inventory_account_code`.
    pub inventory_account_code: Option<String>,
    /// COGS account code; defaults to `posting.cogs_account_code`.
    pub cogs_account_code: Option<String>,
}

impl PostingEngine {
    /// Applies the draft movements of a transaction set to inventory balances
    /// and journalizes their cost.
    ///
    /// The whole batch commits or nothing does. Cost journalization is best
    /// effort: when an account is missing the quantities still post.
    ///
    /// # Errors
    ///
    /// Returns `TransactionSetNotFound`, `NoMovements`, `InvalidMovement`, or a
    /// store fault.
    #[tracing::instrument(skip(self, options), fields(tenant = %tenant_id, transaction_set = %transaction_set_id))]
    pub async fn post_inventory_movements(
        &self,
        tenant_id: TenantId,
        actor_id: ActorId,
        transaction_set_id: TransactionSetId,
        options: InventoryPostingOptions,
    ) -> Result<InventoryPostingResult, PostingError> {
        let set = self
            .store
            .transaction_set(tenant_id, transaction_set_id)
            .await?
            .ok_or(PostingError::TransactionSetNotFound(transaction_set_id))?;
        if set.status.is_posted() {
            return Ok(self.replay_inventory(&set).await?);
        }

        let movements = self
            .store
            .movements(tenant_id, transaction_set_id, Some(MovementStatus::Draft))
            .await?;
        if movements.is_empty() {
            return Err(PostingError::NoMovements(transaction_set_id));
        }
        for movement in &movements {
            validate_movement(movement)?;
        }

        let (cost_journal, cost_status) = match self.cost_accounts(tenant_id, &options).await? {
            None => {
                tracing::warn!("inventory or COGS account missing, cost journalization skipped");
                (None, CostJournal::SkippedMissingAccounts)
            }
            Some(accounts) => match self
                .plan_cost_journal(&set, &movements, accounts, &options)
                .await?
            {
                Some(journal) => {
                    let journal_entry_id = journal.entry.id();
                    (Some(journal), CostJournal::Posted { journal_entry_id })
                }
                None => (None, CostJournal::NoCostedMovements),
            },
        };

        let committed = self
            .writer
            .commit_inventory(InventoryCommit {
                tenant_id,
                actor_id,
                transaction_set_id,
                movement_ids: movements.iter().map(|m| m.id).collect(),
                deltas: batch_deltas(&movements),
                cost_journal,
            })
            .await?;

        let (movements, balances, entry, links) = match committed {
            InventoryCommitted::Applied {
                movements,
                balances,
                entry,
                links,
            } => (movements, balances, entry, links),
            InventoryCommitted::AlreadyPosted => {
                let set = self
                    .store
                    .transaction_set(tenant_id, transaction_set_id)
                    .await?
                    .ok_or(PostingError::TransactionSetNotFound(transaction_set_id))?;
                return Ok(self.replay_inventory(&set).await?);
            }
        };

        let mut events: Vec<AuditEvent> = movements
            .iter()
            .map(|movement| {
                AuditEvent::new(
                    tenant_id,
                    actor_id,
                    EntityType::InventoryMovement,
                    movement.id,
                    AuditAction::InventoryMovementPosted,
                )
                .with_metadata(json!({
                    "movement_type": movement.movement_type,
                    "product_id": movement.product_id,
                    "quantity": movement.quantity.to_string(),
                }))
            })
            .collect();
        if let Some(entry) = &entry {
            events.push(
                AuditEvent::new(
                    tenant_id,
                    actor_id,
                    EntityType::JournalEntry,
                    entry.id,
                    AuditAction::JournalEntryCreated,
                )
                .with_metadata(json!({
                    "transaction_set_id": transaction_set_id,
                    "costed_movements": links.len(),
                })),
            );
        }
        events.push(
            AuditEvent::new(
                tenant_id,
                actor_id,
                EntityType::TransactionSet,
                transaction_set_id,
                AuditAction::TransactionSetPosted,
            )
            .with_metadata(json!({
                "journal_entry_id": entry.as_ref().map(|e| e.id),
                "movement_count": movements.len(),
            })),
        );
        self.emit_all(events).await;

        tracing::info!(
            movements = movements.len(),
            cost_entry = ?cost_status.journal_entry_id(),
            "inventory movements posted"
        );

        Ok(InventoryPostingResult {
            transaction_set_id,
            movements,
            balances,
            cost_journal: cost_status,
            costed_movements: links.into_iter().map(|l| l.movement_id).collect(),
            idempotent: false,
        })
    }

    /// Resolves the configured inventory and COGS accounts.
    async fn cost_accounts(
        &self,
        tenant_id: TenantId,
        options: &InventoryPostingOptions,
    ) -> StoreResult<Option<CostAccounts>> {
        let inventory_code = options
            .inventory_account_code
            .clone()
            .unwrap_or_else(|| self.config.inventory_account_code.clone());
        let cogs_code = options
            .cogs_account_code
            .clone()
            .unwrap_or_else(|| self.config.cogs_account_code.clone());

        let inventory = self
            .store
            .account(tenant_id, &AccountRef::ByCode(inventory_code))
            .await?
            .filter(|a| a.is_active);
        let cogs = self
            .store
            .account(tenant_id, &AccountRef::ByCode(cogs_code))
            .await?
            .filter(|a| a.is_active);

        Ok(inventory.zip(cogs).map(|(inventory, cogs)| CostAccounts {
            inventory: inventory.id,
            cogs: cogs.id,
        }))
    }

    /// Builds the cost entry, or `None` when no movement carries cost.
    async fn plan_cost_journal(
        &self,
        set: &TransactionSet,
        movements: &[InventoryMovement],
        accounts: CostAccounts,
        options: &InventoryPostingOptions,
    ) -> Result<Option<CostJournalCommit>, PostingError> {
        let mut products = HashMap::new();
        for product_id in movements.iter().map(|m| m.product_id).collect::<BTreeSet<_>>() {
            if let Some(product) = self.store.product(set.tenant_id, product_id).await? {
                products.insert(product_id, product);
            }
        }

        let plan = plan_cost_lines(movements, &products, accounts);
        if plan.is_empty() {
            return Ok(None);
        }

        let memo = options
            .memo
            .clone()
            .unwrap_or_else(|| format!("Inventory posting for transaction set {}", set.id));
        let entry = BalancedEntry::new(
            EntryHeader {
                id: JournalEntryId::new(),
                tenant_id: set.tenant_id,
                source_transaction_set_id: set.id,
                posting_date: set.business_date,
                memo: Some(memo),
            },
            plan.lines,
        )?;

        Ok(Some(CostJournalCommit {
            entry,
            costed_movements: plan.costed_movements,
        }))
    }

    /// Reports what an earlier inventory posting left behind.
    async fn replay_inventory(&self, set: &TransactionSet) -> StoreResult<InventoryPostingResult> {
        let movements = self
            .store
            .movements(set.tenant_id, set.id, Some(MovementStatus::Posted))
            .await?;
        let links = self
            .store
            .inventory_posting_links(set.tenant_id, set.id)
            .await?;

        let keys: BTreeSet<BalanceKey> = movements
            .iter()
            .flat_map(movement_deltas)
            .map(|delta| delta.key)
            .collect();
        let mut balances = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(balance) = self.store.inventory_balance(set.tenant_id, key).await? {
                balances.push(balance);
            }
        }

        let cost_journal = links.first().map_or(CostJournal::NoCostedMovements, |link| {
            CostJournal::Posted {
                journal_entry_id: link.journal_entry_id,
            }
        });

        Ok(InventoryPostingResult {
            transaction_set_id: set.id,
            movements,
            balances,
            cost_journal,
            costed_movements: links.into_iter().map(|l| l.movement_id).collect(),
            idempotent: true,
        })
    }
}
