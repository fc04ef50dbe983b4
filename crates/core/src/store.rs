//! Storage seams of the posting engine.
//!
//! [`LedgerStore`] covers reads and posting-run bookkeeping.
//! [`JournalWriter`] is the only way to write journal entries, reversal links
//! and inventory postings; every method commits one atomic unit of work.

use async_trait::async_trait;
use thiserror::Error;

use tally_shared::types::{
    ActorId, JournalEntryId, MovementId, PostingRunId, ProductId, ReversalLinkId, TenantId,
    TransactionSetId,
};

use crate::inventory::{
    BalanceDelta, BalanceKey, InventoryBalance, InventoryMovement, InventoryPostingLink,
    MovementStatus, Product,
};
use crate::ledger::{
    Account, AccountRef, Approval, BalancedEntry, DocumentLink, EntityRef, GateSnapshot,
    JournalEntry, JournalLine, NewPostingRun, Override, PostingIntent, PostingRun, ReversalLink,
    RunClaim, TransactionSet, ValidationIssue,
};

/// Store faults.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A uniqueness or state check failed inside the store.
    #[error("Store conflict: {0}")]
    Conflict(String),

    /// The backing database failed.
    #[error("Database error: {0}")]
    Database(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Read access and posting-run bookkeeping.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Loads a transaction set.
    async fn transaction_set(
        &self,
        tenant_id: TenantId,
        id: TransactionSetId,
    ) -> StoreResult<Option<TransactionSet>>;

    /// Lists approvals attached to an entity.
    async fn approvals(&self, tenant_id: TenantId, entity: EntityRef)
    -> StoreResult<Vec<Approval>>;

    /// Lists validation issues attached to an entity.
    async fn validation_issues(
        &self,
        tenant_id: TenantId,
        entity: EntityRef,
    ) -> StoreResult<Vec<ValidationIssue>>;

    /// Lists overrides attached to an entity.
    async fn overrides(&self, tenant_id: TenantId, entity: EntityRef)
    -> StoreResult<Vec<Override>>;

    /// Lists document links attached to an entity.
    async fn document_links(
        &self,
        tenant_id: TenantId,
        entity: EntityRef,
    ) -> StoreResult<Vec<DocumentLink>>;

    /// Loads a transaction set with its approvals, issues, overrides and
    /// document links from one consistent read.
    ///
    /// A missing set yields an empty snapshot.
    async fn gate_snapshot(
        &self,
        tenant_id: TenantId,
        transaction_set_id: TransactionSetId,
    ) -> StoreResult<GateSnapshot>;

    /// Loads the posting intent attached to a transaction set.
    async fn posting_intent(
        &self,
        tenant_id: TenantId,
        transaction_set_id: TransactionSetId,
    ) -> StoreResult<Option<PostingIntent>>;

    /// Looks up an account by ID or code.
    async fn account(
        &self,
        tenant_id: TenantId,
        account: &AccountRef,
    ) -> StoreResult<Option<Account>>;

    /// Loads a journal entry header.
    async fn journal_entry(
        &self,
        tenant_id: TenantId,
        id: JournalEntryId,
    ) -> StoreResult<Option<JournalEntry>>;

    /// Loads the lines of a journal entry ordered by line number.
    async fn journal_lines(
        &self,
        tenant_id: TenantId,
        journal_entry_id: JournalEntryId,
    ) -> StoreResult<Vec<JournalLine>>;

    /// Loads the reversal link of an original entry, if it has been reversed.
    async fn reversal_link(
        &self,
        tenant_id: TenantId,
        original_journal_entry_id: JournalEntryId,
    ) -> StoreResult<Option<ReversalLink>>;

    /// Lists the movements of a transaction set, optionally by status.
    async fn movements(
        &self,
        tenant_id: TenantId,
        transaction_set_id: TransactionSetId,
        status: Option<MovementStatus>,
    ) -> StoreResult<Vec<InventoryMovement>>;

    /// Lists the inventory posting links of a transaction set.
    async fn inventory_posting_links(
        &self,
        tenant_id: TenantId,
        transaction_set_id: TransactionSetId,
    ) -> StoreResult<Vec<InventoryPostingLink>>;

    /// Loads the balance row for a key.
    async fn inventory_balance(
        &self,
        tenant_id: TenantId,
        key: BalanceKey,
    ) -> StoreResult<Option<InventoryBalance>>;

    /// Loads a product.
    async fn product(&self, tenant_id: TenantId, id: ProductId) -> StoreResult<Option<Product>>;

    /// Returns the most recent posting run of a transaction set.
    async fn latest_posting_run(
        &self,
        tenant_id: TenantId,
        transaction_set_id: TransactionSetId,
    ) -> StoreResult<Option<PostingRun>>;

    /// Atomically claims the posting token for a transaction set.
    ///
    /// Only one `started` or `succeeded` run may exist per transaction set;
    /// a concurrent claim observes the winner as [`RunClaim::Existing`].
    async fn claim_posting_run(&self, run: NewPostingRun) -> StoreResult<RunClaim>;

    /// Marks a started run as failed.
    async fn fail_posting_run(
        &self,
        tenant_id: TenantId,
        run_id: PostingRunId,
        error: String,
    ) -> StoreResult<()>;

    /// Moves a draft transaction set to review.
    ///
    /// Returns `None` when the set was no longer a draft.
    async fn transition_to_review(
        &self,
        tenant_id: TenantId,
        id: TransactionSetId,
    ) -> StoreResult<Option<TransactionSet>>;
}

/// A posting attempt ready to commit.
#[derive(Debug, Clone)]
pub struct PostingCommit {
    /// The run holding the token.
    pub run_id: PostingRunId,
    /// Who posts.
    pub actor_id: ActorId,
    /// The entry to write.
    pub entry: BalancedEntry,
}

/// A reversal ready to commit.
#[derive(Debug, Clone)]
pub struct ReversalCommit {
    /// Pre-assigned link ID.
    pub link_id: ReversalLinkId,
    /// Who reverses.
    pub actor_id: ActorId,
    /// The entry being reversed.
    pub original_journal_entry_id: JournalEntryId,
    /// The reversal transaction set, already in `posted` status.
    pub transaction_set: TransactionSet,
    /// The mirror entry.
    pub entry: BalancedEntry,
    /// Why the entry is reversed.
    pub reason: String,
}

/// Outcome of a reversal commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReversalCommitted {
    /// The reversal was written.
    Created {
        /// The new link.
        link: ReversalLink,
        /// The new entry header.
        entry: JournalEntry,
    },
    /// Another caller reversed the entry first.
    AlreadyReversed(ReversalLink),
}

/// Cost journal part of an inventory commit.
#[derive(Debug, Clone)]
pub struct CostJournalCommit {
    /// The cost entry.
    pub entry: BalancedEntry,
    /// Movements that contributed cost lines.
    pub costed_movements: Vec<MovementId>,
}

/// An inventory posting ready to commit.
#[derive(Debug, Clone)]
pub struct InventoryCommit {
    /// The owning tenant.
    pub tenant_id: TenantId,
    /// Who posts.
    pub actor_id: ActorId,
    /// The transaction set being posted.
    pub transaction_set_id: TransactionSetId,
    /// The draft movements to mark posted.
    pub movement_ids: Vec<MovementId>,
    /// Balance increments, one per touched side.
    pub deltas: Vec<BalanceDelta>,
    /// Cost entry, when cost journalization applies.
    pub cost_journal: Option<CostJournalCommit>,
}

/// Outcome of an inventory commit.
#[derive(Debug, Clone, PartialEq)]
pub enum InventoryCommitted {
    /// The batch was applied.
    Applied {
        /// Movements now in `posted` status.
        movements: Vec<InventoryMovement>,
        /// Balance rows after the increments.
        balances: Vec<InventoryBalance>,
        /// The cost entry header, when one was written.
        entry: Option<JournalEntry>,
        /// Links between the cost entry and its movements.
        links: Vec<InventoryPostingLink>,
    },
    /// The transaction set was posted by someone else first.
    AlreadyPosted,
}

/// The only writer of journal data.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JournalWriter: Send + Sync {
    /// Writes the entry, moves the transaction set to `posted` and marks the
    /// run succeeded, all or nothing.
    async fn commit_posting(&self, commit: PostingCommit) -> StoreResult<JournalEntry>;

    /// Writes the reversal set, entry and link, all or nothing.
    async fn commit_reversal(&self, commit: ReversalCommit) -> StoreResult<ReversalCommitted>;

    /// Applies an inventory batch, all or nothing.
    async fn commit_inventory(&self, commit: InventoryCommit) -> StoreResult<InventoryCommitted>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        assert_eq!(
            StoreError::Conflict("posting run already claimed".into()).to_string(),
            "Store conflict: posting run already claimed"
        );
        assert_eq!(
            StoreError::Database("connection reset".into()).to_string(),
            "Database error: connection reset"
        );
    }
}
