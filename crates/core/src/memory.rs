//! In-memory ledger store.
//!
//! Every unit of work runs under one `tokio::sync::Mutex`, so each
//! `JournalWriter` method is atomic and posting-run claims are serialised.
//! Writer methods check everything before they mutate anything.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use tally_shared::types::{
    InventoryPostingLinkId, JournalEntryId, PostingRunId, ProductId, TenantId, TransactionSetId,
};

use crate::inventory::{
    BalanceKey, InventoryBalance, InventoryMovement, InventoryPostingLink, MovementStatus,
    Product, apply_deltas,
};
use crate::ledger::{
    Account, AccountRef, Approval, DocumentLink, EntityRef, GateSnapshot, JournalEntry,
    JournalLine, NewPostingRun, Override, PostingIntent, PostingRun, ReversalLink, RunClaim,
    RunState, TransactionSet, TransactionSetStatus, ValidationIssue,
};
use crate::store::{
    InventoryCommit, InventoryCommitted, JournalWriter, LedgerStore, PostingCommit,
    ReversalCommit, ReversalCommitted, StoreError, StoreResult,
};

#[derive(Debug, Default)]
struct State {
    accounts: Vec<Account>,
    transaction_sets: HashMap<TransactionSetId, TransactionSet>,
    intents: HashMap<TransactionSetId, PostingIntent>,
    approvals: Vec<Approval>,
    issues: Vec<ValidationIssue>,
    overrides: Vec<Override>,
    documents: Vec<DocumentLink>,
    runs: Vec<PostingRun>,
    entries: HashMap<JournalEntryId, JournalEntry>,
    lines: HashMap<JournalEntryId, Vec<JournalLine>>,
    reversal_links: HashMap<JournalEntryId, ReversalLink>,
    movements: Vec<InventoryMovement>,
    balances: HashMap<TenantId, BTreeMap<BalanceKey, InventoryBalance>>,
    posting_links: Vec<InventoryPostingLink>,
    products: HashMap<ProductId, Product>,
}

impl State {
    fn set(&self, tenant_id: TenantId, id: TransactionSetId) -> Option<&TransactionSet> {
        self.transaction_sets
            .get(&id)
            .filter(|set| set.tenant_id == tenant_id)
    }

    fn set_mut(
        &mut self,
        tenant_id: TenantId,
        id: TransactionSetId,
    ) -> Option<&mut TransactionSet> {
        self.transaction_sets
            .get_mut(&id)
            .filter(|set| set.tenant_id == tenant_id)
    }

    fn active_run(&self, tenant_id: TenantId, id: TransactionSetId) -> Option<&PostingRun> {
        self.runs.iter().find(|run| {
            run.tenant_id == tenant_id
                && run.transaction_set_id == id
                && !matches!(run.state, RunState::Failed { .. })
        })
    }
}

/// Ledger store kept in process memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<Mutex<State>>,
}

impl InMemoryLedger {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ========== Seeding ==========

    /// Adds an account.
    pub async fn insert_account(&self, account: Account) {
        self.state.lock().await.accounts.push(account);
    }

    /// Adds or replaces a transaction set.
    pub async fn insert_transaction_set(&self, set: TransactionSet) {
        self.state.lock().await.transaction_sets.insert(set.id, set);
    }

    /// Attaches a posting intent to its transaction set.
    pub async fn insert_posting_intent(&self, intent: PostingIntent) {
        self.state
            .lock()
            .await
            .intents
            .insert(intent.transaction_set_id, intent);
    }

    /// Adds an approval.
    pub async fn insert_approval(&self, approval: Approval) {
        self.state.lock().await.approvals.push(approval);
    }

    /// Adds a validation issue.
    pub async fn insert_validation_issue(&self, issue: ValidationIssue) {
        self.state.lock().await.issues.push(issue);
    }

    /// Adds an override.
    pub async fn insert_override(&self, override_: Override) {
        self.state.lock().await.overrides.push(override_);
    }

    /// Adds a document link.
    pub async fn insert_document_link(&self, link: DocumentLink) {
        self.state.lock().await.documents.push(link);
    }

    /// Adds an inventory movement.
    pub async fn insert_movement(&self, movement: InventoryMovement) {
        self.state.lock().await.movements.push(movement);
    }

    /// Adds or replaces a product.
    pub async fn insert_product(&self, product: Product) {
        self.state.lock().await.products.insert(product.id, product);
    }

    /// Adds or replaces a balance row.
    pub async fn insert_balance(&self, balance: InventoryBalance) {
        self.state
            .lock()
            .await
            .balances
            .entry(balance.tenant_id)
            .or_default()
            .insert(balance.key, balance);
    }

    // ========== Inspection ==========

    /// All journal entries of a tenant.
    pub async fn journal_entries(&self, tenant_id: TenantId) -> Vec<JournalEntry> {
        let mut entries: Vec<JournalEntry> = self
            .state
            .lock()
            .await
            .entries
            .values()
            .filter(|e| e.tenant_id == tenant_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.id);
        entries
    }

    /// All posting runs of a transaction set in start order.
    pub async fn posting_runs(
        &self,
        tenant_id: TenantId,
        transaction_set_id: TransactionSetId,
    ) -> Vec<PostingRun> {
        let mut runs: Vec<PostingRun> = self
            .state
            .lock()
            .await
            .runs
            .iter()
            .filter(|r| r.tenant_id == tenant_id && r.transaction_set_id == transaction_set_id)
            .cloned()
            .collect();
        runs.sort_by_key(|r| (r.started_at, r.id));
        runs
    }

    /// All balance rows of a tenant.
    pub async fn balances(&self, tenant_id: TenantId) -> Vec<InventoryBalance> {
        self.state
            .lock()
            .await
            .balances
            .get(&tenant_id)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn transaction_set(
        &self,
        tenant_id: TenantId,
        id: TransactionSetId,
    ) -> StoreResult<Option<TransactionSet>> {
        Ok(self.state.lock().await.set(tenant_id, id).cloned())
    }

    async fn approvals(
        &self,
        tenant_id: TenantId,
        entity: EntityRef,
    ) -> StoreResult<Vec<Approval>> {
        let state = self.state.lock().await;
        Ok(state
            .approvals
            .iter()
            .filter(|a| a.tenant_id == tenant_id && a.entity == entity)
            .cloned()
            .collect())
    }

    async fn validation_issues(
        &self,
        tenant_id: TenantId,
        entity: EntityRef,
    ) -> StoreResult<Vec<ValidationIssue>> {
        let state = self.state.lock().await;
        Ok(state
            .issues
            .iter()
            .filter(|i| i.tenant_id == tenant_id && i.entity == entity)
            .cloned()
            .collect())
    }

    async fn overrides(
        &self,
        tenant_id: TenantId,
        entity: EntityRef,
    ) -> StoreResult<Vec<Override>> {
        let state = self.state.lock().await;
        Ok(state
            .overrides
            .iter()
            .filter(|o| o.tenant_id == tenant_id && o.entity == entity)
            .cloned()
            .collect())
    }

    async fn document_links(
        &self,
        tenant_id: TenantId,
        entity: EntityRef,
    ) -> StoreResult<Vec<DocumentLink>> {
        let state = self.state.lock().await;
        Ok(state
            .documents
            .iter()
            .filter(|d| d.tenant_id == tenant_id && d.entity == entity)
            .cloned()
            .collect())
    }

    async fn gate_snapshot(
        &self,
        tenant_id: TenantId,
        transaction_set_id: TransactionSetId,
    ) -> StoreResult<GateSnapshot> {
        let state = self.state.lock().await;
        let Some(transaction_set) = state.set(tenant_id, transaction_set_id).cloned() else {
            return Ok(GateSnapshot::default());
        };
        let entity = EntityRef::transaction_set(transaction_set_id);
        let owned = |row_tenant: TenantId, row_entity: EntityRef| {
            row_tenant == tenant_id && row_entity == entity
        };
        Ok(GateSnapshot {
            transaction_set: Some(transaction_set),
            approvals: state
                .approvals
                .iter()
                .filter(|a| owned(a.tenant_id, a.entity))
                .cloned()
                .collect(),
            issues: state
                .issues
                .iter()
                .filter(|i| owned(i.tenant_id, i.entity))
                .cloned()
                .collect(),
            overrides: state
                .overrides
                .iter()
                .filter(|o| owned(o.tenant_id, o.entity))
                .cloned()
                .collect(),
            document_links: state
                .documents
                .iter()
                .filter(|d| owned(d.tenant_id, d.entity))
                .count(),
        })
    }

    async fn posting_intent(
        &self,
        tenant_id: TenantId,
        transaction_set_id: TransactionSetId,
    ) -> StoreResult<Option<PostingIntent>> {
        let state = self.state.lock().await;
        Ok(state
            .intents
            .get(&transaction_set_id)
            .filter(|i| i.tenant_id == tenant_id)
            .cloned())
    }

    async fn account(
        &self,
        tenant_id: TenantId,
        account: &AccountRef,
    ) -> StoreResult<Option<Account>> {
        let state = self.state.lock().await;
        Ok(state
            .accounts
            .iter()
            .find(|a| {
                a.tenant_id == tenant_id
                    && match account {
                        AccountRef::ById(id) => a.id == *id,
                        AccountRef::ByCode(code) => a.code == *code,
                    }
            })
            .cloned())
    }

    async fn journal_entry(
        &self,
        tenant_id: TenantId,
        id: JournalEntryId,
    ) -> StoreResult<Option<JournalEntry>> {
        let state = self.state.lock().await;
        Ok(state
            .entries
            .get(&id)
            .filter(|e| e.tenant_id == tenant_id)
            .cloned())
    }

    async fn journal_lines(
        &self,
        tenant_id: TenantId,
        journal_entry_id: JournalEntryId,
    ) -> StoreResult<Vec<JournalLine>> {
        let state = self.state.lock().await;
        let owned = state
            .entries
            .get(&journal_entry_id)
            .is_some_and(|e| e.tenant_id == tenant_id);
        if !owned {
            return Ok(Vec::new());
        }
        let mut lines = state
            .lines
            .get(&journal_entry_id)
            .cloned()
            .unwrap_or_default();
        lines.sort_by_key(|l| l.line_no);
        Ok(lines)
    }

    async fn reversal_link(
        &self,
        tenant_id: TenantId,
        original_journal_entry_id: JournalEntryId,
    ) -> StoreResult<Option<ReversalLink>> {
        let state = self.state.lock().await;
        Ok(state
            .reversal_links
            .get(&original_journal_entry_id)
            .filter(|l| l.tenant_id == tenant_id)
            .cloned())
    }

    async fn movements(
        &self,
        tenant_id: TenantId,
        transaction_set_id: TransactionSetId,
        status: Option<MovementStatus>,
    ) -> StoreResult<Vec<InventoryMovement>> {
        let state = self.state.lock().await;
        Ok(state
            .movements
            .iter()
            .filter(|m| {
                m.tenant_id == tenant_id
                    && m.transaction_set_id == transaction_set_id
                    && status.is_none_or(|s| m.status == s)
            })
            .cloned()
            .collect())
    }

    async fn inventory_posting_links(
        &self,
        tenant_id: TenantId,
        transaction_set_id: TransactionSetId,
    ) -> StoreResult<Vec<InventoryPostingLink>> {
        let state = self.state.lock().await;
        Ok(state
            .posting_links
            .iter()
            .filter(|l| l.tenant_id == tenant_id && l.transaction_set_id == transaction_set_id)
            .cloned()
            .collect())
    }

    async fn inventory_balance(
        &self,
        tenant_id: TenantId,
        key: BalanceKey,
    ) -> StoreResult<Option<InventoryBalance>> {
        let state = self.state.lock().await;
        Ok(state
            .balances
            .get(&tenant_id)
            .and_then(|rows| rows.get(&key))
            .cloned())
    }

    async fn product(&self, tenant_id: TenantId, id: ProductId) -> StoreResult<Option<Product>> {
        let state = self.state.lock().await;
        Ok(state
            .products
            .get(&id)
            .filter(|p| p.tenant_id == tenant_id)
            .cloned())
    }

    async fn latest_posting_run(
        &self,
        tenant_id: TenantId,
        transaction_set_id: TransactionSetId,
    ) -> StoreResult<Option<PostingRun>> {
        let state = self.state.lock().await;
        Ok(state
            .runs
            .iter()
            .filter(|r| r.tenant_id == tenant_id && r.transaction_set_id == transaction_set_id)
            .max_by_key(|r| (r.started_at, r.id))
            .cloned())
    }

    async fn claim_posting_run(&self, run: NewPostingRun) -> StoreResult<RunClaim> {
        let mut state = self.state.lock().await;
        if state.set(run.tenant_id, run.transaction_set_id).is_none() {
            return Ok(RunClaim::NoTransactionSet);
        }
        if let Some(existing) = state.active_run(run.tenant_id, run.transaction_set_id) {
            return Ok(RunClaim::Existing(existing.clone()));
        }
        let run = run.started_at(Utc::now());
        state.runs.push(run.clone());
        Ok(RunClaim::Claimed(run))
    }

    async fn fail_posting_run(
        &self,
        tenant_id: TenantId,
        run_id: PostingRunId,
        error: String,
    ) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let run = state
            .runs
            .iter_mut()
            .find(|r| r.tenant_id == tenant_id && r.id == run_id)
            .ok_or_else(|| StoreError::Conflict(format!("posting run {run_id} not found")))?;
        if run.state != RunState::Started {
            return Err(StoreError::Conflict(format!(
                "posting run {run_id} is already {}",
                run.state.status()
            )));
        }
        run.state = RunState::Failed { error };
        run.finished_at = Some(Utc::now());
        Ok(())
    }

    async fn transition_to_review(
        &self,
        tenant_id: TenantId,
        id: TransactionSetId,
    ) -> StoreResult<Option<TransactionSet>> {
        let mut state = self.state.lock().await;
        match state.set_mut(tenant_id, id) {
            Some(set) if set.status == TransactionSetStatus::Draft => {
                set.status = TransactionSetStatus::Review;
                Ok(Some(set.clone()))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl JournalWriter for InMemoryLedger {
    async fn commit_posting(&self, commit: PostingCommit) -> StoreResult<JournalEntry> {
        let mut state = self.state.lock().await;
        let header = commit.entry.header();
        let (tenant_id, set_id) = (header.tenant_id, header.source_transaction_set_id);

        let run_started = state.runs.iter().any(|r| {
            r.id == commit.run_id
                && r.tenant_id == tenant_id
                && r.transaction_set_id == set_id
                && r.state == RunState::Started
        });
        if !run_started {
            return Err(StoreError::Conflict(format!(
                "posting run {} does not hold the token",
                commit.run_id
            )));
        }
        if state.set(tenant_id, set_id).map(|s| s.status) != Some(TransactionSetStatus::Review) {
            return Err(StoreError::Conflict(format!(
                "transaction set {set_id} is no longer in review"
            )));
        }
        if state.entries.contains_key(&header.id) {
            return Err(StoreError::Conflict(format!(
                "journal entry {} already exists",
                header.id
            )));
        }

        let now = Utc::now();
        let (entry, lines) = commit.entry.to_rows(commit.actor_id, now);
        state.entries.insert(entry.id, entry.clone());
        state.lines.insert(entry.id, lines);
        if let Some(set) = state.set_mut(tenant_id, set_id) {
            set.status = TransactionSetStatus::Posted;
        }
        if let Some(run) = state.runs.iter_mut().find(|r| r.id == commit.run_id) {
            run.state = RunState::Succeeded {
                journal_entry_id: entry.id,
            };
            run.finished_at = Some(now);
        }
        Ok(entry)
    }

    async fn commit_reversal(&self, commit: ReversalCommit) -> StoreResult<ReversalCommitted> {
        let mut state = self.state.lock().await;
        let tenant_id = commit.transaction_set.tenant_id;

        if let Some(link) = state
            .reversal_links
            .get(&commit.original_journal_entry_id)
            .filter(|l| l.tenant_id == tenant_id)
        {
            return Ok(ReversalCommitted::AlreadyReversed(link.clone()));
        }
        let original_exists = state
            .entries
            .get(&commit.original_journal_entry_id)
            .is_some_and(|e| e.tenant_id == tenant_id);
        if !original_exists {
            return Err(StoreError::Conflict(format!(
                "journal entry {} not found",
                commit.original_journal_entry_id
            )));
        }

        let now = Utc::now();
        let (entry, lines) = commit.entry.to_rows(commit.actor_id, now);
        let link = ReversalLink {
            id: commit.link_id,
            tenant_id,
            original_journal_entry_id: commit.original_journal_entry_id,
            reversal_journal_entry_id: entry.id,
            reversal_transaction_set_id: commit.transaction_set.id,
            reason: commit.reason,
            created_by: commit.actor_id,
            created_at: now,
        };

        state
            .transaction_sets
            .insert(commit.transaction_set.id, commit.transaction_set);
        state.entries.insert(entry.id, entry.clone());
        state.lines.insert(entry.id, lines);
        state
            .reversal_links
            .insert(link.original_journal_entry_id, link.clone());

        Ok(ReversalCommitted::Created { link, entry })
    }

    async fn commit_inventory(&self, commit: InventoryCommit) -> StoreResult<InventoryCommitted> {
        let mut state = self.state.lock().await;
        let (tenant_id, set_id) = (commit.tenant_id, commit.transaction_set_id);

        match state.set(tenant_id, set_id).map(|s| s.status) {
            None => {
                return Err(StoreError::Conflict(format!(
                    "transaction set {set_id} not found"
                )));
            }
            Some(TransactionSetStatus::Posted) => return Ok(InventoryCommitted::AlreadyPosted),
            Some(_) => {}
        }
        for id in &commit.movement_ids {
            let draft = state.movements.iter().any(|m| {
                m.id == *id
                    && m.tenant_id == tenant_id
                    && m.transaction_set_id == set_id
                    && m.status == MovementStatus::Draft
            });
            if !draft {
                return Err(StoreError::Conflict(format!(
                    "movement {id} is not a draft of transaction set {set_id}"
                )));
            }
        }

        let now = Utc::now();
        let rows = state.balances.entry(tenant_id).or_default();
        let balances = apply_deltas(tenant_id, rows, &commit.deltas);

        let mut movements = Vec::with_capacity(commit.movement_ids.len());
        for movement in &mut state.movements {
            if commit.movement_ids.contains(&movement.id) {
                movement.status = MovementStatus::Posted;
                movements.push(movement.clone());
            }
        }

        let mut entry = None;
        let mut links = Vec::new();
        if let Some(journal) = commit.cost_journal {
            let (row, lines) = journal.entry.to_rows(commit.actor_id, now);
            for movement_id in journal.costed_movements {
                links.push(InventoryPostingLink {
                    id: InventoryPostingLinkId::new(),
                    tenant_id,
                    transaction_set_id: set_id,
                    journal_entry_id: row.id,
                    movement_id,
                });
            }
            state.lines.insert(row.id, lines);
            state.entries.insert(row.id, row.clone());
            state.posting_links.extend(links.iter().cloned());
            entry = Some(row);
        }

        if let Some(set) = state.set_mut(tenant_id, set_id) {
            set.status = TransactionSetStatus::Posted;
        }

        Ok(InventoryCommitted::Applied {
            movements,
            balances,
            entry,
            links,
        })
    }
}
