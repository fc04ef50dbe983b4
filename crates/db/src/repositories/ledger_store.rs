//! Reads and posting-run bookkeeping.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr,
};

use tally_core::inventory::{
    BalanceKey, InventoryBalance, InventoryMovement, InventoryPostingLink, MovementStatus, Product,
};
use tally_core::ledger::{
    Account, AccountRef, Approval, DocumentLink, EntityRef, GateSnapshot, JournalEntry,
    JournalLine, NewPostingRun, Override, PostingIntent, PostingRun, PostingRunStatus,
    ReversalLink, RunClaim, TransactionSet, ValidationIssue,
};
use tally_core::store::{LedgerStore, StoreError, StoreResult};
use tally_shared::types::{JournalEntryId, PostingRunId, ProductId, TenantId, TransactionSetId};

use super::convert::{db_err, posting_intent};
use crate::entities::sea_orm_active_enums::{
    EntityType as DbEntityType, MovementStatus as DbMovementStatus,
    PostingRunStatus as DbPostingRunStatus, TransactionSetStatus as DbTransactionSetStatus,
};
use crate::entities::{
    accounts, approvals, document_links, inventory_balances, inventory_movements,
    inventory_posting_links, journal_entries, journal_lines, overrides, posting_intent_lines,
    posting_intents, posting_runs, products, reversal_links, transaction_sets, validation_issues,
};
use crate::rls::{RlsConnection, RlsExt};

/// Ledger store backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct SeaLedgerStore {
    db: DatabaseConnection,
}

impl SeaLedgerStore {
    /// Creates a store over a connection pool.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Returns the connection pool.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Opens a transaction scoped to one tenant.
    pub(super) async fn scoped(&self, tenant_id: TenantId) -> StoreResult<RlsConnection> {
        self.db.with_rls(tenant_id).await.map_err(db_err)
    }

    async fn active_run(
        &self,
        tenant_id: TenantId,
        transaction_set_id: TransactionSetId,
    ) -> StoreResult<Option<PostingRun>> {
        let scoped = self.scoped(tenant_id).await?;
        let row = posting_runs::Entity::find()
            .filter(posting_runs::Column::TenantId.eq(tenant_id.into_inner()))
            .filter(posting_runs::Column::TransactionSetId.eq(transaction_set_id.into_inner()))
            .filter(posting_runs::Column::Status.ne(DbPostingRunStatus::Failed))
            .one(scoped.transaction())
            .await
            .map_err(db_err)?;
        scoped.commit().await.map_err(db_err)?;
        row.map(PostingRun::try_from).transpose()
    }
}

pub(super) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

// ========== Gate reads ==========

async fn find_transaction_set(
    txn: &DatabaseTransaction,
    tenant_id: TenantId,
    id: TransactionSetId,
) -> StoreResult<Option<TransactionSet>> {
    let row = transaction_sets::Entity::find_by_id(id.into_inner())
        .filter(transaction_sets::Column::TenantId.eq(tenant_id.into_inner()))
        .one(txn)
        .await
        .map_err(db_err)?;
    Ok(row.map(Into::into))
}

async fn find_approvals(
    txn: &DatabaseTransaction,
    tenant_id: TenantId,
    entity: EntityRef,
) -> StoreResult<Vec<Approval>> {
    let entity_type: DbEntityType = entity.entity_type.into();
    let rows = approvals::Entity::find()
        .filter(approvals::Column::TenantId.eq(tenant_id.into_inner()))
        .filter(approvals::Column::EntityType.eq(entity_type))
        .filter(approvals::Column::EntityId.eq(entity.entity_id))
        .order_by_asc(approvals::Column::Id)
        .all(txn)
        .await
        .map_err(db_err)?;
    Ok(rows.into_iter().map(Into::into).collect())
}

async fn find_validation_issues(
    txn: &DatabaseTransaction,
    tenant_id: TenantId,
    entity: EntityRef,
) -> StoreResult<Vec<ValidationIssue>> {
    let entity_type: DbEntityType = entity.entity_type.into();
    let rows = validation_issues::Entity::find()
        .filter(validation_issues::Column::TenantId.eq(tenant_id.into_inner()))
        .filter(validation_issues::Column::EntityType.eq(entity_type))
        .filter(validation_issues::Column::EntityId.eq(entity.entity_id))
        .order_by_asc(validation_issues::Column::Id)
        .all(txn)
        .await
        .map_err(db_err)?;
    Ok(rows.into_iter().map(Into::into).collect())
}

async fn find_overrides(
    txn: &DatabaseTransaction,
    tenant_id: TenantId,
    entity: EntityRef,
) -> StoreResult<Vec<Override>> {
    let entity_type: DbEntityType = entity.entity_type.into();
    let rows = overrides::Entity::find()
        .filter(overrides::Column::TenantId.eq(tenant_id.into_inner()))
        .filter(overrides::Column::EntityType.eq(entity_type))
        .filter(overrides::Column::EntityId.eq(entity.entity_id))
        .order_by_asc(overrides::Column::Id)
        .all(txn)
        .await
        .map_err(db_err)?;
    Ok(rows.into_iter().map(Into::into).collect())
}

async fn find_document_links(
    txn: &DatabaseTransaction,
    tenant_id: TenantId,
    entity: EntityRef,
) -> StoreResult<Vec<DocumentLink>> {
    let entity_type: DbEntityType = entity.entity_type.into();
    let rows = document_links::Entity::find()
        .filter(document_links::Column::TenantId.eq(tenant_id.into_inner()))
        .filter(document_links::Column::EntityType.eq(entity_type))
        .filter(document_links::Column::EntityId.eq(entity.entity_id))
        .order_by_asc(document_links::Column::Id)
        .all(txn)
        .await
        .map_err(db_err)?;
    Ok(rows.into_iter().map(Into::into).collect())
}

#[async_trait]
impl LedgerStore for SeaLedgerStore {
    async fn transaction_set(
        &self,
        tenant_id: TenantId,
        id: TransactionSetId,
    ) -> StoreResult<Option<TransactionSet>> {
        let scoped = self.scoped(tenant_id).await?;
        let row = find_transaction_set(scoped.transaction(), tenant_id, id).await?;
        scoped.commit().await.map_err(db_err)?;
        Ok(row)
    }

    async fn approvals(
        &self,
        tenant_id: TenantId,
        entity: EntityRef,
    ) -> StoreResult<Vec<Approval>> {
        let scoped = self.scoped(tenant_id).await?;
        let rows = find_approvals(scoped.transaction(), tenant_id, entity).await?;
        scoped.commit().await.map_err(db_err)?;
        Ok(rows)
    }

    async fn validation_issues(
        &self,
        tenant_id: TenantId,
        entity: EntityRef,
    ) -> StoreResult<Vec<ValidationIssue>> {
        let scoped = self.scoped(tenant_id).await?;
        let rows = find_validation_issues(scoped.transaction(), tenant_id, entity).await?;
        scoped.commit().await.map_err(db_err)?;
        Ok(rows)
    }

    async fn overrides(
        &self,
        tenant_id: TenantId,
        entity: EntityRef,
    ) -> StoreResult<Vec<Override>> {
        let scoped = self.scoped(tenant_id).await?;
        let rows = find_overrides(scoped.transaction(), tenant_id, entity).await?;
        scoped.commit().await.map_err(db_err)?;
        Ok(rows)
    }

    async fn document_links(
        &self,
        tenant_id: TenantId,
        entity: EntityRef,
    ) -> StoreResult<Vec<DocumentLink>> {
        let scoped = self.scoped(tenant_id).await?;
        let rows = find_document_links(scoped.transaction(), tenant_id, entity).await?;
        scoped.commit().await.map_err(db_err)?;
        Ok(rows)
    }

    async fn gate_snapshot(
        &self,
        tenant_id: TenantId,
        transaction_set_id: TransactionSetId,
    ) -> StoreResult<GateSnapshot> {
        // All five reads see the same snapshot.
        let scoped = RlsConnection::read_snapshot(&self.db, tenant_id)
            .await
            .map_err(db_err)?;
        let txn = scoped.transaction();
        let Some(transaction_set) = find_transaction_set(txn, tenant_id, transaction_set_id).await?
        else {
            scoped.commit().await.map_err(db_err)?;
            return Ok(GateSnapshot::default());
        };
        let entity = EntityRef::transaction_set(transaction_set_id);
        let snapshot = GateSnapshot {
            transaction_set: Some(transaction_set),
            approvals: find_approvals(txn, tenant_id, entity).await?,
            issues: find_validation_issues(txn, tenant_id, entity).await?,
            overrides: find_overrides(txn, tenant_id, entity).await?,
            document_links: find_document_links(txn, tenant_id, entity).await?.len(),
        };
        scoped.commit().await.map_err(db_err)?;
        Ok(snapshot)
    }

    async fn posting_intent(
        &self,
        tenant_id: TenantId,
        transaction_set_id: TransactionSetId,
    ) -> StoreResult<Option<PostingIntent>> {
        let scoped = self.scoped(tenant_id).await?;
        let txn = scoped.transaction();
        let Some(header) = posting_intents::Entity::find_by_id(transaction_set_id.into_inner())
            .filter(posting_intents::Column::TenantId.eq(tenant_id.into_inner()))
            .one(txn)
            .await
            .map_err(db_err)?
        else {
            scoped.commit().await.map_err(db_err)?;
            return Ok(None);
        };
        let lines = posting_intent_lines::Entity::find()
            .filter(posting_intent_lines::Column::TenantId.eq(tenant_id.into_inner()))
            .filter(
                posting_intent_lines::Column::TransactionSetId.eq(transaction_set_id.into_inner()),
            )
            .order_by_asc(posting_intent_lines::Column::LineNo)
            .all(txn)
            .await
            .map_err(db_err)?;
        scoped.commit().await.map_err(db_err)?;
        posting_intent(header, lines).map(Some)
    }

    async fn account(
        &self,
        tenant_id: TenantId,
        account: &AccountRef,
    ) -> StoreResult<Option<Account>> {
        let query = accounts::Entity::find()
            .filter(accounts::Column::TenantId.eq(tenant_id.into_inner()));
        let query = match account {
            AccountRef::ById(id) => query.filter(accounts::Column::Id.eq(id.into_inner())),
            AccountRef::ByCode(code) => query.filter(accounts::Column::Code.eq(code.as_str())),
        };
        let scoped = self.scoped(tenant_id).await?;
        let row = query.one(scoped.transaction()).await.map_err(db_err)?;
        scoped.commit().await.map_err(db_err)?;
        Ok(row.map(Into::into))
    }

    async fn journal_entry(
        &self,
        tenant_id: TenantId,
        id: JournalEntryId,
    ) -> StoreResult<Option<JournalEntry>> {
        let scoped = self.scoped(tenant_id).await?;
        let row = journal_entries::Entity::find_by_id(id.into_inner())
            .filter(journal_entries::Column::TenantId.eq(tenant_id.into_inner()))
            .one(scoped.transaction())
            .await
            .map_err(db_err)?;
        scoped.commit().await.map_err(db_err)?;
        Ok(row.map(Into::into))
    }

    async fn journal_lines(
        &self,
        tenant_id: TenantId,
        journal_entry_id: JournalEntryId,
    ) -> StoreResult<Vec<JournalLine>> {
        let scoped = self.scoped(tenant_id).await?;
        let rows = journal_lines::Entity::find()
            .filter(journal_lines::Column::TenantId.eq(tenant_id.into_inner()))
            .filter(journal_lines::Column::JournalEntryId.eq(journal_entry_id.into_inner()))
            .order_by_asc(journal_lines::Column::LineNo)
            .all(scoped.transaction())
            .await
            .map_err(db_err)?;
        scoped.commit().await.map_err(db_err)?;
        rows.into_iter().map(JournalLine::try_from).collect()
    }

    async fn reversal_link(
        &self,
        tenant_id: TenantId,
        original_journal_entry_id: JournalEntryId,
    ) -> StoreResult<Option<ReversalLink>> {
        let scoped = self.scoped(tenant_id).await?;
        let row = reversal_links::Entity::find()
            .filter(reversal_links::Column::TenantId.eq(tenant_id.into_inner()))
            .filter(
                reversal_links::Column::OriginalJournalEntryId
                    .eq(original_journal_entry_id.into_inner()),
            )
            .one(scoped.transaction())
            .await
            .map_err(db_err)?;
        scoped.commit().await.map_err(db_err)?;
        Ok(row.map(Into::into))
    }

    async fn movements(
        &self,
        tenant_id: TenantId,
        transaction_set_id: TransactionSetId,
        status: Option<MovementStatus>,
    ) -> StoreResult<Vec<InventoryMovement>> {
        let mut query = inventory_movements::Entity::find()
            .filter(inventory_movements::Column::TenantId.eq(tenant_id.into_inner()))
            .filter(
                inventory_movements::Column::TransactionSetId.eq(transaction_set_id.into_inner()),
            );
        if let Some(status) = status {
            query = query
                .filter(inventory_movements::Column::Status.eq(DbMovementStatus::from(status)));
        }
        let scoped = self.scoped(tenant_id).await?;
        let rows = query
            .order_by_asc(inventory_movements::Column::CreatedAt)
            .order_by_asc(inventory_movements::Column::Id)
            .all(scoped.transaction())
            .await
            .map_err(db_err)?;
        scoped.commit().await.map_err(db_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn inventory_posting_links(
        &self,
        tenant_id: TenantId,
        transaction_set_id: TransactionSetId,
    ) -> StoreResult<Vec<InventoryPostingLink>> {
        let scoped = self.scoped(tenant_id).await?;
        let rows = inventory_posting_links::Entity::find()
            .filter(inventory_posting_links::Column::TenantId.eq(tenant_id.into_inner()))
            .filter(
                inventory_posting_links::Column::TransactionSetId
                    .eq(transaction_set_id.into_inner()),
            )
            .order_by_asc(inventory_posting_links::Column::Id)
            .all(scoped.transaction())
            .await
            .map_err(db_err)?;
        scoped.commit().await.map_err(db_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn inventory_balance(
        &self,
        tenant_id: TenantId,
        key: BalanceKey,
    ) -> StoreResult<Option<InventoryBalance>> {
        let location = match key.location.location_id {
            Some(id) => inventory_balances::Column::LocationId.eq(id.into_inner()),
            None => inventory_balances::Column::LocationId.is_null(),
        };
        let scoped = self.scoped(tenant_id).await?;
        let row = inventory_balances::Entity::find()
            .filter(inventory_balances::Column::TenantId.eq(tenant_id.into_inner()))
            .filter(inventory_balances::Column::ProductId.eq(key.product_id.into_inner()))
            .filter(
                inventory_balances::Column::WarehouseId
                    .eq(key.location.warehouse_id.into_inner()),
            )
            .filter(location)
            .one(scoped.transaction())
            .await
            .map_err(db_err)?;
        scoped.commit().await.map_err(db_err)?;
        Ok(row.map(Into::into))
    }

    async fn product(&self, tenant_id: TenantId, id: ProductId) -> StoreResult<Option<Product>> {
        let scoped = self.scoped(tenant_id).await?;
        let row = products::Entity::find_by_id(id.into_inner())
            .filter(products::Column::TenantId.eq(tenant_id.into_inner()))
            .one(scoped.transaction())
            .await
            .map_err(db_err)?;
        scoped.commit().await.map_err(db_err)?;
        Ok(row.map(Into::into))
    }

    async fn latest_posting_run(
        &self,
        tenant_id: TenantId,
        transaction_set_id: TransactionSetId,
    ) -> StoreResult<Option<PostingRun>> {
        let scoped = self.scoped(tenant_id).await?;
        let row = posting_runs::Entity::find()
            .filter(posting_runs::Column::TenantId.eq(tenant_id.into_inner()))
            .filter(posting_runs::Column::TransactionSetId.eq(transaction_set_id.into_inner()))
            .order_by_desc(posting_runs::Column::StartedAt)
            .order_by_desc(posting_runs::Column::Id)
            .one(scoped.transaction())
            .await
            .map_err(db_err)?;
        scoped.commit().await.map_err(db_err)?;
        row.map(PostingRun::try_from).transpose()
    }

    async fn claim_posting_run(&self, run: NewPostingRun) -> StoreResult<RunClaim> {
        let (tenant_id, set_id) = (run.tenant_id, run.transaction_set_id);
        let scoped = self.scoped(tenant_id).await?;
        let txn = scoped.transaction();

        // The set row lock serialises claims; the partial unique index
        // catches anything that slips past it.
        let set = transaction_sets::Entity::find_by_id(set_id.into_inner())
            .filter(transaction_sets::Column::TenantId.eq(tenant_id.into_inner()))
            .lock_exclusive()
            .one(txn)
            .await
            .map_err(db_err)?;
        if set.is_none() {
            scoped.rollback().await.map_err(db_err)?;
            return Ok(RunClaim::NoTransactionSet);
        }

        let active = posting_runs::Entity::find()
            .filter(posting_runs::Column::TenantId.eq(tenant_id.into_inner()))
            .filter(posting_runs::Column::TransactionSetId.eq(set_id.into_inner()))
            .filter(posting_runs::Column::Status.ne(DbPostingRunStatus::Failed))
            .one(txn)
            .await
            .map_err(db_err)?;
        if let Some(active) = active {
            scoped.commit().await.map_err(db_err)?;
            return PostingRun::try_from(active).map(RunClaim::Existing);
        }

        let run = run.started_at(Utc::now());
        let row = posting_runs::ActiveModel {
            id: Set(run.id.into_inner()),
            tenant_id: Set(tenant_id.into_inner()),
            transaction_set_id: Set(set_id.into_inner()),
            status: Set(DbPostingRunStatus::Started),
            journal_entry_id: Set(None),
            error: Set(None),
            retry_of: Set(run.retry_of.map(PostingRunId::into_inner)),
            started_by: Set(run.started_by.into_inner()),
            started_at: Set(run.started_at.fixed_offset()),
            finished_at: Set(None),
        };
        if let Err(err) = posting_runs::Entity::insert(row).exec_without_returning(txn).await {
            if !is_unique_violation(&err) {
                return Err(db_err(err));
            }
            scoped.rollback().await.map_err(db_err)?;
            return match self.active_run(tenant_id, set_id).await? {
                Some(winner) => Ok(RunClaim::Existing(winner)),
                None => Err(StoreError::Conflict(format!(
                    "posting run for transaction set {set_id} was claimed concurrently"
                ))),
            };
        }
        scoped.commit().await.map_err(db_err)?;

        tracing::debug!(run_id = %run.id, transaction_set_id = %set_id, "Posting run claimed");
        Ok(RunClaim::Claimed(run))
    }

    async fn fail_posting_run(
        &self,
        tenant_id: TenantId,
        run_id: PostingRunId,
        error: String,
    ) -> StoreResult<()> {
        let scoped = self.scoped(tenant_id).await?;
        let txn = scoped.transaction();
        let run = posting_runs::Entity::find_by_id(run_id.into_inner())
            .filter(posting_runs::Column::TenantId.eq(tenant_id.into_inner()))
            .lock_exclusive()
            .one(txn)
            .await
            .map_err(db_err)?
            .ok_or_else(|| StoreError::Conflict(format!("posting run {run_id} not found")))?;
        if run.status != DbPostingRunStatus::Started {
            return Err(StoreError::Conflict(format!(
                "posting run {run_id} is already {}",
                PostingRunStatus::from(run.status)
            )));
        }

        let mut active = run.into_active_model();
        active.status = Set(DbPostingRunStatus::Failed);
        active.error = Set(Some(error));
        active.finished_at = Set(Some(Utc::now().fixed_offset()));
        active.update(txn).await.map_err(db_err)?;
        scoped.commit().await.map_err(db_err)
    }

    async fn transition_to_review(
        &self,
        tenant_id: TenantId,
        id: TransactionSetId,
    ) -> StoreResult<Option<TransactionSet>> {
        let scoped = self.scoped(tenant_id).await?;
        let txn = scoped.transaction();
        let set = transaction_sets::Entity::find_by_id(id.into_inner())
            .filter(transaction_sets::Column::TenantId.eq(tenant_id.into_inner()))
            .lock_exclusive()
            .one(txn)
            .await
            .map_err(db_err)?;
        let Some(set) = set.filter(|s| s.status == DbTransactionSetStatus::Draft) else {
            scoped.rollback().await.map_err(db_err)?;
            return Ok(None);
        };

        let mut active = set.into_active_model();
        active.status = Set(DbTransactionSetStatus::Review);
        active.updated_at = Set(Utc::now().fixed_offset());
        let updated = active.update(txn).await.map_err(db_err)?;
        scoped.commit().await.map_err(db_err)?;
        Ok(Some(updated.into()))
    }
}
