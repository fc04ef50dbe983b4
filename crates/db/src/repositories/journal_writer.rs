//! Atomic journal, reversal and inventory writes.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, DbBackend, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, QuerySelect, Set, Statement,
};

use tally_core::inventory::{BalanceDelta, InventoryBalance, InventoryPostingLink};
use tally_core::ledger::{
    BalancedEntry, JournalEntry, JournalLine, ReversalLink, TransactionSet,
};
use tally_core::store::{
    InventoryCommit, InventoryCommitted, JournalWriter, LedgerStore, PostingCommit,
    ReversalCommit, ReversalCommitted, StoreError, StoreResult,
};
use tally_shared::types::{
    ActorId, InventoryPostingLinkId, MovementId, TenantId, TransactionSetId,
};
use uuid::Uuid;

use super::convert::{db_err, line_no_to_db};
use super::ledger_store::{SeaLedgerStore, is_unique_violation};
use crate::entities::sea_orm_active_enums::{
    MovementStatus as DbMovementStatus, PostingRunStatus as DbPostingRunStatus,
    TransactionSetStatus as DbTransactionSetStatus,
};
use crate::entities::{
    inventory_balances, inventory_movements, inventory_posting_links, journal_entries,
    journal_lines, posting_runs, reversal_links, transaction_sets,
};

const UPSERT_BALANCE_SQL: &str = r"
INSERT INTO inventory_balances (id, tenant_id, product_id, warehouse_id, location_id, on_hand, reserved)
VALUES ($1, $2, $3, $4, $5, GREATEST($6::NUMERIC, 0), 0)
ON CONFLICT ON CONSTRAINT uq_inventory_balance_key
DO UPDATE SET on_hand = inventory_balances.on_hand + $6::NUMERIC, updated_at = now()
RETURNING *
";

async fn lock_set(
    txn: &DatabaseTransaction,
    tenant_id: TenantId,
    id: TransactionSetId,
) -> StoreResult<Option<transaction_sets::Model>> {
    transaction_sets::Entity::find_by_id(id.into_inner())
        .filter(transaction_sets::Column::TenantId.eq(tenant_id.into_inner()))
        .lock_exclusive()
        .one(txn)
        .await
        .map_err(db_err)
}

async fn mark_set_posted(
    txn: &DatabaseTransaction,
    set: transaction_sets::Model,
    at: DateTime<Utc>,
) -> StoreResult<()> {
    let mut active = set.into_active_model();
    active.status = Set(DbTransactionSetStatus::Posted);
    active.updated_at = Set(at.fixed_offset());
    active.update(txn).await.map_err(db_err)?;
    Ok(())
}

/// Inserts an entry header and its lines.
async fn insert_entry(
    txn: &DatabaseTransaction,
    entry: &BalancedEntry,
    created_by: ActorId,
    created_at: DateTime<Utc>,
) -> StoreResult<JournalEntry> {
    let (header, lines) = entry.to_rows(created_by, created_at);

    journal_entries::Entity::insert(journal_entries::ActiveModel {
        id: Set(header.id.into_inner()),
        tenant_id: Set(header.tenant_id.into_inner()),
        posting_date: Set(header.posting_date),
        memo: Set(header.memo.clone()),
        source_transaction_set_id: Set(header.source_transaction_set_id.into_inner()),
        created_by: Set(header.created_by.into_inner()),
        created_at: Set(header.created_at.fixed_offset()),
    })
    .exec_without_returning(txn)
    .await
    .map_err(db_err)?;

    let rows = lines
        .into_iter()
        .map(|line| line_row(header.tenant_id, line))
        .collect::<StoreResult<Vec<_>>>()?;
    journal_lines::Entity::insert_many(rows)
        .exec_without_returning(txn)
        .await
        .map_err(db_err)?;

    Ok(header)
}

fn line_row(tenant_id: TenantId, line: JournalLine) -> StoreResult<journal_lines::ActiveModel> {
    Ok(journal_lines::ActiveModel {
        journal_entry_id: Set(line.journal_entry_id.into_inner()),
        line_no: Set(line_no_to_db(line.line_no)?),
        tenant_id: Set(tenant_id.into_inner()),
        account_id: Set(line.account_id.into_inner()),
        debit: Set(line.debit),
        credit: Set(line.credit),
        description: Set(line.description),
    })
}

fn set_row(set: &TransactionSet) -> transaction_sets::ActiveModel {
    transaction_sets::ActiveModel {
        id: Set(set.id.into_inner()),
        tenant_id: Set(set.tenant_id.into_inner()),
        status: Set(set.status.into()),
        source: Set(set.source.into()),
        business_date: Set(set.business_date),
        note: Set(set.note.clone()),
        created_by: Set(set.created_by.into_inner()),
        created_at: Set(set.created_at.fixed_offset()),
        updated_at: Set(set.created_at.fixed_offset()),
    }
}

async fn upsert_balance(
    txn: &DatabaseTransaction,
    tenant_id: TenantId,
    delta: &BalanceDelta,
) -> StoreResult<InventoryBalance> {
    let location = delta.key.location;
    let statement = Statement::from_sql_and_values(
        DbBackend::Postgres,
        UPSERT_BALANCE_SQL,
        [
            Uuid::now_v7().into(),
            tenant_id.into_inner().into(),
            delta.key.product_id.into_inner().into(),
            location.warehouse_id.into_inner().into(),
            location.location_id.map(|id| id.into_inner()).into(),
            delta.delta.into(),
        ],
    );
    inventory_balances::Entity::find()
        .from_raw_sql(statement)
        .one(txn)
        .await
        .map_err(db_err)?
        .map(Into::into)
        .ok_or_else(|| StoreError::Database("balance upsert returned no row".to_string()))
}

#[async_trait]
impl JournalWriter for SeaLedgerStore {
    async fn commit_posting(&self, commit: PostingCommit) -> StoreResult<JournalEntry> {
        let header = commit.entry.header();
        let (tenant_id, set_id) = (header.tenant_id, header.source_transaction_set_id);
        let scoped = self.scoped(tenant_id).await?;
        let txn = scoped.transaction();

        let set = lock_set(txn, tenant_id, set_id)
            .await?
            .filter(|s| s.status == DbTransactionSetStatus::Review)
            .ok_or_else(|| {
                StoreError::Conflict(format!("transaction set {set_id} is no longer in review"))
            })?;
        let run = posting_runs::Entity::find_by_id(commit.run_id.into_inner())
            .filter(posting_runs::Column::TenantId.eq(tenant_id.into_inner()))
            .filter(posting_runs::Column::TransactionSetId.eq(set_id.into_inner()))
            .lock_exclusive()
            .one(txn)
            .await
            .map_err(db_err)?
            .filter(|r| r.status == DbPostingRunStatus::Started)
            .ok_or_else(|| {
                StoreError::Conflict(format!(
                    "posting run {} does not hold the token",
                    commit.run_id
                ))
            })?;

        let now = Utc::now();
        let entry = insert_entry(txn, &commit.entry, commit.actor_id, now).await?;
        mark_set_posted(txn, set, now).await?;

        let mut run = run.into_active_model();
        run.status = Set(DbPostingRunStatus::Succeeded);
        run.journal_entry_id = Set(Some(entry.id.into_inner()));
        run.finished_at = Set(Some(now.fixed_offset()));
        run.update(txn).await.map_err(db_err)?;

        scoped.commit().await.map_err(db_err)?;
        Ok(entry)
    }

    async fn commit_reversal(&self, commit: ReversalCommit) -> StoreResult<ReversalCommitted> {
        let tenant_id = commit.transaction_set.tenant_id;
        let original_id = commit.original_journal_entry_id;
        let scoped = self.scoped(tenant_id).await?;
        let txn = scoped.transaction();

        let existing = reversal_links::Entity::find()
            .filter(reversal_links::Column::TenantId.eq(tenant_id.into_inner()))
            .filter(reversal_links::Column::OriginalJournalEntryId.eq(original_id.into_inner()))
            .one(txn)
            .await
            .map_err(db_err)?;
        if let Some(link) = existing {
            scoped.commit().await.map_err(db_err)?;
            return Ok(ReversalCommitted::AlreadyReversed(link.into()));
        }
        let original = journal_entries::Entity::find_by_id(original_id.into_inner())
            .filter(journal_entries::Column::TenantId.eq(tenant_id.into_inner()))
            .one(txn)
            .await
            .map_err(db_err)?;
        if original.is_none() {
            return Err(StoreError::Conflict(format!(
                "journal entry {original_id} not found"
            )));
        }

        let now = Utc::now();
        transaction_sets::Entity::insert(set_row(&commit.transaction_set))
            .exec_without_returning(txn)
            .await
            .map_err(db_err)?;
        let entry = insert_entry(txn, &commit.entry, commit.actor_id, now).await?;

        let link = ReversalLink {
            id: commit.link_id,
            tenant_id,
            original_journal_entry_id: original_id,
            reversal_journal_entry_id: entry.id,
            reversal_transaction_set_id: commit.transaction_set.id,
            reason: commit.reason,
            created_by: commit.actor_id,
            created_at: now,
        };
        let inserted = reversal_links::Entity::insert(reversal_links::ActiveModel {
            id: Set(link.id.into_inner()),
            tenant_id: Set(tenant_id.into_inner()),
            original_journal_entry_id: Set(original_id.into_inner()),
            reversal_journal_entry_id: Set(entry.id.into_inner()),
            reversal_transaction_set_id: Set(link.reversal_transaction_set_id.into_inner()),
            reason: Set(link.reason.clone()),
            created_by: Set(link.created_by.into_inner()),
            created_at: Set(now.fixed_offset()),
        })
        .exec_without_returning(txn)
        .await;

        if let Err(err) = inserted {
            if !is_unique_violation(&err) {
                return Err(db_err(err));
            }
            // Lost the race: discard our set and entry, report the winner.
            scoped.rollback().await.map_err(db_err)?;
            tracing::debug!(original_journal_entry_id = %original_id, "Reversal raced, reading winner");
            return self
                .reversal_link(tenant_id, original_id)
                .await?
                .map(ReversalCommitted::AlreadyReversed)
                .ok_or_else(|| {
                    StoreError::Conflict(format!(
                        "journal entry {original_id} was reversed concurrently"
                    ))
                });
        }

        scoped.commit().await.map_err(db_err)?;
        Ok(ReversalCommitted::Created { link, entry })
    }

    async fn commit_inventory(&self, commit: InventoryCommit) -> StoreResult<InventoryCommitted> {
        let (tenant_id, set_id) = (commit.tenant_id, commit.transaction_set_id);
        let scoped = self.scoped(tenant_id).await?;
        let txn = scoped.transaction();

        let set = match lock_set(txn, tenant_id, set_id).await? {
            None => {
                return Err(StoreError::Conflict(format!(
                    "transaction set {set_id} not found"
                )));
            }
            Some(set) if set.status == DbTransactionSetStatus::Posted => {
                scoped.commit().await.map_err(db_err)?;
                return Ok(InventoryCommitted::AlreadyPosted);
            }
            Some(set) => set,
        };

        let ids: Vec<Uuid> = commit.movement_ids.iter().map(|id| id.into_inner()).collect();
        let rows = inventory_movements::Entity::find()
            .filter(inventory_movements::Column::TenantId.eq(tenant_id.into_inner()))
            .filter(inventory_movements::Column::TransactionSetId.eq(set_id.into_inner()))
            .filter(inventory_movements::Column::Id.is_in(ids))
            .order_by_asc(inventory_movements::Column::CreatedAt)
            .order_by_asc(inventory_movements::Column::Id)
            .lock_exclusive()
            .all(txn)
            .await
            .map_err(db_err)?;
        for id in &commit.movement_ids {
            let draft = rows
                .iter()
                .any(|m| m.id == id.into_inner() && m.status == DbMovementStatus::Draft);
            if !draft {
                return Err(StoreError::Conflict(format!(
                    "movement {id} is not a draft of transaction set {set_id}"
                )));
            }
        }

        let mut movements = Vec::with_capacity(rows.len());
        for row in rows {
            let mut active = row.into_active_model();
            active.status = Set(DbMovementStatus::Posted);
            movements.push(active.update(txn).await.map_err(db_err)?.into());
        }

        // Applied one by one so a row opened by this batch clamps its first
        // delta only.
        let mut balances = BTreeMap::new();
        for delta in &commit.deltas {
            let balance = upsert_balance(txn, tenant_id, delta).await?;
            balances.insert(balance.key, balance);
        }

        let now = Utc::now();
        let mut entry = None;
        let mut links = Vec::new();
        if let Some(journal) = commit.cost_journal {
            let header = insert_entry(txn, &journal.entry, commit.actor_id, now).await?;
            links = journal
                .costed_movements
                .into_iter()
                .map(|movement_id: MovementId| InventoryPostingLink {
                    id: InventoryPostingLinkId::new(),
                    tenant_id,
                    transaction_set_id: set_id,
                    journal_entry_id: header.id,
                    movement_id,
                })
                .collect();
            let rows: Vec<inventory_posting_links::ActiveModel> = links
                .iter()
                .map(|link| inventory_posting_links::ActiveModel {
                    id: Set(link.id.into_inner()),
                    tenant_id: Set(tenant_id.into_inner()),
                    transaction_set_id: Set(set_id.into_inner()),
                    journal_entry_id: Set(header.id.into_inner()),
                    movement_id: Set(link.movement_id.into_inner()),
                })
                .collect();
            if !rows.is_empty() {
                inventory_posting_links::Entity::insert_many(rows)
                    .exec_without_returning(txn)
                    .await
                    .map_err(db_err)?;
            }
            entry = Some(header);
        }

        mark_set_posted(txn, set, now).await?;
        scoped.commit().await.map_err(db_err)?;

        Ok(InventoryCommitted::Applied {
            movements,
            balances: balances.into_values().collect(),
            entry,
            links,
        })
    }
}
