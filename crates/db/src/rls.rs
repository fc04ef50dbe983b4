//! Row-Level Security (RLS) context management.
//!
//! Every write unit of work runs inside a transaction that carries the
//! tenant in the `app.current_tenant_id` session variable, which the
//! `tenant_isolation` policies compare against each row's `tenant_id`.
//!
//! # Usage
//!
//! ```ignore
//! use tally_db::rls::RlsExt;
//!
//! let scoped = db.with_rls(tenant_id).await?;
//! let sets = transaction_sets::Entity::find().all(scoped.transaction()).await?;
//! scoped.commit().await?;
//! ```

use sea_orm::{
    AccessMode, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr, IsolationLevel,
    TransactionTrait,
};
use tally_shared::types::TenantId;

/// A transaction with the tenant RLS context set.
pub struct RlsConnection {
    txn: DatabaseTransaction,
}

impl RlsConnection {
    /// Begins a transaction and sets `app.current_tenant_id` with `SET LOCAL`,
    /// so the setting ends with the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started or the RLS
    /// context cannot be set.
    pub async fn new(db: &DatabaseConnection, tenant_id: TenantId) -> Result<Self, DbErr> {
        let txn = db.begin().await?;
        set_rls_context(&txn, tenant_id).await?;
        Ok(Self { txn })
    }

    /// Begins a read-only `REPEATABLE READ` transaction with the tenant
    /// context set. Every query in it sees the same snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started or the RLS
    /// context cannot be set.
    pub async fn read_snapshot(
        db: &DatabaseConnection,
        tenant_id: TenantId,
    ) -> Result<Self, DbErr> {
        let txn = db
            .begin_with_config(
                Some(IsolationLevel::RepeatableRead),
                Some(AccessMode::ReadOnly),
            )
            .await?;
        set_rls_context(&txn, tenant_id).await?;
        Ok(Self { txn })
    }

    /// Returns the underlying transaction.
    #[must_use]
    pub fn transaction(&self) -> &DatabaseTransaction {
        &self.txn
    }

    /// Commits the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails.
    pub async fn commit(self) -> Result<(), DbErr> {
        self.txn.commit().await
    }

    /// Rolls back the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback fails.
    pub async fn rollback(self) -> Result<(), DbErr> {
        self.txn.rollback().await
    }
}

/// Extension trait for `DatabaseConnection` to open tenant-scoped transactions.
#[async_trait::async_trait]
pub trait RlsExt {
    /// Opens a transaction scoped to `tenant_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the RLS connection cannot be created.
    async fn with_rls(&self, tenant_id: TenantId) -> Result<RlsConnection, DbErr>;
}

#[async_trait::async_trait]
impl RlsExt for DatabaseConnection {
    async fn with_rls(&self, tenant_id: TenantId) -> Result<RlsConnection, DbErr> {
        RlsConnection::new(self, tenant_id).await
    }
}

fn rls_statement(tenant_id: TenantId) -> String {
    // TenantId renders as a hyphenated UUID, so only hex digits and hyphens
    // reach the statement.
    format!("SET LOCAL app.current_tenant_id = '{tenant_id}'")
}

/// Sets the RLS context on an existing transaction.
///
/// # Errors
///
/// Returns an error if the RLS context cannot be set.
pub async fn set_rls_context(txn: &DatabaseTransaction, tenant_id: TenantId) -> Result<(), DbErr> {
    txn.execute_unprepared(&rls_statement(tenant_id)).await?;
    Ok(())
}
