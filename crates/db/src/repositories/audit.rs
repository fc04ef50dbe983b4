//! Audit events persisted to the `audit_events` table.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{DatabaseConnection, EntityTrait, Set};
use uuid::Uuid;

use tally_core::audit::{AuditError, AuditEvent, AuditSink};

use crate::entities::audit_events;
use crate::entities::sea_orm_active_enums::EntityType as DbEntityType;
use crate::rls::RlsExt;

/// Audit sink backed by PostgreSQL.
///
/// Each event is written in its own tenant-scoped transaction, after the
/// posting it describes has committed.
#[derive(Debug, Clone)]
pub struct SeaAuditSink {
    db: DatabaseConnection,
}

impl SeaAuditSink {
    /// Creates a sink over a connection pool.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn unavailable(err: impl std::fmt::Display) -> AuditError {
    AuditError::Unavailable(err.to_string())
}

#[async_trait]
impl AuditSink for SeaAuditSink {
    async fn log_audit_event(&self, event: AuditEvent) -> Result<(), AuditError> {
        let metadata = if event.metadata.is_null() {
            serde_json::json!({})
        } else {
            event.metadata
        };
        let entity_type: DbEntityType = event.entity.entity_type.into();

        let scoped = self
            .db
            .with_rls(event.tenant_id)
            .await
            .map_err(unavailable)?;
        audit_events::Entity::insert(audit_events::ActiveModel {
            id: Set(Uuid::now_v7()),
            tenant_id: Set(event.tenant_id.into_inner()),
            actor_id: Set(event.actor_id.into_inner()),
            entity_type: Set(entity_type),
            entity_id: Set(event.entity.entity_id),
            action: Set(event.action.as_str().to_string()),
            metadata: Set(metadata),
            created_at: Set(Utc::now().fixed_offset()),
        })
        .exec_without_returning(scoped.transaction())
        .await
        .map_err(unavailable)?;
        scoped.commit().await.map_err(unavailable)
    }
}
