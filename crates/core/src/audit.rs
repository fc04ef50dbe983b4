//! Audit trail emission.
//!
//! The engine reports every posting side effect to an [`AuditSink`]. Sink
//! failures never undo a committed posting.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use tally_shared::types::{ActorId, TenantId};

use crate::ledger::{EntityRef, EntityType};

/// Audited actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditAction {
    /// Draft moved to review.
    #[serde(rename = "transaction_set.submitted")]
    TransactionSetSubmitted,
    /// Transaction set reached `posted`.
    #[serde(rename = "transaction_set.posted")]
    TransactionSetPosted,
    /// A journal entry was written.
    #[serde(rename = "journal_entry.created")]
    JournalEntryCreated,
    /// A reversal link was written.
    #[serde(rename = "reversal_link.created")]
    ReversalLinkCreated,
    /// A movement was applied to balances.
    #[serde(rename = "inventory_movement.posted")]
    InventoryMovementPosted,
}

impl AuditAction {
    /// Returns the dotted action name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TransactionSetSubmitted => "transaction_set.submitted",
            Self::TransactionSetPosted => "transaction_set.posted",
            Self::JournalEntryCreated => "journal_entry.created",
            Self::ReversalLinkCreated => "reversal_link.created",
            Self::InventoryMovementPosted => "inventory_movement.posted",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// The owning tenant.
    pub tenant_id: TenantId,
    /// Who acted.
    pub actor_id: ActorId,
    /// What was acted on.
    pub entity: EntityRef,
    /// What happened.
    pub action: AuditAction,
    /// Action-specific details.
    pub metadata: serde_json::Value,
}

impl AuditEvent {
    /// Creates an event with empty metadata.
    #[must_use]
    pub fn new(
        tenant_id: TenantId,
        actor_id: ActorId,
        entity_type: EntityType,
        entity_id: impl Into<uuid::Uuid>,
        action: AuditAction,
    ) -> Self {
        Self {
            tenant_id,
            actor_id,
            entity: EntityRef {
                entity_type,
                entity_id: entity_id.into(),
            },
            action,
            metadata: serde_json::Value::Null,
        }
    }

    /// Attaches metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Audit sink failures.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The sink could not record the event.
    #[error("Audit sink unavailable: {0}")]
    Unavailable(String),
}

/// Destination for audit events.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Records one event.
    async fn log_audit_event(&self, event: AuditEvent) -> Result<(), AuditError>;
}

/// Writes audit events to the `audit` tracing target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn log_audit_event(&self, event: AuditEvent) -> Result<(), AuditError> {
        tracing::info!(
            target: "audit",
            tenant = %event.tenant_id,
            actor = %event.actor_id,
            entity_type = event.entity.entity_type.as_str(),
            entity_id = %event.entity.entity_id,
            action = event.action.as_str(),
            metadata = %event.metadata,
            "audit event"
        );
        Ok(())
    }
}

/// Keeps audit events in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAuditLog {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all recorded events.
    pub async fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().await.clone()
    }

    /// Returns the recorded actions in order.
    pub async fn actions(&self) -> Vec<AuditAction> {
        self.events.lock().await.iter().map(|e| e.action).collect()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditLog {
    async fn log_audit_event(&self, event: AuditEvent) -> Result<(), AuditError> {
        self.events.lock().await.push(event);
        Ok(())
    }
}
