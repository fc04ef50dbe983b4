//! Journal reversal.

use chrono::{NaiveDate, Utc};
use serde_json::json;
use tally_shared::types::{ActorId, JournalEntryId, ReversalLinkId, TenantId};

use super::{PostingEngine, ReversalResult};
use crate::audit::{AuditAction, AuditEvent};
use crate::ledger::{EntityType, PostingError, ReversalLink, ReversalRequest, ReversalService};
use crate::store::{ReversalCommit, ReversalCommitted};

impl ReversalResult {
    fn replayed(link: &ReversalLink) -> Self {
        Self {
            original_journal_entry_id: link.original_journal_entry_id,
            reversal_journal_entry_id: link.reversal_journal_entry_id,
            reversal_transaction_set_id: link.reversal_transaction_set_id,
            idempotent: true,
        }
    }
}

impl PostingEngine {
    /// Reverses a posted journal entry with a mirror entry.
    ///
    /// Each entry is reversed at most once; later calls return the first
    /// reversal with `idempotent = true`. `posting_date` defaults to today
    /// (UTC).
    ///
    /// # Errors
    ///
    /// Returns `ReasonRequired`, `JournalEntryNotFound`, or a store fault.
    #[tracing::instrument(skip(self, memo), fields(tenant = %tenant_id, journal_entry = %original_journal_entry_id))]
    pub async fn reverse(
        &self,
        tenant_id: TenantId,
        actor_id: ActorId,
        original_journal_entry_id: JournalEntryId,
        reason: &str,
        posting_date: Option<NaiveDate>,
        memo: Option<String>,
    ) -> Result<ReversalResult, PostingError> {
        if reason.trim().is_empty() {
            return Err(PostingError::ReasonRequired);
        }

        if let Some(link) = self
            .store
            .reversal_link(tenant_id, original_journal_entry_id)
            .await?
        {
            return Ok(ReversalResult::replayed(&link));
        }

        let original = self
            .store
            .journal_entry(tenant_id, original_journal_entry_id)
            .await?
            .ok_or(PostingError::JournalEntryNotFound(original_journal_entry_id))?;
        let lines = self
            .store
            .journal_lines(tenant_id, original_journal_entry_id)
            .await?;
        if !ReversalService::validate_reversal(&lines) {
            tracing::warn!("original entry does not balance exactly");
        }

        let plan = ReversalService::plan(
            &original,
            &lines,
            &ReversalRequest {
                actor_id,
                reason,
                posting_date: posting_date.unwrap_or_else(|| Utc::now().date_naive()),
                memo,
                line_prefix: &self.config.reversal_line_prefix,
            },
        )?;
        let reversal_set_id = plan.transaction_set.id;
        let line_count = plan.entry.lines().len();

        let committed = self
            .writer
            .commit_reversal(ReversalCommit {
                link_id: ReversalLinkId::new(),
                actor_id,
                original_journal_entry_id,
                transaction_set: plan.transaction_set,
                entry: plan.entry,
                reason: reason.trim().to_string(),
            })
            .await?;

        let (link, entry) = match committed {
            ReversalCommitted::Created { link, entry } => (link, entry),
            ReversalCommitted::AlreadyReversed(link) => {
                return Ok(ReversalResult::replayed(&link));
            }
        };

        self.emit_all(vec![
            AuditEvent::new(
                tenant_id,
                actor_id,
                EntityType::JournalEntry,
                entry.id,
                AuditAction::JournalEntryCreated,
            )
            .with_metadata(json!({
                "transaction_set_id": reversal_set_id,
                "reverses": original_journal_entry_id,
                "line_count": line_count,
            })),
            AuditEvent::new(
                tenant_id,
                actor_id,
                EntityType::ReversalLink,
                link.id,
                AuditAction::ReversalLinkCreated,
            )
            .with_metadata(json!({
                "original_journal_entry_id": original_journal_entry_id,
                "reversal_journal_entry_id": entry.id,
                "reason": link.reason,
            })),
        ])
        .await;
        tracing::info!(reversal_entry = %entry.id, "journal entry reversed");

        Ok(ReversalResult {
            original_journal_entry_id,
            reversal_journal_entry_id: entry.id,
            reversal_transaction_set_id: reversal_set_id,
            idempotent: false,
        })
    }
}
