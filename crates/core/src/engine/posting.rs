//! Journal posting and review submission.

use serde_json::json;
use tally_shared::types::{ActorId, JournalEntryId, TenantId, TransactionSetId};

use super::{PostingEngine, PostingResult};
use crate::audit::{AuditAction, AuditEvent};
use crate::ledger::{
    AccountRef, IntentLine,
    EntityType, NewPostingRun, PostingError, PostingRun, RunClaim, RunDecision, TransactionSet,
    TransactionSetStatus, build_entry, check_postable,
};
use crate::store::{PostingCommit, StoreError};

impl PostingEngine {
    /// Posts the intent of a transaction set as one balanced journal entry.
    ///
    /// Posting is idempotent per transaction set: once a run succeeded, every
    /// later call returns the same entry with `idempotent = true`.
    ///
    /// # Errors
    ///
    /// Returns `InProgress` while another attempt holds the run token, any
    /// gate or intent failure (the run is then recorded as failed), or a
    /// store fault.
    #[tracing::instrument(skip(self), fields(tenant = %tenant_id, transaction_set = %transaction_set_id))]
    pub async fn post(
        &self,
        tenant_id: TenantId,
        actor_id: ActorId,
        transaction_set_id: TransactionSetId,
    ) -> Result<PostingResult, PostingError> {
        let latest = self
            .store
            .latest_posting_run(tenant_id, transaction_set_id)
            .await?;
        let retry_of = match RunDecision::from_latest(latest.as_ref()) {
            RunDecision::Replay {
                run_id,
                journal_entry_id,
            } => {
                return Ok(PostingResult {
                    journal_entry_id,
                    posting_run_id: run_id,
                    transaction_set_id,
                    idempotent: true,
                });
            }
            RunDecision::Wait => return Err(PostingError::InProgress(transaction_set_id)),
            RunDecision::Attempt { retry_of } => retry_of,
        };

        let claim = self
            .store
            .claim_posting_run(NewPostingRun::new(
                tenant_id,
                transaction_set_id,
                actor_id,
                retry_of,
            ))
            .await?;
        let run = match claim {
            RunClaim::Claimed(run) => run,
            RunClaim::Existing(winner) => {
                return match RunDecision::from_latest(Some(&winner)) {
                    RunDecision::Replay {
                        run_id,
                        journal_entry_id,
                    } => Ok(PostingResult {
                        journal_entry_id,
                        posting_run_id: run_id,
                        transaction_set_id,
                        idempotent: true,
                    }),
                    RunDecision::Wait | RunDecision::Attempt { .. } => {
                        Err(PostingError::InProgress(transaction_set_id))
                    }
                };
            }
            RunClaim::NoTransactionSet => {
                return Err(PostingError::TransactionSetNotFound(transaction_set_id));
            }
        };

        match self.attempt(&run, actor_id).await {
            Ok(journal_entry_id) => {
                tracing::info!(
                    journal_entry = %journal_entry_id,
                    posting_run = %run.id,
                    "transaction set posted"
                );
                Ok(PostingResult {
                    journal_entry_id,
                    posting_run_id: run.id,
                    transaction_set_id,
                    idempotent: false,
                })
            }
            Err(err) => {
                self.record_failure(&run, &err).await;
                Err(err)
            }
        }
    }

    /// Runs gates, builds the entry and commits it under `run`.
    async fn attempt(
        &self,
        run: &PostingRun,
        actor_id: ActorId,
    ) -> Result<JournalEntryId, PostingError> {
        let (tenant_id, transaction_set_id) = (run.tenant_id, run.transaction_set_id);

        check_postable(self.store.as_ref(), tenant_id, transaction_set_id).await?;

        let intent = self
            .store
            .posting_intent(tenant_id, transaction_set_id)
            .await?
            .ok_or(PostingError::PostingIntentNotFound(transaction_set_id))?;
        let accounts = self
            .load_accounts(tenant_id, intent.lines.iter().map((|line| &line.account) as fn(&IntentLine) -> &AccountRef))
            .await?;
        let entry = build_entry(JournalEntryId::new(), &intent, |r| accounts.get(r))?;

        let totals = entry.totals();
        let line_count = entry.lines().len();
        let journal_entry = self
            .writer
            .commit_posting(PostingCommit {
                run_id: run.id,
                actor_id,
                entry,
            })
            .await?;

        self.emit_all(vec![
            AuditEvent::new(
                tenant_id,
                actor_id,
                EntityType::JournalEntry,
                journal_entry.id,
                AuditAction::JournalEntryCreated,
            )
            .with_metadata(json!({
                "transaction_set_id": transaction_set_id,
                "posting_run_id": run.id,
                "line_count": line_count,
                "total_debit": totals.debit.to_string(),
                "total_credit": totals.credit.to_string(),
            })),
            AuditEvent::new(
                tenant_id,
                actor_id,
                EntityType::TransactionSet,
                transaction_set_id,
                AuditAction::TransactionSetPosted,
            )
            .with_metadata(json!({ "journal_entry_id": journal_entry.id })),
        ])
        .await;

        Ok(journal_entry.id)
    }

    async fn record_failure(&self, run: &PostingRun, err: &PostingError) {
        if err.kind().is_fault() {
            tracing::error!(
                posting_run = %run.id,
                code = err.error_code(),
                error = %err,
                "posting failed"
            );
        } else {
            tracing::warn!(
                posting_run = %run.id,
                code = err.error_code(),
                error = %err,
                "posting rejected"
            );
        }
        if let Err(store_err) = self
            .store
            .fail_posting_run(run.tenant_id, run.id, err.to_string())
            .await
        {
            tracing::error!(
                posting_run = %run.id,
                error = %store_err,
                "failed to record posting run failure"
            );
        }
    }

    /// Moves a draft transaction set to review.
    ///
    /// Submitting a set that is already in review returns it unchanged.
    ///
    /// # Errors
    ///
    /// Returns `TransactionSetNotFound`, `AlreadyPosted`, or a store fault.
    #[tracing::instrument(skip(self), fields(tenant = %tenant_id, transaction_set = %transaction_set_id))]
    pub async fn submit_for_review(
        &self,
        tenant_id: TenantId,
        actor_id: ActorId,
        transaction_set_id: TransactionSetId,
    ) -> Result<TransactionSet, PostingError> {
        let current = self
            .store
            .transaction_set(tenant_id, transaction_set_id)
            .await?
            .ok_or(PostingError::TransactionSetNotFound(transaction_set_id))?;

        match current.status {
            TransactionSetStatus::Review => return Ok(current),
            TransactionSetStatus::Posted => {
                return Err(PostingError::AlreadyPosted(transaction_set_id));
            }
            TransactionSetStatus::Draft => {}
        }

        let Some(submitted) = self
            .store
            .transition_to_review(tenant_id, transaction_set_id)
            .await?
        else {
            // Lost a race; report whatever the winner left behind.
            let current = self
                .store
                .transaction_set(tenant_id, transaction_set_id)
                .await?
                .ok_or(PostingError::TransactionSetNotFound(transaction_set_id))?;
            return match current.status {
                TransactionSetStatus::Review => Ok(current),
                TransactionSetStatus::Posted => Err(PostingError::AlreadyPosted(transaction_set_id)),
                TransactionSetStatus::Draft => Err(StoreError::Conflict(format!(
                    "transaction set {transaction_set_id} could not leave draft"
                ))
                .into()),
            };
        };

        self.emit(AuditEvent::new(
            tenant_id,
            actor_id,
            EntityType::TransactionSet,
            transaction_set_id,
            AuditAction::TransactionSetSubmitted,
        ))
        .await;
        tracing::info!("transaction set submitted for review");

        Ok(submitted)
    }
}
