//! Posting gates.
//!
//! A transaction set may post only when it is in review, no approval is
//! pending, every open error-severity issue is overridden, and supporting
//! evidence is linked (or waived by an entity-level override).

use tally_shared::types::{TenantId, TransactionSetId};

use super::error::PostingError;
use super::types::{
    Approval, ApprovalStatus, Override, TransactionSet, TransactionSetStatus, ValidationIssue,
};
use crate::store::{LedgerStore, StoreResult};

/// Everything the gates look at, loaded up front.
#[derive(Debug, Clone, Default)]
pub struct GateSnapshot {
    /// The transaction set, if it exists.
    pub transaction_set: Option<TransactionSet>,
    /// Approvals on the set.
    pub approvals: Vec<Approval>,
    /// Validation issues on the set.
    pub issues: Vec<ValidationIssue>,
    /// Overrides on the set.
    pub overrides: Vec<Override>,
    /// Number of linked documents.
    pub document_links: usize,
}

impl GateSnapshot {
    /// Loads the snapshot for a transaction set in one store read.
    ///
    /// # Errors
    ///
    /// Returns a store error if the read fails.
    pub async fn load(
        store: &dyn LedgerStore,
        tenant_id: TenantId,
        transaction_set_id: TransactionSetId,
    ) -> StoreResult<Self> {
        let mut snapshot = store.gate_snapshot(tenant_id, transaction_set_id).await?;

        // Report the oldest blocker first.
        snapshot.approvals.sort_by_key(|a| a.id);
        snapshot.issues.sort_by_key(|i| i.id);
        Ok(snapshot)
    }

    /// Runs the gates in order and returns the postable set.
    ///
    /// # Errors
    ///
    /// Returns the first gate that fails.
    pub fn check(self, transaction_set_id: TransactionSetId) -> Result<TransactionSet, PostingError> {
        let transaction_set = self
            .transaction_set
            .ok_or(PostingError::TransactionSetNotFound(transaction_set_id))?;

        match transaction_set.status {
            TransactionSetStatus::Posted => {
                return Err(PostingError::AlreadyPosted(transaction_set.id));
            }
            TransactionSetStatus::Draft => {
                return Err(PostingError::NotSubmitted(transaction_set.id));
            }
            TransactionSetStatus::Review => {}
        }

        if let Some(pending) = self
            .approvals
            .iter()
            .find(|a| a.status == ApprovalStatus::Pending)
        {
            return Err(PostingError::PendingApproval(pending.id));
        }

        if let Some(issue) = self.issues.iter().filter(|i| i.is_blocking()).find(|issue| {
            !self
                .overrides
                .iter()
                .any(|o| o.validation_issue_id == Some(issue.id))
        }) {
            return Err(PostingError::UnresolvedValidation(issue.id));
        }

        let evidence_waived = self.overrides.iter().any(Override::targets_entity);
        if self.document_links == 0 && !evidence_waived {
            return Err(PostingError::MissingEvidence(transaction_set.id));
        }

        Ok(transaction_set)
    }
}

/// Loads and checks the gates for a transaction set.
///
/// # Errors
///
/// Returns the first failing gate or a store error.
pub async fn check_postable(
    store: &dyn LedgerStore,
    tenant_id: TenantId,
    transaction_set_id: TransactionSetId,
) -> Result<TransactionSet, PostingError> {
    GateSnapshot::load(store, tenant_id, transaction_set_id)
        .await?
        .check(transaction_set_id)
}
