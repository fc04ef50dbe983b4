//! Reversing entries for posted journals.
//!
//! A reversal never touches the original entry. It creates a new posted
//! transaction set and a mirror entry whose lines swap debit and credit.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tally_shared::types::{
    ActorId, JournalEntryId, ReversalLinkId, TenantId, TransactionSetId,
};

use super::error::PostingError;
use super::journal::{BalancedEntry, EntryHeader, ResolvedLine};
use super::types::{
    JournalEntry, JournalLine, TransactionSet, TransactionSetStatus, TransactionSource,
};

/// Traceability record tying an original entry to its reversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReversalLink {
    /// The link ID.
    pub id: ReversalLinkId,
    /// The owning tenant.
    pub tenant_id: TenantId,
    /// The reversed entry.
    pub original_journal_entry_id: JournalEntryId,
    /// The mirror entry.
    pub reversal_journal_entry_id: JournalEntryId,
    /// The transaction set carrying the mirror entry.
    pub reversal_transaction_set_id: TransactionSetId,
    /// Why the entry was reversed.
    pub reason: String,
    /// Who reversed it.
    pub created_by: ActorId,
    /// When it was reversed.
    pub created_at: DateTime<Utc>,
}

/// Input for a reversal.
#[derive(Debug, Clone)]
pub struct ReversalRequest<'a> {
    /// Who reverses.
    pub actor_id: ActorId,
    /// Why. Must not be blank.
    pub reason: &'a str,
    /// Posting date of the mirror entry.
    pub posting_date: NaiveDate,
    /// Memo override for the mirror entry.
    pub memo: Option<String>,
    /// Prefix for mirrored line descriptions.
    pub line_prefix: &'a str,
}

/// Everything a reversal writes, before it is committed.
#[derive(Debug, Clone)]
pub struct ReversalPlan {
    /// The new `posted` transaction set.
    pub transaction_set: TransactionSet,
    /// The mirror entry.
    pub entry: BalancedEntry,
}

/// Stateless service for creating reversing entries.
pub struct ReversalService;

impl ReversalService {
    /// Mirrors lines by swapping debit and credit.
    ///
    /// Amounts are kept verbatim and descriptions get `prefix`.
    #[must_use]
    pub fn invert_lines(lines: &[JournalLine], prefix: &str) -> Vec<ResolvedLine> {
        lines
            .iter()
            .map(|line| ResolvedLine {
                account_id: line.account_id,
                debit: line.credit,
                credit: line.debit,
                description: Some(format!(
                    "{prefix}{}",
                    line.description.clone().unwrap_or_default()
                )),
            })
            .collect()
    }

    /// Returns true if the original lines balance exactly.
    #[must_use]
    pub fn validate_reversal(lines: &[JournalLine]) -> bool {
        let debit: Decimal = lines.iter().map(|l| l.debit).sum();
        let credit: Decimal = lines.iter().map(|l| l.credit).sum();
        debit == credit
    }

    /// Builds the reversal set and mirror entry for `original`.
    ///
    /// # Errors
    ///
    /// Returns `ReasonRequired` for a blank reason, `JournalEntryNotFound` when
    /// there are no lines, or the entry check failure of the mirrored lines.
    pub fn plan(
        original: &JournalEntry,
        lines: &[JournalLine],
        request: &ReversalRequest<'_>,
    ) -> Result<ReversalPlan, PostingError> {
        let reason = request.reason.trim();
        if reason.is_empty() {
            return Err(PostingError::ReasonRequired);
        }
        if lines.is_empty() {
            return Err(PostingError::JournalEntryNotFound(original.id));
        }

        let transaction_set = TransactionSet {
            id: TransactionSetId::new(),
            tenant_id: original.tenant_id,
            status: TransactionSetStatus::Posted,
            source: TransactionSource::Reversal,
            business_date: request.posting_date,
            note: Some(format!(
                "Reversal of journal entry {}. Reason: {reason}",
                original.id
            )),
            created_by: request.actor_id,
            created_at: Utc::now(),
        };

        let memo = request
            .memo
            .clone()
            .unwrap_or_else(|| format!("Reversal of journal entry {}", original.id));

        let entry = BalancedEntry::new(
            EntryHeader {
                id: JournalEntryId::new(),
                tenant_id: original.tenant_id,
                source_transaction_set_id: transaction_set.id,
                posting_date: request.posting_date,
                memo: Some(memo),
            },
            Self::invert_lines(lines, request.line_prefix),
        )?;

        Ok(ReversalPlan {
            transaction_set,
            entry,
        })
    }
}
