//! Posting error types.
//!
//! This module defines every failure the posting engine can report:
//! precondition gates, malformed intents, the concurrency token, and store
//! faults. Each error is classified by [`ErrorKind`].

use rust_decimal::Decimal;
use thiserror::Error;

use tally_shared::ErrorKind;
use tally_shared::types::{
    ApprovalId, JournalEntryId, MovementId, TransactionSetId, ValidationIssueId,
};

use crate::store::StoreError;

/// Errors that can occur during ledger posting operations.
#[derive(Debug, Error)]
pub enum PostingError {
    // ========== Precondition Errors ==========
    /// Transaction set not found for the tenant.
    #[error("Transaction set not found: {0}")]
    TransactionSetNotFound(TransactionSetId),

    /// No posting intent is attached to the transaction set.
    #[error("No posting intent attached to transaction set {0}")]
    PostingIntentNotFound(TransactionSetId),

    /// Journal entry (or its lines) not found for the tenant.
    #[error("Journal entry not found: {0}")]
    JournalEntryNotFound(JournalEntryId),

    /// Transaction set is already posted.
    #[error("Transaction set {0} is already posted")]
    AlreadyPosted(TransactionSetId),

    /// Transaction set is still a draft.
    #[error("Transaction set {0} has not been submitted for review")]
    NotSubmitted(TransactionSetId),

    /// An approval on the transaction set is still pending.
    #[error("Approval {0} is still pending")]
    PendingApproval(ApprovalId),

    /// An open error-severity validation issue has no override.
    #[error("Validation issue {0} is unresolved and not overridden")]
    UnresolvedValidation(ValidationIssueId),

    /// No supporting document is linked and evidence was not waived.
    #[error("Transaction set {0} has no supporting document")]
    MissingEvidence(TransactionSetId),

    /// The transaction set has no draft inventory movements.
    #[error("Transaction set {0} has no draft inventory movements")]
    NoMovements(TransactionSetId),

    /// A reversal reason is required.
    #[error("Reversal reason is required")]
    ReasonRequired,

    // ========== Integrity Errors ==========
    /// A line references an account that is missing or inactive.
    #[error("Line {0} references an unknown or inactive account")]
    UnknownAccount(u32),

    /// A line carries both a debit and a credit.
    #[error("Line {0} has both a debit and a credit")]
    AmbiguousLine(u32),

    /// A line carries neither a debit nor a credit.
    #[error("Line {0} has neither a debit nor a credit")]
    EmptyLine(u32),

    /// A line carries a negative amount.
    #[error("Line {0} has a negative amount")]
    NegativeAmount(u32),

    /// The intent has no lines at all.
    #[error("Posting intent has no lines")]
    NoLines,

    /// The lines do not balance.
    #[error("Entry is not balanced. Debit: {debit}, Credit: {credit}")]
    Unbalanced {
        /// Total debit amount.
        debit: Decimal,
        /// Total credit amount.
        credit: Decimal,
    },

    /// An inventory movement cannot be applied.
    #[error("Inventory movement {movement_id} is invalid: {reason}")]
    InvalidMovement {
        /// The offending movement.
        movement_id: MovementId,
        /// What is wrong with it.
        reason: String,
    },

    // ========== Concurrency Errors ==========
    /// Another posting attempt for the same transaction set is running.
    #[error("Posting of transaction set {0} is already in progress, retry later")]
    InProgress(TransactionSetId),

    // ========== Infrastructure Errors ==========
    /// Store fault.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PostingError {
    /// Returns the kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TransactionSetNotFound(_)
            | Self::PostingIntentNotFound(_)
            | Self::JournalEntryNotFound(_)
            | Self::AlreadyPosted(_)
            | Self::NotSubmitted(_)
            | Self::PendingApproval(_)
            | Self::UnresolvedValidation(_)
            | Self::MissingEvidence(_)
            | Self::NoMovements(_)
            | Self::ReasonRequired => ErrorKind::Precondition,

            Self::UnknownAccount(_)
            | Self::AmbiguousLine(_)
            | Self::EmptyLine(_)
            | Self::NegativeAmount(_)
            | Self::NoLines
            | Self::Unbalanced { .. }
            | Self::InvalidMovement { .. } => ErrorKind::Integrity,

            Self::InProgress(_) => ErrorKind::Concurrency,

            Self::Store(_) => ErrorKind::Infrastructure,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::TransactionSetNotFound(_) => "TRANSACTION_SET_NOT_FOUND",
            Self::PostingIntentNotFound(_) => "POSTING_INTENT_NOT_FOUND",
            Self::JournalEntryNotFound(_) => "JOURNAL_ENTRY_NOT_FOUND",
            Self::AlreadyPosted(_) => "ALREADY_POSTED",
            Self::NotSubmitted(_) => "NOT_SUBMITTED",
            Self::PendingApproval(_) => "PENDING_APPROVAL",
            Self::UnresolvedValidation(_) => "UNRESOLVED_VALIDATION",
            Self::MissingEvidence(_) => "MISSING_EVIDENCE",
            Self::NoMovements(_) => "NO_MOVEMENTS",
            Self::ReasonRequired => "REASON_REQUIRED",
            Self::UnknownAccount(_) => "UNKNOWN_ACCOUNT",
            Self::AmbiguousLine(_) => "AMBIGUOUS_LINE",
            Self::EmptyLine(_) => "EMPTY_LINE",
            Self::NegativeAmount(_) => "NEGATIVE_AMOUNT",
            Self::NoLines => "NO_LINES",
            Self::Unbalanced { .. } => "UNBALANCED",
            Self::InvalidMovement { .. } => "INVALID_MOVEMENT",
            Self::InProgress(_) => "IN_PROGRESS",
            Self::Store(StoreError::Conflict(_)) => "STORE_CONFLICT",
            Self::Store(StoreError::Database(_)) => "DATABASE_ERROR",
        }
    }

    /// Returns true if the caller may retry the same request.
    ///
    /// Rejections are not retryable as-is: the input has to change first.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::InProgress(_) | Self::Store(_))
    }
}
