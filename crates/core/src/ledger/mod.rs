//! Journal posting logic.
//!
//! This module implements the ledger side of the posting engine:
//! - Transaction sets, gates and posting intents
//! - Posting runs (idempotency and mutual exclusion)
//! - Precondition checks
//! - Balanced journal entry construction
//! - Reversing entries
//! - Error types for posting operations

pub mod error;
pub mod journal;
pub mod preconditions;
pub mod reversal;
pub mod run;
pub mod types;

#[cfg(test)]
mod journal_props;
#[cfg(test)]
mod reversal_props;

pub use error::PostingError;
pub use journal::{
    BalancedEntry, BalancedLine, EntryHeader, JournalTotals, ResolvedLine, build_entry,
    check_amounts,
};
pub use preconditions::{GateSnapshot, check_postable};
pub use reversal::{ReversalLink, ReversalPlan, ReversalRequest, ReversalService};
pub use run::{NewPostingRun, PostingRun, PostingRunStatus, RunClaim, RunDecision, RunState};
pub use types::{
    Account, AccountRef, Approval, ApprovalStatus, DocumentLink, EntityRef, EntityType,
    IntentLine, IssueSeverity, IssueStatus, JournalEntry, JournalLine, Override, PostingIntent,
    TransactionSet, TransactionSetStatus, TransactionSource, ValidationIssue,
};
