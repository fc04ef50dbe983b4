//! Posting runs: the idempotency and mutual-exclusion token for posting.
//!
//! A transaction set has at most one `started` or `succeeded` run at any time.
//! Failed runs are kept for forensics and chained through `retry_of`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use tally_shared::types::{ActorId, JournalEntryId, PostingRunId, TenantId, TransactionSetId};

/// Stored status of a posting run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostingRunStatus {
    /// The attempt holds the token.
    Started,
    /// The attempt wrote a journal entry.
    Succeeded,
    /// The attempt was rejected or faulted.
    Failed,
}

impl PostingRunStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PostingRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Run state with the data each status carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RunState {
    /// The attempt holds the token.
    Started,
    /// The attempt wrote the given entry.
    Succeeded {
        /// The entry created by this run.
        journal_entry_id: JournalEntryId,
    },
    /// The attempt failed with the given message.
    Failed {
        /// Error message recorded for operators.
        error: String,
    },
}

impl RunState {
    /// Returns the stored status for this state.
    #[must_use]
    pub fn status(&self) -> PostingRunStatus {
        match self {
            Self::Started => PostingRunStatus::Started,
            Self::Succeeded { .. } => PostingRunStatus::Succeeded,
            Self::Failed { .. } => PostingRunStatus::Failed,
        }
    }
}

/// Attempt record for one posting attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingRun {
    /// The run ID.
    pub id: PostingRunId,
    /// The owning tenant.
    pub tenant_id: TenantId,
    /// The transaction set being posted.
    pub transaction_set_id: TransactionSetId,
    /// Current state.
    pub state: RunState,
    /// The failed run this attempt retries, if any.
    pub retry_of: Option<PostingRunId>,
    /// Who started the attempt.
    pub started_by: ActorId,
    /// When the attempt started.
    pub started_at: DateTime<Utc>,
    /// When the attempt finished.
    pub finished_at: Option<DateTime<Utc>>,
}

/// A run to be claimed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPostingRun {
    /// The run ID.
    pub id: PostingRunId,
    /// The owning tenant.
    pub tenant_id: TenantId,
    /// The transaction set being posted.
    pub transaction_set_id: TransactionSetId,
    /// Who starts the attempt.
    pub started_by: ActorId,
    /// The failed run this attempt retries, if any.
    pub retry_of: Option<PostingRunId>,
}

impl NewPostingRun {
    /// Prepares a run with a fresh ID.
    #[must_use]
    pub fn new(
        tenant_id: TenantId,
        transaction_set_id: TransactionSetId,
        started_by: ActorId,
        retry_of: Option<PostingRunId>,
    ) -> Self {
        Self {
            id: PostingRunId::new(),
            tenant_id,
            transaction_set_id,
            started_by,
            retry_of,
        }
    }

    /// Materialises the run in `started` state.
    #[must_use]
    pub fn started_at(self, started_at: DateTime<Utc>) -> PostingRun {
        PostingRun {
            id: self.id,
            tenant_id: self.tenant_id,
            transaction_set_id: self.transaction_set_id,
            state: RunState::Started,
            retry_of: self.retry_of,
            started_by: self.started_by,
            started_at,
            finished_at: None,
        }
    }
}

/// Result of an atomic claim attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunClaim {
    /// The new run now holds the token.
    Claimed(PostingRun),
    /// A started or succeeded run already exists.
    Existing(PostingRun),
    /// The transaction set does not exist for the tenant.
    NoTransactionSet,
}

/// What the coordinator should do given the latest run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunDecision {
    /// A previous run succeeded; return its entry.
    Replay {
        /// The succeeded run.
        run_id: PostingRunId,
        /// The entry it created.
        journal_entry_id: JournalEntryId,
    },
    /// Another attempt holds the token.
    Wait,
    /// Claim a new run.
    Attempt {
        /// The failed run being retried, if any.
        retry_of: Option<PostingRunId>,
    },
}

impl RunDecision {
    /// Decides from the most recent run of a transaction set.
    #[must_use]
    pub fn from_latest(latest: Option<&PostingRun>) -> Self {
        match latest {
            None => Self::Attempt { retry_of: None },
            Some(run) => match &run.state {
                RunState::Succeeded { journal_entry_id } => Self::Replay {
                    run_id: run.id,
                    journal_entry_id: *journal_entry_id,
                },
                RunState::Started => Self::Wait,
                RunState::Failed { .. } => Self::Attempt {
                    retry_of: Some(run.id),
                },
            },
        }
    }
}
