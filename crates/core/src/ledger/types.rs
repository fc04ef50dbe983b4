//! Ledger domain types.
//!
//! This module defines the records the posting engine reads and writes:
//! transaction sets and their gates, posting intents, accounts, and the
//! immutable journal read model.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use tally_shared::types::{
    AccountId, ActorId, ApprovalId, DocumentLinkId, JournalEntryId, OverrideId, TenantId,
    TransactionSetId, ValidationIssueId,
};

/// Transaction set status.
///
/// The valid transitions on the journal path are:
/// - Draft → Review (submit for review)
/// - Review → Posted (post)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionSetStatus {
    /// Being assembled by an upstream collaborator.
    Draft,
    /// Submitted and awaiting posting.
    Review,
    /// Part of the ledger (terminal).
    Posted,
}

impl TransactionSetStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Review => "review",
            Self::Posted => "posted",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "review" => Some(Self::Review),
            "posted" => Some(Self::Posted),
            _ => None,
        }
    }

    /// Returns true once the set is part of the ledger.
    #[must_use]
    pub fn is_posted(&self) -> bool {
        matches!(self, Self::Posted)
    }
}

impl fmt::Display for TransactionSetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a transaction set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionSource {
    /// Entered by a user.
    Manual,
    /// Produced by an external integration or import.
    Integration,
    /// Produced by inventory operations.
    Inventory,
    /// Created by the reversal engine.
    Reversal,
}

impl TransactionSource {
    /// Returns the string representation of the source.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Integration => "integration",
            Self::Inventory => "inventory",
            Self::Reversal => "reversal",
        }
    }

    /// Parses a source from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "manual" => Some(Self::Manual),
            "integration" => Some(Self::Integration),
            "inventory" => Some(Self::Inventory),
            "reversal" => Some(Self::Reversal),
            _ => None,
        }
    }
}

/// A unit of work awaiting, or having been, posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSet {
    /// The transaction set ID.
    pub id: TransactionSetId,
    /// The owning tenant.
    pub tenant_id: TenantId,
    /// Current status.
    pub status: TransactionSetStatus,
    /// Origin of the set.
    pub source: TransactionSource,
    /// Business date of the set.
    pub business_date: NaiveDate,
    /// Free-form note.
    pub note: Option<String>,
    /// Who created the set.
    pub created_by: ActorId,
    /// When the set was created.
    pub created_at: DateTime<Utc>,
}

/// The kind of record an [`EntityRef`] points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// A transaction set.
    TransactionSet,
    /// A journal entry.
    JournalEntry,
    /// A posting run.
    PostingRun,
    /// A reversal link.
    ReversalLink,
    /// An inventory movement.
    InventoryMovement,
}

impl EntityType {
    /// Returns the string representation of the entity type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TransactionSet => "transaction_set",
            Self::JournalEntry => "journal_entry",
            Self::PostingRun => "posting_run",
            Self::ReversalLink => "reversal_link",
            Self::InventoryMovement => "inventory_movement",
        }
    }

    /// Parses an entity type from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "transaction_set" => Some(Self::TransactionSet),
            "journal_entry" => Some(Self::JournalEntry),
            "posting_run" => Some(Self::PostingRun),
            "reversal_link" => Some(Self::ReversalLink),
            "inventory_movement" => Some(Self::InventoryMovement),
            _ => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed pointer to any gated or audited record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    /// The kind of record.
    pub entity_type: EntityType,
    /// The record ID.
    pub entity_id: Uuid,
}

impl EntityRef {
    /// Points at a transaction set.
    #[must_use]
    pub fn transaction_set(id: TransactionSetId) -> Self {
        Self {
            entity_type: EntityType::TransactionSet,
            entity_id: id.into_inner(),
        }
    }
}

/// Approval gate status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    /// Awaiting sign-off; blocks posting.
    Pending,
    /// Signed off.
    Approved,
    /// Declined.
    Rejected,
}

/// A gate requiring human sign-off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    /// The approval ID.
    pub id: ApprovalId,
    /// The owning tenant.
    pub tenant_id: TenantId,
    /// The gated record.
    pub entity: EntityRef,
    /// Current status.
    pub status: ApprovalStatus,
}

/// Severity of a validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    /// Blocks posting unless overridden.
    Error,
    /// Informational only.
    Warning,
}

/// Lifecycle state of a validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueStatus {
    /// Still unresolved.
    Open,
    /// Resolved upstream.
    Resolved,
}

/// A detected problem on a gated record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// The issue ID.
    pub id: ValidationIssueId,
    /// The owning tenant.
    pub tenant_id: TenantId,
    /// The record the issue was raised on.
    pub entity: EntityRef,
    /// Issue severity.
    pub severity: IssueSeverity,
    /// Issue status.
    pub status: IssueStatus,
    /// Human-readable description.
    pub message: String,
}

impl ValidationIssue {
    /// Returns true if this issue blocks posting on its own.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        self.severity == IssueSeverity::Error && self.status == IssueStatus::Open
    }
}

/// An explicit human bypass of a gate.
///
/// With `validation_issue_id` set the override satisfies that issue. Without
/// it the override targets the entity itself and waives document evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Override {
    /// The override ID.
    pub id: OverrideId,
    /// The owning tenant.
    pub tenant_id: TenantId,
    /// The record the override belongs to.
    pub entity: EntityRef,
    /// The issue being overridden, if any.
    pub validation_issue_id: Option<ValidationIssueId>,
    /// Why the gate was bypassed.
    pub reason: String,
    /// Who granted the override.
    pub created_by: ActorId,
}

impl Override {
    /// Returns true if the override targets the entity directly.
    #[must_use]
    pub fn targets_entity(&self) -> bool {
        self.validation_issue_id.is_none()
    }
}

/// Evidence attached to a gated record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentLink {
    /// The link ID.
    pub id: DocumentLinkId,
    /// The owning tenant.
    pub tenant_id: TenantId,
    /// The record the document supports.
    pub entity: EntityRef,
    /// Opaque reference to the stored document.
    pub document_ref: String,
}

/// A chart-of-accounts node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// The account ID.
    pub id: AccountId,
    /// The owning tenant.
    pub tenant_id: TenantId,
    /// Account code, unique per tenant.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Whether lines may reference the account.
    pub is_active: bool,
}

/// How a posting intent line names its account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum AccountRef {
    /// Reference by account ID.
    ById(AccountId),
    /// Reference by account code.
    ByCode(String),
}

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ById(id) => write!(f, "id:{id}"),
            Self::ByCode(code) => write!(f, "code:{code}"),
        }
    }
}

/// One candidate line of a posting intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentLine {
    /// The account to post to.
    pub account: AccountRef,
    /// Debit amount (zero if credit).
    #[serde(with = "rust_decimal::serde::str")]
    pub debit: Decimal,
    /// Credit amount (zero if debit).
    #[serde(with = "rust_decimal::serde::str")]
    pub credit: Decimal,
    /// Optional line description.
    pub description: Option<String>,
}

impl IntentLine {
    /// Creates a debit line.
    #[must_use]
    pub fn debit(account: AccountRef, amount: Decimal) -> Self {
        Self {
            account,
            debit: amount,
            credit: Decimal::ZERO,
            description: None,
        }
    }

    /// Creates a credit line.
    #[must_use]
    pub fn credit(account: AccountRef, amount: Decimal) -> Self {
        Self {
            account,
            debit: Decimal::ZERO,
            credit: amount,
            description: None,
        }
    }

    /// Sets the line description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Declarative candidate journal for a transaction set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingIntent {
    /// The owning tenant.
    pub tenant_id: TenantId,
    /// The transaction set this intent belongs to.
    pub transaction_set_id: TransactionSetId,
    /// The posting date of the resulting entry.
    pub posting_date: NaiveDate,
    /// Entry memo.
    pub memo: Option<String>,
    /// Candidate lines in posting order.
    pub lines: Vec<IntentLine>,
}

/// An immutable posted accounting event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// The entry ID.
    pub id: JournalEntryId,
    /// The owning tenant.
    pub tenant_id: TenantId,
    /// Posting date.
    pub posting_date: NaiveDate,
    /// Entry memo.
    pub memo: Option<String>,
    /// The transaction set that produced the entry.
    pub source_transaction_set_id: TransactionSetId,
    /// Who wrote the entry.
    pub created_by: ActorId,
    /// When the entry was written.
    pub created_at: DateTime<Utc>,
}

/// One debit or credit row of a journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    /// The entry this line belongs to.
    pub journal_entry_id: JournalEntryId,
    /// 1-based position within the entry.
    pub line_no: u32,
    /// The posted account.
    pub account_id: AccountId,
    /// Debit amount.
    #[serde(with = "rust_decimal::serde::str")]
    pub debit: Decimal,
    /// Credit amount.
    #[serde(with = "rust_decimal::serde::str")]
    pub credit: Decimal,
    /// Optional line description.
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_names() {
        for status in [
            TransactionSetStatus::Draft,
            TransactionSetStatus::Review,
            TransactionSetStatus::Posted,
        ] {
            assert_eq!(TransactionSetStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TransactionSetStatus::parse("voided"), None);
    }

    #[test]
    fn test_only_open_errors_block() {
        let mut issue = ValidationIssue {
            id: ValidationIssueId::new(),
            tenant_id: TenantId::new(),
            entity: EntityRef::transaction_set(TransactionSetId::new()),
            severity: IssueSeverity::Error,
            status: IssueStatus::Open,
            message: "Vendor tax id missing".to_string(),
        };
        assert!(issue.is_blocking());

        issue.status = IssueStatus::Resolved;
        assert!(!issue.is_blocking());

        issue.status = IssueStatus::Open;
        issue.severity = IssueSeverity::Warning;
        assert!(!issue.is_blocking());
    }

    #[test]
    fn test_account_ref_serialization() {
        let by_code = AccountRef::ByCode("1000".to_string());
        let json = serde_json::to_value(&by_code).unwrap();
        assert_eq!(json["by"], "by_code");
        assert_eq!(json["value"], "1000");
        assert_eq!(by_code.to_string(), "code:1000");
    }

    #[test]
    fn test_intent_line_amounts_serialize_as_strings() {
        let line = IntentLine::debit(
            AccountRef::ByCode("1000".to_string()),
            Decimal::new(10_050, 2),
        );
        let json = serde_json::to_value(&line).unwrap();
        assert_eq!(json["debit"], "100.50");
        assert_eq!(json["credit"], "0");
    }
}
