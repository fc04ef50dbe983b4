//! Journal entry construction.
//!
//! A [`BalancedEntry`] can only be built through [`BalancedEntry::new`], which
//! checks every line and the entry balance. The journal writer accepts nothing
//! else, so an unbalanced entry cannot reach the store.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use tally_shared::types::{
    AccountId, ActorId, JournalEntryId, TenantId, TransactionSetId, approx_eq, normalize,
};

use super::error::PostingError;
use super::types::{Account, AccountRef, JournalEntry, JournalLine, PostingIntent};

/// Header fields of an entry about to be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryHeader {
    /// Pre-assigned entry ID.
    pub id: JournalEntryId,
    /// The owning tenant.
    pub tenant_id: TenantId,
    /// The transaction set the entry is sourced from.
    pub source_transaction_set_id: TransactionSetId,
    /// Posting date.
    pub posting_date: NaiveDate,
    /// Memo.
    pub memo: Option<String>,
}

/// A line with its account resolved, before numbering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedLine {
    /// The resolved account.
    pub account_id: AccountId,
    /// Debit amount.
    pub debit: Decimal,
    /// Credit amount.
    pub credit: Decimal,
    /// Optional description.
    pub description: Option<String>,
}

impl ResolvedLine {
    /// Creates a debit line.
    #[must_use]
    pub fn debit(account_id: AccountId, amount: Decimal, description: Option<String>) -> Self {
        Self {
            account_id,
            debit: amount,
            credit: Decimal::ZERO,
            description,
        }
    }

    /// Creates a credit line.
    #[must_use]
    pub fn credit(account_id: AccountId, amount: Decimal, description: Option<String>) -> Self {
        Self {
            account_id,
            debit: Decimal::ZERO,
            credit: amount,
            description,
        }
    }
}

/// A numbered line of a balanced entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalancedLine {
    /// 1-based line number.
    pub line_no: u32,
    /// The account.
    pub account_id: AccountId,
    /// Debit amount, normalised to six decimal places.
    pub debit: Decimal,
    /// Credit amount, normalised to six decimal places.
    pub credit: Decimal,
    /// Optional description.
    pub description: Option<String>,
}

/// Debit and credit totals of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct JournalTotals {
    /// Sum of debits.
    pub debit: Decimal,
    /// Sum of credits.
    pub credit: Decimal,
}

impl JournalTotals {
    /// Returns true if debits and credits agree within the ledger epsilon.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        approx_eq(self.debit, self.credit)
    }
}

/// An entry whose lines are known to be well formed and balanced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalancedEntry {
    header: EntryHeader,
    lines: Vec<BalancedLine>,
    totals: JournalTotals,
}

impl BalancedEntry {
    /// Checks and numbers the lines.
    ///
    /// # Errors
    ///
    /// Returns the first malformed line (1-based), `NoLines` for an empty set,
    /// or `Unbalanced` when totals differ by more than the epsilon.
    pub fn new(header: EntryHeader, lines: Vec<ResolvedLine>) -> Result<Self, PostingError> {
        if lines.is_empty() {
            return Err(PostingError::NoLines);
        }

        let mut totals = JournalTotals::default();
        let mut numbered = Vec::with_capacity(lines.len());

        for (line_no, line) in (1u32..).zip(lines) {
            let (debit, credit) = (normalize(line.debit), normalize(line.credit));
            check_amounts(line_no, debit, credit)?;
            totals.debit += debit;
            totals.credit += credit;
            numbered.push(BalancedLine {
                line_no,
                account_id: line.account_id,
                debit,
                credit,
                description: line.description,
            });
        }

        if !totals.is_balanced() {
            return Err(PostingError::Unbalanced {
                debit: totals.debit,
                credit: totals.credit,
            });
        }

        Ok(Self {
            header,
            lines: numbered,
            totals,
        })
    }

    /// Returns the header.
    #[must_use]
    pub fn header(&self) -> &EntryHeader {
        &self.header
    }

    /// Returns the pre-assigned entry ID.
    #[must_use]
    pub fn id(&self) -> JournalEntryId {
        self.header.id
    }

    /// Returns the numbered lines.
    #[must_use]
    pub fn lines(&self) -> &[BalancedLine] {
        &self.lines
    }

    /// Returns the totals.
    #[must_use]
    pub fn totals(&self) -> JournalTotals {
        self.totals
    }

    /// Materialises the header and line rows as they are stored.
    #[must_use]
    pub fn to_rows(
        &self,
        created_by: ActorId,
        created_at: DateTime<Utc>,
    ) -> (JournalEntry, Vec<JournalLine>) {
        let entry = JournalEntry {
            id: self.header.id,
            tenant_id: self.header.tenant_id,
            posting_date: self.header.posting_date,
            memo: self.header.memo.clone(),
            source_transaction_set_id: self.header.source_transaction_set_id,
            created_by,
            created_at,
        };
        let lines = self
            .lines
            .iter()
            .map(|line| JournalLine {
                journal_entry_id: self.header.id,
                line_no: line.line_no,
                account_id: line.account_id,
                debit: line.debit,
                credit: line.credit,
                description: line.description.clone(),
            })
            .collect();
        (entry, lines)
    }
}

/// Checks the amount shape of a single line.
///
/// Callers pass amounts already normalised, so a line that rounds to zero
/// counts as empty.
///
/// # Errors
///
/// Returns `NegativeAmount`, `AmbiguousLine` or `EmptyLine` for `line_no`.
pub fn check_amounts(line_no: u32, debit: Decimal, credit: Decimal) -> Result<(), PostingError> {
    if debit < Decimal::ZERO || credit < Decimal::ZERO {
        return Err(PostingError::NegativeAmount(line_no));
    }
    match (debit.is_zero(), credit.is_zero()) {
        (false, false) => Err(PostingError::AmbiguousLine(line_no)),
        (true, true) => Err(PostingError::EmptyLine(line_no)),
        _ => Ok(()),
    }
}

/// Resolves a posting intent into a balanced entry.
///
/// Lines are checked in order. For each line the account is resolved first,
/// then its amounts. `lookup` returns the account a reference names, if any;
/// inactive accounts count as unknown.
///
/// # Errors
///
/// Returns the first line failure, `NoLines`, or `Unbalanced`.
pub fn build_entry<'a, F>(
    id: JournalEntryId,
    intent: &PostingIntent,
    lookup: F,
) -> Result<BalancedEntry, PostingError>
where
    F: Fn(&AccountRef) -> Option<&'a Account>,
{
    let mut resolved = Vec::with_capacity(intent.lines.len());
    for (line_no, line) in (1u32..).zip(&intent.lines) {
        let account = lookup(&line.account)
            .filter(|account| account.is_active && account.tenant_id == intent.tenant_id)
            .ok_or(PostingError::UnknownAccount(line_no))?;
        check_amounts(line_no, normalize(line.debit), normalize(line.credit))?;
        resolved.push(ResolvedLine {
            account_id: account.id,
            debit: line.debit,
            credit: line.credit,
            description: line.description.clone(),
        });
    }

    BalancedEntry::new(
        EntryHeader {
            id,
            tenant_id: intent.tenant_id,
            source_transaction_set_id: intent.transaction_set_id,
            posting_date: intent.posting_date,
            memo: intent.memo.clone(),
        },
        resolved,
    )
}
