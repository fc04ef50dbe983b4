//! Property-based tests for journal entry construction.
//!
//! Every entry that passes `BalancedEntry::new` balances within the ledger
//! epsilon, and every line carries exactly one positive side.

use proptest::prelude::*;
use rust_decimal::Decimal;
use tally_shared::types::{
    AccountId, EPSILON, JournalEntryId, TenantId, TransactionSetId, approx_eq,
};

use super::error::PostingError;
use super::journal::{BalancedEntry, EntryHeader, ResolvedLine};

/// Strategy to generate a positive amount with up to six decimals.
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000_000i64).prop_map(|micros| Decimal::new(micros, 6))
}

fn header() -> EntryHeader {
    EntryHeader {
        id: JournalEntryId::new(),
        tenant_id: TenantId::new(),
        source_transaction_set_id: TransactionSetId::new(),
        posting_date: chrono::NaiveDate::from_ymd_opt(2026, 10, 14).unwrap(),
        memo: None,
    }
}

/// Strategy for balanced line sets: debits are split across several lines and
/// offset by a single credit.
fn balanced_lines() -> impl Strategy<Value = Vec<ResolvedLine>> {
    prop::collection::vec(positive_amount(), 1..6).prop_map(|debits| {
        let total: Decimal = debits.iter().copied().sum();
        let mut lines: Vec<ResolvedLine> = debits
            .into_iter()
            .map(|amount| ResolvedLine::debit(AccountId::new(), amount, None))
            .collect();
        lines.push(ResolvedLine::credit(AccountId::new(), total, None));
        lines
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Balanced lines always build, and the totals agree.
    #[test]
    fn prop_balanced_lines_build(lines in balanced_lines()) {
        let count = lines.len();
        let entry = BalancedEntry::new(header(), lines).unwrap();
        prop_assert_eq!(entry.lines().len(), count);
        prop_assert!(approx_eq(entry.totals().debit, entry.totals().credit));
    }

    /// Line numbers are 1..=n in order.
    #[test]
    fn prop_line_numbers_are_dense(lines in balanced_lines()) {
        let entry = BalancedEntry::new(header(), lines).unwrap();
        for (expected, line) in (1u32..).zip(entry.lines()) {
            prop_assert_eq!(line.line_no, expected);
        }
    }

    /// Each built line has exactly one nonzero side.
    #[test]
    fn prop_lines_are_one_sided(lines in balanced_lines()) {
        let entry = BalancedEntry::new(header(), lines).unwrap();
        for line in entry.lines() {
            prop_assert!(line.debit.is_zero() != line.credit.is_zero());
            prop_assert!(line.debit >= Decimal::ZERO && line.credit >= Decimal::ZERO);
        }
    }

    /// Skewing the credit by more than the epsilon is always rejected.
    #[test]
    fn prop_skewed_lines_rejected(lines in balanced_lines(), skew in positive_amount()) {
        let mut lines = lines;
        if let Some(last) = lines.last_mut() {
            last.credit += skew.max(EPSILON);
        }
        let result = BalancedEntry::new(header(), lines);
        prop_assert!(matches!(result, Err(PostingError::Unbalanced { .. })), "unexpected result: {:?}", result);
    }

    /// A line with both sides set is rejected with its 1-based number.
    #[test]
    fn prop_ambiguous_line_reported(lines in balanced_lines(), amount in positive_amount()) {
        let mut lines = lines;
        let index = lines.len() - 1;
        lines[index].debit = amount;
        let expected = u32::try_from(index + 1).unwrap();
        let result = BalancedEntry::new(header(), lines);
        prop_assert!(matches!(result, Err(PostingError::AmbiguousLine(n)) if n == expected), "unexpected result: {:?}", result);
    }
}
