//! Property-based tests for `ReversalService`.
//!
//! A reversal mirrors the original: summing original and mirror per account
//! nets to zero, and the mirror balances whenever the original does.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use tally_shared::types::{AccountId, ActorId, JournalEntryId, TenantId, TransactionSetId, approx_eq};

use super::reversal::{ReversalRequest, ReversalService};
use super::types::{JournalEntry, JournalLine};

/// Strategy for generating random positive amounts.
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|n| Decimal::new(n, 2))
}

/// Strategy for balanced original lines: pairs of debit and credit.
fn arb_balanced_lines() -> impl Strategy<Value = Vec<JournalLine>> {
    prop::collection::vec((arb_amount(), prop::option::of("[a-zA-Z ]{0,20}")), 1..4).prop_map(
        |pairs| {
            let entry_id = JournalEntryId::new();
            let mut lines = Vec::new();
            for (line_no, (amount, description)) in (0u32..).zip(pairs) {
                lines.push(JournalLine {
                    journal_entry_id: entry_id,
                    line_no: line_no * 2 + 1,
                    account_id: AccountId::new(),
                    debit: amount,
                    credit: Decimal::ZERO,
                    description: description.clone(),
                });
                lines.push(JournalLine {
                    journal_entry_id: entry_id,
                    line_no: line_no * 2 + 2,
                    account_id: AccountId::new(),
                    debit: Decimal::ZERO,
                    credit: amount,
                    description,
                });
            }
            lines
        },
    )
}

fn original_entry(lines: &[JournalLine]) -> JournalEntry {
    JournalEntry {
        id: lines.first().map_or_else(JournalEntryId::new, |l| l.journal_entry_id),
        tenant_id: TenantId::new(),
        posting_date: NaiveDate::from_ymd_opt(2026, 9, 30).unwrap(),
        memo: None,
        source_transaction_set_id: TransactionSetId::new(),
        created_by: ActorId::new(),
        created_at: Utc::now(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Original plus mirror nets to zero on every account.
    #[test]
    fn prop_reversal_nets_to_zero(lines in arb_balanced_lines()) {
        let mirrored = ReversalService::invert_lines(&lines, "Reversal: ");
        let mut net: HashMap<AccountId, Decimal> = HashMap::new();
        for line in &lines {
            *net.entry(line.account_id).or_default() += line.debit - line.credit;
        }
        for line in &mirrored {
            *net.entry(line.account_id).or_default() += line.debit - line.credit;
        }
        prop_assert!(net.values().all(Decimal::is_zero));
    }

    /// The mirror entry of a balanced original builds and keeps its totals.
    #[test]
    fn prop_reversal_plan_balances(lines in arb_balanced_lines()) {
        let original = original_entry(&lines);
        let request = ReversalRequest {
            actor_id: ActorId::new(),
            reason: "Correction",
            posting_date: NaiveDate::from_ymd_opt(2026, 10, 14).unwrap(),
            memo: None,
            line_prefix: "Reversal: ",
        };
        let plan = ReversalService::plan(&original, &lines, &request).unwrap();
        let original_debit: Decimal = lines.iter().map(|l| l.debit).sum();
        prop_assert_eq!(plan.entry.lines().len(), lines.len());
        prop_assert!(approx_eq(plan.entry.totals().credit, original_debit));
        prop_assert!(plan.entry.totals().is_balanced());
    }

    /// Every mirrored description carries the prefix.
    #[test]
    fn prop_descriptions_prefixed(lines in arb_balanced_lines()) {
        let mirrored = ReversalService::invert_lines(&lines, "Reversal: ");
        for (original, mirror) in lines.iter().zip(&mirrored) {
            let description = mirror.description.clone().unwrap_or_default();
            prop_assert!(description.starts_with("Reversal: "));
            prop_assert!(description.ends_with(original.description.as_deref().unwrap_or_default()));
        }
    }
}
