//! Property-based tests for cost journalization.
//!
//! Whatever the movement mix, the cost lines of a batch balance exactly and
//! build into a `BalancedEntry`.

use std::collections::HashMap;

use proptest::prelude::*;
use rust_decimal::Decimal;
use tally_shared::types::{
    AccountId, JournalEntryId, MovementId, ProductId, TenantId, TransactionSetId, WarehouseId,
};

use super::costing::{CostAccounts, plan_cost_lines};
use super::types::{InventoryMovement, MovementStatus, MovementType, StockLocation};
use crate::ledger::{BalancedEntry, EntryHeader};

fn arb_movement_type() -> impl Strategy<Value = MovementType> {
    prop_oneof![
        Just(MovementType::Receipt),
        Just(MovementType::Issue),
        Just(MovementType::Transfer),
        Just(MovementType::Adjustment),
    ]
}

/// Strategy for a valid movement with an optional explicit cost.
fn arb_movement() -> impl Strategy<Value = InventoryMovement> {
    (
        arb_movement_type(),
        (1i64..1_000_000i64).prop_map(|n| Decimal::new(n, 3)),
        prop::option::of((0i64..10_000_000i64).prop_map(|n| Decimal::new(n, 4))),
        0u8..3,
    )
        .prop_map(|(movement_type, quantity, unit_cost, sides)| {
            let side = || Some(StockLocation::warehouse(WarehouseId::new()));
            let (from, to) = match sides {
                0 => (side(), None),
                1 => (None, side()),
                _ => (side(), side()),
            };
            InventoryMovement {
                id: MovementId::new(),
                tenant_id: TenantId::new(),
                transaction_set_id: TransactionSetId::new(),
                product_id: ProductId::new(),
                quantity,
                from,
                to,
                unit_cost,
                movement_type,
                status: MovementStatus::Draft,
            }
        })
}

fn accounts() -> CostAccounts {
    CostAccounts {
        inventory: AccountId::new(),
        cogs: AccountId::new(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Cost lines of any batch balance exactly.
    #[test]
    fn prop_cost_lines_balance(movements in prop::collection::vec(arb_movement(), 1..8)) {
        let plan = plan_cost_lines(&movements, &HashMap::new(), accounts());
        let debit: Decimal = plan.lines.iter().map(|l| l.debit).sum();
        let credit: Decimal = plan.lines.iter().map(|l| l.credit).sum();
        prop_assert_eq!(debit, credit);
        prop_assert_eq!(plan.lines.len(), plan.costed_movements.len() * 2);
    }

    /// A non-empty plan always builds into a balanced entry.
    #[test]
    fn prop_cost_plan_builds(movements in prop::collection::vec(arb_movement(), 1..8)) {
        let plan = plan_cost_lines(&movements, &HashMap::new(), accounts());
        if !plan.is_empty() {
            let header = EntryHeader {
                id: JournalEntryId::new(),
                tenant_id: TenantId::new(),
                source_transaction_set_id: TransactionSetId::new(),
                posting_date: chrono::NaiveDate::from_ymd_opt(2026, 10, 14).unwrap(),
                memo: None,
            };
            let entry = BalancedEntry::new(header, plan.lines);
            prop_assert!(entry.is_ok(), "unexpected result: {:?}", entry);
        }
    }

    /// Transfers never produce cost lines.
    #[test]
    fn prop_transfers_not_costed(mut movement in arb_movement()) {
        movement.movement_type = MovementType::Transfer;
        let plan = plan_cost_lines(&[movement], &HashMap::new(), accounts());
        prop_assert!(plan.is_empty());
    }
}
