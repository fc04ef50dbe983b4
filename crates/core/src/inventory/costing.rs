//! Cost journalization for inventory movements.
//!
//! Receipts capitalise into the inventory account against the COGS account,
//! which stands in as the clearing account. Issues expense out of inventory.
//! Transfers do not change valuation.

use std::collections::HashMap;

use rust_decimal::Decimal;
use tally_shared::types::{AccountId, MovementId, ProductId, extend};

use super::types::{InventoryMovement, MovementType, Product};
use crate::ledger::ResolvedLine;

/// Resolved accounts used for cost lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostAccounts {
    /// Inventory asset account.
    pub inventory: AccountId,
    /// Cost of goods sold account.
    pub cogs: AccountId,
}

/// Cost lines of a batch and the movements they came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CostLines {
    /// Lines in movement order, two per costed movement.
    pub lines: Vec<ResolvedLine>,
    /// Movements that produced lines.
    pub costed_movements: Vec<MovementId>,
}

impl CostLines {
    /// Returns true if no movement produced lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Direction of a cost posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CostFlow {
    /// Dr inventory, Cr COGS.
    IntoStock,
    /// Dr COGS, Cr inventory.
    OutOfStock,
}

fn cost_flow(movement: &InventoryMovement) -> Option<CostFlow> {
    match movement.movement_type {
        MovementType::Receipt => Some(CostFlow::IntoStock),
        MovementType::Issue => Some(CostFlow::OutOfStock),
        MovementType::Transfer => None,
        MovementType::Adjustment => match (movement.from.is_some(), movement.to.is_some()) {
            (false, true) => Some(CostFlow::IntoStock),
            (true, false) => Some(CostFlow::OutOfStock),
            _ => None,
        },
    }
}

/// Unit cost of a movement: its own cost, else the product standard cost for
/// receipts and adjustments.
#[must_use]
pub fn unit_cost(movement: &InventoryMovement, product: Option<&Product>) -> Option<Decimal> {
    movement.unit_cost.or_else(|| {
        movement
            .movement_type
            .uses_standard_cost()
            .then(|| product.and_then(|p| p.standard_cost))
            .flatten()
    })
}

/// Cost lines for one movement: none, or a debit and a credit of equal value.
#[must_use]
pub fn movement_cost_lines(
    movement: &InventoryMovement,
    unit_cost: Option<Decimal>,
    accounts: CostAccounts,
) -> Vec<ResolvedLine> {
    let (Some(flow), Some(unit_cost)) = (cost_flow(movement), unit_cost) else {
        return Vec::new();
    };
    let total = extend(movement.quantity, unit_cost);
    if total <= Decimal::ZERO {
        return Vec::new();
    }

    let description = Some(format!(
        "{} of product {} ({} @ {})",
        movement.movement_type, movement.product_id, movement.quantity, unit_cost
    ));
    let (debit, credit) = match flow {
        CostFlow::IntoStock => (accounts.inventory, accounts.cogs),
        CostFlow::OutOfStock => (accounts.cogs, accounts.inventory),
    };
    vec![
        ResolvedLine::debit(debit, total, description.clone()),
        ResolvedLine::credit(credit, total, description),
    ]
}

/// Cost lines for a batch.
#[must_use]
pub fn plan_cost_lines(
    movements: &[InventoryMovement],
    products: &HashMap<ProductId, Product>,
    accounts: CostAccounts,
) -> CostLines {
    let mut plan = CostLines::default();
    for movement in movements {
        let cost = unit_cost(movement, products.get(&movement.product_id));
        let lines = movement_cost_lines(movement, cost, accounts);
        if !lines.is_empty() {
            plan.costed_movements.push(movement.id);
            plan.lines.extend(lines);
        }
    }
    plan
}
