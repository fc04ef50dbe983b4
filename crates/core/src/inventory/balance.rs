//! Movement validation and balance arithmetic.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tally_shared::types::{TenantId, normalize};

use super::types::{BalanceDelta, BalanceKey, InventoryBalance, InventoryMovement};
use crate::ledger::PostingError;

/// Checks that a movement can be applied.
///
/// # Errors
///
/// Returns `InvalidMovement` for a non-positive quantity or a movement with
/// neither side.
pub fn validate_movement(movement: &InventoryMovement) -> Result<(), PostingError> {
    if movement.quantity <= Decimal::ZERO {
        return Err(PostingError::InvalidMovement {
            movement_id: movement.id,
            reason: format!("quantity must be positive, got {}", movement.quantity),
        });
    }
    if movement.from.is_none() && movement.to.is_none() {
        return Err(PostingError::InvalidMovement {
            movement_id: movement.id,
            reason: "movement has neither a source nor a destination".to_string(),
        });
    }
    Ok(())
}

/// Quantity deltas of one movement: `-quantity` at `from`, `+quantity` at `to`.
#[must_use]
pub fn movement_deltas(movement: &InventoryMovement) -> Vec<BalanceDelta> {
    let quantity = normalize(movement.quantity);
    let outbound = movement.from.map(|location| BalanceDelta {
        key: BalanceKey {
            product_id: movement.product_id,
            location,
        },
        delta: -quantity,
    });
    let inbound = movement.to.map(|location| BalanceDelta {
        key: BalanceKey {
            product_id: movement.product_id,
            location,
        },
        delta: quantity,
    });
    outbound.into_iter().chain(inbound).collect()
}

/// Deltas of a batch, one per touched side in movement order.
///
/// Deltas are not merged: each is applied on its own so that a row created
/// by the batch clamps its first delta only.
#[must_use]
pub fn batch_deltas(movements: &[InventoryMovement]) -> Vec<BalanceDelta> {
    movements.iter().flat_map(movement_deltas).collect()
}

impl InventoryBalance {
    /// Opens a new row. The opening delta is clamped at zero.
    #[must_use]
    pub fn opening(tenant_id: TenantId, key: BalanceKey, delta: Decimal) -> Self {
        let on_hand = delta.max(Decimal::ZERO);
        Self {
            tenant_id,
            key,
            on_hand,
            reserved: Decimal::ZERO,
            available: on_hand,
        }
    }

    /// Applies a delta to an existing row verbatim.
    pub fn apply(&mut self, delta: Decimal) {
        self.on_hand += delta;
        self.available = self.on_hand - self.reserved;
    }
}

/// Applies deltas to a set of rows, opening rows that do not exist yet.
///
/// Returns the touched rows in key order.
pub fn apply_deltas(
    tenant_id: TenantId,
    rows: &mut BTreeMap<BalanceKey, InventoryBalance>,
    deltas: &[BalanceDelta],
) -> Vec<InventoryBalance> {
    let mut touched = BTreeMap::new();
    for delta in deltas {
        let row = rows
            .entry(delta.key)
            .and_modify(|row| row.apply(delta.delta))
            .or_insert_with(|| InventoryBalance::opening(tenant_id, delta.key, delta.delta));
        touched.insert(delta.key, row.clone());
    }
    touched.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::types::{MovementStatus, MovementType, StockLocation};
    use rust_decimal_macros::dec;
    use tally_shared::types::{MovementId, ProductId, TransactionSetId, WarehouseId};

    fn movement(
        movement_type: MovementType,
        quantity: Decimal,
        from: Option<StockLocation>,
        to: Option<StockLocation>,
    ) -> InventoryMovement {
        InventoryMovement {
            id: MovementId::new(),
            tenant_id: TenantId::new(),
            transaction_set_id: TransactionSetId::new(),
            product_id: ProductId::new(),
            quantity,
            from,
            to,
            unit_cost: None,
            movement_type,
            status: MovementStatus::Draft,
        }
    }

    fn main_warehouse() -> StockLocation {
        StockLocation::warehouse(WarehouseId::new())
    }

    #[test]
    fn test_validate_rejects_non_positive_quantity() {
        let m = movement(MovementType::Receipt, Decimal::ZERO, None, Some(main_warehouse()));
        assert!(matches!(
            validate_movement(&m),
            Err(PostingError::InvalidMovement { movement_id, .. }) if movement_id == m.id
        ));
        let m = movement(MovementType::Receipt, dec!(-1), None, Some(main_warehouse()));
        assert!(validate_movement(&m).is_err());
    }

    #[test]
    fn test_validate_rejects_sideless_movement() {
        let m = movement(MovementType::Adjustment, dec!(1), None, None);
        assert!(matches!(
            validate_movement(&m),
            Err(PostingError::InvalidMovement { .. })
        ));
    }

    #[test]
    fn test_transfer_produces_two_deltas() {
        let from = main_warehouse();
        let to = main_warehouse();
        let m = movement(MovementType::Transfer, dec!(3), Some(from), Some(to));
        let deltas = movement_deltas(&m);
        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0].key.location, from);
        assert_eq!(deltas[0].delta, dec!(-3));
        assert_eq!(deltas[1].key.location, to);
        assert_eq!(deltas[1].delta, dec!(3));
    }

    #[test]
    fn test_receipt_then_issue() {
        let tenant = TenantId::new();
        let warehouse = main_warehouse();
        let receipt = movement(MovementType::Receipt, dec!(10), None, Some(warehouse));
        let mut issue = movement(MovementType::Issue, dec!(4), Some(warehouse), None);
        issue.product_id = receipt.product_id;

        let mut rows = BTreeMap::new();
        let after_receipt = apply_deltas(tenant, &mut rows, &batch_deltas(&[receipt]));
        assert_eq!(after_receipt[0].on_hand, dec!(10));
        assert_eq!(after_receipt[0].available, dec!(10));

        let after_issue = apply_deltas(tenant, &mut rows, &batch_deltas(&[issue]));
        assert_eq!(after_issue.len(), 1);
        assert_eq!(after_issue[0].on_hand, dec!(6));
        assert_eq!(after_issue[0].available, dec!(6));
    }

    #[test]
    fn test_opening_negative_delta_clamps_to_zero() {
        let tenant = TenantId::new();
        let m = movement(MovementType::Issue, dec!(5), Some(main_warehouse()), None);
        let mut rows = BTreeMap::new();
        let touched = apply_deltas(tenant, &mut rows, &batch_deltas(&[m]));
        assert_eq!(touched[0].on_hand, Decimal::ZERO);
        assert_eq!(touched[0].available, Decimal::ZERO);
    }

    #[test]
    fn test_existing_row_takes_delta_verbatim() {
        let tenant = TenantId::new();
        let key = BalanceKey {
            product_id: ProductId::new(),
            location: main_warehouse(),
        };
        let mut balance = InventoryBalance::opening(tenant, key, dec!(2));
        balance.reserved = dec!(1);
        balance.apply(dec!(-5));
        assert_eq!(balance.on_hand, dec!(-3));
        assert_eq!(balance.available, dec!(-4));
    }
}
