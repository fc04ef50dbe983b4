//! Inventory domain types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use tally_shared::types::{
    InventoryPostingLinkId, JournalEntryId, LocationId, MovementId, ProductId, TenantId,
    TransactionSetId, WarehouseId,
};

/// Kind of quantity change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    /// Goods coming in.
    Receipt,
    /// Goods going out.
    Issue,
    /// Goods moving between locations.
    Transfer,
    /// Count correction.
    Adjustment,
}

impl MovementType {
    /// Returns the string representation of the movement type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Receipt => "receipt",
            Self::Issue => "issue",
            Self::Transfer => "transfer",
            Self::Adjustment => "adjustment",
        }
    }

    /// Parses a movement type from its string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "receipt" => Some(Self::Receipt),
            "issue" => Some(Self::Issue),
            "transfer" => Some(Self::Transfer),
            "adjustment" => Some(Self::Adjustment),
            _ => None,
        }
    }

    /// Returns true if a missing unit cost falls back to the standard cost.
    #[must_use]
    pub fn uses_standard_cost(&self) -> bool {
        matches!(self, Self::Receipt | Self::Adjustment)
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Movement lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementStatus {
    /// Not yet applied to balances.
    Draft,
    /// Applied to balances.
    Posted,
}

impl MovementStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Posted => "posted",
        }
    }
}

/// A warehouse, optionally narrowed to a bin location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StockLocation {
    /// The warehouse.
    pub warehouse_id: WarehouseId,
    /// The location inside the warehouse.
    pub location_id: Option<LocationId>,
}

impl StockLocation {
    /// A whole warehouse.
    #[must_use]
    pub fn warehouse(warehouse_id: WarehouseId) -> Self {
        Self {
            warehouse_id,
            location_id: None,
        }
    }

    /// A location inside a warehouse.
    #[must_use]
    pub fn at(warehouse_id: WarehouseId, location_id: LocationId) -> Self {
        Self {
            warehouse_id,
            location_id: Some(location_id),
        }
    }
}

/// A quantity change candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryMovement {
    /// The movement ID.
    pub id: MovementId,
    /// The owning tenant.
    pub tenant_id: TenantId,
    /// The transaction set that carries the movement.
    pub transaction_set_id: TransactionSetId,
    /// The product moved.
    pub product_id: ProductId,
    /// Quantity moved; must be positive.
    #[serde(with = "rust_decimal::serde::str")]
    pub quantity: Decimal,
    /// Source side.
    pub from: Option<StockLocation>,
    /// Destination side.
    pub to: Option<StockLocation>,
    /// Explicit unit cost.
    #[serde(with = "rust_decimal::serde::str_option")]
    pub unit_cost: Option<Decimal>,
    /// Kind of movement.
    pub movement_type: MovementType,
    /// Lifecycle status.
    pub status: MovementStatus,
}

/// Identity of a balance row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BalanceKey {
    /// The product.
    pub product_id: ProductId,
    /// Where it is held.
    pub location: StockLocation,
}

/// A signed quantity change for one balance row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDelta {
    /// The row to change.
    pub key: BalanceKey,
    /// Signed change in on-hand quantity.
    #[serde(with = "rust_decimal::serde::str")]
    pub delta: Decimal,
}

/// On-hand, reserved and available quantity of a product at a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryBalance {
    /// The owning tenant.
    pub tenant_id: TenantId,
    /// Row identity.
    pub key: BalanceKey,
    /// Physically on hand.
    #[serde(with = "rust_decimal::serde::str")]
    pub on_hand: Decimal,
    /// Held for open orders.
    #[serde(with = "rust_decimal::serde::str")]
    pub reserved: Decimal,
    /// `on_hand - reserved`.
    #[serde(with = "rust_decimal::serde::str")]
    pub available: Decimal,
}

/// Links a costed movement to the entry that carries its cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryPostingLink {
    /// The link ID.
    pub id: InventoryPostingLinkId,
    /// The owning tenant.
    pub tenant_id: TenantId,
    /// The posted transaction set.
    pub transaction_set_id: TransactionSetId,
    /// The cost entry.
    pub journal_entry_id: JournalEntryId,
    /// The costed movement.
    pub movement_id: MovementId,
}

/// Product master data the engine needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// The product ID.
    pub id: ProductId,
    /// The owning tenant.
    pub tenant_id: TenantId,
    /// Stock keeping unit.
    pub sku: String,
    /// Standard unit cost, if maintained.
    #[serde(with = "rust_decimal::serde::str_option")]
    pub standard_cost: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(MovementType::Receipt, "receipt", true)]
    #[case(MovementType::Issue, "issue", false)]
    #[case(MovementType::Transfer, "transfer", false)]
    #[case(MovementType::Adjustment, "adjustment", true)]
    fn test_movement_type(
        #[case] movement_type: MovementType,
        #[case] name: &str,
        #[case] standard_cost: bool,
    ) {
        assert_eq!(movement_type.as_str(), name);
        assert_eq!(MovementType::parse(name), Some(movement_type));
        assert_eq!(movement_type.uses_standard_cost(), standard_cost);
    }

    #[test]
    fn test_unknown_movement_type() {
        assert_eq!(MovementType::parse("scrap"), None);
    }

    #[test]
    fn test_stock_location_constructors() {
        let warehouse = WarehouseId::new();
        let location = LocationId::new();
        assert_eq!(StockLocation::warehouse(warehouse).location_id, None);
        assert_eq!(
            StockLocation::at(warehouse, location).location_id,
            Some(location)
        );
    }
}
