//! Inventory movement posting.
//!
//! - Movement, balance and link types
//! - Movement validation and balance arithmetic
//! - Cost journalization

pub mod balance;
pub mod costing;
pub mod types;

#[cfg(test)]
mod costing_props;

pub use balance::{apply_deltas, batch_deltas, movement_deltas, validate_movement};
pub use costing::{CostAccounts, CostLines, plan_cost_lines, unit_cost};
pub use types::{
    BalanceDelta, BalanceKey, InventoryBalance, InventoryMovement, InventoryPostingLink,
    MovementStatus, MovementType, Product, StockLocation,
};
