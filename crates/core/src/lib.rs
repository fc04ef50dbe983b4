//! Ledger posting engine for Tally.
//!
//! This crate turns reviewed transaction sets into balanced, immutable journal
//! entries. It has ZERO web or database dependencies: storage is reached
//! through the [`store::LedgerStore`] and [`store::JournalWriter`] traits and
//! audit events through [`audit::AuditSink`].
//!
//! # Modules
//!
//! - `ledger` - Transaction sets, gates, posting runs and journal entries
//! - `inventory` - Movements, balances and cost journalization
//! - `engine` - The posting engine coordinating all of the above
//! - `store` - Storage seams
//! - `audit` - Audit trail emission
//! - `memory` - In-memory store for tests and embedding

pub mod audit;
pub mod engine;
pub mod inventory;
pub mod ledger;
pub mod memory;
pub mod store;

pub use engine::{
    CostJournal, InventoryPostingOptions, InventoryPostingResult, PostingEngine, PostingResult,
    ReversalResult,
};
pub use ledger::PostingError;
