//! PostgreSQL implementations of the core storage and audit traits.
//!
//! [`SeaLedgerStore`] implements both `LedgerStore` and `JournalWriter`.
//! Every call runs in its own tenant-scoped transaction; writer methods
//! lock the rows they check before they write anything.

mod audit;
mod convert;
mod journal_writer;
mod ledger_store;

pub use audit::SeaAuditSink;
pub use ledger_store::SeaLedgerStore;
