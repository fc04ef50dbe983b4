//! `SeaORM` entities, one module per table.

#![allow(missing_docs)]

pub mod accounts;
pub mod approvals;
pub mod audit_events;
pub mod document_links;
pub mod inventory_balances;
pub mod inventory_movements;
pub mod inventory_posting_links;
pub mod journal_entries;
pub mod journal_lines;
pub mod overrides;
pub mod posting_intent_lines;
pub mod posting_intents;
pub mod posting_runs;
pub mod products;
pub mod reversal_links;
pub mod sea_orm_active_enums;
pub mod transaction_sets;
pub mod validation_issues;
