//! Shared types, errors, and configuration for Tally.
//!
//! This crate provides common building blocks used across all other crates:
//! - Typed IDs for type-safe entity references
//! - The exact-decimal numeric policy used for amounts and quantities
//! - The error taxonomy shared by the posting engine and its stores
//! - Configuration management
//! - Tracing subscriber setup

pub mod config;
pub mod error;
pub mod telemetry;
pub mod types;

pub use config::AppConfig;
pub use error::ErrorKind;
