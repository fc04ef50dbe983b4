//! Common types used across the application.

pub mod amount;
pub mod id;

pub use amount::{AMOUNT_SCALE, EPSILON, approx_eq, extend, normalize};
pub use id::*;
