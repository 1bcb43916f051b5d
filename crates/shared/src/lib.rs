// Test code patterns (expected in test modules):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Sternblitz Shared Types and Utilities
//!
//! Domain enums, pricing and status rules, the order row model and database
//! helpers shared by the billing and api crates.

pub mod contact;
pub mod db;
pub mod error;
pub mod order;
pub mod pricing;
pub mod status;
pub mod types;

pub use contact::{non_blank, normalize_email};
pub use db::*;
pub use error::*;
pub use order::{Order, ORDER_COLUMNS};
pub use pricing::{charge_amount, compute_final, PricingConfig};
pub use status::{normalize_status, OrderStatus, StatusError, LEGACY_STATUS_RULES};
pub use types::*;
