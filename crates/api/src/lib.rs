// Test code patterns (expected in test modules):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Sternblitz API Library
//!
//! HTTP surface of the Sternblitz CRM backend: orders, referrals, Stripe
//! payment flows, invites and sign links.

pub mod auth;
pub mod config;
pub mod email;
pub mod error;
pub mod routes;
pub mod security;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
