//! Error types for Sternblitz domain rules

use thiserror::Error;

use crate::status::StatusError;

#[derive(Debug, Error)]
pub enum SternError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Status(#[from] StatusError),
}
