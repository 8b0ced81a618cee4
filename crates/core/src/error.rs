//! Core error types

use thiserror::Error;

/// Errors for core type validation and conversion
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid phone number: {0}")]
    InvalidPhone(String),

    #[error("Invalid postal code: {0}")]
    InvalidPostalCode(String),

    #[error("Illegal status transition: {from} -> {to}")]
    IllegalTransition { from: String, to: String },

    #[error("Invalid job number: {0}")]
    InvalidJobNumber(String),

    #[error("Invalid audio format: {0}")]
    InvalidAudio(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
