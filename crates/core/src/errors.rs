//! Core error types for the Elly application.
//!
//! This module defines storage- and transport-agnostic error types. Adapter
//! crates (HTTP clients, repositories) convert their own failures into these.

use chrono::ParseError as ChronoParseError;
use thiserror::Error;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the aggregation pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// Unknown bank code or missing base configuration. Fatal for a run.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Non-2xx or transport failure from a bank collaborator.
    #[error("External service error: {0}")]
    ExternalService(#[from] ExternalServiceError),

    #[error("Input validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Failure reported by (or while talking to) a remote bank API.
#[derive(Error, Debug, Clone)]
#[error("{service} failed{}: {message}", .status.map(|s| format!(" with HTTP {}", s)).unwrap_or_default())]
pub struct ExternalServiceError {
    /// Logical operation, e.g. `bank-token`, `accounts`, `transactions`.
    pub service: String,
    /// HTTP status when the remote answered at all.
    pub status: Option<u16>,
    pub message: String,
}

impl ExternalServiceError {
    pub fn new(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// Validation errors for user input and data parsing.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Required field '{0}' is missing")]
    MissingField(String),

    #[error("Failed to parse decimal number: {0}")]
    DecimalParse(#[from] rust_decimal::Error),

    #[error("Failed to parse date/time: {0}")]
    DateTimeParse(#[from] ChronoParseError),
}

/// Business-rule failures surfaced to the caller of a specific operation.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Missing consent: {0}")]
    MissingConsent(String),

    #[error("Reserve account not found: {0}")]
    ReserveNotFound(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Invalid onboarding transition: {0}")]
    InvalidTransition(String),
}

// === From implementations for common error types ===

impl From<rust_decimal::Error> for Error {
    fn from(err: rust_decimal::Error) -> Self {
        Error::Validation(ValidationError::DecimalParse(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Validation(ValidationError::InvalidInput(err.to_string()))
    }
}

impl From<ChronoParseError> for Error {
    fn from(err: ChronoParseError) -> Self {
        Error::Validation(ValidationError::DateTimeParse(err))
    }
}

impl From<Error> for String {
    fn from(err: Error) -> Self {
        err.to_string()
    }
}
