use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single field-level problem found while validating a request
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{field}: {message}")]
pub struct FieldError {
    /// Path of the offending field, e.g. `positions[2].shares`
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Every problem found in a rejected request
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{}", join_field_errors(.errors))]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    /// Whether any reported problem concerns `field` (matched on the last path segment)
    pub fn names_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| {
            e.field == field
                || e.field
                    .rsplit('.')
                    .next()
                    .is_some_and(|last| last == field)
        })
    }
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Fatal errors of an analysis
#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    /// A computed value broke an engine invariant; this is a defect, never corrected silently
    #[error("Internal invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Analysis task failed: {0}")]
    TaskFailed(String),
}

pub type HarvestResult<T> = Result<T, HarvestError>;

/// Failures of the price-quote collaborator
#[derive(Error, Debug)]
pub enum QuoteError {
    #[error("Quote unavailable for {0}")]
    Unavailable(String),

    #[error("Quote request timed out for {0}")]
    Timeout(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid quote: {0}")]
    InvalidQuote(String),
}

pub type QuoteResult<T> = Result<T, QuoteError>;

/// Failures of the generative replacement advisor
#[derive(Error, Debug)]
pub enum AdvisorError {
    #[error("Advisor not configured")]
    NotConfigured,

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Rejected suggestion: {0}")]
    Rejected(String),
}

pub type AdvisorResult<T> = Result<T, AdvisorError>;
