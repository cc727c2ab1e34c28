//! Error types for the student store and its data source.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("data source unavailable: {0}")]
    Unavailable(String),

    #[error("data source returned malformed data: {0}")]
    Malformed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("student not found: {0}")]
    NotFound(Uuid),

    #[error("invalid student record: {0}")]
    Invalid(ValidationErrors),

    #[error("failed to sync student {id}: {message}")]
    SyncFailed { id: Uuid, message: String },

    #[error(transparent)]
    Source(#[from] SourceError),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// A single rejected field on a student record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

/// All field failures found on one record, reported together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn push(&mut self, field: &'static str, message: &'static str) {
        self.0.push(FieldError { field, message });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    pub fn has(&self, field: &str) -> bool {
        self.0.iter().any(|error| error.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|error| format!("{}: {}", error.field, error.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
