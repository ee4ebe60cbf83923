//! Admission error types
//!
//! Error types for subscription admission. A rejected candidate reports
//! every failure that applies, so `add_subscription` returns a `Vec` of
//! these rather than a single error.

use crate::query::{SchemaViolation, SyntaxError};

/// Error type for subscription admission
#[derive(Debug, Clone, PartialEq)]
pub enum AdmissionError {
    /// Candidate has an empty ID
    MissingId,
    /// Candidate is not associated with a connection
    MissingConnection,
    /// Candidate query text is empty
    EmptyQuery,
    /// Candidate has no delivery callback
    MissingDeliverer,
    /// Query failed to parse
    Syntax(SyntaxError),
    /// Query failed schema validation
    Schema(SchemaViolation),
    /// The (connection, id) pair is already registered
    Duplicate {
        /// The subscription ID that collided
        id: String,
    },
    /// The connection reached its subscription cap
    SubscriptionLimit {
        /// The configured cap
        limit: usize,
    },
}

impl std::fmt::Display for AdmissionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdmissionError::MissingId => write!(f, "Subscription ID is empty"),
            AdmissionError::MissingConnection => {
                write!(f, "Subscription is not associated with a connection")
            }
            AdmissionError::EmptyQuery => write!(f, "Subscription query is empty"),
            AdmissionError::MissingDeliverer => {
                write!(f, "Subscription has no delivery callback")
            }
            AdmissionError::Syntax(err) => write!(f, "{}", err),
            AdmissionError::Schema(violation) => write!(f, "{}", violation),
            AdmissionError::Duplicate { id } => {
                write!(f, "Subscription '{}' is already registered", id)
            }
            AdmissionError::SubscriptionLimit { limit } => {
                write!(f, "Connection reached its subscription limit of {}", limit)
            }
        }
    }
}

impl std::error::Error for AdmissionError {}
