//! Admission pipeline
//!
//! Runs before the registry takes any lock: candidate shape checks first,
//! then parse, then schema validation, then field extraction. Shape
//! failures are collected and reported together; a parse failure is a
//! single error; validation failures are again reported together.

use crate::query::{extract_fields, parse, validate, Document};
use crate::schema::Schema;

use super::entry::Subscription;
use super::error::AdmissionError;

/// Check the candidate's shape, collecting every failure
pub(super) fn validate_candidate(candidate: &Subscription) -> Vec<AdmissionError> {
    let mut errors = Vec::new();

    if candidate.id.is_empty() {
        errors.push(AdmissionError::MissingId);
    }
    if candidate.connection.is_none() {
        errors.push(AdmissionError::MissingConnection);
    }
    if candidate.query.trim().is_empty() {
        errors.push(AdmissionError::EmptyQuery);
    }
    if candidate.deliver.is_none() {
        errors.push(AdmissionError::MissingDeliverer);
    }

    errors
}

/// Parse and validate a query, returning the document and its fields
pub(super) fn admit_query(
    query: &str,
    schema: &Schema,
) -> Result<(Document, Vec<String>), Vec<AdmissionError>> {
    let document = match parse(query) {
        Ok(document) => document,
        Err(err) => return Err(vec![AdmissionError::Syntax(err)]),
    };

    let violations = validate(&document, schema);
    if !violations.is_empty() {
        return Err(violations.into_iter().map(AdmissionError::Schema).collect());
    }

    let fields = extract_fields(&document);
    Ok((document, fields))
}
