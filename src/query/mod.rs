//! Subscription query language
//!
//! Parsing and validation for the query documents subscribers register
//! with. Admission runs both stages before the registry stores anything.
//!
//! # Pipeline
//!
//! ```text
//!   query text
//!       │
//!       ▼
//!   parser::parse ──────► SyntaxError        (first error, short-circuit)
//!       │
//!       ▼
//!   validate::validate ─► Vec<SchemaViolation> (all errors, collected)
//!       │
//!       ▼
//!   validate::extract_fields ─► ordered top-level field names
//! ```
//!
//! The parser admits documents syntactically; the validator admits them
//! against a [`Schema`](crate::schema::Schema). Field extraction feeds the
//! registry's field matcher.

pub mod ast;
pub mod parser;
pub mod validate;

pub use ast::{Argument, Document, FieldNode, Operation, Pos, Value, VariableDefinition};
pub use parser::{parse, SyntaxError, MAX_NESTING_DEPTH};
pub use validate::{extract_fields, validate, SchemaViolation};
