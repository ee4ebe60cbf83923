//! Document validation against a schema
//!
//! Unlike parsing, validation does not short-circuit: every violation in the
//! document is collected and reported together.

use std::collections::HashSet;
use std::fmt;

use crate::schema::{FieldKind, ObjectType, Schema};

use super::ast::{Document, FieldNode, Pos};

/// A single rule violation found during validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// What rule was broken
    pub message: String,
    /// Where the offending node sits in the source
    pub pos: Pos,
}

impl SchemaViolation {
    fn new(message: String, pos: Pos) -> Self {
        Self { message, pos }
    }
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation error at {}: {}", self.pos, self.message)
    }
}

impl std::error::Error for SchemaViolation {}

/// Validate a document against a schema, collecting every violation
///
/// Checks, per document: anonymous operations must stand alone, operation
/// names must be unique. Per operation: variable definitions must be unique,
/// and the selection tree must match the schema (known fields, selection
/// sets only on object fields and always on object fields, declared
/// arguments, defined variables).
pub fn validate(document: &Document, schema: &Schema) -> Vec<SchemaViolation> {
    let mut violations = Vec::new();

    if document.operations.len() > 1 {
        for op in &document.operations {
            if op.name.is_none() {
                violations.push(SchemaViolation::new(
                    "Anonymous operation must be the only operation in the document".to_string(),
                    op.pos,
                ));
            }
        }
    }

    let mut seen_names = HashSet::new();
    for op in &document.operations {
        if let Some(ref name) = op.name {
            if !seen_names.insert(name.as_str()) {
                violations.push(SchemaViolation::new(
                    format!("Duplicate operation name '{}'", name),
                    op.pos,
                ));
            }
        }
    }

    for op in &document.operations {
        let mut declared: Vec<&str> = Vec::new();
        for def in &op.variable_definitions {
            if declared.contains(&def.name.as_str()) {
                violations.push(SchemaViolation::new(
                    format!("Duplicate variable definition '${}'", def.name),
                    def.pos,
                ));
            } else {
                declared.push(&def.name);
            }
        }

        check_selection_set(
            &op.selection_set,
            schema.subscription_root(),
            schema,
            &declared,
            &mut violations,
        );
    }

    violations
}

fn check_selection_set(
    fields: &[FieldNode],
    parent: &ObjectType,
    schema: &Schema,
    declared: &[&str],
    out: &mut Vec<SchemaViolation>,
) {
    for field in fields {
        let Some(def) = parent.field_def(&field.name) else {
            out.push(SchemaViolation::new(
                format!("Unknown field '{}' on type '{}'", field.name, parent.name),
                field.pos,
            ));
            continue;
        };

        for arg in &field.arguments {
            if !def.has_argument(&arg.name) {
                out.push(SchemaViolation::new(
                    format!("Unknown argument '{}' on field '{}'", arg.name, field.name),
                    arg.pos,
                ));
            }

            let mut vars = Vec::new();
            arg.value.collect_variables(&mut vars);
            for var in vars {
                if !declared.contains(&var) {
                    out.push(SchemaViolation::new(
                        format!("Variable '${}' is not defined", var),
                        arg.pos,
                    ));
                }
            }
        }

        match def.kind {
            FieldKind::Scalar => {
                if !field.selection_set.is_empty() {
                    out.push(SchemaViolation::new(
                        format!("Scalar field '{}' cannot have a selection set", field.name),
                        field.pos,
                    ));
                }
            }
            FieldKind::Object(ref type_name) => {
                if field.selection_set.is_empty() {
                    out.push(SchemaViolation::new(
                        format!(
                            "Field '{}' of type '{}' must have a selection set",
                            field.name, type_name
                        ),
                        field.pos,
                    ));
                } else if let Some(ty) = schema.object_type(type_name) {
                    // schema construction guarantees the type exists
                    check_selection_set(&field.selection_set, ty, schema, declared, out);
                }
            }
        }
    }
}

/// Extract the top-level field names a document subscribes to
///
/// Names are returned in source order, deduplicated on first occurrence.
/// Nested selections are never flattened into the result.
pub fn extract_fields(document: &Document) -> Vec<String> {
    let mut fields = Vec::new();
    for op in &document.operations {
        for selection in &op.selection_set {
            if !fields.contains(&selection.name) {
                fields.push(selection.name.clone());
            }
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::parse;
    use crate::schema::FieldDef;

    fn chat_schema() -> Schema {
        Schema::builder()
            .object(
                ObjectType::new("Message")
                    .field(FieldDef::scalar("body"))
                    .field(FieldDef::scalar("sender")),
            )
            .subscription(
                ObjectType::new("Subscription")
                    .field(FieldDef::object("messageAdded", "Message").argument("channel"))
                    .field(FieldDef::scalar("userCount")),
            )
            .build()
            .unwrap()
    }

    fn violations(query: &str) -> Vec<SchemaViolation> {
        validate(&parse(query).unwrap(), &chat_schema())
    }

    #[test]
    fn test_valid_document() {
        let found = violations(
            "subscription Msgs($channel) { messageAdded(channel: $channel) { body sender } userCount }",
        );
        assert!(found.is_empty(), "unexpected violations: {:?}", found);
    }

    #[test]
    fn test_anonymous_operation_must_stand_alone() {
        let found = violations("{ userCount } subscription A { userCount }");

        assert_eq!(found.len(), 1);
        assert!(found[0].message.contains("Anonymous operation"));

        // alone it is fine
        assert!(violations("{ userCount }").is_empty());
    }

    #[test]
    fn test_duplicate_operation_names() {
        let found = violations("subscription A { userCount } subscription A { userCount }");

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].message, "Duplicate operation name 'A'");
    }

    #[test]
    fn test_unknown_field() {
        let found = violations("{ nonsense }");

        assert_eq!(found.len(), 1);
        assert_eq!(
            found[0].message,
            "Unknown field 'nonsense' on type 'Subscription'"
        );

        let found = violations("{ messageAdded(channel: \"x\") { body bogus } }");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].message, "Unknown field 'bogus' on type 'Message'");
    }

    #[test]
    fn test_selection_set_on_scalar() {
        let found = violations("{ userCount { nested } }");

        assert_eq!(found.len(), 1);
        assert!(found[0]
            .message
            .contains("Scalar field 'userCount' cannot have a selection set"));
    }

    #[test]
    fn test_object_field_requires_selection_set() {
        let found = violations("{ messageAdded(channel: \"x\") }");

        assert_eq!(found.len(), 1);
        assert!(found[0].message.contains("must have a selection set"));
    }

    #[test]
    fn test_unknown_argument() {
        let found = violations("{ messageAdded(channel: \"x\", limit: 5) { body } }");

        assert_eq!(found.len(), 1);
        assert_eq!(
            found[0].message,
            "Unknown argument 'limit' on field 'messageAdded'"
        );
    }

    #[test]
    fn test_undefined_variable() {
        let found = violations("subscription { messageAdded(channel: $channel) { body } }");

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].message, "Variable '$channel' is not defined");
    }

    #[test]
    fn test_undefined_variable_nested_in_value() {
        let found = violations(
            "subscription Msgs($a) { messageAdded(channel: {list: [$a, $b]}) { body } }",
        );

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].message, "Variable '$b' is not defined");
    }

    #[test]
    fn test_duplicate_variable_definition() {
        let found =
            violations("subscription Msgs($channel $channel) { messageAdded(channel: $channel) { body } }");

        assert_eq!(found.len(), 1);
        assert_eq!(
            found[0].message,
            "Duplicate variable definition '$channel'"
        );
    }

    #[test]
    fn test_multiple_violations_collected() {
        let found = violations("{ nonsense userCount { x } messageAdded(bogus: $v) }");

        let messages: Vec<&str> = found.iter().map(|v| v.message.as_str()).collect();
        assert_eq!(messages.len(), 5);
        assert!(messages[0].contains("Unknown field 'nonsense'"));
        assert!(messages[1].contains("Scalar field 'userCount'"));
        assert!(messages[2].contains("Unknown argument 'bogus'"));
        assert!(messages[3].contains("Variable '$v' is not defined"));
        assert!(messages[4].contains("must have a selection set"));
    }

    #[test]
    fn test_extract_fields_dedup_and_order() {
        let doc = parse(
            "subscription A { messageAdded(channel: \"x\") { body } userCount } subscription B { userCount messageAdded(channel: \"y\") { sender } }",
        )
        .unwrap();

        assert_eq!(extract_fields(&doc), vec!["messageAdded", "userCount"]);
    }

    #[test]
    fn test_extract_fields_ignores_nested() {
        let doc = parse("{ messageAdded(channel: \"x\") { body sender } }").unwrap();

        assert_eq!(extract_fields(&doc), vec!["messageAdded"]);
    }
}
