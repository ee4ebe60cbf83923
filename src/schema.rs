//! Schema of subscribable fields
//!
//! A schema names the object types a query may select and the arguments
//! each field accepts. Admission validates every incoming document against
//! it before the registry stores anything.

use std::collections::HashMap;
use std::fmt;

/// What a field resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Leaf value, no selection set allowed
    Scalar,
    /// Reference to another object type, selection set required
    Object(String),
}

/// A single field on an object type
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Field name as it appears in queries
    pub name: String,
    /// Scalar or object reference
    pub kind: FieldKind,
    /// Declared argument names
    pub arguments: Vec<String>,
}

impl FieldDef {
    /// Define a scalar field
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Scalar,
            arguments: Vec::new(),
        }
    }

    /// Define a field referencing another object type
    pub fn object(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Object(type_name.into()),
            arguments: Vec::new(),
        }
    }

    /// Declare an argument name on this field
    pub fn argument(mut self, name: impl Into<String>) -> Self {
        self.arguments.push(name.into());
        self
    }

    /// Whether the field declares the given argument
    pub fn has_argument(&self, name: &str) -> bool {
        self.arguments.iter().any(|a| a == name)
    }
}

/// A named object type with its fields
#[derive(Debug, Clone)]
pub struct ObjectType {
    /// Type name
    pub name: String,
    fields: HashMap<String, FieldDef>,
}

impl ObjectType {
    /// Create an empty object type
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: HashMap::new(),
        }
    }

    /// Add a field definition
    pub fn field(mut self, def: FieldDef) -> Self {
        self.fields.insert(def.name.clone(), def);
        self
    }

    /// Look up a field by name
    pub fn field_def(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    /// Iterate over the field definitions
    pub fn fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.values()
    }
}

/// Validated schema: object types plus the subscription root
#[derive(Debug, Clone)]
pub struct Schema {
    types: HashMap<String, ObjectType>,
    subscription: ObjectType,
}

impl Schema {
    /// Start building a schema
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// The subscription root type
    pub fn subscription_root(&self) -> &ObjectType {
        &self.subscription
    }

    /// Look up an object type by name
    pub fn object_type(&self, name: &str) -> Option<&ObjectType> {
        self.types.get(name)
    }
}

/// Builder for `Schema`
///
/// `build()` verifies that every object-typed field references a type that
/// was registered, so a `Schema` never contains dangling references.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    types: Vec<ObjectType>,
    subscription: Option<ObjectType>,
}

impl SchemaBuilder {
    /// Register an object type
    pub fn object(mut self, ty: ObjectType) -> Self {
        self.types.push(ty);
        self
    }

    /// Set the subscription root type
    pub fn subscription(mut self, ty: ObjectType) -> Self {
        self.subscription = Some(ty);
        self
    }

    /// Validate references and produce the schema
    pub fn build(self) -> Result<Schema, SchemaError> {
        let subscription = self.subscription.ok_or(SchemaError::MissingSubscriptionRoot)?;

        let mut types = HashMap::with_capacity(self.types.len());
        for ty in self.types {
            if types.contains_key(&ty.name) {
                return Err(SchemaError::DuplicateType(ty.name));
            }
            types.insert(ty.name.clone(), ty);
        }

        for ty in types.values().chain(std::iter::once(&subscription)) {
            for field in ty.fields() {
                if let FieldKind::Object(ref referenced) = field.kind {
                    if !types.contains_key(referenced) {
                        return Err(SchemaError::UnknownType {
                            object: ty.name.clone(),
                            field: field.name.clone(),
                            referenced: referenced.clone(),
                        });
                    }
                }
            }
        }

        Ok(Schema {
            types,
            subscription,
        })
    }
}

/// Error type for schema construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// No subscription root was set
    MissingSubscriptionRoot,
    /// Two object types registered under the same name
    DuplicateType(String),
    /// A field references a type that was never registered
    UnknownType {
        /// Type the offending field lives on
        object: String,
        /// Field carrying the dangling reference
        field: String,
        /// The missing type name
        referenced: String,
    },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::MissingSubscriptionRoot => {
                write!(f, "Schema has no subscription root type")
            }
            SchemaError::DuplicateType(name) => {
                write!(f, "Duplicate object type: {}", name)
            }
            SchemaError::UnknownType {
                object,
                field,
                referenced,
            } => write!(
                f,
                "Field {}.{} references unknown type {}",
                object, field, referenced
            ),
        }
    }
}

impl std::error::Error for SchemaError {}
