//! Model and field metadata.
//!
//! The proxy only consumes a narrow slice of a model definition: field names,
//! whether a field is persisted or indexed, how date fields are rendered, and
//! whether identifiers are assigned by the caller or by the store.
//!
//! # Example
//!
//! ```rust
//! use photondb_proxy::model::{Field, FieldType, IdentifierStrategy, Model};
//!
//! let model = Model::new("App.model.User")
//!     .with_field(Field::new("id").of_type(FieldType::Int))
//!     .with_field(Field::new("email").indexed())
//!     .with_field(Field::new("selected").transient())
//!     .with_identifier(IdentifierStrategy::Unique);
//!
//! assert_eq!(model.collection_name(), "User");
//! assert!(model.identifier.is_unique());
//! ```

pub mod record;

pub use record::Record;

use serde::{Deserialize, Serialize};

/// Declared type of a model field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Auto,
    String,
    Int,
    Float,
    Boolean,
    Date,
}

/// Field metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(default, rename = "type")]
    pub field_type: FieldType,
    /// Non-persistent fields never reach the store.
    #[serde(default = "default_persist")]
    pub persist: bool,
    /// Request a secondary index on this field.
    #[serde(default)]
    pub index: bool,
    /// chrono format string used when a date field is written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_format: Option<String>,
}

fn default_persist() -> bool {
    true
}

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::Auto,
            persist: true,
            index: false,
            date_format: None,
        }
    }

    pub fn of_type(mut self, field_type: FieldType) -> Self {
        self.field_type = field_type;
        self
    }

    /// Mark the field as client-side only.
    pub fn transient(mut self) -> Self {
        self.persist = false;
        self
    }

    pub fn indexed(mut self) -> Self {
        self.index = true;
        self
    }

    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = Some(format.into());
        self
    }

    pub fn is_date(&self) -> bool {
        self.field_type == FieldType::Date
    }
}

/// Who assigns record identifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierStrategy {
    /// The store assigns identifiers after creation.
    #[default]
    Sequential,
    /// The caller assigns identifiers; they are persisted and round-tripped.
    Unique,
}

impl IdentifierStrategy {
    pub fn is_unique(&self) -> bool {
        matches!(self, IdentifierStrategy::Unique)
    }
}

/// Model definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Fully qualified model name, e.g. `App.model.User`.
    pub name: String,
    #[serde(default = "default_id_property")]
    pub id_property: String,
    #[serde(default)]
    pub identifier: IdentifierStrategy,
    #[serde(default)]
    pub fields: Vec<Field>,
}

fn default_id_property() -> String {
    "id".to_string()
}

impl Model {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id_property: default_id_property(),
            identifier: IdentifierStrategy::default(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_id_property(mut self, id_property: impl Into<String>) -> Self {
        self.id_property = id_property.into();
        self
    }

    pub fn with_identifier(mut self, identifier: IdentifierStrategy) -> Self {
        self.identifier = identifier;
        self
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Collection derived from the last segment of the model name.
    pub fn collection_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// Give every date field without an explicit format the default one.
    pub fn apply_date_format(&mut self, default_format: &str) {
        for field in self.fields.iter_mut().filter(|f| f.is_date()) {
            if field.date_format.is_none() {
                field.date_format = Some(default_format.to_string());
            }
        }
    }
}
