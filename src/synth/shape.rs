//! Input shape synthesis: per entity, an all-required create shape and a
//! tri-state update shape, plus the decoded values that travel with them.

use crate::config::{FieldRule, TagConfig, ValueType};
use crate::introspect::FieldDescriptor;
use crate::optional::TriState;
use crate::store::Record;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

pub const INPUT_SUFFIX: &str = "Input";

pub fn create_shape_name(entity: &str) -> String {
    format!("Add{}{}", entity, INPUT_SUFFIX)
}

pub fn update_shape_name(entity: &str) -> String {
    format!("Update{}{}", entity, INPUT_SUFFIX)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Create,
    Update,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Wrapping {
    /// Caller must supply the field.
    Required,
    /// Field may be omitted, set to null, or set to a value independently.
    TriState,
}

#[derive(Clone, Debug, Serialize)]
pub struct ShapeField {
    pub name: String,
    pub value_type: ValueType,
    /// Nullability of the underlying type; for tri-state fields this is what the
    /// wrapped value may hold.
    pub nullable: bool,
    pub wrapping: Wrapping,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub identifier: bool,
    #[serde(skip)]
    pub validation: Option<FieldRule>,
}

impl ShapeField {
    fn from_descriptor(d: &FieldDescriptor, wrapping: Wrapping) -> Self {
        ShapeField {
            name: d.name.clone(),
            value_type: d.value_type.clone(),
            nullable: d.nullable,
            wrapping,
            identifier: false,
            validation: d.validation.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Shape {
    pub name: String,
    pub kind: ShapeKind,
    pub entity: String,
    pub fields: Vec<ShapeField>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<TagConfig>,
}

impl Shape {
    pub fn field(&self, name: &str) -> Option<&ShapeField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn identifier(&self) -> Option<&ShapeField> {
        self.fields.iter().find(|f| f.identifier)
    }
}

/// `Add{E}Input`: one required field per mutable field; entity-level tags carried over.
pub fn synthesize_create(entity: &str, tags: &[TagConfig], fields: &[FieldDescriptor]) -> Shape {
    Shape {
        name: create_shape_name(entity),
        kind: ShapeKind::Create,
        entity: entity.to_string(),
        fields: fields
            .iter()
            .map(|d| ShapeField::from_descriptor(d, Wrapping::Required))
            .collect(),
        tags: tags.to_vec(),
    }
}

/// `Update{E}Input`: the required identifier followed by one tri-state field per
/// mutable field.
pub fn synthesize_update(entity: &str, identifier: &FieldDescriptor, fields: &[FieldDescriptor]) -> Shape {
    let mut id = ShapeField::from_descriptor(identifier, Wrapping::Required);
    id.identifier = true;
    id.nullable = false;
    let mut shape_fields = Vec::with_capacity(fields.len() + 1);
    shape_fields.push(id);
    shape_fields.extend(
        fields
            .iter()
            .map(|d| ShapeField::from_descriptor(d, Wrapping::TriState)),
    );
    Shape {
        name: update_shape_name(entity),
        kind: ShapeKind::Update,
        entity: entity.to_string(),
        fields: shape_fields,
        tags: Vec::new(),
    }
}

/// Decoded create-shape payload: every field present.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CreateInput {
    pub values: Record,
}

/// Decoded update-shape payload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateInput {
    pub id: Value,
    pub changes: BTreeMap<String, TriState<Value>>,
}

impl UpdateInput {
    pub fn new(id: impl Into<Value>) -> Self {
        UpdateInput {
            id: id.into(),
            changes: BTreeMap::new(),
        }
    }

    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.changes.insert(field.to_string(), TriState::value(value.into()));
        self
    }

    pub fn clear(mut self, field: &str) -> Self {
        self.changes.insert(field.to_string(), TriState::null());
        self
    }
}
