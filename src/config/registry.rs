//! Resolved entity registry: manifest validated and flattened for synthesis.

use crate::config::{FieldAccess, TagConfig, ValidationRule};
use crate::error::SynthesisError;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Identifier type, used to parse encoded ids and to pick auto-assignment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PkType {
    Uuid,
    BigInt,
    Int,
    Text,
}

impl PkType {
    pub fn value_type(&self) -> ValueType {
        match self {
            PkType::Uuid => ValueType::Uuid,
            PkType::BigInt => ValueType::Int64,
            PkType::Int => ValueType::Int32,
            PkType::Text => ValueType::String,
        }
    }
}

/// Underlying type of a field, with any may-be-absent wrapper already stripped.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "of", rename_all = "snake_case")]
pub enum ValueType {
    Bool,
    Int32,
    Int64,
    Float64,
    String,
    Date,
    DateTime,
    Uuid,
    Enum(String),
    Entity(String),
    List(Box<ValueType>),
}

impl ValueType {
    /// Value types can only hold null through the `?` wrapper; reference types
    /// through the nullability annotation.
    pub fn is_value_type(&self) -> bool {
        !matches!(self, ValueType::String | ValueType::Entity(_) | ValueType::List(_))
    }

    pub fn builtin(name: &str) -> Option<ValueType> {
        Some(match name {
            "bool" => ValueType::Bool,
            "i32" => ValueType::Int32,
            "i64" => ValueType::Int64,
            "f64" => ValueType::Float64,
            "string" => ValueType::String,
            "date" => ValueType::Date,
            "datetime" => ValueType::DateTime,
            "uuid" => ValueType::Uuid,
            _ => return None,
        })
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Bool => f.write_str("bool"),
            ValueType::Int32 => f.write_str("i32"),
            ValueType::Int64 => f.write_str("i64"),
            ValueType::Float64 => f.write_str("f64"),
            ValueType::String => f.write_str("string"),
            ValueType::Date => f.write_str("date"),
            ValueType::DateTime => f.write_str("datetime"),
            ValueType::Uuid => f.write_str("uuid"),
            ValueType::Enum(n) | ValueType::Entity(n) => f.write_str(n),
            ValueType::List(inner) => write!(f, "[{}]", inner),
        }
    }
}

/// One declared field as written in the manifest, type expression parsed.
#[derive(Clone, Debug)]
pub struct FieldDefinition {
    pub name: String,
    pub value_type: ValueType,
    /// Declared with the `?` wrapper.
    pub wrapped: bool,
    /// Declared with `nullable: true`.
    pub annotated_nullable: bool,
    pub access: FieldAccess,
    pub tags: Vec<TagConfig>,
    pub validation: Option<FieldRule>,
}

/// A field's validation rule, with its `pattern` compiled once at resolve time.
#[derive(Clone, Debug)]
pub struct FieldRule {
    pub rule: ValidationRule,
    pub pattern: Option<Regex>,
}

impl FieldRule {
    pub fn compile(rule: &ValidationRule, field: &str) -> Result<Self, SynthesisError> {
        let pattern = rule
            .pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| SynthesisError::InvalidRule {
                field: field.to_string(),
                reason: e.to_string(),
            })?;
        Ok(FieldRule {
            rule: rule.clone(),
            pattern,
        })
    }
}

impl PartialEq for FieldRule {
    fn eq(&self, other: &Self) -> bool {
        self.rule == other.rule
            && self.pattern.as_ref().map(Regex::as_str) == other.pattern.as_ref().map(Regex::as_str)
    }
}

#[derive(Clone, Debug)]
pub struct BaseDefinition {
    pub name: String,
    pub identifier: String,
    pub pk_type: PkType,
    pub fields: Vec<FieldDefinition>,
}

impl BaseDefinition {
    pub fn declares(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f.name == field)
    }
}

#[derive(Clone, Debug)]
pub struct EntityDefinition {
    pub name: String,
    /// Inherited (outermost ancestor first) then own fields. Base marker fields excluded.
    pub fields: Vec<FieldDefinition>,
    pub tags: Vec<TagConfig>,
}

impl EntityDefinition {
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Immutable snapshot of discovered entities, in manifest order.
#[derive(Clone, Debug)]
pub struct EntityRegistry {
    pub base: BaseDefinition,
    pub enums: HashMap<String, Vec<String>>,
    entities: Vec<Arc<EntityDefinition>>,
    by_name: HashMap<String, usize>,
}

impl EntityRegistry {
    pub fn new(
        base: BaseDefinition,
        enums: HashMap<String, Vec<String>>,
        entities: Vec<EntityDefinition>,
    ) -> Self {
        let by_name = entities
            .iter()
            .enumerate()
            .map(|(i, e)| (e.name.clone(), i))
            .collect();
        EntityRegistry {
            base,
            enums,
            entities: entities.into_iter().map(Arc::new).collect(),
            by_name,
        }
    }

    pub fn enumerate(&self) -> impl Iterator<Item = &Arc<EntityDefinition>> {
        self.entities.iter()
    }

    pub fn entity(&self, name: &str) -> Option<&Arc<EntityDefinition>> {
        self.by_name.get(name).map(|&i| &self.entities[i])
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn identifier(&self) -> &str {
        &self.base.identifier
    }

    pub fn enum_values(&self, name: &str) -> Option<&[String]> {
        self.enums.get(name).map(Vec::as_slice)
    }
}
