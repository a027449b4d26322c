//! Raw model manifest types matching the JSON layout (base marker, enums, entities).

use serde::{Deserialize, Serialize};

/// The root marker every registered entity descends from. Its fields (the identifier
/// at minimum) are inherited by all entities but never part of their input shapes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BaseConfig {
    pub name: String,
    /// Name of the identifier field among `fields`.
    #[serde(default = "default_identifier")]
    pub identifier: String,
    pub fields: Vec<FieldConfig>,
}

fn default_identifier() -> String {
    "id".into()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnumConfig {
    pub name: String,
    pub values: Vec<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldAccess {
    #[default]
    ReadWrite,
    ReadOnly,
    WriteOnly,
    Private,
}

impl FieldAccess {
    pub fn readable(&self) -> bool {
        matches!(self, FieldAccess::ReadWrite | FieldAccess::ReadOnly)
    }

    pub fn writable(&self) -> bool {
        matches!(self, FieldAccess::ReadWrite | FieldAccess::WriteOnly)
    }
}

/// Declarative metadata attached to an entity or field, e.g. `"filtering"` on a
/// sub-collection so it stays independently queryable.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagConfig {
    Filtering,
    Sorting,
    Projection,
    Paging,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    /// Type expression: `i32`, `i32?`, `string`, `[OtherThing]`, an enum or entity name.
    #[serde(rename = "type")]
    pub type_: String,
    /// Nullability annotation. Only meaningful for reference types; value types
    /// opt into null through the `?` wrapper.
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub access: FieldAccess,
    #[serde(default)]
    pub tags: Vec<TagConfig>,
    #[serde(default)]
    pub validation: Option<ValidationRule>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityConfig {
    pub name: String,
    /// Parent definition; the base marker when omitted.
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default, rename = "abstract")]
    pub abstract_: bool,
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
    #[serde(default)]
    pub tags: Vec<TagConfig>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Whole manifest in one struct for in-memory loading.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelConfig {
    pub base: BaseConfig,
    #[serde(default)]
    pub enums: Vec<EnumConfig>,
    #[serde(default)]
    pub entities: Vec<EntityConfig>,
}
