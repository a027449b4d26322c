//! Field introspection: turns declared fields into descriptors with a single
//! resolved nullability flag.

use crate::config::{BaseDefinition, EntityDefinition, FieldDefinition, FieldRule, TagConfig, ValueType};
use serde::Serialize;

/// (name, underlying type, nullability, accessibility) for one field.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub value_type: ValueType,
    pub nullable: bool,
    pub readable: bool,
    pub writable: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<TagConfig>,
    #[serde(skip)]
    pub validation: Option<FieldRule>,
}

impl FieldDescriptor {
    pub fn is_mutable(&self) -> bool {
        self.readable && self.writable
    }
}

/// A field accepts null if it is a value type declared with the `?` wrapper, or a
/// reference type annotated nullable (`nullable: true` or `?`). Either suffices.
pub fn resolve_nullability(def: &FieldDefinition) -> bool {
    let value_type = def.value_type.is_value_type();
    let wrapped_value = value_type && def.wrapped;
    let annotated_reference = !value_type && (def.annotated_nullable || def.wrapped);
    wrapped_value || annotated_reference
}

pub fn describe_field(def: &FieldDefinition) -> FieldDescriptor {
    FieldDescriptor {
        name: def.name.clone(),
        value_type: def.value_type.clone(),
        nullable: resolve_nullability(def),
        readable: def.access.readable(),
        writable: def.access.writable(),
        tags: def.tags.clone(),
        validation: def.validation.clone(),
    }
}

/// Mutable (readable and writable) fields of `entity` in declaration order,
/// excluding anything declared on the base marker.
pub fn describe(entity: &EntityDefinition, base: &BaseDefinition) -> Vec<FieldDescriptor> {
    entity
        .fields
        .iter()
        .filter(|f| !base.declares(&f.name))
        .map(describe_field)
        .filter(FieldDescriptor::is_mutable)
        .collect()
}

/// Mutable fields of the base marker itself (the identifier and any shared fields).
pub fn describe_base(base: &BaseDefinition) -> Vec<FieldDescriptor> {
    base.fields
        .iter()
        .map(describe_field)
        .filter(FieldDescriptor::is_mutable)
        .collect()
}

/// Every field of the entity, base marker first, regardless of accessibility.
pub fn describe_all(entity: &EntityDefinition, base: &BaseDefinition) -> Vec<FieldDescriptor> {
    base.fields
        .iter()
        .chain(entity.fields.iter().filter(|f| !base.declares(&f.name)))
        .map(describe_field)
        .collect()
}
