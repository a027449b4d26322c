//! Load the model manifest from disk and resolve it into an immutable registry.

use crate::config::registry::{
    BaseDefinition, EntityDefinition, EntityRegistry, FieldDefinition, FieldRule, PkType, ValueType,
};
use crate::config::types::*;
use crate::config::validate;
use crate::error::SynthesisError;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Build the registry from a manifest (validates first).
pub fn resolve(config: &ModelConfig) -> Result<EntityRegistry, SynthesisError> {
    validate(config)?;

    let enum_names: HashSet<&str> = config.enums.iter().map(|e| e.name.as_str()).collect();
    let entities_by_name: HashMap<&str, &EntityConfig> =
        config.entities.iter().map(|e| (e.name.as_str(), e)).collect();
    let mut chains: HashMap<&str, Vec<&EntityConfig>> = HashMap::new();
    for ent in &config.entities {
        match ancestry(ent, &entities_by_name, &config.base.name) {
            Some(chain) => {
                chains.insert(ent.name.as_str(), chain);
            }
            None => tracing::debug!(
                entity = %ent.name,
                base = %config.base.name,
                "does not reach the base marker, skipped"
            ),
        }
    }
    let entity_names: HashSet<&str> = chains.keys().copied().collect();
    let types = TypeScope {
        enums: &enum_names,
        entities: &entity_names,
    };

    let base = resolve_base(&config.base, &types)?;

    let mut entities = Vec::new();
    for ent in &config.entities {
        let Some(chain) = chains.get(ent.name.as_str()) else {
            continue;
        };
        if ent.abstract_ {
            tracing::debug!(entity = %ent.name, "abstract definition, not registered");
            continue;
        }
        let mut fields = Vec::new();
        let mut names = HashSet::new();
        for def in chain.iter().rev() {
            for f in &def.fields {
                if !names.insert(f.name.clone()) {
                    return Err(SynthesisError::Duplicate {
                        kind: "field",
                        name: format!("{}.{} (inherited from {})", ent.name, f.name, def.name),
                    });
                }
                fields.push(resolve_field(f, &def.name, &types)?);
            }
        }
        entities.push(EntityDefinition {
            name: ent.name.clone(),
            fields,
            tags: ent.tags.clone(),
        });
    }

    let enums = config
        .enums
        .iter()
        .map(|e| (e.name.clone(), e.values.clone()))
        .collect();
    tracing::debug!(entities = entities.len(), base = %base.name, "registry resolved");
    Ok(EntityRegistry::new(base, enums, entities))
}

/// Read a JSON manifest from `path`.
pub async fn load_from_path(path: impl AsRef<Path>) -> Result<ModelConfig, SynthesisError> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SynthesisError::Load(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&text).map_err(|e| SynthesisError::Load(format!("{}: {}", path.display(), e)))
}

struct TypeScope<'a> {
    enums: &'a HashSet<&'a str>,
    entities: &'a HashSet<&'a str>,
}

/// The entity itself followed by each non-base ancestor, or `None` when the
/// chain never reaches the base marker. Validation rules out cycles.
fn ancestry<'a>(
    ent: &'a EntityConfig,
    by_name: &HashMap<&str, &'a EntityConfig>,
    base: &str,
) -> Option<Vec<&'a EntityConfig>> {
    let mut chain = vec![ent];
    let mut parent = ent.extends.as_deref().unwrap_or(base);
    while parent != base {
        let p = *by_name.get(parent)?;
        chain.push(p);
        parent = p.extends.as_deref().unwrap_or(base);
    }
    Some(chain)
}

fn resolve_base(base: &BaseConfig, types: &TypeScope<'_>) -> Result<BaseDefinition, SynthesisError> {
    let fields = base
        .fields
        .iter()
        .map(|f| resolve_field(f, &base.name, types))
        .collect::<Result<Vec<_>, _>>()?;
    let id = fields
        .iter()
        .find(|f| f.name == base.identifier)
        .ok_or_else(|| SynthesisError::MissingIdentifier {
            base: base.name.clone(),
            field: base.identifier.clone(),
        })?;
    let pk_type = infer_pk_type(id)?;
    Ok(BaseDefinition {
        name: base.name.clone(),
        identifier: base.identifier.clone(),
        pk_type,
        fields,
    })
}

fn infer_pk_type(field: &FieldDefinition) -> Result<PkType, SynthesisError> {
    let unsupported = || SynthesisError::UnsupportedIdentifier {
        field: field.name.clone(),
        type_name: field.value_type.to_string(),
    };
    if field.wrapped || field.annotated_nullable || !field.access.writable() || !field.access.readable() {
        return Err(unsupported());
    }
    match field.value_type {
        ValueType::Int64 => Ok(PkType::BigInt),
        ValueType::Int32 => Ok(PkType::Int),
        ValueType::Uuid => Ok(PkType::Uuid),
        ValueType::String => Ok(PkType::Text),
        _ => Err(unsupported()),
    }
}

fn resolve_field(
    f: &FieldConfig,
    owner: &str,
    types: &TypeScope<'_>,
) -> Result<FieldDefinition, SynthesisError> {
    let path = format!("{}.{}", owner, f.name);
    let (value_type, wrapped) = parse_type_expr(&f.type_, &path, types)?;
    let validation = f
        .validation
        .as_ref()
        .map(|rule| FieldRule::compile(rule, &path))
        .transpose()?;
    Ok(FieldDefinition {
        name: f.name.clone(),
        value_type,
        wrapped,
        annotated_nullable: f.nullable,
        access: f.access.clone(),
        tags: f.tags.clone(),
        validation,
    })
}

/// Parse `T`, `T?`, `[T]` or `[T]?`. Returns the underlying type and whether the
/// `?` wrapper was present.
fn parse_type_expr(
    expr: &str,
    owner: &str,
    types: &TypeScope<'_>,
) -> Result<(ValueType, bool), SynthesisError> {
    let invalid = || SynthesisError::InvalidType {
        expr: expr.to_string(),
        owner: owner.to_string(),
    };
    let trimmed = expr.trim();
    let (body, wrapped) = match trimmed.strip_suffix('?') {
        Some(b) => (b.trim(), true),
        None => (trimmed, false),
    };
    if let Some(inner) = body.strip_prefix('[') {
        let inner = inner.strip_suffix(']').ok_or_else(invalid)?.trim();
        if inner.ends_with('?') || inner.starts_with('[') {
            return Err(invalid());
        }
        let element = named_type(inner, owner, types)?;
        return Ok((ValueType::List(Box::new(element)), wrapped));
    }
    if body.is_empty() || body.contains(['[', ']', '?']) {
        return Err(invalid());
    }
    Ok((named_type(body, owner, types)?, wrapped))
}

fn named_type(name: &str, owner: &str, types: &TypeScope<'_>) -> Result<ValueType, SynthesisError> {
    if let Some(t) = ValueType::builtin(name) {
        return Ok(t);
    }
    if types.enums.contains(name) {
        return Ok(ValueType::Enum(name.to_string()));
    }
    if types.entities.contains(name) {
        return Ok(ValueType::Entity(name.to_string()));
    }
    Err(SynthesisError::MissingReference {
        kind: "type",
        name: name.to_string(),
        from: owner.to_string(),
    })
}
