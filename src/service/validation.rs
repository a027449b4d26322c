//! Request decoding and validation: JSON payloads into typed shape inputs, with
//! per-field rules from the manifest.

use crate::case::declared_key;
use crate::config::{EntityRegistry, FieldDefinition, FieldRule, PkType, ValueType};
use crate::error::AppError;
use crate::optional::TriState;
use crate::store::Record;
use crate::synth::{CreateInput, Shape, UpdateInput, Wrapping};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub struct RequestValidator;

impl RequestValidator {
    /// Decode a create-shape payload. Every field must be supplied; null only
    /// where the field is nullable.
    pub fn decode_create(
        shape: &Shape,
        registry: &EntityRegistry,
        body: &Value,
    ) -> Result<CreateInput, AppError> {
        let obj = as_object(shape, body)?;
        reject_unknown(shape, obj)?;
        let mut values = Record::new();
        for field in &shape.fields {
            let v = obj
                .get(&field.name)
                .map(|v| declared_value(v, &field.value_type, registry))
                .ok_or_else(|| AppError::Validation(format!("{} is required", field.name)))?;
            if v.is_null() {
                if !field.nullable {
                    return Err(AppError::Validation(format!("{} must not be null", field.name)));
                }
            } else {
                check_type(&field.name, &v, &field.value_type, registry)?;
                if let Some(rule) = &field.validation {
                    validate_field(&field.name, &v, rule)?;
                }
            }
            values.insert(field.name.clone(), v);
        }
        Ok(CreateInput { values })
    }

    /// Decode an update-shape payload. The identifier is required; every other
    /// field is absent, explicitly null, or a type-checked value. Nulls are
    /// left for the merge to judge.
    pub fn decode_update(
        shape: &Shape,
        registry: &EntityRegistry,
        pk_type: &PkType,
        body: &Value,
    ) -> Result<UpdateInput, AppError> {
        let obj = as_object(shape, body)?;
        reject_unknown(shape, obj)?;
        let mut id = Value::Null;
        let mut changes = BTreeMap::new();
        for field in &shape.fields {
            let supplied = obj.get(&field.name);
            match field.wrapping {
                Wrapping::Required => {
                    let v = supplied
                        .filter(|v| !v.is_null())
                        .ok_or_else(|| AppError::Validation(format!("{} is required", field.name)))?;
                    if field.identifier {
                        id = Self::decode_id(pk_type, v)?;
                    } else {
                        check_type(&field.name, v, &field.value_type, registry)?;
                    }
                }
                Wrapping::TriState => {
                    let state = match supplied {
                        None => TriState::Absent,
                        Some(v) => TriState::<Value>::deserialize(declared_value(v, &field.value_type, registry))
                            .map_err(|e| AppError::Validation(format!("{}: {}", field.name, e)))?,
                    };
                    if let TriState::Present(Some(v)) = &state {
                        check_type(&field.name, v, &field.value_type, registry)?;
                        if let Some(rule) = &field.validation {
                            validate_field(&field.name, v, rule)?;
                        }
                    }
                    changes.insert(field.name.clone(), state);
                }
            }
        }
        Ok(UpdateInput { id, changes })
    }

    /// Parse an encoded identifier. Accepts a JSON string or number and yields
    /// the canonical value for the identifier type.
    pub fn decode_id(pk_type: &PkType, raw: &Value) -> Result<Value, AppError> {
        let invalid = || AppError::Validation(format!("invalid identifier: {}", raw));
        match pk_type {
            PkType::BigInt | PkType::Int => {
                let n = match raw {
                    Value::Number(n) => n.as_i64(),
                    Value::String(s) => s.trim().parse::<i64>().ok(),
                    _ => None,
                }
                .ok_or_else(invalid)?;
                if *pk_type == PkType::Int && i32::try_from(n).is_err() {
                    return Err(invalid());
                }
                Ok(Value::from(n))
            }
            PkType::Uuid => {
                let s = raw.as_str().ok_or_else(invalid)?;
                let u = uuid::Uuid::parse_str(s.trim()).map_err(|_| invalid())?;
                Ok(Value::String(u.to_string()))
            }
            PkType::Text => match raw {
                Value::String(s) if !s.is_empty() => Ok(raw.clone()),
                Value::Number(n) => Ok(Value::String(n.to_string())),
                _ => Err(invalid()),
            },
        }
    }
}

fn as_object<'a>(shape: &Shape, body: &'a Value) -> Result<&'a Map<String, Value>, AppError> {
    body.as_object()
        .ok_or_else(|| AppError::Validation(format!("{} must be a JSON object", shape.name)))
}

fn reject_unknown(shape: &Shape, obj: &Map<String, Value>) -> Result<(), AppError> {
    match obj.keys().find(|k| shape.field(k).is_none()) {
        Some(k) => Err(AppError::Validation(format!("unknown field {} for {}", k, shape.name))),
        None => Ok(()),
    }
}

/// Declared fields of a nested entity value: base marker first.
fn nested_fields<'a>(registry: &'a EntityRegistry, entity: &str) -> Option<Vec<&'a FieldDefinition>> {
    let def = registry.entity(entity)?;
    Some(registry.base.fields.iter().chain(def.fields.iter()).collect())
}

/// Rename keys inside nested entity values (and lists of them) onto declared
/// field names, the same way top-level request keys are mapped.
pub fn declared_value(v: &Value, value_type: &ValueType, registry: &EntityRegistry) -> Value {
    match (value_type, v) {
        (ValueType::Entity(e), Value::Object(obj)) => {
            let Some(fields) = nested_fields(registry, e) else {
                return v.clone();
            };
            let mapped = obj
                .iter()
                .map(|(k, inner)| {
                    let key = declared_key(k, |name| fields.iter().any(|f| f.name == name));
                    let inner = match fields.iter().find(|f| f.name == key) {
                        Some(f) => declared_value(inner, &f.value_type, registry),
                        None => inner.clone(),
                    };
                    (key, inner)
                })
                .collect();
            Value::Object(mapped)
        }
        (ValueType::List(element), Value::Array(items)) => Value::Array(
            items
                .iter()
                .map(|item| declared_value(item, element, registry))
                .collect(),
        ),
        _ => v.clone(),
    }
}

/// Check a non-null value against the field's underlying type.
pub fn check_type(
    name: &str,
    v: &Value,
    value_type: &ValueType,
    registry: &EntityRegistry,
) -> Result<(), AppError> {
    let mismatch = || AppError::Validation(format!("{} must be of type {}", name, value_type));
    let ok = match value_type {
        ValueType::Bool => v.is_boolean(),
        ValueType::Int32 => v.as_i64().map(|n| i32::try_from(n).is_ok()).unwrap_or(false),
        ValueType::Int64 => v.is_i64(),
        ValueType::Float64 => v.is_number(),
        ValueType::String => v.is_string(),
        ValueType::Date => v
            .as_str()
            .map(|s| chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok())
            .unwrap_or(false),
        ValueType::DateTime => v
            .as_str()
            .map(|s| chrono::DateTime::parse_from_rfc3339(s).is_ok())
            .unwrap_or(false),
        ValueType::Uuid => v
            .as_str()
            .map(|s| uuid::Uuid::parse_str(s).is_ok())
            .unwrap_or(false),
        ValueType::Enum(e) => match (v.as_str(), registry.enum_values(e)) {
            (Some(s), Some(values)) => {
                if !values.iter().any(|x| x == s) {
                    return Err(AppError::Validation(format!(
                        "{} must be one of: {}",
                        name,
                        values.join(", ")
                    )));
                }
                true
            }
            _ => false,
        },
        ValueType::Entity(e) => {
            let obj = v.as_object().ok_or_else(mismatch)?;
            if let Some(fields) = nested_fields(registry, e) {
                if let Some(k) = obj.keys().find(|k| !fields.iter().any(|f| &f.name == *k)) {
                    return Err(AppError::Validation(format!("unknown field {}.{}", name, k)));
                }
                for f in fields {
                    if let Some(inner) = obj.get(&f.name).filter(|x| !x.is_null()) {
                        check_type(&format!("{}.{}", name, f.name), inner, &f.value_type, registry)?;
                    }
                }
            }
            true
        }
        ValueType::List(inner) => {
            let items = v.as_array().ok_or_else(mismatch)?;
            for (i, item) in items.iter().enumerate() {
                check_type(&format!("{}[{}]", name, i), item, inner, registry)?;
            }
            true
        }
    };
    if ok {
        Ok(())
    } else {
        Err(mismatch())
    }
}

fn validate_field(col: &str, v: &Value, field_rule: &FieldRule) -> Result<(), AppError> {
    if v.is_null() {
        return Ok(());
    }
    let rule = &field_rule.rule;
    if let Some(format) = &rule.format {
        validate_format(col, v, format)?;
    }
    if let Some(max) = rule.max_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() > max as usize {
                return Err(AppError::Validation(format!(
                    "{} must be at most {} characters",
                    col, max
                )));
            }
        }
    }
    if let Some(min) = rule.min_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() < min as usize {
                return Err(AppError::Validation(format!(
                    "{} must be at least {} characters",
                    col, min
                )));
            }
        }
    }
    if let Some(re) = &field_rule.pattern {
        if let Some(s) = v.as_str() {
            if !re.is_match(s) {
                return Err(AppError::Validation(format!("{} does not match required pattern", col)));
            }
        }
    }
    if let Some(ref allowed) = rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            return Err(AppError::Validation(format!(
                "{} must be one of: {:?}",
                col,
                allowed.iter().take(5).collect::<Vec<_>>()
            )));
        }
    }
    if let Some(min) = rule.minimum {
        if let Some(n) = v.as_f64() {
            if n < min {
                return Err(AppError::Validation(format!("{} must be at least {}", col, min)));
            }
        }
    }
    if let Some(max) = rule.maximum {
        if let Some(n) = v.as_f64() {
            if n > max {
                return Err(AppError::Validation(format!("{} must be at most {}", col, max)));
            }
        }
    }
    Ok(())
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), Value::String(t)) => s == t,
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn validate_format(col: &str, v: &Value, format: &str) -> Result<(), AppError> {
    match format.to_lowercase().as_str() {
        "email" => {
            if let Some(s) = v.as_str() {
                if !s.contains('@') || s.len() < 3 {
                    return Err(AppError::Validation(format!("{} must be a valid email", col)));
                }
            }
        }
        "uuid" => {
            if let Some(s) = v.as_str() {
                if uuid::Uuid::parse_str(s).is_err() {
                    return Err(AppError::Validation(format!("{} must be a valid UUID", col)));
                }
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BaseDefinition, EntityDefinition, FieldAccess, ValidationRule};
    use crate::introspect::FieldDescriptor;
    use crate::synth::{synthesize_create, synthesize_update};
    use serde_json::json;
    use std::collections::HashMap;

    fn descriptor(name: &str, value_type: ValueType, nullable: bool) -> FieldDescriptor {
        FieldDescriptor {
            name: name.into(),
            value_type,
            nullable,
            readable: true,
            writable: true,
            tags: Vec::new(),
            validation: None,
        }
    }

    fn definition(name: &str, value_type: ValueType) -> FieldDefinition {
        FieldDefinition {
            name: name.into(),
            value_type,
            wrapped: false,
            annotated_nullable: false,
            access: FieldAccess::ReadWrite,
            tags: Vec::new(),
            validation: None,
        }
    }

    fn registry() -> EntityRegistry {
        let base = BaseDefinition {
            name: "EntityBase".into(),
            identifier: "id".into(),
            pk_type: PkType::BigInt,
            fields: vec![definition("id", ValueType::Int64)],
        };
        let mut enums = HashMap::new();
        enums.insert("Color".to_string(), vec!["Red".to_string(), "Blue".to_string()]);
        let item = EntityDefinition {
            name: "Item".into(),
            fields: vec![definition("creation_date", ValueType::Date)],
            tags: Vec::new(),
        };
        EntityRegistry::new(base, enums, vec![item])
    }

    fn rule(rule: ValidationRule) -> FieldRule {
        FieldRule::compile(&rule, "Thing.field").unwrap()
    }

    fn check(rule: &FieldRule, v: Value) -> bool {
        validate_field("field", &v, rule).is_ok()
    }

    fn fields() -> Vec<FieldDescriptor> {
        let mut name = descriptor("name", ValueType::String, false);
        name.validation = Some(rule(ValidationRule {
            max_length: Some(5),
            ..Default::default()
        }));
        vec![
            name,
            descriptor("description", ValueType::String, true),
            descriptor("count", ValueType::Int32, false),
            descriptor("color", ValueType::Enum("Color".into()), false),
        ]
    }

    #[test]
    fn create_requires_every_field() {
        let shape = synthesize_create("Thing", &[], &fields());
        let err = RequestValidator::decode_create(&shape, &registry(), &json!({"name": "a", "count": 1}))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(m) if m == "description is required"));
    }

    #[test]
    fn create_rejects_null_for_non_nullable() {
        let shape = synthesize_create("Thing", &[], &fields());
        let body = json!({"name": null, "description": null, "count": 1, "color": "Red"});
        assert!(RequestValidator::decode_create(&shape, &registry(), &body).is_err());
        let body = json!({"name": "a", "description": null, "count": 0, "color": "Red"});
        let input = RequestValidator::decode_create(&shape, &registry(), &body).unwrap();
        assert_eq!(input.values["count"], json!(0));
    }

    #[test]
    fn create_applies_rules_and_types() {
        let shape = synthesize_create("Thing", &[], &fields());
        let long = json!({"name": "too long", "description": null, "count": 1, "color": "Red"});
        assert!(RequestValidator::decode_create(&shape, &registry(), &long).is_err());
        let bad_enum = json!({"name": "a", "description": null, "count": 1, "color": "Green"});
        assert!(RequestValidator::decode_create(&shape, &registry(), &bad_enum).is_err());
        let overflow = json!({"name": "a", "description": null, "count": 3_000_000_000u64, "color": "Red"});
        assert!(RequestValidator::decode_create(&shape, &registry(), &overflow).is_err());
        let unknown = json!({"name": "a", "description": null, "count": 1, "color": "Red", "x": 1});
        assert!(RequestValidator::decode_create(&shape, &registry(), &unknown).is_err());
    }

    #[test]
    fn update_distinguishes_absent_null_and_value() {
        let shape = synthesize_update("Thing", &descriptor("id", ValueType::Int64, false), &fields());
        let body = json!({"id": "4", "description": null, "count": 7});
        let input = RequestValidator::decode_update(&shape, &registry(), &PkType::BigInt, &body).unwrap();
        assert_eq!(input.id, json!(4));
        assert_eq!(input.changes["description"], TriState::null());
        assert_eq!(input.changes["count"], TriState::value(json!(7)));
        assert_eq!(input.changes["name"], TriState::Absent);
    }

    #[test]
    fn update_leaves_null_checks_to_merge() {
        let shape = synthesize_update("Thing", &descriptor("id", ValueType::Int64, false), &fields());
        let body = json!({"id": 1, "name": null});
        let input = RequestValidator::decode_update(&shape, &registry(), &PkType::BigInt, &body).unwrap();
        assert_eq!(input.changes["name"], TriState::null());
    }

    #[test]
    fn update_requires_identifier() {
        let shape = synthesize_update("Thing", &descriptor("id", ValueType::Int64, false), &fields());
        let body = json!({"count": 1});
        assert!(RequestValidator::decode_update(&shape, &registry(), &PkType::BigInt, &body).is_err());
    }

    #[test]
    fn identifiers_decode_per_type() {
        assert_eq!(RequestValidator::decode_id(&PkType::BigInt, &json!("12")).unwrap(), json!(12));
        assert!(RequestValidator::decode_id(&PkType::Int, &json!(5_000_000_000i64)).is_err());
        assert!(RequestValidator::decode_id(&PkType::Uuid, &json!("nope")).is_err());
        assert_eq!(RequestValidator::decode_id(&PkType::Text, &json!(3)).unwrap(), json!("3"));
    }

    #[test]
    fn length_rules_count_characters() {
        let r = rule(ValidationRule {
            min_length: Some(2),
            max_length: Some(3),
            ..Default::default()
        });
        assert!(!check(&r, json!("a")));
        assert!(check(&r, json!("ab")));
        assert!(check(&r, json!("abc")));
        assert!(!check(&r, json!("abcd")));
        // three characters, nine bytes
        assert!(check(&r, json!("日本語")));
        assert!(!check(&r, json!("é")));
    }

    #[test]
    fn pattern_rule_uses_compiled_regex() {
        let r = rule(ValidationRule {
            pattern: Some("^[a-z]+$".into()),
            ..Default::default()
        });
        assert!(check(&r, json!("abc")));
        assert!(!check(&r, json!("Abc1")));
        let bad = ValidationRule {
            pattern: Some("([a-z".into()),
            ..Default::default()
        };
        assert!(FieldRule::compile(&bad, "Thing.code").is_err());
    }

    #[test]
    fn format_rules() {
        let email = rule(ValidationRule {
            format: Some("email".into()),
            ..Default::default()
        });
        assert!(check(&email, json!("a@b.io")));
        assert!(!check(&email, json!("nobody")));

        let id = rule(ValidationRule {
            format: Some("UUID".into()),
            ..Default::default()
        });
        assert!(check(&id, json!("67e55044-10b1-426f-9247-bb680e5fe0c8")));
        assert!(!check(&id, json!("67e55044")));
    }

    #[test]
    fn allowed_values() {
        let r = rule(ValidationRule {
            allowed: Some(vec![json!("low"), json!(2)]),
            ..Default::default()
        });
        assert!(check(&r, json!("low")));
        assert!(check(&r, json!(2.0)));
        assert!(!check(&r, json!("high")));
        assert!(!check(&r, json!(3)));
    }

    #[test]
    fn numeric_bounds_are_inclusive() {
        let r = rule(ValidationRule {
            minimum: Some(0.0),
            maximum: Some(10.0),
            ..Default::default()
        });
        assert!(check(&r, json!(0)));
        assert!(check(&r, json!(10)));
        assert!(!check(&r, json!(-1)));
        assert!(!check(&r, json!(10.5)));
        // null is never subject to rules
        assert!(check(&r, Value::Null));
    }

    #[test]
    fn nested_keys_map_to_declared_names() {
        let items = descriptor("items", ValueType::List(Box::new(ValueType::Entity("Item".into()))), false);
        let shape = synthesize_create("Box", &[], &[items]);

        let body = json!({"items": [{"creationDate": "2024-05-01"}]});
        let input = RequestValidator::decode_create(&shape, &registry(), &body).unwrap();
        assert_eq!(input.values["items"], json!([{"creation_date": "2024-05-01"}]));

        let wrong_type = json!({"items": [{"creationDate": 5}]});
        assert!(RequestValidator::decode_create(&shape, &registry(), &wrong_type).is_err());
        let unknown = json!({"items": [{"createdOn": "2024-05-01"}]});
        assert!(RequestValidator::decode_create(&shape, &registry(), &unknown).is_err());
    }

    #[test]
    fn nested_keys_map_in_updates() {
        let items = descriptor("items", ValueType::List(Box::new(ValueType::Entity("Item".into()))), true);
        let shape = synthesize_update("Box", &descriptor("id", ValueType::Int64, false), &[items]);
        let body = json!({"id": 1, "items": [{"id": 3, "creationDate": "2024-05-01"}]});
        let input = RequestValidator::decode_update(&shape, &registry(), &PkType::BigInt, &body).unwrap();
        assert_eq!(
            input.changes["items"],
            TriState::value(json!([{"id": 3, "creation_date": "2024-05-01"}]))
        );
    }
}
