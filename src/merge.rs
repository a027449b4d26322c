//! Merge engine: copies input-shape values onto entity records.
//!
//! Source and destination fields pair only when both name and underlying type
//! match; a same-named field of another type is skipped without error.

use crate::error::MergeError;
use crate::introspect::FieldDescriptor;
use crate::optional::TriState;
use crate::store::Record;
use crate::synth::{Shape, ShapeField, Wrapping};
use serde_json::Value;
use std::collections::BTreeMap;

fn paired<'a>(source: &ShapeField, destination: &'a [FieldDescriptor]) -> Option<&'a FieldDescriptor> {
    destination
        .iter()
        .find(|d| d.name == source.name && d.value_type == source.value_type && d.writable)
}

/// Full copy (create path): every paired required field is written
/// unconditionally. Destination nullability is not consulted.
pub fn copy_shared_fields(
    source: &Shape,
    input: &Record,
    destination: &[FieldDescriptor],
    target: &mut Record,
) -> usize {
    let mut copied = 0;
    for field in source.fields.iter().filter(|f| f.wrapping == Wrapping::Required) {
        let Some(dest) = paired(field, destination) else {
            continue;
        };
        let value = input.get(&field.name).cloned().unwrap_or(Value::Null);
        target.insert(dest.name.clone(), value);
        copied += 1;
    }
    copied
}

/// Tri-state merge (update path). Absent fields are left untouched, explicit
/// nulls are checked against the destination's nullability, values overwrite.
///
/// All changes are checked before any is written, so a rejected null leaves
/// `target` unmodified. Returns the number of fields written.
pub fn apply_field_changes(
    source: &Shape,
    changes: &BTreeMap<String, TriState<Value>>,
    destination: &[FieldDescriptor],
    target: &mut Record,
) -> Result<usize, MergeError> {
    let mut plan: Vec<(&str, Value)> = Vec::new();
    for field in source.fields.iter().filter(|f| f.wrapping == Wrapping::TriState) {
        let Some(dest) = paired(field, destination) else {
            continue;
        };
        match changes.get(&field.name) {
            None | Some(TriState::Absent) => {}
            Some(TriState::Present(None)) => {
                if !dest.nullable {
                    return Err(MergeError::NullAssignment {
                        field: dest.name.clone(),
                    });
                }
                plan.push((dest.name.as_str(), Value::Null));
            }
            Some(TriState::Present(Some(v))) => plan.push((dest.name.as_str(), v.clone())),
        }
    }
    let written = plan.len();
    for (name, value) in plan {
        target.insert(name.to_string(), value);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValueType;
    use crate::synth::{synthesize_create, synthesize_update};
    use pretty_assertions::assert_eq;
    use serde_json::json;

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

    fn thing_fields() -> Vec<FieldDescriptor> {
        vec![
            descriptor("name", ValueType::String, false),
            descriptor("description", ValueType::String, true),
            descriptor("count", ValueType::Int32, false),
        ]
    }

    fn record(v: Value) -> Record {
        match v {
            Value::Object(m) => m,
            _ => Record::new(),
        }
    }

    fn update_shape() -> Shape {
        synthesize_update("Thing", &descriptor("id", ValueType::Int64, false), &thing_fields())
    }

    #[test]
    fn copy_writes_zero_values() {
        let shape = synthesize_create("Thing", &[], &thing_fields());
        let input = record(json!({"name": "n", "description": null, "count": 0}));
        let mut target = record(json!({"id": null, "name": "", "description": null, "count": 0}));
        target.insert("count".into(), json!(42));
        let copied = copy_shared_fields(&shape, &input, &thing_fields(), &mut target);
        assert_eq!(copied, 3);
        assert_eq!(target["count"], json!(0));
        assert_eq!(target["name"], json!("n"));
    }

    #[test]
    fn copy_skips_same_name_with_other_type() {
        let source = synthesize_create(
            "Source",
            &[],
            &[descriptor("count", ValueType::String, false)],
        );
        let dest = vec![descriptor("count", ValueType::Int32, false)];
        let mut target = record(json!({"count": 3}));
        let copied = copy_shared_fields(&source, &record(json!({"count": "three"})), &dest, &mut target);
        assert_eq!(copied, 0);
        assert_eq!(target["count"], json!(3));
    }

    #[test]
    fn copy_skips_read_only_destination() {
        let shape = synthesize_create("Thing", &[], &thing_fields());
        let mut dest = thing_fields();
        dest[0].writable = false;
        let mut target = record(json!({"name": "kept"}));
        copy_shared_fields(&shape, &record(json!({"name": "new", "count": 1})), &dest, &mut target);
        assert_eq!(target["name"], json!("kept"));
        assert_eq!(target["count"], json!(1));
    }

    #[test]
    fn all_absent_update_is_a_no_op() {
        let before = record(json!({"id": 1, "name": "Thing 1", "description": "d", "count": 5}));
        let mut target = before.clone();
        let written = apply_field_changes(&update_shape(), &BTreeMap::new(), &thing_fields(), &mut target).unwrap();
        assert_eq!(written, 0);
        assert_eq!(target, before);
    }

    #[test]
    fn value_round_trips_then_absent_keeps_it() {
        let shape = update_shape();
        let mut target = record(json!({"id": 1, "name": "a", "description": null, "count": 5}));
        let mut changes = BTreeMap::new();
        changes.insert("count".to_string(), TriState::value(json!(7)));
        apply_field_changes(&shape, &changes, &thing_fields(), &mut target).unwrap();
        assert_eq!(target["count"], json!(7));

        changes.insert("count".to_string(), TriState::Absent);
        apply_field_changes(&shape, &changes, &thing_fields(), &mut target).unwrap();
        assert_eq!(target["count"], json!(7));
    }

    #[test]
    fn null_into_nullable_field_clears_it() {
        let mut target = record(json!({"description": "d"}));
        let mut changes = BTreeMap::new();
        changes.insert("description".to_string(), TriState::null());
        let written = apply_field_changes(&update_shape(), &changes, &thing_fields(), &mut target).unwrap();
        assert_eq!(written, 1);
        assert_eq!(target["description"], Value::Null);
    }

    #[test]
    fn null_into_non_nullable_field_rejected_without_partial_write() {
        let before = record(json!({"id": 1, "name": "a", "description": "d", "count": 5}));
        let mut target = before.clone();
        let mut changes = BTreeMap::new();
        changes.insert("description".to_string(), TriState::value(json!("changed")));
        changes.insert("name".to_string(), TriState::null());
        let err = apply_field_changes(&update_shape(), &changes, &thing_fields(), &mut target).unwrap_err();
        assert_eq!(err, MergeError::NullAssignment { field: "name".into() });
        assert_eq!(err.to_string(), "cannot assign null to non-nullable field: name");
        assert_eq!(target, before);
    }

    #[test]
    fn tri_state_skips_mismatched_types() {
        let source = synthesize_update(
            "Source",
            &descriptor("id", ValueType::Int64, false),
            &[descriptor("count", ValueType::String, true)],
        );
        let mut target = record(json!({"count": 3}));
        let mut changes = BTreeMap::new();
        changes.insert("count".to_string(), TriState::null());
        let written = apply_field_changes(&source, &changes, &thing_fields(), &mut target).unwrap();
        assert_eq!(written, 0);
        assert_eq!(target["count"], json!(3));
    }

    #[test]
    fn identifier_is_never_merged() {
        let mut target = record(json!({"id": 1}));
        let mut changes = BTreeMap::new();
        changes.insert("id".to_string(), TriState::value(json!(9)));
        let mut dest = thing_fields();
        dest.push(descriptor("id", ValueType::Int64, false));
        apply_field_changes(&update_shape(), &changes, &dest, &mut target).unwrap();
        assert_eq!(target["id"], json!(1));
    }
}
