mod common;

use entity_api::config::{ModelConfig, PkType, ValueType};
use entity_api::synth::{CapabilitySet, Handler, PagingOptions, ShapeKind, Wrapping};
use entity_api::{resolve, ApiSchema, SynthesisError, SynthesisOptions};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn synthesize(model: Value) -> Result<ApiSchema, SynthesisError> {
    let config: ModelConfig = serde_json::from_value(model).expect("manifest json");
    let registry = resolve(&config)?;
    ApiSchema::synthesize(registry, SynthesisOptions::default())
}

fn with_entities(entities: Value) -> Value {
    json!({
        "base": { "name": "EntityBase", "fields": [{ "name": "id", "type": "i64" }] },
        "entities": entities
    })
}

#[test]
fn shapes_have_one_field_per_mutable_field() {
    let schema = common::schema();
    for (entity, mutable) in [("Thing", 3), ("OtherThing", 4)] {
        let add = schema.shape(&format!("Add{}Input", entity)).unwrap();
        assert_eq!(add.kind, ShapeKind::Create);
        assert_eq!(add.fields.len(), mutable);
        assert!(add.fields.iter().all(|f| f.wrapping == Wrapping::Required));

        let update = schema.shape(&format!("Update{}Input", entity)).unwrap();
        assert_eq!(update.kind, ShapeKind::Update);
        assert_eq!(update.fields.len(), mutable + 1);
        let id = update.identifier().unwrap();
        assert_eq!((id.name.as_str(), id.wrapping), ("id", Wrapping::Required));
        assert_eq!(
            update.fields.iter().filter(|f| f.wrapping == Wrapping::TriState).count(),
            mutable
        );
    }
}

#[test]
fn read_only_and_base_fields_stay_out_of_shapes() {
    let schema = common::schema();
    let add = schema.shape("AddThingInput").unwrap();
    let names: Vec<&str> = add.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["name", "description", "count"]);
    assert!(schema.table("Thing").unwrap().field("other_things").is_some());
}

#[test]
fn nullability_follows_wrapper_and_annotation() {
    let schema = common::schema();
    let update = schema.shape("UpdateOtherThingInput").unwrap();
    assert!(update.field("due").unwrap().nullable);
    assert!(update.field("thing_id").unwrap().nullable);
    assert!(!update.field("creation_date").unwrap().nullable);
    let thing = schema.shape("UpdateThingInput").unwrap();
    assert!(thing.field("description").unwrap().nullable);
    assert!(!thing.field("name").unwrap().nullable);

    let schema = synthesize(with_entities(json!([{
        "name": "Box",
        "fields": [
            { "name": "count", "type": "i32", "nullable": true },
            { "name": "label", "type": "string?" }
        ]
    }])))
    .unwrap();
    let update = schema.shape("UpdateBoxInput").unwrap();
    assert!(!update.field("count").unwrap().nullable);
    assert!(update.field("label").unwrap().nullable);
}

#[test]
fn operations_and_capabilities() {
    let schema = common::schema();
    let names: Vec<&str> = schema.query().operations.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["ThingSet", "ThingById", "OtherThingSet", "OtherThingById"]);
    let names: Vec<&str> = schema.mutation().operations.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["AddThing", "UpdateThing", "AddOtherThing", "UpdateOtherThing"]);

    let set = schema.query().operation("ThingSet").unwrap();
    assert_eq!(set.handler, Handler::Set);
    assert_eq!(set.capabilities, CapabilitySet::collection(PagingOptions::default()));
    let paging = set.capabilities.paging.as_ref().unwrap();
    assert_eq!((paging.default_page_size, paging.max_page_size), (100, 1000));
    assert!(paging.include_total_count);

    let by_id = schema.query().operation("ThingById").unwrap();
    assert!(by_id.capabilities.single_result && by_id.capabilities.projection);
    assert!(by_id.takes_id());

    let update = schema.mutation().operation("UpdateThing").unwrap();
    assert_eq!(update.input_shape(), Some("UpdateThingInput"));
    assert!(update.takes_id());
    assert_eq!(schema.registry().base.pk_type, PkType::BigInt);
}

#[test]
fn entity_tags_carry_to_create_shape() {
    let schema = common::schema();
    assert_eq!(schema.shape("AddOtherThingInput").unwrap().tags.len(), 2);
    assert!(schema.shape("UpdateOtherThingInput").unwrap().tags.is_empty());
}

#[test]
fn abstract_parents_are_inherited_not_registered() {
    let schema = common::schema();
    assert!(schema.table("Dated").is_none());
    assert!(schema.query().operation("DatedSet").is_none());
    let other = schema.table("OtherThing").unwrap();
    let names: Vec<&str> = other.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["id", "creation_date", "priority", "due", "thing_id"]);
    assert_eq!(
        other.field("priority").unwrap().value_type,
        ValueType::Enum("Priority".into())
    );
}

#[test]
fn synthesis_is_deterministic() {
    let a = serde_json::to_value(common::schema().document()).unwrap();
    let b = serde_json::to_value(common::schema().document()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn identifier_only_entity_is_fine() {
    let schema = synthesize(with_entities(json!([{ "name": "Marker" }]))).unwrap();
    assert_eq!(schema.shape("AddMarkerInput").unwrap().fields.len(), 0);
    assert_eq!(schema.shape("UpdateMarkerInput").unwrap().fields.len(), 1);
}

#[test]
fn shape_name_collision_aborts() {
    let err = synthesize(with_entities(json!([
        { "name": "Thing", "fields": [{ "name": "name", "type": "string" }] },
        { "name": "AddThingInput" }
    ])))
    .err()
    .unwrap();
    assert!(matches!(err, SynthesisError::NameCollision { ref name, .. } if name == "AddThingInput"));
}

#[test]
fn container_name_collision_aborts() {
    let err = synthesize(with_entities(json!([{ "name": "Query" }]))).err().unwrap();
    assert!(matches!(err, SynthesisError::NameCollision { .. }));
}

#[test]
fn identifier_problems_abort() {
    let missing = json!({
        "base": { "name": "EntityBase", "identifier": "key", "fields": [{ "name": "id", "type": "i64" }] },
        "entities": []
    });
    assert!(matches!(synthesize(missing), Err(SynthesisError::MissingIdentifier { .. })));

    let float = json!({
        "base": { "name": "EntityBase", "fields": [{ "name": "id", "type": "f64" }] },
        "entities": []
    });
    assert!(matches!(synthesize(float), Err(SynthesisError::UnsupportedIdentifier { .. })));

    let wrapped = json!({
        "base": { "name": "EntityBase", "fields": [{ "name": "id", "type": "uuid?" }] },
        "entities": []
    });
    assert!(matches!(synthesize(wrapped), Err(SynthesisError::UnsupportedIdentifier { .. })));
}

#[test]
fn manifest_errors_abort() {
    let cycle = with_entities(json!([
        { "name": "A", "extends": "B" },
        { "name": "B", "extends": "A" }
    ]));
    assert!(matches!(synthesize(cycle), Err(SynthesisError::Cycle(_))));

    let unknown = with_entities(json!([{ "name": "A", "fields": [{ "name": "w", "type": "Widget" }] }]));
    assert!(matches!(synthesize(unknown), Err(SynthesisError::MissingReference { .. })));

    let redeclared = with_entities(json!([{ "name": "A", "fields": [{ "name": "id", "type": "i64" }] }]));
    assert!(matches!(synthesize(redeclared), Err(SynthesisError::Duplicate { .. })));
}

#[test]
fn bad_validation_pattern_aborts_synthesis() {
    let model = with_entities(json!([{
        "name": "Code",
        "fields": [{ "name": "code", "type": "string", "validation": { "pattern": "([a-z" } }]
    }]));
    match synthesize(model) {
        Err(SynthesisError::InvalidRule { field, .. }) => assert_eq!(field, "Code.code"),
        other => panic!("expected InvalidRule, got {:?}", other.map(|_| ())),
    }

    let good = with_entities(json!([{
        "name": "Code",
        "fields": [{ "name": "code", "type": "string", "validation": { "pattern": "^[a-z]+$" } }]
    }]));
    let schema = synthesize(good).unwrap();
    let field = schema.shape("AddCodeInput").unwrap().field("code").unwrap();
    let pattern = field.validation.as_ref().and_then(|r| r.pattern.as_ref()).unwrap();
    assert!(pattern.is_match("abc"));
}

#[test]
fn definitions_outside_the_base_chain_are_skipped() {
    let model = with_entities(json!([
        { "name": "Kept", "fields": [{ "name": "label", "type": "string" }] },
        { "name": "Orphan", "extends": "Elsewhere" },
        { "name": "OrphanChild", "extends": "Orphan" }
    ]));
    let schema = synthesize(model).unwrap();
    let names: Vec<&str> = schema.registry().enumerate().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["Kept"]);
    assert!(schema.query().operation("OrphanSet").is_none());

    // a skipped definition cannot be used as a field type
    let referenced = with_entities(json!([
        { "name": "Orphan", "extends": "Elsewhere" },
        { "name": "Holder", "fields": [{ "name": "o", "type": "Orphan?" }] }
    ]));
    assert!(matches!(synthesize(referenced), Err(SynthesisError::MissingReference { .. })));
}
