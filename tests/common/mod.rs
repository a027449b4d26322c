#![allow(dead_code)]

use entity_api::config::ModelConfig;
use entity_api::store::{Change, MemoryStore, Record, Store};
use entity_api::{resolve, ApiSchema, SynthesisOptions};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

pub const MODEL: &str = include_str!("../../demos/model.json");

pub fn model() -> ModelConfig {
    serde_json::from_str(MODEL).expect("demo model parses")
}

pub fn schema() -> ApiSchema {
    let registry = resolve(&model()).expect("demo model resolves");
    ApiSchema::synthesize(registry, SynthesisOptions::default()).expect("demo model synthesizes")
}

/// Store holding "Thing 1" (id 1) and "Thing 2" (id 2).
pub async fn seeded(schema: &ApiSchema) -> MemoryStore {
    let store = MemoryStore::new();
    let table = schema.table("Thing").expect("Thing table").clone();
    let mut session = store.session();
    for (name, description) in [("Thing 1", "Description 1"), ("Thing 2", "Description 2")] {
        let mut record = table.defaults.clone();
        record.insert("name".into(), json!(name));
        record.insert("description".into(), json!(description));
        session.stage(Change::Insert {
            table: table.clone(),
            record,
        });
    }
    session
        .commit(&CancellationToken::new())
        .await
        .expect("seed commits");
    store
}

pub fn record(v: Value) -> Record {
    match v {
        Value::Object(m) => m,
        other => panic!("expected object, got {}", other),
    }
}
