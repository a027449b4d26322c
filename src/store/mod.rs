//! Persistence collaborator: session-scoped collections with staged changes and
//! an all-or-nothing commit.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{PgStore, DEFAULT_PG_SCHEMA};

use crate::config::{BaseDefinition, EntityRegistry, PkType, ValueType};
use crate::error::StoreError;
use crate::introspect::FieldDescriptor;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use std::sync::Arc;

/// One entity instance (or input payload), keyed by field name.
pub type Record = Map<String, Value>;

/// Everything a store needs to know about one entity's collection.
#[derive(Clone, Debug, Serialize)]
pub struct EntityTable {
    pub name: String,
    pub identifier: String,
    pub pk_type: PkType,
    /// All fields, base marker first.
    pub fields: Vec<FieldDescriptor>,
    /// Default-initialized instance; identifier null until commit.
    #[serde(skip)]
    pub defaults: Record,
}

impl EntityTable {
    pub fn new(
        name: &str,
        base: &BaseDefinition,
        fields: Vec<FieldDescriptor>,
        registry: &EntityRegistry,
    ) -> Self {
        let defaults = fields
            .iter()
            .map(|f| {
                let v = if f.name == base.identifier || f.nullable {
                    Value::Null
                } else {
                    default_value(&f.value_type, registry)
                };
                (f.name.clone(), v)
            })
            .collect();
        EntityTable {
            name: name.to_string(),
            identifier: base.identifier.clone(),
            pk_type: base.pk_type.clone(),
            fields,
            defaults,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn id_of<'a>(&self, record: &'a Record) -> Option<&'a Value> {
        record.get(&self.identifier).filter(|v| !v.is_null())
    }
}

/// Zero value for a non-nullable field of `value_type`.
pub fn default_value(value_type: &ValueType, registry: &EntityRegistry) -> Value {
    match value_type {
        ValueType::Bool => Value::Bool(false),
        ValueType::Int32 | ValueType::Int64 => Value::from(0),
        ValueType::Float64 => Value::from(0.0),
        ValueType::String => Value::String(String::new()),
        ValueType::Date => Value::String("0001-01-01".into()),
        ValueType::DateTime => Value::String("0001-01-01T00:00:00Z".into()),
        ValueType::Uuid => Value::String(uuid::Uuid::nil().to_string()),
        ValueType::Enum(name) => registry
            .enum_values(name)
            .and_then(|v| v.first())
            .map(|s| Value::String(s.clone()))
            .unwrap_or(Value::Null),
        ValueType::List(_) => Value::Array(Vec::new()),
        ValueType::Entity(_) => Value::Null,
    }
}

#[derive(Clone, Debug)]
pub enum Change {
    Insert { table: Arc<EntityTable>, record: Record },
    Update { table: Arc<EntityTable>, id: Value, record: Record },
}

impl Change {
    pub fn table(&self) -> &EntityTable {
        match self {
            Change::Insert { table, .. } | Change::Update { table, .. } => table,
        }
    }
}

/// Request-scoped persistence context.
#[async_trait]
pub trait Session: Send {
    /// Full, unfiltered collection for `table`.
    async fn set(&mut self, table: &EntityTable) -> Result<Vec<Record>, StoreError>;

    /// Records whose identifier equals `id`.
    async fn find(&mut self, table: &EntityTable, id: &Value) -> Result<Vec<Record>, StoreError> {
        let rows = self.set(table).await?;
        Ok(rows
            .into_iter()
            .filter(|r| table.id_of(r) == Some(id))
            .collect())
    }

    fn stage(&mut self, change: Change);

    /// Persist every staged change, or none. Returns persisted records in staging order.
    async fn commit(&mut self, cancel: &CancellationToken) -> Result<Vec<Record>, StoreError>;
}

/// Opens sessions; shared across requests.
pub trait Store: Send + Sync {
    fn session(&self) -> Box<dyn Session>;
}
