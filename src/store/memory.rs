//! In-process store. Tables live behind one lock; a commit applies all staged
//! changes to a scratch copy and swaps it in only if every change succeeds.

use super::{Change, EntityTable, Record, Session, Store};
use crate::config::PkType;
use crate::error::StoreError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug, Default)]
struct MemoryTable {
    next_id: i64,
    rows: Vec<Record>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<HashMap<String, MemoryTable>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed rows in `entity`.
    pub async fn count(&self, entity: &str) -> usize {
        self.tables
            .read()
            .await
            .get(entity)
            .map(|t| t.rows.len())
            .unwrap_or(0)
    }
}

impl Store for MemoryStore {
    fn session(&self) -> Box<dyn Session> {
        Box::new(MemorySession {
            store: self.clone(),
            staged: Vec::new(),
        })
    }
}

struct MemorySession {
    store: MemoryStore,
    staged: Vec<Change>,
}

#[async_trait]
impl Session for MemorySession {
    async fn set(&mut self, table: &EntityTable) -> Result<Vec<Record>, StoreError> {
        let guard = self.store.tables.read().await;
        Ok(guard.get(&table.name).map(|t| t.rows.clone()).unwrap_or_default())
    }

    fn stage(&mut self, change: Change) {
        self.staged.push(change);
    }

    async fn commit(&mut self, cancel: &CancellationToken) -> Result<Vec<Record>, StoreError> {
        let staged = std::mem::take(&mut self.staged);
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        let mut guard = tokio::select! {
            _ = cancel.cancelled() => return Err(StoreError::Cancelled),
            guard = self.store.tables.write() => guard,
        };

        let mut scratch: HashMap<String, MemoryTable> = HashMap::new();
        let mut out = Vec::with_capacity(staged.len());
        for change in staged {
            let name = change.table().name.clone();
            let table = scratch
                .entry(name.clone())
                .or_insert_with(|| guard.get(&name).cloned().unwrap_or_default());
            let row = match change {
                Change::Insert { table: meta, mut record } => {
                    let id = match meta.id_of(&record) {
                        Some(id) => {
                            if table.rows.iter().any(|r| meta.id_of(r) == Some(id)) {
                                return Err(StoreError::Conflict(format!(
                                    "{} with {} {} already exists",
                                    meta.name, meta.identifier, id
                                )));
                            }
                            id.clone()
                        }
                        None => next_id(table, &meta.pk_type),
                    };
                    record.insert(meta.identifier.clone(), id);
                    table.rows.push(record.clone());
                    record
                }
                Change::Update { table: meta, id, mut record } => {
                    let slot = table
                        .rows
                        .iter_mut()
                        .find(|r| meta.id_of(r) == Some(&id))
                        .ok_or_else(|| {
                            StoreError::Conflict(format!("{} {} no longer exists", meta.name, id))
                        })?;
                    record.insert(meta.identifier.clone(), id);
                    *slot = record.clone();
                    record
                }
            };
            out.push(row);
        }

        guard.extend(scratch);
        tracing::debug!(rows = out.len(), "memory commit");
        Ok(out)
    }
}

fn next_id(table: &mut MemoryTable, pk_type: &PkType) -> Value {
    match pk_type {
        PkType::BigInt | PkType::Int => {
            table.next_id += 1;
            Value::from(table.next_id)
        }
        PkType::Uuid | PkType::Text => Value::String(uuid::Uuid::new_v4().to_string()),
    }
}
