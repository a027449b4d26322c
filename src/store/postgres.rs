//! PostgreSQL store: one table per entity, staged changes applied in a single
//! transaction at commit.

use super::{Change, EntityTable, Record, Session, Store};
use crate::error::StoreError;
use crate::sql::{create_table, insert, row_to_record, select_all, select_by_id, update, PgBindValue, QueryBuf};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_PG_SCHEMA: &str = "public";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    schema: String,
}

impl PgStore {
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        PgStore {
            pool,
            schema: schema.into(),
        }
    }

    /// Create the schema and one table per entity if missing. Existing tables are left as is.
    pub async fn ensure_tables(&self, tables: &[Arc<EntityTable>]) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "CREATE SCHEMA IF NOT EXISTS \"{}\"",
            self.schema.replace('"', "\"\"")
        ))
        .execute(&self.pool)
        .await?;
        for t in tables {
            let ddl = create_table(&self.schema, t);
            tracing::debug!(sql = %ddl, "ensure table");
            sqlx::query(&ddl).execute(&self.pool).await?;
        }
        tracing::info!(schema = %self.schema, tables = tables.len(), "entity tables ready");
        Ok(())
    }
}

impl Store for PgStore {
    fn session(&self) -> Box<dyn Session> {
        Box::new(PgSession {
            store: self.clone(),
            staged: Vec::new(),
        })
    }
}

struct PgSession {
    store: PgStore,
    staged: Vec<Change>,
}

#[async_trait]
impl Session for PgSession {
    async fn set(&mut self, table: &EntityTable) -> Result<Vec<Record>, StoreError> {
        let q = select_all(&self.store.schema, table);
        let mut conn = self.store.pool.acquire().await?;
        query_many(&mut conn, &q, table).await
    }

    async fn find(&mut self, table: &EntityTable, id: &Value) -> Result<Vec<Record>, StoreError> {
        let q = select_by_id(&self.store.schema, table, id);
        let mut conn = self.store.pool.acquire().await?;
        query_many(&mut conn, &q, table).await
    }

    fn stage(&mut self, change: Change) {
        self.staged.push(change);
    }

    async fn commit(&mut self, cancel: &CancellationToken) -> Result<Vec<Record>, StoreError> {
        let staged = std::mem::take(&mut self.staged);
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        let schema = self.store.schema.clone();
        let pool = self.store.pool.clone();
        let work = async move {
            let mut tx = pool.begin().await?;
            let mut out = Vec::with_capacity(staged.len());
            for change in &staged {
                let row = match change {
                    Change::Insert { table, record } => {
                        let q = insert(&schema, table, record);
                        execute_returning_one(&mut tx, &q, table)
                            .await?
                            .ok_or_else(|| StoreError::Backend(format!("insert into {} returned no row", table.name)))?
                    }
                    Change::Update { table, id, record } => {
                        let q = update(&schema, table, id, record);
                        execute_returning_one(&mut tx, &q, table)
                            .await?
                            .ok_or_else(|| StoreError::Conflict(format!("{} {} no longer exists", table.name, id)))?
                    }
                };
                out.push(row);
            }
            tx.commit().await?;
            Ok::<_, StoreError>(out)
        };
        // dropping the transaction on cancellation rolls it back
        let out = tokio::select! {
            _ = cancel.cancelled() => return Err(StoreError::Cancelled),
            res = work => res?,
        };
        tracing::debug!(rows = out.len(), "postgres commit");
        Ok(out)
    }
}

fn bind_all<'q>(
    q: &'q QueryBuf,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(PgBindValue::from_json(p));
    }
    query
}

async fn query_many(
    conn: &mut PgConnection,
    q: &QueryBuf,
    table: &EntityTable,
) -> Result<Vec<Record>, StoreError> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let rows = bind_all(q).fetch_all(&mut *conn).await?;
    rows.iter()
        .map(|r| row_to_record(r, &table.fields).map_err(StoreError::from))
        .collect()
}

async fn execute_returning_one(
    conn: &mut PgConnection,
    q: &QueryBuf,
    table: &EntityTable,
) -> Result<Option<Record>, StoreError> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query (tx)");
    let row = bind_all(q).fetch_optional(&mut *conn).await.map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            StoreError::Conflict(db.message().to_string())
        }
        other => StoreError::Db(other),
    })?;
    row.map(|r| row_to_record(&r, &table.fields))
        .transpose()
        .map_err(StoreError::from)
}
