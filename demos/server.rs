//! Example server: loads the model manifest, synthesizes the schema, picks the
//! store (PostgreSQL when DATABASE_URL is set, in-process otherwise), seeds two
//! things and serves the API.

use entity_api::{
    api_router, load_from_path, resolve, ApiSchema, AppState, MemoryStore, PgStore, Session, Settings,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("entity_api=info".parse()?))
        .init();

    let settings = Settings::from_env()?;
    let config = load_from_path(&settings.model_path).await?;
    let registry = resolve(&config)?;
    let schema = ApiSchema::synthesize(registry, settings.synthesis_options())?;

    let state = match &settings.database_url {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await?;
            let store = PgStore::new(pool, settings.api_schema.clone());
            store.ensure_tables(&schema.tables()).await?;
            AppState::new(schema, store)
        }
        None => {
            tracing::info!("DATABASE_URL not set, serving from memory");
            AppState::new(schema, MemoryStore::new())
        }
    };
    seed(&state).await?;

    let app = api_router(state, &settings);
    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Seed "Thing 1" and "Thing 2" when the Thing collection is empty.
async fn seed(state: &AppState) -> Result<(), Box<dyn std::error::Error>> {
    let Some(table) = state.schema.table("Thing") else {
        return Ok(());
    };
    let mut session: Box<dyn Session> = state.store.session();
    if !session.set(table).await?.is_empty() {
        return Ok(());
    }
    for (name, description) in [("Thing 1", "Description 1"), ("Thing 2", "Description 2")] {
        let mut record = table.defaults.clone();
        record.insert("name".into(), json!(name));
        record.insert("description".into(), json!(description));
        session.stage(entity_api::store::Change::Insert {
            table: table.clone(),
            record,
        });
    }
    let rows = session.commit(&CancellationToken::new()).await?;
    tracing::info!(rows = rows.len(), "seeded");
    Ok(())
}
