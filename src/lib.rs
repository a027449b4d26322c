//! Entity API: synthesizes query/mutation operations and input shapes from a
//! declarative entity model, and merges create/partial-update inputs onto
//! persisted entities.

pub mod case;
pub mod config;
pub mod error;
pub mod handlers;
pub mod introspect;
pub mod merge;
pub mod optional;
pub mod response;
pub mod routes;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;
pub mod store;
pub mod synth;

pub use config::{load_from_path, resolve, EntityRegistry, ModelConfig};
pub use error::{AppError, MergeError, StoreError, SynthesisError};
pub use introspect::{describe, FieldDescriptor};
pub use merge::{apply_field_changes, copy_shared_fields};
pub use optional::TriState;
pub use routes::{api_router, common_routes, operation_routes};
pub use service::{CrudService, RequestValidator};
pub use settings::Settings;
pub use state::AppState;
pub use store::{MemoryStore, PgStore, Record, Session, Store};
pub use synth::{ApiSchema, Arguments, ContainerKind, Output, SynthesisOptions};
