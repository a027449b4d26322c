//! Shared application state for all routes. The schema is synthesized once at
//! startup and never changes afterwards.

use crate::store::Store;
use crate::synth::ApiSchema;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub schema: Arc<ApiSchema>,
    pub store: Arc<dyn Store>,
}

impl AppState {
    pub fn new(schema: ApiSchema, store: impl Store + 'static) -> Self {
        AppState {
            schema: Arc::new(schema),
            store: Arc::new(store),
        }
    }
}
