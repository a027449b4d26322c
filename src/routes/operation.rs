//! Routes for the synthesized Query and Mutation containers.

use crate::handlers::operation::{mutation, query, schema};
use crate::state::AppState;
use axum::{routing::get, routing::post, Router};

pub fn operation_routes(state: AppState) -> Router {
    Router::new()
        .route("/schema", get(schema))
        .route("/query/:operation", get(query))
        .route("/mutation/:operation", post(mutation))
        .with_state(state)
}
