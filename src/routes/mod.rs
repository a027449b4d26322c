//! Router assembly.

mod common;
mod operation;

pub use common::common_routes;
pub use operation::operation_routes;

use crate::settings::Settings;
use crate::state::AppState;
use axum::Router;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Request bodies larger than this are rejected before reaching a handler.
pub const BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// Full API: common routes plus the synthesized surface, with tracing,
/// request timeout and body size limit.
pub fn api_router(state: AppState, settings: &Settings) -> Router {
    Router::new()
        .merge(common_routes())
        .merge(operation_routes(state))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .layer(TimeoutLayer::new(Duration::from_secs(settings.request_timeout_secs)))
        .layer(TraceLayer::new_for_http())
}
