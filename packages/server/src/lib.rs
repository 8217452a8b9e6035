pub mod config;
pub mod consumers;
pub mod database;
pub mod dlq;
pub mod entity;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod shutdown;
pub mod state;

use std::time::Duration;

use axum::http::{HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable as ScalarServable};

use crate::config::{CorsConfig, ServerConfig};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Dead-Letter Recovery API",
        version = "1.0.0",
        description = "Inspect, retry and discard dead-lettered work"
    ),
    tags((name = "Dead Letter Queue", description = "Dead-letter entry management")),
)]
struct ApiDoc;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::dlq::list_entries,
        handlers::dlq::get_stats,
        handlers::dlq::get_entry,
        handlers::dlq::retry_entry,
        handlers::dlq::discard_entry,
        handlers::dlq::retry_all,
    ),
    components(schemas(
        common::DlqEntry,
        common::DlqStats,
        common::RetryAttempt,
        error::ErrorBody,
        models::dlq::DlqRetryResponse,
        models::dlq::DlqDiscardResponse,
        models::dlq::DlqRetryAllResponse,
    ))
)]
struct DlqApiDoc;

/// OpenAPI document with the DLQ routes mounted under `base_path`.
pub fn openapi(base_path: &str) -> utoipa::openapi::OpenApi {
    ApiDoc::openapi().nest(base_path, DlqApiDoc::openapi())
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allow_origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {}", o);
                None
            }
        })
        .collect();

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(config.max_age));

    if config.allow_origins.iter().any(|o| o == "*") {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

/// Build the application router.
pub fn build_router(state: AppState, config: &ServerConfig) -> axum::Router {
    let base_path = config.base_path.trim_end_matches('/');
    let api = if base_path.is_empty() {
        routes::dlq_routes()
    } else {
        axum::Router::new().nest(base_path, routes::dlq_routes())
    };

    api.with_state(state)
        .merge(Scalar::with_url("/scalar", openapi(base_path)))
        .layer(cors_layer(&config.cors))
}
