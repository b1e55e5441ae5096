//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection and service construction
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: request DTOs, envelopes and mapping into domain inputs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{
    http::{HeaderValue, Method, header},
    routing::get,
    Extension, Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::warn;

use shopfront_infra::store::StoreError;

use crate::config::AppConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Router plus the services behind it, so `main` can shut them down.
pub struct App {
    pub router: Router,
    pub services: Arc<AppServices>,
}

/// Build services from config and wire the router over them.
pub async fn build_app(config: &AppConfig) -> Result<App, StoreError> {
    let services = Arc::new(services::build_services(config).await?);
    let router = build_router(services.clone(), config);
    Ok(App { router, services })
}

pub fn build_router(services: Arc<AppServices>, config: &AppConfig) -> Router {
    let auth_state = middleware::AuthState {
        accounts: services.accounts.clone(),
    };
    // Multipart framing overhead on top of the per-file cap.
    let upload_body_limit = config.upload.max_bytes.saturating_mul(10).saturating_add(64 * 1024);

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router(upload_body_limit))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ))
        .layer(Extension(services))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&config.cors_origins))
                .layer(TimeoutLayer::new(config.request_timeout)),
        )
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring unparsable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(600))
}
