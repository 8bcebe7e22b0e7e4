//! Materials API Library
//!
//! CRUD service over material inventory records, validated against static
//! unit and tax-rate reference lists.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod health;
pub mod metrics;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod reference;
pub mod services;
pub mod tracing;

use axum::{routing::get, Router};
use http::HeaderValue;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::handlers::AppServices;
use crate::reference::ReferenceData;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: Arc<AppConfig>,
    pub reference: Arc<ReferenceData>,
    pub services: AppServices,
}

impl AppState {
    pub fn new(db: Arc<DbPool>, config: AppConfig, reference: ReferenceData) -> Self {
        let reference = Arc::new(reference);
        let services = AppServices::new(db.clone(), reference.clone());
        Self {
            db,
            config: Arc::new(config),
            reference,
            services,
        }
    }
}

/// CORS from the configured origin list, permissive when none are listed.
/// Configuration validation already refused a non-development environment
/// without origins unless the any-origin override is set.
pub fn cors_layer(cfg: &AppConfig) -> CorsLayer {
    let configured = cfg.cors_origins();
    let origins: Vec<HeaderValue> = configured
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if origins.len() < configured.len() {
        ::tracing::warn!(
            configured = configured.len(),
            usable = origins.len(),
            "dropping CORS origins that are not valid header values"
        );
    }

    if origins.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Full application router: material and reference routes, health, metrics
/// and API docs, wrapped in CORS, tracing and request-id layers.
pub fn app_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    let db = state.db.clone();

    Router::new()
        .merge(handlers::materials::material_routes())
        .merge(handlers::reference::reference_routes())
        .with_state(state)
        .nest("/health", health::health_routes(db))
        .route("/metrics", get(metrics::metrics_handler))
        .route("/metrics/json", get(metrics::metrics_json_handler))
        .merge(openapi::swagger_ui())
        .layer(cors)
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
}
