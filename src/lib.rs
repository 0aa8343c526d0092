//! psi-api library
//!
//! Purchasing and receiving back office: draft receivings built from
//! purchase orders, their inventory transactions, and the admin HTTP API.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod common;
pub mod config;
pub mod context;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod migrator;
pub mod models;
pub mod services;

use axum::{middleware, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::auth::{auth_middleware, AuthConfig, AuthService};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
    pub auth: Arc<AuthService>,
}

impl AppState {
    pub fn new(db: Arc<DatabaseConnection>, config: config::AppConfig) -> Self {
        let services = handlers::AppServices::new(db.clone(), config.receiving.clone());
        let auth = Arc::new(AuthService::new(AuthConfig::from(&config)));
        Self {
            db,
            config,
            services,
            auth,
        }
    }
}

/// Full application router: `/health` plus the authenticated `/api/v1` API.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(handlers::receivings::receiving_routes())
        .merge(handlers::enum_values::enum_value_routes())
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ));

    let x_request_id = http::HeaderName::from_static("x-request-id");

    Router::new()
        .merge(handlers::health::health_routes())
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CorsLayer::permissive())
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
        .with_state(state)
}
