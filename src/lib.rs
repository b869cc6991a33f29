pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod telemetry;
pub mod utils;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::Result;
use crate::middleware::{
    auth::{require_bearer_auth, JwtKeys},
    rate_limit::{rate_limit_middleware, RateLimiter},
};
use crate::services::{
    auth_service::AuthService,
    identity_service::{ClerkClient, IdentityProvider},
    user_service::{SqliteUserStore, UserStore},
    webhook_service::WebhookSyncService,
};

const WEBHOOK_BODY_LIMIT: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub webhook_service: WebhookSyncService,
    pub auth_service: AuthService,
    pub webhook_limiter: RateLimiter,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: &Config) -> Result<Self> {
        let identity = ClerkClient::new(
            config.clerk_api_url.clone(),
            config.clerk_secret_key.clone(),
            Duration::from_secs(config.identity_timeout_secs),
        )?;
        Self::with_identity_provider(pool, config, Arc::new(identity))
    }

    /// Same as [`AppState::new`] with a caller-supplied identity provider.
    pub fn with_identity_provider(
        pool: SqlitePool,
        config: &Config,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self> {
        let user_store: Arc<dyn UserStore> = Arc::new(SqliteUserStore::new(pool.clone()));
        let webhook_service = WebhookSyncService::from_secret(
            config.clerk_webhook_secret.as_deref(),
            user_store,
            identity,
        )?;
        let auth_service = AuthService::new(
            pool.clone(),
            JwtKeys::new(&config.jwt_secret),
            chrono::Duration::seconds(config.session_ttl_secs),
        );

        Ok(Self {
            pool,
            webhook_service,
            auth_service,
            webhook_limiter: RateLimiter::per_second(config.webhook_rps),
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let webhook_api = Router::new()
        .route(
            "/api/webhooks/clerk",
            post(routes::webhook::handle_clerk_webhook),
        )
        .layer(DefaultBodyLimit::max(WEBHOOK_BODY_LIMIT))
        .layer(axum::middleware::from_fn_with_state(
            state.webhook_limiter.clone(),
            rate_limit_middleware,
        ));

    let session_api = Router::new()
        .route("/api/auth/sign-out", post(routes::auth::sign_out))
        .route("/api/account", get(routes::account::get_account))
        .layer(axum::middleware::from_fn_with_state(
            state.auth_service.clone(),
            require_bearer_auth,
        ));

    Router::new()
        .route("/health", get(routes::health::health))
        .route("/api/openapi.json", get(routes::openapi::openapi_json))
        .route("/api/auth/sign-up/email", post(routes::auth::sign_up))
        .route("/api/auth/sign-in/email", post(routes::auth::sign_in))
        .merge(webhook_api)
        .merge(session_api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
