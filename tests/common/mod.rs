#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, Response, StatusCode},
    Router,
};
use serde_json::Value as JsonValue;
use sqlx::SqlitePool;
use tower::ServiceExt;
use url::Url;

use user_sync_backend::{
    build_router,
    config::Config,
    database::pool::{create_memory_pool, run_migrations},
    error::{Error, Result},
    services::identity_service::IdentityProvider,
    utils::signature::WebhookVerifier,
    AppState,
};

pub const WEBHOOK_SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";
pub const JWT_SECRET: &str = "test_jwt_secret";

/// Records back-reference pushes instead of calling out.
#[derive(Clone, Default)]
pub struct RecordingIdentityProvider {
    pub calls: Arc<Mutex<Vec<(String, String)>>>,
    pub fail: bool,
}

impl RecordingIdentityProvider {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityProvider for RecordingIdentityProvider {
    async fn set_external_id(&self, provider_user_id: &str, local_id: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((provider_user_id.to_string(), local_id.to_string()));
        if self.fail {
            Err(Error::Upstream("identity provider returned 503".into()))
        } else {
            Ok(())
        }
    }
}

pub fn test_config(webhook_secret: Option<&str>) -> Config {
    Config {
        server_address: "127.0.0.1:0".into(),
        database_url: "sqlite::memory:".into(),
        jwt_secret: JWT_SECRET.into(),
        clerk_webhook_secret: webhook_secret.map(str::to_string),
        clerk_secret_key: None,
        clerk_api_url: Url::parse("http://127.0.0.1:9/v1").unwrap(),
        webhook_rps: 1000,
        identity_timeout_secs: 1,
        session_ttl_secs: 3600,
    }
}

pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
    pub identity: RecordingIdentityProvider,
}

pub async fn setup_app_with(
    webhook_secret: Option<&str>,
    identity: RecordingIdentityProvider,
) -> TestApp {
    let pool = create_memory_pool().await.expect("pool");
    run_migrations(&pool).await.expect("migrations");

    let config = test_config(webhook_secret);
    let state =
        AppState::with_identity_provider(pool.clone(), &config, Arc::new(identity.clone()))
            .expect("state");

    TestApp {
        router: build_router(state),
        pool,
        identity,
    }
}

pub async fn setup_app() -> TestApp {
    setup_app_with(Some(WEBHOOK_SECRET), RecordingIdentityProvider::default()).await
}

pub fn signed_request(body: &str) -> Request<Body> {
    let verifier = WebhookVerifier::new(WEBHOOK_SECRET).unwrap();
    let timestamp = chrono::Utc::now().timestamp().to_string();
    let signature = verifier.sign("msg_test", &timestamp, body).unwrap();

    Request::builder()
        .method("POST")
        .uri("/api/webhooks/clerk")
        .header("content-type", "application/json")
        .header("svix-id", "msg_test")
        .header("svix-timestamp", timestamp)
        .header("svix-signature", signature)
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn send(app: &TestApp, req: Request<Body>) -> (StatusCode, JsonValue) {
    let resp: Response<Body> = app.router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null)
    };
    (status, json)
}

pub async fn count_users(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await
        .expect("count")
}

pub fn user_event(event_type: &str, id: &str, email: Option<&str>, first: Option<&str>, last: Option<&str>) -> String {
    let emails = match email {
        Some(e) => serde_json::json!([{ "email_address": e }]),
        None => serde_json::json!([]),
    };
    serde_json::json!({
        "type": event_type,
        "data": {
            "id": id,
            "email_addresses": emails,
            "first_name": first,
            "last_name": last,
        }
    })
    .to_string()
}
