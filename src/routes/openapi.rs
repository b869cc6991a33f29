use axum::Json;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::dto::{
    account_dto::AccountResponse,
    auth_dto::{SessionResponse, SignInPayload, SignUpPayload},
    webhook_dto::WebhookResponse,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health::health,
        crate::routes::webhook::handle_clerk_webhook,
        crate::routes::auth::sign_up,
        crate::routes::auth::sign_in,
        crate::routes::auth::sign_out,
        crate::routes::account::get_account,
    ),
    components(schemas(
        WebhookResponse,
        AccountResponse,
        SignUpPayload,
        SignInPayload,
        SessionResponse
    )),
    modifiers(&BearerAuth),
    tags((name = "user-sync-backend", description = "Identity-provider user synchronization"))
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
