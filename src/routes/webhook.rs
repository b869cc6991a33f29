use axum::{extract::State, http::HeaderMap, Json};

use crate::{
    dto::webhook_dto::WebhookResponse, error::Result, utils::signature::WebhookHeaders, AppState,
};

/// Body is taken as the raw string: the signature covers the exact bytes sent.
#[utoipa::path(
    post,
    path = "/api/webhooks/clerk",
    request_body(content = String, description = "Raw identity-provider event JSON", content_type = "application/json"),
    params(
        ("svix-id" = String, Header, description = "Message id"),
        ("svix-timestamp" = String, Header, description = "Unix timestamp in seconds"),
        ("svix-signature" = String, Header, description = "Space-separated v1 signatures")
    ),
    responses(
        (status = 200, description = "Event applied or acknowledged", body = WebhookResponse),
        (status = 400, description = "Event is missing required fields"),
        (status = 401, description = "Signature verification failed"),
        (status = 404, description = "No local user for the event subject"),
        (status = 409, description = "User already exists"),
        (status = 500, description = "Webhook secret not configured")
    )
)]
#[axum::debug_handler]
pub async fn handle_clerk_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>> {
    let headers = WebhookHeaders::from_header_map(&headers)?;
    let response = state.webhook_service.handle(&body, &headers).await?;
    Ok(Json(response))
}
