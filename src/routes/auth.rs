use axum::{extract::State, http::StatusCode, Extension, Json};

use crate::{
    dto::auth_dto::{SessionResponse, SignInPayload, SignUpPayload},
    error::Result,
    middleware::auth::Claims,
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/auth/sign-up/email",
    request_body = SignUpPayload,
    responses(
        (status = 201, description = "Account created and signed in", body = SessionResponse),
        (status = 400, description = "Invalid email, password or name"),
        (status = 409, description = "Email is already registered")
    )
)]
pub async fn sign_up(
    State(state): State<AppState>,
    Json(payload): Json<SignUpPayload>,
) -> Result<(StatusCode, Json<SessionResponse>)> {
    let session = state.auth_service.sign_up(payload).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

#[utoipa::path(
    post,
    path = "/api/auth/sign-in/email",
    request_body = SignInPayload,
    responses(
        (status = 200, description = "Signed in", body = SessionResponse),
        (status = 401, description = "Invalid email or password")
    )
)]
pub async fn sign_in(
    State(state): State<AppState>,
    Json(payload): Json<SignInPayload>,
) -> Result<Json<SessionResponse>> {
    let session = state.auth_service.sign_in(payload).await?;
    Ok(Json(session))
}

#[utoipa::path(
    post,
    path = "/api/auth/sign-out",
    responses(
        (status = 204, description = "Session revoked"),
        (status = 401, description = "Missing or invalid bearer token")
    ),
    security(("bearer" = []))
)]
pub async fn sign_out(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode> {
    state.auth_service.sign_out(&claims).await?;
    Ok(StatusCode::NO_CONTENT)
}
