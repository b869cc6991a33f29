use axum::{extract::State, Extension, Json};

use crate::{
    dto::account_dto::AccountResponse, error::Result, middleware::auth::Claims, AppState,
};

#[utoipa::path(
    get,
    path = "/api/account",
    responses(
        (status = 200, description = "Account of the signed-in caller", body = AccountResponse),
        (status = 401, description = "Missing, invalid or revoked bearer token"),
        (status = 404, description = "Account no longer exists")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn get_account(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<AccountResponse>> {
    let account = state.auth_service.get_account(&claims.sub).await?;
    Ok(Json(AccountResponse::from(account)))
}
