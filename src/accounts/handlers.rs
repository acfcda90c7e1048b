use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    accounts::{
        dto::{PublicUser, RegisterRequest, TokenRequest, TokenResponse, UpdateMeRequest},
        errors::AccountError,
        extractors::{BearerToken, ValidJson},
        services::AccountService,
    },
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/user/create", post(register))
        .route("/user/token", post(issue_token))
        // any other method on /user/me is answered with 405 by the router
        .route("/user/me", get(get_me).patch(update_me))
}

#[instrument(skip_all)]
pub async fn register(
    State(accounts): State<AccountService>,
    ValidJson(payload): ValidJson<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicUser>), AccountError> {
    let user = accounts.register(payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip_all)]
pub async fn issue_token(
    State(accounts): State<AccountService>,
    ValidJson(payload): ValidJson<TokenRequest>,
) -> Result<Json<TokenResponse>, AccountError> {
    let token = accounts.authenticate(payload).await?;
    Ok(Json(TokenResponse { token }))
}

#[instrument(skip_all)]
pub async fn get_me(
    State(accounts): State<AccountService>,
    BearerToken(token): BearerToken,
) -> Result<Json<PublicUser>, AccountError> {
    Ok(Json(accounts.get_self(&token).await?))
}

#[instrument(skip_all)]
pub async fn update_me(
    State(accounts): State<AccountService>,
    BearerToken(token): BearerToken,
    ValidJson(payload): ValidJson<UpdateMeRequest>,
) -> Result<Json<PublicUser>, AccountError> {
    Ok(Json(accounts.update_self(&token, payload).await?))
}
