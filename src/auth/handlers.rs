use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use tracing::{instrument, warn};

use crate::{
    auth::{
        dto::{
            CredentialsRequest, OkResponse, PublicUser, RequestResetRequest, ResetPasswordRequest,
            TokenResponse,
        },
        services::{is_valid_email, normalize_email},
    },
    error::{AppError, AppResult},
    extract::ApiJson,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/request-reset", post(request_reset))
        .route("/auth/reset", post(reset))
}

fn ensure_email_shape(email: &str) -> AppResult<()> {
    if !is_valid_email(&normalize_email(email)) {
        warn!("malformed email rejected");
        return Err(AppError::validation("Invalid email"));
    }
    Ok(())
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CredentialsRequest>,
) -> AppResult<(StatusCode, Json<PublicUser>)> {
    ensure_email_shape(&payload.email)?;
    let user = state.auth.signup(&payload.email, &payload.password).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CredentialsRequest>,
) -> AppResult<Json<TokenResponse>> {
    let token = state.auth.login(&payload.email, &payload.password).await?;
    Ok(Json(TokenResponse { token }))
}

#[instrument(skip(state, payload))]
pub async fn request_reset(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RequestResetRequest>,
) -> AppResult<Json<OkResponse>> {
    ensure_email_shape(&payload.email)?;
    state.auth.request_password_reset(&payload.email).await?;
    Ok(Json(OkResponse::ok()))
}

#[instrument(skip(state, payload))]
pub async fn reset(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ResetPasswordRequest>,
) -> AppResult<Json<OkResponse>> {
    state
        .auth
        .reset_password(&payload.token, &payload.new_password)
        .await?;
    Ok(Json(OkResponse::ok()))
}
