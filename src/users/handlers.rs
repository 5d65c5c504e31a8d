use axum::{extract::State, routing::get, Json, Router};
use tracing::instrument;

use crate::{
    auth::{dto::PublicUser, extractors::CurrentUser},
    error::AppResult,
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new().route("/users/me", get(get_me))
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn get_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<PublicUser>> {
    Ok(Json(state.auth.current_user(&user).await?))
}
