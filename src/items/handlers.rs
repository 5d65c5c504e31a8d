use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{CreateItemRequest, SearchQuery, UpdateItemRequest},
    repo_types::Item,
};
use crate::{
    auth::{dto::OkResponse, extractors::CurrentUser},
    error::AppResult,
    extract::{ApiJson, ApiPath, ApiQuery},
    state::AppState,
};

pub fn item_routes() -> Router<AppState> {
    Router::new()
        .route("/items", get(list_items).post(create_item))
        .route(
            "/items/:id",
            get(get_item).patch(update_item).delete(delete_item),
        )
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn list_items(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> AppResult<Json<Vec<Item>>> {
    let items = state.items.search(user.id, query.q.as_deref()).await?;
    Ok(Json(items))
}

#[instrument(skip(state, user, body), fields(user_id = user.id))]
pub async fn create_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<CreateItemRequest>,
) -> AppResult<(StatusCode, Json<Item>)> {
    let item = state.items.create(user.id, body).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn get_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<Item>> {
    Ok(Json(state.items.find_one(user.id, id).await?))
}

#[instrument(skip(state, user, body), fields(user_id = user.id))]
pub async fn update_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<UpdateItemRequest>,
) -> AppResult<Json<Item>> {
    Ok(Json(state.items.update(user.id, id, body).await?))
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn delete_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<OkResponse>> {
    state.items.remove(user.id, id).await?;
    Ok(Json(OkResponse::ok()))
}
