use axum::{
    extract::{Path, Query, State},
    response::Redirect,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::extractors::ManageUsers,
    error::AppResult,
    state::AppState,
    users::{
        dto::{ListQuery, UserInput},
        services,
    },
    view::View,
};

pub fn users_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(index).post(store))
        .route("/users/create", get(create))
        .route("/users/:id", get(show).put(update).delete(destroy))
        .route("/users/:id/edit", get(edit))
        .route("/users/:id/delete", get(delete))
}

/// GET /users
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    actor: ManageUsers,
    Query(query): Query<ListQuery>,
) -> AppResult<View> {
    services::list(&state, actor.id(), &query).await
}

/// GET /users/:id
pub async fn show(
    state: State<AppState>,
    actor: ManageUsers,
    id: Path<i64>,
) -> AppResult<View> {
    edit(state, actor, id).await
}

/// GET /users/create
#[instrument(skip(state))]
pub async fn create(State(state): State<AppState>, actor: ManageUsers) -> AppResult<View> {
    services::new_form(&state, actor.id()).await
}

/// GET /users/:id/edit
#[instrument(skip(state))]
pub async fn edit(
    State(state): State<AppState>,
    actor: ManageUsers,
    Path(id): Path<i64>,
) -> AppResult<View> {
    services::edit_form(&state, actor.id(), id).await
}

/// POST /users
#[instrument(skip(state, input))]
pub async fn store(
    State(state): State<AppState>,
    actor: ManageUsers,
    Json(input): Json<UserInput>,
) -> AppResult<Redirect> {
    let to = services::create(&state, actor.id(), input).await?;
    Ok(Redirect::to(&to))
}

/// PUT /users/:id
#[instrument(skip(state, input))]
pub async fn update(
    State(state): State<AppState>,
    actor: ManageUsers,
    Path(id): Path<i64>,
    Json(input): Json<UserInput>,
) -> AppResult<Redirect> {
    let to = services::update(&state, actor.id(), id, input).await?;
    Ok(Redirect::to(&to))
}

/// GET /users/:id/delete
pub async fn delete(
    state: State<AppState>,
    actor: ManageUsers,
    id: Path<i64>,
) -> AppResult<Redirect> {
    destroy(state, actor, id).await
}

/// DELETE /users/:id
#[instrument(skip(state))]
pub async fn destroy(
    State(state): State<AppState>,
    actor: ManageUsers,
    Path(id): Path<i64>,
) -> AppResult<Redirect> {
    let to = services::destroy(&state, actor.id(), id).await?;
    Ok(Redirect::to(&to))
}
