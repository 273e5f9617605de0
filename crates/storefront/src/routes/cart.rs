//! Cart route handlers.
//!
//! Every mutation goes through the collections engine, so the in-memory
//! cart, the durable local cache, and the remote mirror all observe the
//! same sequence of changes.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use projecthub_core::ProjectId;
use serde::Deserialize;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::models::Project;
use crate::state::AppState;
use crate::store::Slot;

/// Payload for adding a project to a collection.
#[derive(Debug, Deserialize)]
pub struct AddItem {
    pub project_id: String,
}

/// Current cart contents, in insertion order.
#[instrument(skip_all)]
pub async fn index(State(state): State<AppState>) -> Json<Vec<Project>> {
    let collections = state.collections().lock().await;
    Json(collections.snapshot(Slot::Cart))
}

/// Add a catalog project to the cart.
#[instrument(skip_all)]
pub async fn add(
    State(state): State<AppState>,
    Json(payload): Json<AddItem>,
) -> Result<Json<Vec<Project>>> {
    add_to_slot(&state, Slot::Cart, payload.project_id).await
}

/// Remove a project from the cart; removing an absent id is a no-op.
#[instrument(skip_all)]
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<Vec<Project>> {
    let id = ProjectId::from(id);
    let mut collections = state.collections().lock().await;
    collections.remove(Slot::Cart, &id);
    Json(collections.snapshot(Slot::Cart))
}

/// Move a cart item to the wishlist.
#[instrument(skip_all)]
pub async fn move_to_wishlist(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let id = ProjectId::from(id);
    let mut collections = state.collections().lock().await;
    let Some(project) = collections
        .cart()
        .iter()
        .find(|item| item.id == id)
        .cloned()
    else {
        return Err(AppError::NotFound(format!("cart item {id}")));
    };
    collections.move_to_wishlist(project);
    Ok(StatusCode::NO_CONTENT)
}

/// Shared add path for both collections: resolve the id through the
/// catalog, reject unknown ids, then hand the record to the engine.
pub(super) async fn add_to_slot(
    state: &AppState,
    slot: Slot,
    project_id: String,
) -> Result<Json<Vec<Project>>> {
    let id = ProjectId::from(project_id);
    let resolved = state.catalog().fetch_by_ids(std::slice::from_ref(&id)).await?;
    let Some(project) = resolved.into_iter().next() else {
        return Err(AppError::NotFound(format!("project {id}")));
    };

    let mut collections = state.collections().lock().await;
    collections.add(slot, project);
    Ok(Json(collections.snapshot(slot)))
}
