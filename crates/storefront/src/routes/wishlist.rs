//! Wishlist route handlers.
//!
//! Structurally the mirror image of the cart surface; both share the same
//! collections engine underneath.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use projecthub_core::ProjectId;
use tracing::instrument;

use super::cart::{AddItem, add_to_slot};
use crate::error::{AppError, Result};
use crate::models::Project;
use crate::state::AppState;
use crate::store::Slot;

/// Current wishlist contents, in insertion order.
#[instrument(skip_all)]
pub async fn index(State(state): State<AppState>) -> Json<Vec<Project>> {
    let collections = state.collections().lock().await;
    Json(collections.snapshot(Slot::Wishlist))
}

/// Add a catalog project to the wishlist.
#[instrument(skip_all)]
pub async fn add(
    State(state): State<AppState>,
    Json(payload): Json<AddItem>,
) -> Result<Json<Vec<Project>>> {
    add_to_slot(&state, Slot::Wishlist, payload.project_id).await
}

/// Remove a project from the wishlist; removing an absent id is a no-op.
#[instrument(skip_all)]
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<Vec<Project>> {
    let id = ProjectId::from(id);
    let mut collections = state.collections().lock().await;
    collections.remove(Slot::Wishlist, &id);
    Json(collections.snapshot(Slot::Wishlist))
}

/// Move a wishlist item to the cart.
#[instrument(skip_all)]
pub async fn move_to_cart(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let id = ProjectId::from(id);
    let mut collections = state.collections().lock().await;
    let Some(project) = collections
        .wishlist()
        .iter()
        .find(|item| item.id == id)
        .cloned()
    else {
        return Err(AppError::NotFound(format!("wishlist item {id}")));
    };
    collections.move_to_cart(project);
    Ok(StatusCode::NO_CONTENT)
}
