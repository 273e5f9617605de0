//! Catalog route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use projecthub_core::ProjectId;
use tracing::instrument;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{NewProject, Project};
use crate::state::AppState;

/// List the full catalog.
#[instrument(skip_all)]
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<Project>>> {
    let projects = state.catalog().list().await?;
    Ok(Json(projects))
}

/// Create a catalog entry. Admin only.
#[instrument(skip_all)]
pub async fn create(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Json(draft): Json<NewProject>,
) -> Result<(StatusCode, Json<Project>)> {
    let id = ProjectId::new(Uuid::new_v4().to_string());
    let project = draft.into_project(id)?;
    state.catalog().insert(&project).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// Delete a catalog entry. Admin only.
#[instrument(skip_all)]
pub async fn destroy(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let id = ProjectId::from(id);
    if state.catalog().delete(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("project {id}")))
    }
}
