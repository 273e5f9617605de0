//! Account route handlers. All require a signed-in user.

use axum::{
    Json,
    extract::{Path, State},
};
use projecthub_core::ProjectId;
use serde::Serialize;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{DownloadArtifact, Purchase, RemoteUserRecord};
use crate::state::AppState;

/// Account overview: the user's remote record.
#[derive(Debug, Serialize)]
pub struct AccountView {
    pub email: String,
    #[serde(flatten)]
    pub record: RemoteUserRecord,
}

/// The signed-in user's remote record. A user with no record yet sees an
/// empty one.
#[instrument(skip_all)]
pub async fn index(
    RequireAuth(principal): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<AccountView>> {
    let record = state
        .remote()
        .fetch(principal.user_id)
        .await?
        .unwrap_or_default();
    Ok(Json(AccountView {
        email: principal.email.to_string(),
        record,
    }))
}

/// Purchase history, newest first.
#[instrument(skip_all)]
pub async fn purchases(
    RequireAuth(principal): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<Purchase>>> {
    let rows = state.purchases().list_for_user(principal.user_id).await?;
    Ok(Json(rows))
}

/// Re-issue a download artifact for a purchased project.
///
/// Artifacts are derived, not stored: expired links are replaced by asking
/// again, gated on a purchase row existing for this user and project.
#[instrument(skip_all)]
pub async fn download(
    RequireAuth(principal): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DownloadArtifact>> {
    let id = ProjectId::from(id);
    let owned = state
        .purchases()
        .list_for_user(principal.user_id)
        .await?
        .iter()
        .any(|purchase| purchase.project_id == id);
    if !owned {
        return Err(AppError::NotFound(format!("purchase for project {id}")));
    }

    let artifact = state
        .signer()
        .sign(&id)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(artifact))
}
