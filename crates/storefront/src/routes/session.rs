//! Session route handlers.
//!
//! Identity is established by an external provider; this surface only
//! accepts the resulting principal. Sign-in triggers the remote hydration
//! pass, sign-out keeps the local collections intact.

use axum::{Json, extract::State, http::StatusCode};
use tracing::instrument;

use crate::models::Principal;
use crate::state::AppState;

/// Sign a principal in and hydrate the collections from their remote
/// record.
#[instrument(skip_all)]
pub async fn sign_in(State(state): State<AppState>, Json(principal): Json<Principal>) -> StatusCode {
    state.sign_in(principal).await;
    StatusCode::NO_CONTENT
}

/// Sign the current principal out.
#[instrument(skip_all)]
pub async fn sign_out(State(state): State<AppState>) -> StatusCode {
    state.sign_out();
    StatusCode::NO_CONTENT
}
