//! Checkout route handlers.
//!
//! A begun checkout lives in the state's checkout map until the process
//! exits. Terminal checkouts stay in the map so a repeated settlement call
//! for the same checkout gets a conflict response instead of a dangling 404.

use axum::{
    Json,
    extract::{Path, State},
};
use projecthub_core::{CurrencyCode, PaymentId};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::checkout::Checkout;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::DownloadArtifact;
use crate::state::AppState;
use crate::store::Slot;

/// Response for a begun checkout.
#[derive(Debug, Serialize)]
pub struct CheckoutStarted {
    pub checkout_id: Uuid,
    pub amount_minor: i64,
    pub currency: CurrencyCode,
    /// Order reference from the payment processor, handed to its checkout UI.
    pub provider_ref: String,
}

/// Payload for settling a checkout.
#[derive(Debug, Deserialize)]
pub struct Settlement {
    pub payment_id: String,
}

/// Begin a checkout for the current cart contents.
#[instrument(skip_all)]
pub async fn begin(
    RequireAuth(principal): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<CheckoutStarted>> {
    let items = state.collections().lock().await.snapshot(Slot::Cart);
    let currency = state.config().payments.currency;
    let checkout = Checkout::begin(Some(principal), items, currency, state.payments()).await?;

    let started = CheckoutStarted {
        checkout_id: checkout.id(),
        amount_minor: checkout.amount_minor(),
        currency: checkout.currency(),
        provider_ref: checkout.provider_ref().to_owned(),
    };
    state.checkouts().lock().await.insert(checkout.id(), checkout);
    Ok(Json(started))
}

/// Settle a checkout with the processor's payment token.
#[instrument(skip_all)]
pub async fn settle(
    RequireAuth(_principal): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<Settlement>,
) -> Result<Json<Vec<DownloadArtifact>>> {
    if payload.payment_id.trim().is_empty() {
        return Err(AppError::BadRequest("payment_id must not be empty".to_owned()));
    }
    let token = PaymentId::from(payload.payment_id);

    let mut checkouts = state.checkouts().lock().await;
    let checkout = checkouts
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("checkout {id}")))?;

    let artifacts = checkout
        .settle(
            token,
            state.purchases(),
            state.signer(),
            state.remote(),
            state.collections(),
        )
        .await?;
    Ok(Json(artifacts))
}
