//! Purchase records and download artifacts.

use chrono::{DateTime, Utc};
use projecthub_core::{PaymentId, ProjectId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One purchase row, created at settlement time.
///
/// The purchase table is append-only; rows are never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Purchase {
    pub user_id: UserId,
    pub project_id: ProjectId,
    /// Amount charged, in the currency's standard unit.
    pub amount: Decimal,
    /// Settlement token from the payment processor.
    pub payment_id: PaymentId,
    pub created_at: DateTime<Utc>,
}

/// A purchase row about to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPurchase {
    pub user_id: UserId,
    pub project_id: ProjectId,
    pub amount: Decimal,
    pub payment_id: PaymentId,
}

/// A short-lived access credential for one purchased bundle.
///
/// Derived, not stored. Regenerable on demand by any party holding a valid
/// [`Purchase`] row; this crate derives it once, synchronously after
/// settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadArtifact {
    pub project_id: ProjectId,
    pub download_url: String,
    pub expires_in_seconds: u64,
}
