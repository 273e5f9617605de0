//! Purchase repository.
//!
//! Rows are append-only; one settlement inserts its whole batch inside a
//! single transaction so a mid-batch failure leaves nothing behind.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use projecthub_core::{PaymentId, ProjectId, UserId};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use super::{PurchaseStore, RepositoryError};
use crate::models::{NewPurchase, Purchase};

/// Repository for settlement purchase rows.
#[derive(Clone)]
pub struct PurchaseRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct PurchaseRow {
    user_id: Uuid,
    project_id: String,
    amount: Decimal,
    payment_id: String,
    created_at: DateTime<Utc>,
}

impl From<PurchaseRow> for Purchase {
    fn from(row: PurchaseRow) -> Self {
        Self {
            user_id: UserId::new(row.user_id),
            project_id: ProjectId::new(row.project_id),
            amount: row.amount,
            payment_id: PaymentId::new(row.payment_id),
            created_at: row.created_at,
        }
    }
}

impl PurchaseRepository {
    /// Create a new purchase repository over a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PurchaseStore for PurchaseRepository {
    async fn payment_recorded(
        &self,
        user_id: UserId,
        payment_id: &PaymentId,
    ) -> Result<bool, RepositoryError> {
        let exists: bool = sqlx::query_scalar(
            r"
            SELECT EXISTS (
                SELECT 1 FROM purchases
                WHERE user_id = $1 AND payment_id = $2
            )
            ",
        )
        .bind(user_id.as_uuid())
        .bind(payment_id.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn insert_batch(&self, purchases: &[NewPurchase]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for purchase in purchases {
            sqlx::query(
                r"
                INSERT INTO purchases (user_id, project_id, amount, payment_id)
                VALUES ($1, $2, $3, $4)
                ",
            )
            .bind(purchase.user_id.as_uuid())
            .bind(purchase.project_id.as_str())
            .bind(purchase.amount)
            .bind(purchase.payment_id.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Purchase>, RepositoryError> {
        let rows: Vec<PurchaseRow> = sqlx::query_as(
            r"
            SELECT user_id, project_id, amount, payment_id, created_at
            FROM purchases
            WHERE user_id = $1
            ORDER BY created_at DESC
            ",
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Purchase::from).collect())
    }
}
