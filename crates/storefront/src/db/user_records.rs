//! Remote user record repository.
//!
//! One row per user, holding the mirrored cart/wishlist id lists, the
//! purchased-project ids, and the user's messages. Mirror writes are
//! full-list upserts so they converge regardless of arrival order.

use async_trait::async_trait;
use projecthub_core::{ProjectId, UserId};
use sqlx::PgPool;
use sqlx::types::Json;

use super::RepositoryError;
use crate::models::{Message, RemoteUserRecord};
use crate::store::Slot;
use crate::sync::RemoteMirrorStore;

/// Repository for per-user remote records.
#[derive(Clone)]
pub struct UserRecordRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct UserRecordRow {
    cart: Vec<String>,
    wishlist: Vec<String>,
    purchased_projects: Vec<String>,
    messages: Json<Vec<Message>>,
}

impl From<UserRecordRow> for RemoteUserRecord {
    fn from(row: UserRecordRow) -> Self {
        let ids = |raw: Vec<String>| raw.into_iter().map(ProjectId::new).collect();
        Self {
            cart: ids(row.cart),
            wishlist: ids(row.wishlist),
            purchased_projects: ids(row.purchased_projects),
            messages: row.messages.0,
        }
    }
}

impl UserRecordRepository {
    /// Create a new user record repository over a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn id_strings(ids: &[ProjectId]) -> Vec<String> {
    ids.iter().map(|id| id.as_str().to_owned()).collect()
}

#[async_trait]
impl RemoteMirrorStore for UserRecordRepository {
    async fn fetch(&self, user_id: UserId) -> Result<Option<RemoteUserRecord>, RepositoryError> {
        let row: Option<UserRecordRow> = sqlx::query_as(
            r"
            SELECT cart, wishlist, purchased_projects, messages
            FROM user_records
            WHERE user_id = $1
            ",
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(RemoteUserRecord::from))
    }

    async fn replace_slot(
        &self,
        user_id: UserId,
        slot: Slot,
        ids: &[ProjectId],
    ) -> Result<(), RepositoryError> {
        let sql = match slot {
            Slot::Cart => {
                r"
                INSERT INTO user_records (user_id, cart)
                VALUES ($1, $2)
                ON CONFLICT (user_id) DO UPDATE SET cart = EXCLUDED.cart
                "
            }
            Slot::Wishlist => {
                r"
                INSERT INTO user_records (user_id, wishlist)
                VALUES ($1, $2)
                ON CONFLICT (user_id) DO UPDATE SET wishlist = EXCLUDED.wishlist
                "
            }
        };

        sqlx::query(sql)
            .bind(user_id.as_uuid())
            .bind(id_strings(ids))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn append_purchased(
        &self,
        user_id: UserId,
        ids: &[ProjectId],
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO user_records (user_id, purchased_projects)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE
            SET purchased_projects = user_records.purchased_projects || EXCLUDED.purchased_projects
            ",
        )
        .bind(user_id.as_uuid())
        .bind(id_strings(ids))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
