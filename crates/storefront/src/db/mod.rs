//! Database operations for the storefront `PostgreSQL`.
//!
//! # Tables
//!
//! - `projects` - Catalog of purchasable project bundles
//! - `user_records` - Per-user remote mirror (cart/wishlist id lists,
//!   purchased projects, messages)
//! - `purchases` - Append-only settlement rows
//!
//! # Migrations
//!
//! Migrations live in `crates/storefront/migrations/` and run via
//! `sqlx migrate run` against the storefront database. They are not run
//! automatically on startup.
//!
//! The repository structs here implement the store traits the engine
//! consumes ([`CatalogStore`], [`PurchaseStore`],
//! [`crate::sync::RemoteMirrorStore`]), which keeps the engine testable with
//! in-memory collaborators.

use std::time::Duration;

use async_trait::async_trait;
use projecthub_core::{PaymentId, ProjectId, UserId};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use crate::models::{NewPurchase, Project, Purchase};

pub mod projects;
pub mod purchases;
pub mod user_records;

pub use projects::ProjectRepository;
pub use purchases::PurchaseRepository;
pub use user_records::UserRecordRepository;

/// Errors from repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored value could not be interpreted.
    #[error("Data corruption: {0}")]
    DataCorruption(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Read access to the project catalog, plus the narrow admin mutations.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// List the whole catalog.
    async fn list(&self) -> Result<Vec<Project>, RepositoryError>;

    /// Fetch the projects with the given ids; unknown ids are simply absent
    /// from the result.
    async fn fetch_by_ids(&self, ids: &[ProjectId]) -> Result<Vec<Project>, RepositoryError>;

    /// Insert a new catalog entry.
    async fn insert(&self, project: &Project) -> Result<(), RepositoryError>;

    /// Delete a catalog entry, returning whether it existed.
    async fn delete(&self, id: &ProjectId) -> Result<bool, RepositoryError>;
}

/// Append-only store of settlement purchase rows.
#[async_trait]
pub trait PurchaseStore: Send + Sync {
    /// Whether a purchase row with this settlement token already exists for
    /// the user (the checkout idempotency check).
    async fn payment_recorded(
        &self,
        user_id: UserId,
        payment_id: &PaymentId,
    ) -> Result<bool, RepositoryError>;

    /// Insert all rows of one settlement as a single transaction.
    async fn insert_batch(&self, purchases: &[NewPurchase]) -> Result<(), RepositoryError>;

    /// All purchases made by a user, newest first.
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Purchase>, RepositoryError>;
}
