//! Catalog repository with a read-through cache.
//!
//! Project records are immutable once fetched, so individual lookups are
//! cached in a `moka` future cache; admin mutations invalidate eagerly.

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use projecthub_core::{CurrencyCode, Price, ProjectId};
use rust_decimal::Decimal;
use sqlx::PgPool;

use super::{CatalogStore, RepositoryError};
use crate::models::Project;

/// How long a cached project stays fresh.
const CACHE_TTL: Duration = Duration::from_secs(300);
const CACHE_CAPACITY: u64 = 1024;

/// Repository for catalog project operations.
#[derive(Clone)]
pub struct ProjectRepository {
    pool: PgPool,
    cache: Cache<ProjectId, Project>,
}

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: String,
    title: String,
    description: String,
    price: Decimal,
    currency: String,
    preview_image: String,
    technologies: Vec<String>,
    rating: f32,
}

impl ProjectRow {
    fn into_project(self) -> Result<Project, RepositoryError> {
        let currency = CurrencyCode::parse(&self.currency).ok_or_else(|| {
            RepositoryError::DataCorruption(format!(
                "unknown currency code in database: {}",
                self.currency
            ))
        })?;
        Ok(Project {
            id: ProjectId::new(self.id),
            title: self.title,
            description: self.description,
            price: Price::new(self.price, currency),
            preview_image: self.preview_image,
            technologies: self.technologies,
            rating: self.rating,
        })
    }
}

impl ProjectRepository {
    /// Create a new catalog repository over a connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            cache: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(CACHE_TTL)
                .build(),
        }
    }
}

#[async_trait]
impl CatalogStore for ProjectRepository {
    async fn list(&self) -> Result<Vec<Project>, RepositoryError> {
        let rows: Vec<ProjectRow> = sqlx::query_as(
            r"
            SELECT id, title, description, price, currency, preview_image,
                   technologies, rating
            FROM projects
            ORDER BY title
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ProjectRow::into_project).collect()
    }

    async fn fetch_by_ids(&self, ids: &[ProjectId]) -> Result<Vec<Project>, RepositoryError> {
        let mut found = Vec::with_capacity(ids.len());
        let mut missing: Vec<String> = Vec::new();

        for id in ids {
            if let Some(project) = self.cache.get(id).await {
                found.push(project);
            } else {
                missing.push(id.as_str().to_owned());
            }
        }

        if !missing.is_empty() {
            let rows: Vec<ProjectRow> = sqlx::query_as(
                r"
                SELECT id, title, description, price, currency, preview_image,
                       technologies, rating
                FROM projects
                WHERE id = ANY($1)
                ",
            )
            .bind(&missing)
            .fetch_all(&self.pool)
            .await?;

            for row in rows {
                let project = row.into_project()?;
                self.cache.insert(project.id.clone(), project.clone()).await;
                found.push(project);
            }
        }

        // Preserve the requested order.
        let mut ordered = Vec::with_capacity(found.len());
        for id in ids {
            if let Some(pos) = found.iter().position(|p| &p.id == id) {
                ordered.push(found.swap_remove(pos));
            }
        }
        Ok(ordered)
    }

    async fn insert(&self, project: &Project) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO projects (id, title, description, price, currency,
                                  preview_image, technologies, rating)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(project.id.as_str())
        .bind(&project.title)
        .bind(&project.description)
        .bind(project.price.amount)
        .bind(project.price.currency_code.code())
        .bind(&project.preview_image)
        .bind(&project.technologies)
        .bind(project.rating)
        .execute(&self.pool)
        .await?;

        self.cache.insert(project.id.clone(), project.clone()).await;
        Ok(())
    }

    async fn delete(&self, id: &ProjectId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        self.cache.invalidate(id).await;
        Ok(result.rows_affected() > 0)
    }
}
