//! Catalog project types.
//!
//! [`Project`] records are owned by the catalog; the cart/wishlist engine
//! only ever holds references to them and never mutates their fields.

use projecthub_core::{Price, ProjectId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A purchasable digital project bundle.
///
/// Immutable once fetched from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Opaque stable identifier, unique key.
    pub id: ProjectId,
    pub title: String,
    pub description: String,
    /// Non-negative decimal currency amount.
    pub price: Price,
    /// URI of the preview image.
    pub preview_image: String,
    /// Ordered list of technology tags.
    pub technologies: Vec<String>,
    pub rating: f32,
}

/// Validation failures for a [`NewProject`] payload.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProjectValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("price must not be negative")]
    NegativePrice,
    #[error("rating must be between 0.0 and 5.0")]
    RatingOutOfRange,
}

/// A validated draft of a catalog project.
///
/// Form payloads are checked here before any store mutation; an invalid
/// draft never reaches the repository.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProject {
    pub title: String,
    pub description: String,
    pub price: Price,
    pub preview_image: String,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub rating: f32,
}

impl NewProject {
    /// Check required fields and value ranges.
    ///
    /// # Errors
    ///
    /// Returns the first failing [`ProjectValidationError`].
    pub fn validate(&self) -> Result<(), ProjectValidationError> {
        if self.title.trim().is_empty() {
            return Err(ProjectValidationError::MissingField("title"));
        }
        if self.description.trim().is_empty() {
            return Err(ProjectValidationError::MissingField("description"));
        }
        if self.preview_image.trim().is_empty() {
            return Err(ProjectValidationError::MissingField("preview_image"));
        }
        if self.price.is_negative() {
            return Err(ProjectValidationError::NegativePrice);
        }
        if !(0.0..=5.0).contains(&self.rating) {
            return Err(ProjectValidationError::RatingOutOfRange);
        }
        Ok(())
    }

    /// Validate and promote the draft into a [`Project`] with the given id.
    ///
    /// # Errors
    ///
    /// Returns the first failing [`ProjectValidationError`].
    pub fn into_project(self, id: ProjectId) -> Result<Project, ProjectValidationError> {
        self.validate()?;
        Ok(Project {
            id,
            title: self.title,
            description: self.description,
            price: self.price,
            preview_image: self.preview_image,
            technologies: self.technologies,
            rating: self.rating,
        })
    }
}
