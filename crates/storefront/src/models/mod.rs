//! Domain models for the storefront.

pub mod project;
pub mod purchase;
pub mod user;

pub use project::{NewProject, Project, ProjectValidationError};
pub use purchase::{DownloadArtifact, NewPurchase, Purchase};
pub use user::{Message, Principal, RemoteUserRecord};
