//! Request middleware and extractors.

pub mod auth;

pub use auth::{AccessDecision, RequireAdmin, RequireAuth, RequiredRole, check_access};
