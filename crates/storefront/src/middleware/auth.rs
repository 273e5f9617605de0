//! Access guard and authentication extractors.
//!
//! Routes declare what they require via extractors: `RequireAuth` for any
//! signed-in user, `RequireAdmin` for administrators. A failed requirement
//! never renders the protected content; unauthenticated visitors are
//! redirected to the sign-in page, while authenticated non-admins hitting
//! an admin surface are sent back to the site root.

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};

use crate::models::Principal;
use crate::state::AppState;

/// Where unauthenticated visitors are sent.
pub const SIGN_IN_ROUTE: &str = "/authenticationpage";

/// Where authenticated non-admins are sent when they hit an admin surface.
pub const SITE_ROOT: &str = "/";

/// What a route requires of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredRole {
    /// Open to everyone.
    None,
    /// Any signed-in user.
    Authenticated,
    /// Signed-in administrators only.
    Admin,
}

/// Outcome of evaluating a route requirement against the current principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Redirect(&'static str),
}

/// Evaluate a requirement against the current principal.
///
/// An unknown identity never satisfies `Authenticated` or `Admin`: fail
/// closed, redirect to sign-in.
#[must_use]
pub fn check_access(principal: Option<&Principal>, required: RequiredRole) -> AccessDecision {
    match required {
        RequiredRole::None => AccessDecision::Allow,
        RequiredRole::Authenticated => match principal {
            Some(_) => AccessDecision::Allow,
            None => AccessDecision::Redirect(SIGN_IN_ROUTE),
        },
        RequiredRole::Admin => match principal {
            Some(p) if p.is_admin => AccessDecision::Allow,
            Some(_) => AccessDecision::Redirect(SITE_ROOT),
            None => AccessDecision::Redirect(SIGN_IN_ROUTE),
        },
    }
}

/// Extractor that requires a signed-in user.
///
/// # Example
///
/// ```rust,ignore
/// async fn account_handler(
///     RequireAuth(principal): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", principal.email)
/// }
/// ```
pub struct RequireAuth(pub Principal);

/// Extractor that requires a signed-in administrator.
pub struct RequireAdmin(pub Principal);

/// Rejection carrying the redirect target chosen by the guard.
pub struct AuthRejection(&'static str);

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        Redirect::to(self.0).into_response()
    }
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let principal = state.principal();
        match check_access(principal.as_ref(), RequiredRole::Authenticated) {
            AccessDecision::Allow => match principal {
                Some(p) => Ok(Self(p)),
                None => Err(AuthRejection(SIGN_IN_ROUTE)),
            },
            AccessDecision::Redirect(target) => Err(AuthRejection(target)),
        }
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let principal = state.principal();
        match check_access(principal.as_ref(), RequiredRole::Admin) {
            AccessDecision::Allow => match principal {
                Some(p) => Ok(Self(p)),
                None => Err(AuthRejection(SIGN_IN_ROUTE)),
            },
            AccessDecision::Redirect(target) => Err(AuthRejection(target)),
        }
    }
}
