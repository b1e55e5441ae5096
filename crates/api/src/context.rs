//! Per-request caller identity.
//!
//! The auth middleware resolves the bearer token once and stores an
//! [`AuthOutcome`]; handlers pick it up through the extractors below.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use shopfront_auth::{AuthError, Principal};

use crate::app::errors::ApiError;

#[derive(Debug, Clone)]
pub enum AuthOutcome {
    /// No `Authorization` header.
    Anonymous,
    Authenticated(Principal),
    /// A token was sent but could not be accepted.
    Rejected(String),
}

/// Caller that must be authenticated.
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub Principal);

/// Caller that may be anonymous. Rejected tokens count as anonymous.
#[derive(Debug, Clone)]
pub struct MaybePrincipal(pub Option<Principal>);

fn outcome(parts: &Parts) -> AuthOutcome {
    parts
        .extensions
        .get::<AuthOutcome>()
        .cloned()
        .unwrap_or(AuthOutcome::Anonymous)
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match outcome(parts) {
            AuthOutcome::Authenticated(principal) => Ok(CurrentPrincipal(principal)),
            AuthOutcome::Anonymous => Err(AuthError::unauthenticated("no token provided").into()),
            AuthOutcome::Rejected(reason) => Err(AuthError::unauthenticated(reason).into()),
        }
    }
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for MaybePrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(match outcome(parts) {
            AuthOutcome::Authenticated(principal) => MaybePrincipal(Some(principal)),
            _ => MaybePrincipal(None),
        })
    }
}
