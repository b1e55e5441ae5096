//! Service-layer error.
//!
//! Store-level `NotFound`/`Conflict` become domain errors here so the HTTP layer
//! maps a single taxonomy. Only infrastructure failures stay as `Store`.

use thiserror::Error;

use shopfront_auth::{AuthError, PasswordError, TokenError};
use shopfront_core::DomainError;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Transient, database or corrupt-row failures.
    #[error(transparent)]
    Store(StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ServiceError::Domain(DomainError::NotFound(what)),
            StoreError::Conflict(msg) => ServiceError::Domain(DomainError::Conflict(msg)),
            StoreError::Domain(e) => ServiceError::Domain(e),
            other => ServiceError::Store(other),
        }
    }
}

impl From<TokenError> for ServiceError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(msg) => ServiceError::Internal(msg),
            other => ServiceError::Auth(AuthError::unauthenticated(other.to_string())),
        }
    }
}

impl From<PasswordError> for ServiceError {
    fn from(err: PasswordError) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_lookups_surface_as_domain_errors() {
        match ServiceError::from(StoreError::NotFound("order 9".into())) {
            ServiceError::Domain(DomainError::NotFound(what)) => assert_eq!(what, "order 9"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(matches!(
            ServiceError::from(StoreError::Transient("deadlock".into())),
            ServiceError::Store(StoreError::Transient(_))
        ));
    }

    #[test]
    fn bad_tokens_are_unauthenticated() {
        let err = ServiceError::from(TokenError::Invalid("bad signature".into()));
        assert!(matches!(err, ServiceError::Auth(AuthError::Unauthenticated(_))));
    }
}
