use thiserror::Error;

use crate::{Principal, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("forbidden: {0}")]
    Forbidden(String),
}

impl AuthError {
    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::Unauthenticated(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }
}

/// Authorize a principal for an operation open to `allowed` roles.
///
/// - No IO
/// - No panics
pub fn authorize(principal: &Principal, allowed: &[Role]) -> Result<(), AuthError> {
    if allowed.contains(&principal.role) {
        Ok(())
    } else {
        Err(AuthError::Forbidden(format!(
            "role '{}' is not allowed to perform this operation",
            principal.role
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PrincipalId;
    use shopfront_core::UserId;

    fn user() -> Principal {
        Principal {
            id: PrincipalId::User(UserId::new(3)),
            email: "u@example.com".into(),
            name: "U".into(),
            role: Role::USER,
        }
    }

    #[test]
    fn role_outside_allowed_set_is_forbidden() {
        match authorize(&user(), &[Role::ADMIN]).unwrap_err() {
            AuthError::Forbidden(msg) if msg.contains("'user'") => {}
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(authorize(&user(), &[Role::ADMIN, Role::USER]).is_ok());
        assert!(authorize(&Principal::configured_admin("a@b.co"), &[Role::ADMIN]).is_ok());
    }
}
