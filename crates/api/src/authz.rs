//! API-side authorization guards.
//!
//! Checked in handlers before calling a service, keeping the services
//! themselves role-agnostic.

use shopfront_auth::{AuthError, Principal, Role, authorize};

/// Catalog management, order administration and dashboard routes.
pub fn require_admin(principal: &Principal) -> Result<(), AuthError> {
    authorize(principal, &[Role::ADMIN])
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopfront_auth::PrincipalId;
    use shopfront_core::UserId;

    #[test]
    fn only_admins_pass() {
        let user = Principal {
            id: PrincipalId::User(UserId::new(8)),
            email: "u@shop.test".into(),
            name: "U".into(),
            role: Role::USER,
        };
        assert!(matches!(require_admin(&user), Err(AuthError::Forbidden(_))));
        assert!(require_admin(&Principal::configured_admin("a@shop.test")).is_ok());
    }
}
