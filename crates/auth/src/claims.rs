use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Principal, PrincipalId, Role};

/// JWT claims model (transport-agnostic).
///
/// Timestamps are carried as Unix seconds under the registered `iat`/`exp` names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject / principal identifier.
    pub sub: PrincipalId,

    pub email: String,

    pub name: String,

    pub role: Role,

    /// Issued-at timestamp.
    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp.
    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

impl JwtClaims {
    pub fn for_principal(principal: &Principal, issued_at: DateTime<Utc>, ttl: chrono::Duration) -> Self {
        Self {
            sub: principal.id,
            email: principal.email.clone(),
            name: principal.name.clone(),
            role: principal.role.clone(),
            issued_at,
            expires_at: issued_at + ttl,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate JWT claims.
///
/// Validates the time window only; signature verification happens in `token`.
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn claims(iat: i64, exp: i64) -> JwtClaims {
        JwtClaims {
            sub: PrincipalId::ConfiguredAdmin,
            email: "admin@example.com".into(),
            name: "Administrator".into(),
            role: Role::ADMIN,
            issued_at: Utc.timestamp_opt(iat, 0).unwrap(),
            expires_at: Utc.timestamp_opt(exp, 0).unwrap(),
        }
    }

    #[test]
    fn time_window_is_enforced() {
        let c = claims(1_000, 2_000);
        assert!(validate_claims(&c, Utc.timestamp_opt(1_500, 0).unwrap()).is_ok());
        assert_eq!(
            validate_claims(&c, Utc.timestamp_opt(2_000, 0).unwrap()),
            Err(TokenValidationError::Expired)
        );
        assert_eq!(
            validate_claims(&c, Utc.timestamp_opt(10, 0).unwrap()),
            Err(TokenValidationError::NotYetValid)
        );
        assert_eq!(
            validate_claims(&claims(5, 5), Utc.timestamp_opt(5, 0).unwrap()),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }

    #[test]
    fn serializes_registered_claim_names() {
        let principal = Principal::configured_admin("admin@example.com");
        let issued = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let c = JwtClaims::for_principal(&principal, issued, Duration::days(30));
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["sub"], "admin");
        assert_eq!(json["iat"], 1_700_000_000);
        assert_eq!(json["exp"], 1_700_000_000 + 30 * 86_400);
        assert_eq!(json["role"], "admin");
    }
}
