//! `shopfront-auth`: token, principal and authorization boundary.
//!
//! Decoupled from HTTP and storage: the API layer extracts bearer tokens and
//! infra resolves principals against the user table.

pub mod authorize;
pub mod claims;
pub mod password;
pub mod principal;
pub mod roles;
pub mod token;

pub use authorize::{AuthError, authorize};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use password::{PasswordError, hash_password, verify_password};
pub use principal::{Principal, PrincipalId};
pub use roles::Role;
pub use token::{Hs256Jwt, JwtValidator, TokenError};
