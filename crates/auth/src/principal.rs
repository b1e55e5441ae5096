use core::str::FromStr;
use serde::{Deserialize, Serialize};

use shopfront_core::{DomainError, UserId};

use crate::Role;

/// Identity of an authenticated principal.
///
/// Registered users are keyed by their row id; the configured administrator is a
/// synthetic principal with no user row. On the wire this is `"admin"` or the
/// decimal user id.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PrincipalId {
    User(UserId),
    ConfiguredAdmin,
}

impl PrincipalId {
    const ADMIN_SUBJECT: &'static str = "admin";

    pub fn user_id(self) -> Option<UserId> {
        match self {
            PrincipalId::User(id) => Some(id),
            PrincipalId::ConfiguredAdmin => None,
        }
    }
}

impl core::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PrincipalId::User(id) => core::fmt::Display::fmt(id, f),
            PrincipalId::ConfiguredAdmin => f.write_str(Self::ADMIN_SUBJECT),
        }
    }
}

impl FromStr for PrincipalId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == Self::ADMIN_SUBJECT {
            return Ok(PrincipalId::ConfiguredAdmin);
        }
        Ok(PrincipalId::User(s.parse()?))
    }
}

impl TryFrom<String> for PrincipalId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PrincipalId> for String {
    fn from(value: PrincipalId) -> Self {
        value.to_string()
    }
}

/// A fully resolved caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl Principal {
    /// The synthetic administrator backed by configured credentials.
    pub fn configured_admin(email: impl Into<String>) -> Self {
        Self {
            id: PrincipalId::ConfiguredAdmin,
            email: email.into(),
            name: "Administrator".to_string(),
            role: Role::ADMIN,
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.id.user_id()
    }
}
