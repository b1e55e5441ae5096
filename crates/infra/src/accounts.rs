//! Login, registration and bearer-token resolution.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use shopfront_auth::{
    AuthError, Hs256Jwt, JwtClaims, JwtValidator, Principal, PrincipalId, Role, hash_password,
    verify_password,
};
use shopfront_core::DomainError;

use crate::error::{ServiceError, ServiceResult};
use crate::store::{NewUser, UserRecord, UserStore};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const DEFAULT_BCRYPT_COST: u32 = 10;

/// Distinguished administrator that bypasses the user table.
#[derive(Clone)]
pub struct AdminCredentials {
    pub email: String,
    pub password: String,
}

impl core::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct AccountSettings {
    pub admin: Option<AdminCredentials>,
    pub token_ttl: Duration,
    pub bcrypt_cost: u32,
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            admin: None,
            token_ttl: Duration::days(30),
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }
}

/// Issued token plus the principal it was issued for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub token: String,
    #[serde(rename = "user")]
    pub principal: Principal,
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Clone)]
pub struct Accounts {
    users: Arc<dyn UserStore>,
    jwt: Hs256Jwt,
    settings: AccountSettings,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn invalid_credentials() -> ServiceError {
    AuthError::unauthenticated("invalid credentials").into()
}

fn principal_for(user: &UserRecord) -> Principal {
    Principal {
        id: PrincipalId::User(user.id),
        email: user.email.clone(),
        name: user.name.clone(),
        role: user.role.clone(),
    }
}

impl Accounts {
    pub fn new(users: Arc<dyn UserStore>, jwt: Hs256Jwt, settings: AccountSettings) -> Self {
        Self { users, jwt, settings }
    }

    fn issue(&self, principal: Principal) -> ServiceResult<Session> {
        let claims = JwtClaims::for_principal(&principal, Utc::now(), self.settings.token_ttl);
        let token = self.jwt.issue(&claims)?;
        Ok(Session { token, principal })
    }

    fn admin_for(&self, email: &str) -> Option<&AdminCredentials> {
        self.settings
            .admin
            .as_ref()
            .filter(|admin| normalize_email(&admin.email) == email)
    }

    #[instrument(skip(self, password), err)]
    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<Session> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(DomainError::validation("email and password are required").into());
        }

        if let Some(admin) = self.admin_for(&email) {
            if admin.password != password {
                warn!("admin login rejected");
                return Err(invalid_credentials());
            }
            info!("admin logged in");
            return self.issue(Principal::configured_admin(email));
        }

        let user = match self.users.find_by_email(&email).await? {
            Some(user) if user.is_active => user,
            _ => return Err(invalid_credentials()),
        };

        let plain = password.to_string();
        let hash = user.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || verify_password(&plain, &hash))
            .await
            .map_err(|e| ServiceError::Internal(format!("password check aborted: {e}")))?;
        if !matches {
            return Err(invalid_credentials());
        }

        info!(user_id = %user.id, "user logged in");
        self.issue(principal_for(&user))
    }

    /// Create a `user`-role account and log it in.
    #[instrument(skip(self, registration), fields(email = %registration.email), err)]
    pub async fn register(&self, registration: Registration) -> ServiceResult<Session> {
        let name = registration.name.trim().to_string();
        let email = normalize_email(&registration.email);
        if name.is_empty() || email.is_empty() || registration.password.is_empty() {
            return Err(DomainError::validation("name, email and password are required").into());
        }
        if !email.contains('@') {
            return Err(DomainError::validation("email is not a valid address").into());
        }
        if registration.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(DomainError::validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            ))
            .into());
        }
        if self.admin_for(&email).is_some() {
            return Err(DomainError::conflict(format!("email '{email}' already registered")).into());
        }

        let cost = self.settings.bcrypt_cost;
        let plain = registration.password;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&plain, cost))
            .await
            .map_err(|e| ServiceError::Internal(format!("password hashing aborted: {e}")))??;

        let user = self
            .users
            .create(
                NewUser {
                    name,
                    email,
                    password_hash,
                    role: Role::USER,
                },
                Utc::now(),
            )
            .await?;
        info!(user_id = %user.id, "user registered");
        self.issue(principal_for(&user))
    }

    /// Resolve a bearer token to the principal it names.
    ///
    /// Database users must still exist and be active.
    pub async fn resolve(&self, token: &str) -> ServiceResult<Principal> {
        let claims = self.jwt.validate(token, Utc::now())?;
        match claims.sub {
            PrincipalId::ConfiguredAdmin => match &self.settings.admin {
                Some(admin) => Ok(Principal::configured_admin(normalize_email(&admin.email))),
                None => Err(AuthError::unauthenticated("administrator login is disabled").into()),
            },
            PrincipalId::User(id) => match self.users.get(id).await? {
                Some(user) if user.is_active => Ok(principal_for(&user)),
                _ => Err(AuthError::unauthenticated("account no longer active").into()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryUserStore;

    const ADMIN_EMAIL: &str = "Admin@Shop.test";

    fn accounts() -> Accounts {
        let settings = AccountSettings {
            admin: Some(AdminCredentials {
                email: ADMIN_EMAIL.into(),
                password: "letmein".into(),
            }),
            token_ttl: Duration::hours(1),
            bcrypt_cost: 4,
        };
        Accounts::new(Arc::new(InMemoryUserStore::new()), Hs256Jwt::new(b"test-secret"), settings)
    }

    fn registration(email: &str, password: &str) -> Registration {
        Registration {
            name: "Robin".into(),
            email: email.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn register_login_and_resolve() {
        let accounts = accounts();
        let session = accounts.register(registration(" Robin@Example.com ", "secret1")).await.unwrap();
        assert_eq!(session.principal.email, "robin@example.com");
        assert_eq!(session.principal.role, Role::USER);

        let login = accounts.login("robin@example.com", "secret1").await.unwrap();
        let resolved = accounts.resolve(&login.token).await.unwrap();
        assert_eq!(resolved, session.principal);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_look_the_same() {
        let accounts = accounts();
        accounts.register(registration("robin@example.com", "secret1")).await.unwrap();

        for (email, password) in [("robin@example.com", "nope123"), ("ghost@example.com", "secret1")] {
            match accounts.login(email, password).await {
                Err(ServiceError::Auth(AuthError::Unauthenticated(msg))) => assert_eq!(msg, "invalid credentials"),
                other => panic!("unexpected result: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn registration_rules() {
        let accounts = accounts();
        assert!(matches!(
            accounts.register(registration("a@b.co", "short")).await,
            Err(ServiceError::Domain(DomainError::Validation(_)))
        ));
        accounts.register(registration("a@b.co", "longenough")).await.unwrap();
        assert!(matches!(
            accounts.register(registration("A@B.co", "longenough")).await,
            Err(ServiceError::Domain(DomainError::Conflict(_)))
        ));
        assert!(matches!(
            accounts.register(registration(ADMIN_EMAIL, "longenough")).await,
            Err(ServiceError::Domain(DomainError::Conflict(_)))
        ));
    }

    #[tokio::test]
    async fn configured_admin_bypasses_user_table() {
        let accounts = accounts();
        let session = accounts.login("admin@shop.test", "letmein").await.unwrap();
        assert!(session.principal.role.is_admin());
        assert_eq!(session.principal.id, PrincipalId::ConfiguredAdmin);

        let resolved = accounts.resolve(&session.token).await.unwrap();
        assert_eq!(resolved.id, PrincipalId::ConfiguredAdmin);

        assert!(matches!(
            accounts.login("admin@shop.test", "wrong").await,
            Err(ServiceError::Auth(AuthError::Unauthenticated(_)))
        ));
    }

    #[tokio::test]
    async fn garbage_tokens_are_unauthenticated() {
        assert!(matches!(
            accounts().resolve("not-a-token").await,
            Err(ServiceError::Auth(AuthError::Unauthenticated(_)))
        ));
    }
}
