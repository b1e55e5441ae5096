//! Process configuration, read once from the environment at startup.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use shopfront_infra::accounts::DEFAULT_BCRYPT_COST;
use shopfront_infra::{AdminCredentials, UploadPolicy};

const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

fn invalid(var: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        var,
        reason: reason.into(),
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub use_persistent_stores: bool,
    pub jwt_secret: String,
    pub jwt_ttl: chrono::Duration,
    pub admin: Option<AdminCredentials>,
    /// Empty means permissive CORS.
    pub cors_origins: Vec<String>,
    pub upload: UploadPolicy,
    pub request_timeout: Duration,
    pub bcrypt_cost: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset and blank values take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = match get("BIND_ADDR") {
            Some(v) => v.parse().map_err(|e| invalid("BIND_ADDR", format!("{e}")))?,
            None => SocketAddr::from(([0, 0, 0, 0], 5001)),
        };

        let use_persistent_stores = match get("USE_PERSISTENT_STORES") {
            Some(v) => v
                .parse::<bool>()
                .map_err(|_| invalid("USE_PERSISTENT_STORES", "expected true or false"))?,
            None => false,
        };
        let database_url = get("DATABASE_URL");
        if use_persistent_stores && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| {
            warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });
        let jwt_ttl = match get("JWT_EXPIRE") {
            Some(v) => parse_ttl(&v).ok_or_else(|| invalid("JWT_EXPIRE", format!("cannot parse '{v}'")))?,
            None => chrono::Duration::days(30),
        };

        let admin = match (get("ADMIN_EMAIL"), get("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminCredentials { email, password }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing("ADMIN_PASSWORD")),
            (None, Some(_)) => return Err(ConfigError::Missing("ADMIN_EMAIL")),
        };

        let cors_origins = get("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let mut upload = UploadPolicy::new(get("UPLOAD_DIR").map(PathBuf::from).unwrap_or_else(|| "./public/uploads".into()));
        if let Some(v) = get("UPLOAD_MAX_BYTES") {
            upload.max_bytes = parse_number("UPLOAD_MAX_BYTES", &v)?;
        }
        if let Some(v) = get("UPLOAD_ALLOWED_TYPES") {
            upload.allowed_types = v
                .split(',')
                .map(|t| t.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|t| !t.is_empty())
                .collect();
            if upload.allowed_types.is_empty() {
                return Err(invalid("UPLOAD_ALLOWED_TYPES", "no file types listed"));
            }
        }

        let request_timeout = match get("REQUEST_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(parse_number("REQUEST_TIMEOUT_SECS", &v)?),
            None => Duration::from_secs(30),
        };

        let db_max_connections = match get("DB_MAX_CONNECTIONS") {
            Some(v) => parse_number("DB_MAX_CONNECTIONS", &v)?,
            None => 20,
        };
        let bcrypt_cost = match get("BCRYPT_COST") {
            Some(v) => parse_number("BCRYPT_COST", &v)?,
            None => DEFAULT_BCRYPT_COST,
        };
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(invalid("BCRYPT_COST", "must be between 4 and 31"));
        }

        Ok(Self {
            bind_addr,
            database_url,
            db_max_connections,
            use_persistent_stores,
            jwt_secret,
            jwt_ttl,
            admin,
            cors_origins,
            upload,
            request_timeout,
            bcrypt_cost,
        })
    }
}

fn parse_number<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| invalid(var, e.to_string()))
}

/// `30d`, `12h`, `45m`, `90s` or plain seconds.
pub fn parse_ttl(value: &str) -> Option<chrono::Duration> {
    let value = value.trim();
    let (digits, unit) = match value.char_indices().last()? {
        (idx, c) if c.is_ascii_alphabetic() => (&value[..idx], Some(c.to_ascii_lowercase())),
        _ => (value, None),
    };
    let n: i64 = digits.parse().ok().filter(|n| *n > 0)?;
    match unit {
        None | Some('s') => chrono::Duration::try_seconds(n),
        Some('m') => chrono::Duration::try_minutes(n),
        Some('h') => chrono::Duration::try_hours(n),
        Some('d') => chrono::Duration::try_days(n),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let env: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind_addr.port(), 5001);
        assert!(!cfg.use_persistent_stores);
        assert_eq!(cfg.jwt_ttl, chrono::Duration::days(30));
        assert!(cfg.admin.is_none());
        assert!(cfg.cors_origins.is_empty());
        assert_eq!(cfg.upload.max_bytes, UploadPolicy::DEFAULT_MAX_BYTES);
        assert_eq!(cfg.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn parses_explicit_values() {
        let cfg = config(&[
            ("JWT_EXPIRE", "12h"),
            ("ADMIN_EMAIL", "admin@shop.test"),
            ("ADMIN_PASSWORD", "pw"),
            ("CORS_ORIGINS", "http://a.test, http://b.test"),
            ("UPLOAD_ALLOWED_TYPES", ".PNG,jpg"),
            ("BCRYPT_COST", "4"),
        ])
        .unwrap();
        assert_eq!(cfg.jwt_ttl, chrono::Duration::hours(12));
        assert_eq!(cfg.admin.unwrap().email, "admin@shop.test");
        assert_eq!(cfg.cors_origins, ["http://a.test", "http://b.test"]);
        assert_eq!(cfg.upload.allowed_types, ["png", "jpg"]);
    }

    #[test]
    fn malformed_values_name_the_variable() {
        assert_eq!(
            config(&[("USE_PERSISTENT_STORES", "true")]).unwrap_err(),
            ConfigError::Missing("DATABASE_URL")
        );
        match config(&[("JWT_EXPIRE", "soon")]).unwrap_err() {
            ConfigError::Invalid { var: "JWT_EXPIRE", .. } => {}
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(matches!(
            config(&[("DB_MAX_CONNECTIONS", "many")]),
            Err(ConfigError::Invalid { var: "DB_MAX_CONNECTIONS", .. })
        ));
        assert_eq!(config(&[("ADMIN_EMAIL", "a@b.co")]).unwrap_err(), ConfigError::Missing("ADMIN_PASSWORD"));
    }

    #[test]
    fn ttl_units() {
        assert_eq!(parse_ttl("30d"), Some(chrono::Duration::days(30)));
        assert_eq!(parse_ttl("45m"), Some(chrono::Duration::minutes(45)));
        assert_eq!(parse_ttl("90"), Some(chrono::Duration::seconds(90)));
        assert_eq!(parse_ttl("0h"), None);
        assert_eq!(parse_ttl("3w"), None);
    }
}
