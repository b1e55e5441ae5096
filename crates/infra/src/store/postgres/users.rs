use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::instrument;

use shopfront_auth::Role;
use shopfront_core::UserId;

use super::map_sqlx_error;
use crate::store::{NewUser, StoreError, UserRecord, UserStore};

const USER_COLUMNS: &str = "id, name, email, password, role, is_active, created_at";

#[derive(Debug, Clone)]
pub struct PostgresUserStore {
    pool: Arc<PgPool>,
}

impl PostgresUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

fn user_from_row(row: &PgRow) -> Result<UserRecord, StoreError> {
    let get = |e| map_sqlx_error("decode_user", e);
    let role: String = row.try_get("role").map_err(get)?;
    Ok(UserRecord {
        id: UserId::new(row.try_get("id").map_err(get)?),
        name: row.try_get("name").map_err(get)?,
        email: row.try_get("email").map_err(get)?,
        password_hash: row.try_get("password").map_err(get)?,
        role: Role::new(role),
        is_active: row.try_get("is_active").map_err(get)?,
        created_at: row.try_get("created_at").map_err(get)?,
    })
}

#[async_trait]
impl UserStore for PostgresUserStore {
    #[instrument(skip(self), err)]
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user_by_email", e))?;
        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn get(&self, id: UserId) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_user", e))?;
        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self, user), fields(email = %user.email), err)]
    async fn create(&self, user: NewUser, now: DateTime<Utc>) -> Result<UserRecord, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users (name, email, password, role, is_active, created_at)
            VALUES ($1, $2, $3, $4, TRUE, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(now)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| match map_sqlx_error("create_user", e) {
            StoreError::Conflict(_) => StoreError::Conflict(format!("email '{}' already registered", user.email)),
            other => other,
        })?;
        user_from_row(&row)
    }
}
