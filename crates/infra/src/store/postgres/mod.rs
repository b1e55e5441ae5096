//! Postgres-backed stores.
//!
//! Queries are runtime-checked (`sqlx::query` + `Row::try_get`) so the crate
//! builds without a live database. The expected schema lives in
//! `crates/infra/sql/schema.sql`.
//!
//! ## Error Mapping
//!
//! | SQLx error | Postgres code | `StoreError` |
//! |------------|---------------|--------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (integer out of range) | `22003` | `Conflict` |
//! | Database (serialization failure / deadlock) | `40001` / `40P01` | `Transient` |
//! | Database (other) | any other | `Database` |
//! | PoolTimedOut, Io | n/a | `Transient` |
//! | ColumnDecode, Decode, ColumnNotFound | n/a | `Corrupt` |
//! | Other | n/a | `Database` |

mod cart;
mod orders;
mod products;
mod users;

pub use cart::PostgresCartStore;
pub use orders::PostgresOrderStore;
pub use products::PostgresProductStore;
pub use users::PostgresUserStore;

pub(crate) use super::to_i32;
use super::StoreError;

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("22003") => StoreError::Conflict(msg),
                Some("40001") | Some("40P01") => StoreError::Transient(msg),
                _ => StoreError::Database(msg),
            }
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Transient(format!("connection pool timed out in {}", operation))
        }
        sqlx::Error::Io(e) => StoreError::Transient(format!("io error in {}: {}", operation, e)),
        sqlx::Error::PoolClosed => {
            StoreError::Database(format!("connection pool closed in {}", operation))
        }
        e @ (sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_)) => {
            StoreError::Corrupt(format!("failed to decode row in {}: {}", operation, e))
        }
        _ => StoreError::Database(format!("sqlx error in {}: {}", operation, err)),
    }
}

/// Convert a non-negative integer column into `u32`.
pub(crate) fn non_negative(column: &str, value: i32) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{column} is negative ({value})")))
}

/// Convert a money column (minor units) into `u64`.
pub(crate) fn minor_units(column: &str, value: i64) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::Corrupt(format!("{column} is negative ({value})")))
}

/// Money values bound as Postgres `BIGINT`.
pub(crate) fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
