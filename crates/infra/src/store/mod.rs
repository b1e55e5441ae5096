//! Persistence contracts.
//!
//! Every store has an in-memory implementation (dev/test) and a Postgres one.
//! Services hold `Arc<dyn …Store>` so both are interchangeable at wiring time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use shopfront_auth::Role;
use shopfront_core::{DomainError, MAX_UNITS, OrderId, ProductId, UserId};
use shopfront_inventory::StockMovement;
use shopfront_products::{NewProduct, Product, ProductPatch, StockChange};
use shopfront_sales::{CartLine, NewOrder, Order, OrderStats, OrderStatus, StatusUpdate};

pub mod memory;
pub mod postgres;

pub use memory::{InMemoryCartStore, InMemoryOrderStore, InMemoryProductStore, InMemoryUserStore};
pub use postgres::{PostgresCartStore, PostgresOrderStore, PostgresProductStore, PostgresUserStore};

/// Store error.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    /// Unique constraint or lost race.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A domain rule rejected the change inside the store's transaction.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Serialization failure, deadlock, pool exhaustion or a dropped connection.
    /// Safe to retry the whole transaction.
    #[error("transient storage failure: {0}")]
    Transient(String),

    #[error("database error: {0}")]
    Database(String),

    /// A stored row could not be decoded.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

/// Narrow a unit count to the schema's `INTEGER` range.
///
/// Values past [`MAX_UNITS`] are a `Conflict`: the write is refused rather than
/// stored as a different number.
pub(crate) fn to_i32(column: &str, value: u32) -> Result<i32, StoreError> {
    i32::try_from(value)
        .map_err(|_| StoreError::Conflict(format!("{column} {value} exceeds the storable maximum {MAX_UNITS}")))
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 100;

    /// Clamp raw query values into range.
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

/// Result of one locked stock read-modify-write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockAdjustment {
    /// No product row with that id.
    Missing,
    Adjusted {
        name: String,
        /// `None` when no counter is tracked for the line.
        change: Option<StockChange>,
        /// Set when the stored variant stock could not be decoded and was ignored.
        variant_issue: Option<String>,
        /// Derived total after the change.
        total: Option<u64>,
    },
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Insert a validated product. Duplicate SKU → `Conflict`.
    async fn create(&self, input: &NewProduct, sku: &str, now: DateTime<Utc>) -> Result<Product, StoreError>;

    /// Fetch regardless of `is_active`.
    async fn get(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError>;

    /// Active products, newest first.
    async fn list_active(&self, page: PageRequest) -> Result<Page<Product>, StoreError>;

    /// Active featured products, newest first.
    async fn featured(&self, limit: u32) -> Result<Vec<Product>, StoreError>;

    async fn update(&self, id: ProductId, patch: &ProductPatch, now: DateTime<Utc>) -> Result<Product, StoreError>;

    /// Soft delete. Returns false when no active product had that id.
    async fn deactivate(&self, id: ProductId, now: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Soft delete every active product; returns how many were affected.
    async fn deactivate_all(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Apply one movement under a row lock. Each call is its own atomic unit.
    async fn adjust_stock(&self, id: ProductId, movement: &StockMovement, now: DateTime<Utc>)
        -> Result<StockAdjustment, StoreError>;
}

/// Order status change committed by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub order: Order,
    pub previous: OrderStatus,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert the order and its items atomically.
    async fn create(&self, input: &NewOrder, now: DateTime<Utc>) -> Result<Order, StoreError>;

    async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// All orders, newest first.
    async fn list(&self) -> Result<Vec<Order>, StoreError>;

    /// Read the current status, validate and write the update, serialised per order.
    /// `None` when the order does not exist.
    async fn update_status(
        &self,
        id: OrderId,
        update: &StatusUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<StatusChange>, StoreError>;

    async fn delete(&self, id: OrderId) -> Result<bool, StoreError>;

    async fn delete_all(&self) -> Result<u64, StoreError>;

    async fn stats(&self) -> Result<OrderStats, StoreError>;
}

/// Stored user row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    async fn get(&self, id: UserId) -> Result<Option<UserRecord>, StoreError>;

    /// Duplicate email → `Conflict`.
    async fn create(&self, user: NewUser, now: DateTime<Utc>) -> Result<UserRecord, StoreError>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    /// Lines in insertion order.
    async fn lines(&self, user: UserId) -> Result<Vec<CartLine>, StoreError>;

    /// Add, accumulating onto an existing line.
    async fn add(&self, user: UserId, product: ProductId, quantity: u32) -> Result<CartLine, StoreError>;

    /// Overwrite the quantity of an existing line. `None` when there is no line.
    async fn set_quantity(
        &self,
        user: UserId,
        product: ProductId,
        quantity: u32,
    ) -> Result<Option<CartLine>, StoreError>;

    async fn remove(&self, user: UserId, product: ProductId) -> Result<bool, StoreError>;

    async fn clear(&self, user: UserId) -> Result<u64, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_request_clamps_inputs() {
        let p = PageRequest::new(Some(0), Some(1_000));
        assert_eq!((p.page, p.limit), (1, PageRequest::MAX_LIMIT));
        assert_eq!(PageRequest::new(Some(3), None).offset(), 20);
    }

    #[test]
    fn unit_counts_past_integer_range_are_refused() {
        assert_eq!(to_i32("stock", 42).unwrap(), 42);
        assert_eq!(to_i32("stock", MAX_UNITS).unwrap(), i32::MAX);
        match to_i32("quantity", 3_000_000_000) {
            Err(StoreError::Conflict(msg)) if msg.contains("quantity 3000000000") => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
