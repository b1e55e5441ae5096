//! Infrastructure layer: persistence, services and IO.
//!
//! Stores sit behind traits with Postgres and in-memory implementations; the
//! services here compose them and are what the HTTP layer calls.

pub mod accounts;
pub mod carts;
pub mod catalog;
pub mod db;
pub mod error;
pub mod inventory_adjustment;
pub mod order_lifecycle;
pub mod retry;
pub mod store;
pub mod uploads;

pub use accounts::{AccountSettings, Accounts, AdminCredentials, Registration, Session};
pub use carts::{CartView, Carts};
pub use catalog::{Catalog, StockSale};
pub use error::{ServiceError, ServiceResult};
pub use inventory_adjustment::InventoryAdjuster;
pub use order_lifecycle::{OrderLifecycle, StatusUpdateReport};
pub use retry::RetryPolicy;
pub use uploads::{IncomingFile, UploadError, UploadFailure, UploadIngestor, UploadPolicy, UploadReport};
