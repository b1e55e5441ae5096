//! Product catalog domain module.
//!
//! Pure domain logic for catalog entries and their stock representations
//! (no IO, no HTTP, no storage).

pub mod product;
pub mod stock;

pub use product::{NewProduct, Product, ProductPatch, generate_sku, DEFAULT_CATEGORY};
pub use stock::{StockBucket, StockChange, StockLevels, VariantStock};
