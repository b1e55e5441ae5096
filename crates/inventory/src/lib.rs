//! Inventory adjustment rules.
//!
//! Decides, from an order status transition, whether stock moves and in which
//! direction, and applies one line's movement to a product's stock levels.
//! Deterministic domain logic only; running the movements against storage is
//! the infra crate's job.

pub mod adjustment;

pub use adjustment::{
    AdjustmentRecord, AdjustmentWarning, Direction, InventoryAdjustment, StockMovement,
    direction_for,
};
