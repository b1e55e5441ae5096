//! Orders and cart domain module.
//!
//! Pure domain logic: order status rules, order intake validation and totals,
//! cart quantity rules.

pub mod cart;
pub mod order;
pub mod status;

pub use cart::{CartLine, CartLineView, CartQuantityChange, CartSummary, validate_add_quantity};
pub use order::{Customer, NewOrder, Order, OrderItem, OrderStats, StatusUpdate};
pub use status::{OrderStatus, PaymentMethod, PaymentStatus};
