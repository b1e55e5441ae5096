use serde::{Deserialize, Serialize};

use shopfront_core::{DomainError, DomainResult, MAX_UNITS, Money, ProductId};

/// Stored cart line for one user and product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Outcome of a requested quantity on an existing line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartQuantityChange {
    Set(u32),
    Remove,
}

impl CartQuantityChange {
    /// Zero removes the line; negative quantities are rejected.
    pub fn from_requested(quantity: i64) -> DomainResult<Self> {
        match quantity {
            q if q < 0 => Err(DomainError::validation("quantity cannot be negative")),
            0 => Ok(Self::Remove),
            q => units(q).map(Self::Set),
        }
    }
}

/// Validate the quantity of an add-to-cart request.
pub fn validate_add_quantity(quantity: i64) -> DomainResult<u32> {
    if quantity < 1 {
        return Err(DomainError::validation("quantity must be at least 1"));
    }
    units(quantity)
}

fn units(quantity: i64) -> DomainResult<u32> {
    u32::try_from(quantity)
        .ok()
        .filter(|q| *q <= MAX_UNITS)
        .ok_or_else(|| DomainError::validation(format!("quantity cannot exceed {MAX_UNITS}")))
}

/// Cart line joined with live product data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineView {
    pub product_id: ProductId,
    pub name: String,
    pub price: Money,
    pub image: Option<String>,
    pub quantity: u32,
    pub subtotal: Money,
}

impl CartLineView {
    pub fn new(line: CartLine, name: String, price: Money, image: Option<String>) -> Self {
        Self {
            product_id: line.product_id,
            name,
            price,
            image,
            quantity: line.quantity,
            subtotal: price.times(line.quantity),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    /// Sum of quantities.
    pub count: u64,
    /// Sum of line subtotals at live prices.
    pub total: Money,
}

impl CartSummary {
    pub fn of(lines: &[CartLineView]) -> Self {
        Self {
            count: lines.iter().map(|l| u64::from(l.quantity)).sum(),
            total: lines.iter().map(|l| l.subtotal).sum(),
        }
    }
}
