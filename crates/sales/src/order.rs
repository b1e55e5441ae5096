use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopfront_core::{DomainError, DomainResult, Money, OrderId, ProductId, UserId, ensure_units};

use crate::status::{OrderStatus, PaymentMethod, PaymentStatus};

/// Line item snapshot taken when the order is placed.
///
/// `product_id` is a weak reference: the product may later be deactivated or
/// edited without affecting the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    pub name: String,
    /// Unit price at order time.
    pub price: Money,
    pub quantity: u32,
    /// Variant label (e.g. a color name).
    pub color: Option<String>,
    pub image: Option<String>,
}

impl OrderItem {
    pub fn subtotal(&self) -> Money {
        self.price.times(self.quantity)
    }

    pub fn variant(&self) -> Option<&str> {
        self.color.as_deref().filter(|c| !c.is_empty())
    }
}

/// Contact fields captured on the order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
}

/// Order intake, validated before any persistence write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewOrder {
    pub customer: Customer,
    pub items: Vec<OrderItem>,
    pub delivery_fee: Money,
    /// Caller-supplied total; wins over the computed one when present.
    pub total_amount: Option<Money>,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    pub user_id: Option<UserId>,
    pub is_guest_order: bool,
}

impl NewOrder {
    pub fn validate(&self) -> DomainResult<()> {
        if self.customer.name.trim().is_empty() {
            return Err(DomainError::validation("customer name is required"));
        }
        if self.customer.email.trim().is_empty() {
            return Err(DomainError::validation("customer email is required"));
        }
        if !looks_like_email(self.customer.email.trim()) {
            return Err(DomainError::validation("customer email is not a valid address"));
        }
        if self.items.is_empty() {
            return Err(DomainError::validation("order must contain at least one item"));
        }
        for (idx, item) in self.items.iter().enumerate() {
            if item.quantity == 0 {
                return Err(DomainError::validation(format!(
                    "item {idx}: quantity must be at least 1"
                )));
            }
            ensure_units(&format!("item {idx}: quantity"), item.quantity)?;
            if item.name.trim().is_empty() {
                return Err(DomainError::validation(format!("item {idx}: name is required")));
            }
        }
        Ok(())
    }

    /// Sum of line subtotals plus the delivery fee.
    pub fn computed_total(&self) -> Money {
        self.items
            .iter()
            .map(OrderItem::subtotal)
            .sum::<Money>()
            .saturating_add(self.delivery_fee)
    }

    /// Total to persist: the caller's figure if supplied, otherwise the computed one.
    pub fn total(&self) -> Money {
        self.total_amount.unwrap_or_else(|| self.computed_total())
    }

    /// `(supplied, computed)` when the caller's total disagrees with the items.
    pub fn total_mismatch(&self) -> Option<(Money, Money)> {
        let supplied = self.total_amount?;
        let computed = self.computed_total();
        (supplied != computed).then_some((supplied, computed))
    }
}

fn looks_like_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !s.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

/// Persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub customer: Customer,
    pub items: Vec<OrderItem>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub total_amount: Money,
    pub delivery_fee: Money,
    pub notes: Option<String>,
    pub user_id: Option<UserId>,
    pub is_guest_order: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Materialize an accepted intake.
    pub fn place(id: OrderId, input: NewOrder, now: DateTime<Utc>) -> Self {
        let total_amount = input.total();
        Self {
            id,
            customer: input.customer,
            items: input.items,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: input.payment_method,
            total_amount,
            delivery_fee: input.delivery_fee,
            notes: input.notes,
            user_id: input.user_id,
            is_guest_order: input.is_guest_order,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a status/payment update and return the status held before it.
    pub fn apply(&mut self, update: &StatusUpdate, now: DateTime<Utc>) -> DomainResult<OrderStatus> {
        update.validate()?;
        let previous = self.status;
        if let Some(next) = update.status {
            previous.ensure_can_transition_to(next)?;
            self.status = next;
        }
        if let Some(payment) = update.payment_status {
            self.payment_status = payment;
        }
        self.updated_at = now;
        Ok(previous)
    }
}

/// Requested change of order status and/or payment status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
}

impl StatusUpdate {
    pub fn validate(&self) -> DomainResult<()> {
        if self.status.is_none() && self.payment_status.is_none() {
            return Err(DomainError::validation(
                "at least one of status or paymentStatus is required",
            ));
        }
        Ok(())
    }
}

/// Dashboard counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStats {
    pub total_orders: u64,
    pub pending_orders: u64,
    pub processing_orders: u64,
    pub shipped_orders: u64,
    pub delivered_orders: u64,
    pub cancelled_orders: u64,
    /// Revenue of delivered orders.
    pub total_revenue: Money,
    /// `total_revenue / delivered_orders`, rounded down; zero with no deliveries.
    pub average_order_value: Money,
}

impl OrderStats {
    pub fn record(&mut self, status: OrderStatus, total: Money) {
        self.add_group(status, 1, total);
    }

    /// Fold in `count` orders of one status whose totals sum to `total`.
    pub fn add_group(&mut self, status: OrderStatus, count: u64, total: Money) {
        self.total_orders += count;
        match status {
            OrderStatus::Pending => self.pending_orders += count,
            OrderStatus::Processing => self.processing_orders += count,
            OrderStatus::Shipped => self.shipped_orders += count,
            OrderStatus::Delivered => {
                self.delivered_orders += count;
                self.total_revenue = self.total_revenue.saturating_add(total);
                self.average_order_value = self
                    .total_revenue
                    .minor()
                    .checked_div(self.delivered_orders)
                    .map_or(Money::ZERO, Money::from_minor);
            }
            OrderStatus::Cancelled => self.cancelled_orders += count,
        }
    }

    pub fn from_orders<'a>(orders: impl IntoIterator<Item = &'a Order>) -> Self {
        let mut stats = Self::default();
        for order in orders {
            stats.record(order.status, order.total_amount);
        }
        stats
    }
}
