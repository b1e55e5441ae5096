//! Order creation and status transitions.
//!
//! The status write is serialised per order by the store (row lock or table
//! mutex) and returns the status it replaced. That previous status, not one read
//! earlier, drives the inventory adjustment, so two racing updates can never both
//! cross into a fulfilling status.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{Span, info, instrument, warn};

use shopfront_core::{DomainError, OrderId};
use shopfront_inventory::InventoryAdjustment;
use shopfront_sales::{NewOrder, Order, OrderStats, OrderStatus, StatusUpdate};

use crate::error::ServiceResult;
use crate::inventory_adjustment::InventoryAdjuster;
use crate::retry::RetryPolicy;
use crate::store::{OrderStore, ProductStore};

/// Outcome of a status update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateReport {
    pub order: Order,
    pub previous_status: OrderStatus,
    pub adjustment: InventoryAdjustment,
}

impl StatusUpdateReport {
    pub fn inventory_touched(&self) -> bool {
        self.adjustment.touched()
    }
}

#[derive(Clone)]
pub struct OrderLifecycle {
    orders: Arc<dyn OrderStore>,
    adjuster: InventoryAdjuster,
    create_retry: RetryPolicy,
}

impl OrderLifecycle {
    pub fn new(orders: Arc<dyn OrderStore>, products: Arc<dyn ProductStore>) -> Self {
        Self {
            orders,
            adjuster: InventoryAdjuster::new(products),
            create_retry: RetryPolicy::default(),
        }
    }

    pub fn with_create_retry(mut self, policy: RetryPolicy) -> Self {
        self.create_retry = policy;
        self
    }

    /// Validate and persist a new order with its items in one transaction.
    ///
    /// The transaction is retried on transient failures only.
    #[instrument(skip(self, input), fields(items = input.items.len(), order_id = tracing::field::Empty), err)]
    pub async fn create(&self, input: NewOrder) -> ServiceResult<Order> {
        input.validate()?;
        if let Some((supplied, computed)) = input.total_mismatch() {
            warn!(%supplied, %computed, "caller-supplied total differs from item sum; keeping supplied total");
        }

        let order = self
            .create_retry
            .run("create_order", || self.orders.create(&input, Utc::now()))
            .await?;

        Span::current().record("order_id", order.id.get());
        info!(total = %order.total_amount, guest = order.is_guest_order, "order created");
        Ok(order)
    }

    #[instrument(skip(self), err)]
    pub async fn get(&self, id: OrderId) -> ServiceResult<Order> {
        self.orders
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("order {id}")).into())
    }

    pub async fn list(&self) -> ServiceResult<Vec<Order>> {
        Ok(self.orders.list().await?)
    }

    /// Write the new status/payment status, then adjust inventory for the
    /// transition that was actually committed.
    ///
    /// Adjustment problems are reported in the result and never fail the call.
    /// Lines are committed one by one: if the process stops part way, lines
    /// already adjusted stay adjusted.
    #[instrument(skip(self, update), fields(order_id = %id, status = ?update.status, payment_status = ?update.payment_status), err)]
    pub async fn update_status(&self, id: OrderId, update: StatusUpdate) -> ServiceResult<StatusUpdateReport> {
        update.validate()?;

        let change = self
            .orders
            .update_status(id, &update, Utc::now())
            .await?
            .ok_or_else(|| DomainError::not_found(format!("order {id}")))?;

        let next = change.order.status;
        info!(from = change.previous.as_str(), to = next.as_str(), "order status updated");

        let adjustment = self
            .adjuster
            .run(id, change.previous, next, &change.order.items)
            .await;

        Ok(StatusUpdateReport {
            order: change.order,
            previous_status: change.previous,
            adjustment,
        })
    }

    /// Remove an order. Stock already adjusted for it is left as is.
    #[instrument(skip(self), err)]
    pub async fn delete(&self, id: OrderId) -> ServiceResult<()> {
        if !self.orders.delete(id).await? {
            return Err(DomainError::not_found(format!("order {id}")).into());
        }
        info!(order_id = %id, "order deleted");
        Ok(())
    }

    #[instrument(skip(self), err)]
    pub async fn delete_all(&self) -> ServiceResult<u64> {
        let removed = self.orders.delete_all().await?;
        info!(removed, "all orders deleted");
        Ok(removed)
    }

    pub async fn stats(&self) -> ServiceResult<OrderStats> {
        Ok(self.orders.stats().await?)
    }
}
