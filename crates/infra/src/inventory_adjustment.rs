//! Runs the stock movements for one order status transition.
//!
//! Each line is its own locked read-modify-write against the product store, in
//! item order. A line that cannot be adjusted becomes a warning; it never stops
//! the remaining lines or the status change that triggered it.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use shopfront_core::OrderId;
use shopfront_inventory::{
    AdjustmentRecord, AdjustmentWarning, InventoryAdjustment, StockMovement, direction_for,
};
use shopfront_sales::{OrderItem, OrderStatus};

use crate::store::{ProductStore, StockAdjustment};

#[derive(Clone)]
pub struct InventoryAdjuster {
    products: Arc<dyn ProductStore>,
}

impl InventoryAdjuster {
    pub fn new(products: Arc<dyn ProductStore>) -> Self {
        Self { products }
    }

    #[instrument(skip(self, items), fields(order_id = %order_id, from = previous.as_str(), to = next.as_str()))]
    pub async fn run(
        &self,
        order_id: OrderId,
        previous: OrderStatus,
        next: OrderStatus,
        items: &[OrderItem],
    ) -> InventoryAdjustment {
        let Some(direction) = direction_for(previous, next) else {
            debug!("transition does not move stock");
            return InventoryAdjustment::none();
        };

        let mut outcome = InventoryAdjustment::started(direction);
        for movement in StockMovement::plan(items, direction) {
            let product_id = movement.product_id;
            match self.products.adjust_stock(product_id, &movement, Utc::now()).await {
                Ok(StockAdjustment::Missing) => {
                    outcome.warnings.push(AdjustmentWarning::ProductMissing { product_id });
                }
                Ok(StockAdjustment::Adjusted {
                    name,
                    change,
                    variant_issue,
                    ..
                }) => {
                    if let Some(reason) = variant_issue {
                        outcome
                            .warnings
                            .push(AdjustmentWarning::MalformedVariantStock { product_id, reason });
                    }
                    match change {
                        Some(change) => {
                            outcome.records.push(AdjustmentRecord::new(product_id, name, &change));
                        }
                        None => outcome.warnings.push(AdjustmentWarning::StockUntracked { product_id }),
                    }
                }
                Err(err) => outcome.warnings.push(AdjustmentWarning::Store {
                    product_id,
                    message: err.to_string(),
                }),
            }
        }

        for warning in &outcome.warnings {
            warn!(product_id = %warning.product_id(), warning = %warning, "inventory line not adjusted");
        }
        info!(
            direction = ?direction,
            adjusted = outcome.records.len(),
            warnings = outcome.warnings.len(),
            "inventory adjusted"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::DateTime;

    use super::*;
    use crate::store::{InMemoryProductStore, Page, PageRequest, StoreError};
    use shopfront_core::{Money, ProductId};
    use shopfront_inventory::Direction;
    use shopfront_products::{NewProduct, Product, ProductPatch, VariantStock};

    fn product(stock: Option<u32>, colors: Option<&[(&str, u32)]>) -> NewProduct {
        NewProduct {
            name: "Tee".into(),
            description: "Cotton tee".into(),
            price: Money::from_minor(1_500),
            stock,
            color_stock: colors.map(|c| c.iter().map(|(k, v)| (k.to_string(), *v)).collect::<VariantStock>()),
            ..NewProduct::default()
        }
    }

    fn line(id: ProductId, quantity: u32, color: Option<&str>) -> OrderItem {
        OrderItem {
            product_id: id,
            name: "Tee".into(),
            price: Money::from_minor(1_500),
            quantity,
            color: color.map(str::to_string),
            image: None,
        }
    }

    async fn seeded(input: NewProduct) -> (Arc<InMemoryProductStore>, ProductId) {
        let store = Arc::new(InMemoryProductStore::new());
        let created = store.create(&input, "SKU-T", Utc::now()).await.unwrap();
        (store, created.id)
    }

    #[tokio::test]
    async fn deliver_then_cancel_restores_scalar_stock() {
        let (store, id) = seeded(product(Some(5), None)).await;
        let adjuster = InventoryAdjuster::new(store.clone());
        let items = [line(id, 2, None)];

        let out = adjuster
            .run(OrderId::new(1), OrderStatus::Pending, OrderStatus::Delivered, &items)
            .await;
        assert_eq!(out.direction, Some(Direction::Decrement));
        assert_eq!((out.records[0].previous_quantity, out.records[0].new_quantity), (5, 3));
        assert_eq!(store.get(id).await.unwrap().unwrap().stock.scalar, Some(3));

        adjuster
            .run(OrderId::new(1), OrderStatus::Delivered, OrderStatus::Cancelled, &items)
            .await;
        assert_eq!(store.get(id).await.unwrap().unwrap().stock.scalar, Some(5));
    }

    #[tokio::test]
    async fn variant_line_moves_only_its_bucket() {
        let (store, id) = seeded(product(Some(9), Some(&[("red", 3), ("blue", 2)]))).await;
        let adjuster = InventoryAdjuster::new(store.clone());

        let out = adjuster
            .run(OrderId::new(2), OrderStatus::Shipped, OrderStatus::Delivered, &[line(id, 2, Some("red"))])
            .await;
        assert_eq!(out.records[0].variant.as_deref(), Some("red"));

        let stock = store.get(id).await.unwrap().unwrap().stock;
        let variants = stock.variants.unwrap();
        assert_eq!((variants.get("red"), variants.get("blue")), (Some(1), Some(2)));
        assert_eq!(stock.scalar, Some(9));
    }

    #[tokio::test]
    async fn excess_decrement_clamps_at_zero() {
        let (store, id) = seeded(product(Some(4), None)).await;
        let out = InventoryAdjuster::new(store.clone())
            .run(OrderId::new(3), OrderStatus::Pending, OrderStatus::Delivered, &[line(id, 10, None)])
            .await;
        assert_eq!(out.records[0].new_quantity, 0);
        assert_eq!(store.get(id).await.unwrap().unwrap().stock.scalar, Some(0));
    }

    #[tokio::test]
    async fn repeated_lines_for_one_product_accumulate() {
        let (store, id) = seeded(product(Some(10), None)).await;
        InventoryAdjuster::new(store.clone())
            .run(
                OrderId::new(4),
                OrderStatus::Pending,
                OrderStatus::Delivered,
                &[line(id, 3, None), line(id, 4, None)],
            )
            .await;
        assert_eq!(store.get(id).await.unwrap().unwrap().stock.scalar, Some(3));
    }

    #[tokio::test]
    async fn problem_lines_warn_and_do_not_block_the_rest() {
        let (store, id) = seeded(product(Some(6), None)).await;
        let untracked = store.create(&product(None, None), "SKU-U", Utc::now()).await.unwrap();

        let out = InventoryAdjuster::new(store.clone())
            .run(
                OrderId::new(5),
                OrderStatus::Processing,
                OrderStatus::Delivered,
                &[line(ProductId::new(999), 1, None), line(untracked.id, 1, None), line(id, 1, None)],
            )
            .await;

        assert_eq!(
            out.warnings,
            vec![
                AdjustmentWarning::ProductMissing { product_id: ProductId::new(999) },
                AdjustmentWarning::StockUntracked { product_id: untracked.id },
            ]
        );
        assert_eq!(out.records.len(), 1);
        assert_eq!(store.get(id).await.unwrap().unwrap().stock.scalar, Some(5));
    }

    /// Stands in for a Postgres row whose `color_stock` JSON failed to decode:
    /// the inner store only tracks scalar stock, and every adjustment reports why
    /// the variant map was ignored.
    struct UndecodableVariants {
        inner: InMemoryProductStore,
    }

    #[async_trait]
    impl ProductStore for UndecodableVariants {
        async fn create(&self, input: &NewProduct, sku: &str, now: DateTime<Utc>) -> Result<Product, StoreError> {
            self.inner.create(input, sku, now).await
        }
        async fn get(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
            self.inner.get(id).await
        }
        async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
            self.inner.get_many(ids).await
        }
        async fn list_active(&self, page: PageRequest) -> Result<Page<Product>, StoreError> {
            self.inner.list_active(page).await
        }
        async fn featured(&self, limit: u32) -> Result<Vec<Product>, StoreError> {
            self.inner.featured(limit).await
        }
        async fn update(&self, id: ProductId, patch: &ProductPatch, now: DateTime<Utc>) -> Result<Product, StoreError> {
            self.inner.update(id, patch, now).await
        }
        async fn deactivate(&self, id: ProductId, now: DateTime<Utc>) -> Result<bool, StoreError> {
            self.inner.deactivate(id, now).await
        }
        async fn deactivate_all(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
            self.inner.deactivate_all(now).await
        }
        async fn adjust_stock(
            &self,
            id: ProductId,
            movement: &StockMovement,
            now: DateTime<Utc>,
        ) -> Result<StockAdjustment, StoreError> {
            match self.inner.adjust_stock(id, movement, now).await? {
                StockAdjustment::Adjusted { name, change, total, .. } => Ok(StockAdjustment::Adjusted {
                    name,
                    change,
                    variant_issue: Some("malformed variant stock: invalid value: integer `-1`".into()),
                    total,
                }),
                missing => Ok(missing),
            }
        }
    }

    #[tokio::test]
    async fn undecodable_variant_stock_falls_back_to_scalar_and_warns() {
        let inner = InMemoryProductStore::new();
        let created = inner.create(&product(Some(8), None), "SKU-M", Utc::now()).await.unwrap();
        let store = Arc::new(UndecodableVariants { inner });

        let out = InventoryAdjuster::new(store.clone())
            .run(
                OrderId::new(7),
                OrderStatus::Pending,
                OrderStatus::Delivered,
                &[line(created.id, 3, Some("red"))],
            )
            .await;

        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].variant, None);
        assert_eq!((out.records[0].previous_quantity, out.records[0].new_quantity), (8, 5));
        match out.warnings.as_slice() {
            [AdjustmentWarning::MalformedVariantStock { product_id, reason }] => {
                assert_eq!(*product_id, created.id);
                assert!(reason.contains("malformed"));
            }
            other => panic!("unexpected warnings: {other:?}"),
        }
        assert_eq!(store.get(created.id).await.unwrap().unwrap().stock.scalar, Some(5));
    }

    #[tokio::test]
    async fn non_crossing_transitions_touch_nothing() {
        let (store, id) = seeded(product(Some(5), None)).await;
        let adjuster = InventoryAdjuster::new(store.clone());
        let items = [line(id, 1, None)];

        for (from, to) in [
            (OrderStatus::Pending, OrderStatus::Processing),
            (OrderStatus::Delivered, OrderStatus::Delivered),
            (OrderStatus::Pending, OrderStatus::Cancelled),
        ] {
            let out = adjuster.run(OrderId::new(6), from, to, &items).await;
            assert_eq!(out, InventoryAdjustment::none());
        }
        assert_eq!(store.get(id).await.unwrap().unwrap().stock.scalar, Some(5));
    }
}
