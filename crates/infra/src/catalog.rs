//! Product catalog service.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};

use shopfront_core::{DomainError, ProductId};
use shopfront_inventory::{Direction, StockMovement};
use shopfront_products::{NewProduct, Product, ProductPatch, StockBucket, generate_sku};

use crate::error::ServiceResult;
use crate::store::{Page, PageRequest, ProductStore, StockAdjustment};

/// Most featured products the storefront shows.
pub const FEATURED_LIMIT: u32 = 8;

/// Result of a storefront stock decrement.
///
/// `old_stock`/`new_stock` are `None` when the product tracks no stock for the
/// requested line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockSale {
    pub product_id: ProductId,
    /// Variant label that was decremented; `None` when scalar stock moved.
    pub color: Option<String>,
    pub old_stock: Option<u32>,
    pub new_stock: Option<u32>,
    pub total_stock: Option<u64>,
    pub sold_out: bool,
}

#[derive(Clone)]
pub struct Catalog {
    products: Arc<dyn ProductStore>,
}

impl Catalog {
    pub fn new(products: Arc<dyn ProductStore>) -> Self {
        Self { products }
    }

    /// Validate and insert. A SKU is generated when none is supplied.
    #[instrument(skip(self, input), fields(name = %input.name), err)]
    pub async fn create(&self, input: NewProduct) -> ServiceResult<Product> {
        input.validate()?;
        let now = Utc::now();
        let sku = match input.sku.as_deref().map(str::trim) {
            Some(sku) if !sku.is_empty() => sku.to_string(),
            _ => generate_sku(now),
        };
        let product = self.products.create(&input, &sku, now).await?;
        info!(product_id = %product.id, sku = %product.sku, "product created");
        Ok(product)
    }

    pub async fn list(&self, page: PageRequest) -> ServiceResult<Page<Product>> {
        Ok(self.products.list_active(page).await?)
    }

    pub async fn featured(&self) -> ServiceResult<Vec<Product>> {
        Ok(self.products.featured(FEATURED_LIMIT).await?)
    }

    /// Active product by id; deactivated products are not found.
    pub async fn get(&self, id: ProductId) -> ServiceResult<Product> {
        match self.products.get(id).await? {
            Some(product) if product.is_active => Ok(product),
            _ => Err(DomainError::not_found(format!("product {id}")).into()),
        }
    }

    #[instrument(skip(self, patch), err)]
    pub async fn update(&self, id: ProductId, patch: ProductPatch) -> ServiceResult<Product> {
        patch.validate()?;
        let product = self.products.update(id, &patch, Utc::now()).await?;
        info!(product_id = %id, "product updated");
        Ok(product)
    }

    /// Soft delete.
    #[instrument(skip(self), err)]
    pub async fn deactivate(&self, id: ProductId) -> ServiceResult<()> {
        if !self.products.deactivate(id, Utc::now()).await? {
            return Err(DomainError::not_found(format!("product {id}")).into());
        }
        info!(product_id = %id, "product deactivated");
        Ok(())
    }

    #[instrument(skip(self), err)]
    pub async fn deactivate_all(&self) -> ServiceResult<u64> {
        let count = self.products.deactivate_all(Utc::now()).await?;
        if count == 0 {
            return Err(DomainError::not_found("active products").into());
        }
        info!(count, "all products deactivated");
        Ok(count)
    }

    /// Storefront decrement: the variant bucket when `color` names one,
    /// otherwise scalar stock, floored at zero.
    #[instrument(skip(self), err)]
    pub async fn sell(&self, id: ProductId, quantity: u32, color: Option<String>) -> ServiceResult<StockSale> {
        if quantity == 0 {
            return Err(DomainError::validation("quantity must be greater than zero").into());
        }
        self.get(id).await?;

        let movement = StockMovement {
            product_id: id,
            quantity,
            variant: color.filter(|c| !c.is_empty()),
            direction: Direction::Decrement,
        };
        let (change, variant_issue, total) = match self.products.adjust_stock(id, &movement, Utc::now()).await? {
            StockAdjustment::Missing => return Err(DomainError::not_found(format!("product {id}")).into()),
            StockAdjustment::Adjusted {
                change,
                variant_issue,
                total,
                ..
            } => (change, variant_issue, total),
        };
        if let Some(reason) = variant_issue {
            warn!(product_id = %id, %reason, "ignoring malformed variant stock");
        }

        let color = change.as_ref().and_then(|c| match &c.bucket {
            StockBucket::Variant(label) => Some(label.clone()),
            StockBucket::Scalar => None,
        });
        let sale = StockSale {
            product_id: id,
            color,
            old_stock: change.as_ref().map(|c| c.previous),
            new_stock: change.as_ref().map(|c| c.new),
            total_stock: total,
            sold_out: total == Some(0),
        };
        info!(product_id = %id, old = ?sale.old_stock, new = ?sale.new_stock, "storefront stock decremented");
        Ok(sale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::store::InMemoryProductStore;
    use shopfront_core::Money;
    use shopfront_products::VariantStock;

    fn tee() -> NewProduct {
        NewProduct {
            name: "Tee".into(),
            description: "Cotton".into(),
            price: Money::from_minor(1_200),
            stock: Some(4),
            ..NewProduct::default()
        }
    }

    fn catalog() -> Catalog {
        Catalog::new(Arc::new(InMemoryProductStore::new()))
    }

    #[tokio::test]
    async fn create_generates_sku_and_defaults_category() {
        let catalog = catalog();
        let product = catalog.create(tee()).await.unwrap();
        assert!(product.sku.starts_with("SKU-"), "sku = {}", product.sku);
        assert_eq!(product.category, "Others");

        let mut explicit = tee();
        explicit.sku = Some(product.sku.clone());
        match catalog.create(explicit).await {
            Err(ServiceError::Domain(DomainError::Conflict(_))) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_products_are_rejected() {
        let mut input = tee();
        input.price = Money::ZERO;
        assert!(matches!(
            catalog().create(input).await,
            Err(ServiceError::Domain(DomainError::Validation(_)))
        ));
    }

    #[tokio::test]
    async fn deactivated_products_disappear() {
        let catalog = catalog();
        let product = catalog.create(tee()).await.unwrap();
        catalog.deactivate(product.id).await.unwrap();

        assert!(matches!(
            catalog.get(product.id).await,
            Err(ServiceError::Domain(DomainError::NotFound(_)))
        ));
        assert!(matches!(
            catalog.deactivate_all().await,
            Err(ServiceError::Domain(DomainError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn empty_patch_is_rejected() {
        let catalog = catalog();
        let product = catalog.create(tee()).await.unwrap();
        match catalog.update(product.id, ProductPatch::default()).await {
            Err(ServiceError::Domain(DomainError::Validation(msg))) if msg.contains("no fields") => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn sell_prefers_matching_variant_and_clamps() {
        let catalog = catalog();
        let mut input = tee();
        input.color_stock = Some([("red".to_string(), 1), ("blue".to_string(), 2)].into_iter().collect::<VariantStock>());
        let product = catalog.create(input).await.unwrap();

        let sale = catalog.sell(product.id, 5, Some("red".into())).await.unwrap();
        assert_eq!(sale.color.as_deref(), Some("red"));
        assert_eq!((sale.old_stock, sale.new_stock), (Some(1), Some(0)));
        assert_eq!(sale.total_stock, Some(2));
        assert!(!sale.sold_out);

        let sale = catalog.sell(product.id, 1, Some("green".into())).await.unwrap();
        assert_eq!(sale.color, None);
        assert_eq!((sale.old_stock, sale.new_stock), (Some(4), Some(3)));
    }
}
