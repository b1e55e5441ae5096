//! Shopping cart service for registered users.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument};

use shopfront_auth::{AuthError, Principal};
use shopfront_core::{DomainError, ProductId, UserId};
use shopfront_sales::{CartLine, CartLineView, CartQuantityChange, CartSummary, validate_add_quantity};

use crate::error::ServiceResult;
use crate::store::{CartStore, ProductStore};

/// Cart lines joined with live product data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartLineView>,
    #[serde(flatten)]
    pub summary: CartSummary,
}

#[derive(Clone)]
pub struct Carts {
    carts: Arc<dyn CartStore>,
    products: Arc<dyn ProductStore>,
}

/// Only database users own a cart; the configured admin does not.
fn owner(principal: &Principal) -> Result<UserId, AuthError> {
    principal
        .user_id()
        .ok_or_else(|| AuthError::forbidden("the configured administrator has no cart"))
}

impl Carts {
    pub fn new(carts: Arc<dyn CartStore>, products: Arc<dyn ProductStore>) -> Self {
        Self { carts, products }
    }

    /// Lines whose product no longer exists are left out.
    pub async fn view(&self, principal: &Principal) -> ServiceResult<CartView> {
        let user = owner(principal)?;
        let lines = self.carts.lines(user).await?;
        let ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
        let products: HashMap<_, _> = self
            .products
            .get_many(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let items: Vec<CartLineView> = lines
            .into_iter()
            .filter_map(|line| {
                let product = products.get(&line.product_id)?;
                Some(CartLineView::new(
                    line,
                    product.name.clone(),
                    product.price,
                    product.first_image().map(str::to_string),
                ))
            })
            .collect();
        let summary = CartSummary::of(&items);
        Ok(CartView { items, summary })
    }

    #[instrument(skip(self, principal), fields(user = %principal.id), err)]
    pub async fn add(&self, principal: &Principal, product_id: ProductId, quantity: i64) -> ServiceResult<CartLine> {
        let user = owner(principal)?;
        let quantity = validate_add_quantity(quantity)?;
        match self.products.get(product_id).await? {
            Some(product) if product.is_active => {}
            _ => return Err(DomainError::not_found(format!("product {product_id}")).into()),
        }
        let line = self.carts.add(user, product_id, quantity).await?;
        debug!(quantity = line.quantity, "cart line added");
        Ok(line)
    }

    /// Set a line's quantity. Zero removes the line and returns `None`.
    #[instrument(skip(self, principal), fields(user = %principal.id), err)]
    pub async fn set_quantity(
        &self,
        principal: &Principal,
        product_id: ProductId,
        quantity: i64,
    ) -> ServiceResult<Option<CartLine>> {
        let user = owner(principal)?;
        match CartQuantityChange::from_requested(quantity)? {
            CartQuantityChange::Remove => {
                self.remove(principal, product_id).await?;
                Ok(None)
            }
            CartQuantityChange::Set(quantity) => self
                .carts
                .set_quantity(user, product_id, quantity)
                .await?
                .map(Some)
                .ok_or_else(|| DomainError::not_found(format!("cart item for product {product_id}")).into()),
        }
    }

    pub async fn remove(&self, principal: &Principal, product_id: ProductId) -> ServiceResult<()> {
        let user = owner(principal)?;
        if !self.carts.remove(user, product_id).await? {
            return Err(DomainError::not_found(format!("cart item for product {product_id}")).into());
        }
        Ok(())
    }

    pub async fn clear(&self, principal: &Principal) -> ServiceResult<u64> {
        let user = owner(principal)?;
        Ok(self.carts.clear(user).await?)
    }

    pub async fn summary(&self, principal: &Principal) -> ServiceResult<CartSummary> {
        Ok(self.view(principal).await?.summary)
    }
}
