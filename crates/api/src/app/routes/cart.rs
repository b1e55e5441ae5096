use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    routing::{get, put},
    Router,
};
use serde_json::json;

use shopfront_core::{DomainError, ProductId};

use crate::app::dto::{self, ApiJson};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::context::CurrentPrincipal;

pub fn router() -> Router {
    Router::new()
        .route("/", get(view_cart).post(add_to_cart).delete(clear_cart))
        .route("/count", get(cart_count))
        .route("/total", get(cart_total))
        .route("/:product_id", put(set_quantity).delete(remove_line))
}

pub async fn view_cart(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> ApiResult {
    Ok(dto::ok(services.carts.view(&principal).await?))
}

pub async fn add_to_cart(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiJson(body): ApiJson<dto::AddToCartRequest>,
) -> ApiResult {
    let product_id = body
        .product_id
        .ok_or_else(|| DomainError::validation("productId is required"))?;
    let line = services
        .carts
        .add(&principal, product_id, body.quantity.unwrap_or(1))
        .await?;
    Ok(dto::created(line))
}

/// Quantity 0 removes the line.
pub async fn set_quantity(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(product_id): Path<String>,
    ApiJson(body): ApiJson<dto::CartQuantityRequest>,
) -> ApiResult {
    let product_id: ProductId = dto::parse_id(&product_id)?;
    let quantity = body
        .quantity
        .ok_or_else(|| DomainError::validation("quantity is required"))?;
    match services.carts.set_quantity(&principal, product_id, quantity).await? {
        Some(line) => Ok(dto::ok(line)),
        None => Ok(dto::message("item removed from cart")),
    }
}

pub async fn remove_line(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(product_id): Path<String>,
) -> ApiResult {
    let product_id: ProductId = dto::parse_id(&product_id)?;
    services.carts.remove(&principal, product_id).await?;
    Ok(dto::message("item removed from cart"))
}

pub async fn clear_cart(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> ApiResult {
    let removed = services.carts.clear(&principal).await?;
    Ok(dto::ok(json!({ "removed": removed })))
}

pub async fn cart_count(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> ApiResult {
    let summary = services.carts.summary(&principal).await?;
    Ok(dto::ok(json!({ "count": summary.count })))
}

pub async fn cart_total(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> ApiResult {
    let summary = services.carts.summary(&principal).await?;
    Ok(dto::ok(json!({ "total": summary.total })))
}
