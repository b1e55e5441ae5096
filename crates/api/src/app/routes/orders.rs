use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    routing::{get, post, put},
    Router,
};
use serde_json::json;

use shopfront_core::OrderId;

use crate::app::dto::{self, ApiJson};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::authz::require_admin;
use crate::context::{CurrentPrincipal, MaybePrincipal};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_orders).post(create_order).delete(delete_all_orders))
        .route("/guest", post(create_guest_order))
        .route("/stats", get(order_stats))
        .route("/:id", get(get_order).delete(delete_order))
        .route("/:id/status", put(update_status))
}

/// Public; linked to the caller when a valid token is sent.
pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    MaybePrincipal(principal): MaybePrincipal,
    ApiJson(body): ApiJson<dto::CreateOrderRequest>,
) -> ApiResult {
    let user_id = principal.and_then(|p| p.user_id());
    let order = services.orders.create(body.into_new_order(user_id)?).await?;
    Ok(dto::created(order))
}

pub async fn create_guest_order(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<dto::GuestOrderRequest>,
) -> ApiResult {
    let order = services.orders.create(body.into_new_order()?).await?;
    Ok(dto::created(order))
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> ApiResult {
    require_admin(&principal)?;
    let orders = services.orders.list().await?;
    Ok(dto::listing(&orders))
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<String>,
) -> ApiResult {
    require_admin(&principal)?;
    let id: OrderId = dto::parse_id(&id)?;
    Ok(dto::ok(services.orders.get(id).await?))
}

pub async fn order_stats(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> ApiResult {
    require_admin(&principal)?;
    Ok(dto::ok(services.orders.stats().await?))
}

pub async fn update_status(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::UpdateStatusRequest>,
) -> ApiResult {
    require_admin(&principal)?;
    let id: OrderId = dto::parse_id(&id)?;
    let report = services.orders.update_status(id, body.into_update()?).await?;

    Ok(dto::ok(json!({
        "order": report.order,
        "previousStatus": report.previous_status,
        "inventoryTouched": report.inventory_touched(),
        "direction": report.adjustment.direction,
        "adjustments": report.adjustment.records,
        "warnings": report.adjustment.warnings,
    })))
}

/// Stock already adjusted for the order is not restored.
pub async fn delete_order(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<String>,
) -> ApiResult {
    require_admin(&principal)?;
    let id: OrderId = dto::parse_id(&id)?;
    services.orders.delete(id).await?;
    Ok(dto::message("order deleted"))
}

pub async fn delete_all_orders(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> ApiResult {
    require_admin(&principal)?;
    let removed = services.orders.delete_all().await?;
    Ok(dto::ok(json!({ "deleted": removed })))
}
