use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Extension, Multipart, Path, Query},
    routing::{get, post, put},
    Router,
};
use serde_json::json;

use shopfront_core::ProductId;
use shopfront_infra::IncomingFile;

use crate::app::dto::{self, ApiJson};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::services::AppServices;
use crate::authz::require_admin;
use crate::context::CurrentPrincipal;

/// Most files accepted by one upload request.
const MAX_UPLOAD_FILES: usize = 10;

pub fn router(upload_body_limit: usize) -> Router {
    Router::new()
        .route("/", get(list_products).post(create_product).delete(deactivate_all))
        .route("/featured", get(featured_products))
        .route(
            "/images",
            post(upload_images).layer(DefaultBodyLimit::max(upload_body_limit)),
        )
        .route("/:id", get(get_product).put(update_product).delete(deactivate_product))
        .route("/:id/stock", put(sell_stock))
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::PageQuery>,
) -> ApiResult {
    let request = query.request();
    let page = services.catalog.list(request).await?;
    Ok(dto::paged(&page, request))
}

pub async fn featured_products(Extension(services): Extension<Arc<AppServices>>) -> ApiResult {
    let products = services.catalog.featured().await?;
    Ok(dto::listing(&products))
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> ApiResult {
    let id: ProductId = dto::parse_id(&id)?;
    Ok(dto::ok(services.catalog.get(id).await?))
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiJson(body): ApiJson<dto::CreateProductRequest>,
) -> ApiResult {
    require_admin(&principal)?;
    let product = services.catalog.create(body.into_new_product()?).await?;
    Ok(dto::created(product))
}

pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::UpdateProductRequest>,
) -> ApiResult {
    require_admin(&principal)?;
    let id: ProductId = dto::parse_id(&id)?;
    let product = services.catalog.update(id, body.into_patch()?).await?;
    Ok(dto::ok(product))
}

pub async fn deactivate_product(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<String>,
) -> ApiResult {
    require_admin(&principal)?;
    let id: ProductId = dto::parse_id(&id)?;
    services.catalog.deactivate(id).await?;
    Ok(dto::message("product deleted"))
}

pub async fn deactivate_all(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> ApiResult {
    require_admin(&principal)?;
    let count = services.catalog.deactivate_all().await?;
    Ok(dto::ok(json!({ "deleted": count })))
}

/// Storefront purchase decrement; public.
pub async fn sell_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::StockRequest>,
) -> ApiResult {
    let id: ProductId = dto::parse_id(&id)?;
    let quantity = body.quantity()?;
    let sale = services.catalog.sell(id, quantity, body.color).await?;
    Ok(dto::ok(sale))
}

pub async fn upload_images(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    mut multipart: Multipart,
) -> ApiResult {
    require_admin(&principal)?;

    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        if field.name() != Some("images") {
            continue;
        }
        if files.len() == MAX_UPLOAD_FILES {
            return Err(ApiError::BadRequest(format!("at most {MAX_UPLOAD_FILES} files per upload")));
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| ApiError::BadRequest(e.body_text()))?;
        files.push(IncomingFile {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        });
    }
    if files.is_empty() {
        return Err(ApiError::BadRequest("no files uploaded; use the 'images' field".into()));
    }

    let report = services.uploads.ingest(files).await;
    if report.uploaded.is_empty() {
        let reasons: Vec<String> = report.failed.iter().map(|f| format!("{}: {}", f.filename, f.reason)).collect();
        return Err(ApiError::BadRequest(reasons.join("; ")));
    }
    Ok(dto::created(report))
}
