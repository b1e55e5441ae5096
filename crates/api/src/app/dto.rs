//! Request DTOs, success envelopes and mapping into domain inputs.
//!
//! Money travels as integer minor units (cents).

use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};

use shopfront_core::{DomainError, DomainResult, Money, ProductId, UserId};
use shopfront_infra::Registration;
use shopfront_infra::store::{Page, PageRequest};
use shopfront_products::{NewProduct, ProductPatch, VariantStock};
use shopfront_sales::{Customer, NewOrder, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, StatusUpdate};

use crate::app::errors::ApiError;

// -------------------------
// Extractors / envelopes
// -------------------------

/// `Json` whose rejections use the error envelope.
pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

pub fn success<T: Serialize>(status: StatusCode, data: T) -> Response {
    (status, Json(json!({ "status": "success", "data": data }))).into_response()
}

pub fn ok<T: Serialize>(data: T) -> Response {
    success(StatusCode::OK, data)
}

pub fn created<T: Serialize>(data: T) -> Response {
    success(StatusCode::CREATED, data)
}

pub fn message(text: impl Into<String>) -> Response {
    Json(json!({ "status": "success", "message": text.into() })).into_response()
}

/// `{status, count, data}` for unpaginated lists.
pub fn listing<T: Serialize>(items: &[T]) -> Response {
    Json(json!({ "status": "success", "count": items.len(), "data": items })).into_response()
}

pub fn paged<T: Serialize>(page: &Page<T>, request: PageRequest) -> Response {
    let mut pagination = serde_json::Map::new();
    if request.offset() + (request.limit as u64) < page.total {
        pagination.insert("next".into(), json!({ "page": request.page + 1, "limit": request.limit }));
    }
    if request.page > 1 {
        pagination.insert("prev".into(), json!({ "page": request.page - 1, "limit": request.limit }));
    }
    Json(json!({
        "status": "success",
        "count": page.items.len(),
        "total": page.total,
        "pagination": pagination,
        "data": page.items,
    }))
    .into_response()
}

/// Path ids are parsed by hand so a bad id yields a validation error.
pub fn parse_id<T>(raw: &str) -> DomainResult<T>
where
    T: std::str::FromStr<Err = DomainError>,
{
    raw.parse()
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn required<T>(value: Option<T>, field: &str) -> DomainResult<T> {
    value.ok_or_else(|| DomainError::validation(format!("{field} is required")))
}

fn variant_stock(value: &Value) -> DomainResult<VariantStock> {
    VariantStock::from_json(value).map_err(|e| DomainError::validation(format!("colorStock: {e}")))
}

// -------------------------
// Products
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    pub fn request(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<u64>,
    pub original_price: Option<u64>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub sku: Option<String>,
    pub weight: Option<f64>,
    pub length: Option<f64>,
    pub height: Option<f64>,
    pub size: Option<String>,
    pub color: Option<String>,
    pub stock: Option<u32>,
    pub color_stock: Option<Value>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_featured: bool,
}

impl CreateProductRequest {
    pub fn into_new_product(self) -> DomainResult<NewProduct> {
        let color_stock = match &self.color_stock {
            None | Some(Value::Null) => None,
            Some(value) => Some(variant_stock(value)?),
        };
        Ok(NewProduct {
            name: required(self.name, "name")?,
            description: required(self.description, "description")?,
            price: Money::from_minor(required(self.price, "price")?),
            original_price: self.original_price.map(Money::from_minor),
            category: self.category,
            brand: self.brand,
            sku: self.sku,
            weight: self.weight,
            length: self.length,
            height: self.height,
            size: self.size,
            color: self.color,
            stock: self.stock,
            color_stock,
            images: self.images,
            tags: self.tags,
            is_featured: self.is_featured,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<u64>,
    #[serde(default, deserialize_with = "nullable")]
    pub original_price: Option<Option<u64>>,
    pub category: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub brand: Option<Option<String>>,
    pub sku: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub weight: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub length: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub height: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub size: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub color: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub stock: Option<Option<u32>>,
    #[serde(default, deserialize_with = "nullable")]
    pub color_stock: Option<Option<Value>>,
    pub images: Option<Vec<String>>,
    #[serde(default)]
    pub clear_images: bool,
    pub tags: Option<Vec<String>>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
}

impl UpdateProductRequest {
    pub fn into_patch(self) -> DomainResult<ProductPatch> {
        let color_stock = match self.color_stock {
            None => None,
            Some(None) | Some(Some(Value::Null)) => Some(None),
            Some(Some(value)) => Some(Some(variant_stock(&value)?)),
        };
        let images = if self.clear_images { Some(Vec::new()) } else { self.images };
        Ok(ProductPatch {
            name: self.name,
            description: self.description,
            price: self.price.map(Money::from_minor),
            original_price: self.original_price.map(|p| p.map(Money::from_minor)),
            category: self.category,
            brand: self.brand,
            sku: self.sku,
            weight: self.weight,
            length: self.length,
            height: self.height,
            size: self.size,
            color: self.color,
            stock: self.stock,
            color_stock,
            images,
            tags: self.tags,
            is_active: self.is_active,
            is_featured: self.is_featured,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct StockRequest {
    pub quantity: Option<i64>,
    pub color: Option<String>,
}

impl StockRequest {
    pub fn quantity(&self) -> DomainResult<u32> {
        self.quantity
            .filter(|q| *q > 0)
            .and_then(|q| u32::try_from(q).ok())
            .ok_or_else(|| DomainError::validation("valid quantity is required"))
    }
}

// -------------------------
// Orders
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub product_id: Option<ProductId>,
    pub name: Option<String>,
    pub price: Option<u64>,
    pub quantity: Option<u32>,
    pub color: Option<String>,
    pub image: Option<String>,
}

impl OrderItemRequest {
    fn into_item(self, idx: usize) -> DomainResult<OrderItem> {
        let field = |name: &str| format!("items[{idx}].{name}");
        Ok(OrderItem {
            product_id: required(self.product_id, &field("productId"))?,
            name: required(self.name, &field("name"))?,
            price: Money::from_minor(required(self.price, &field("price"))?),
            quantity: required(self.quantity, &field("quantity"))?,
            color: self.color,
            image: self.image,
        })
    }
}

fn items(raw: Vec<OrderItemRequest>) -> DomainResult<Vec<OrderItem>> {
    raw.into_iter().enumerate().map(|(i, item)| item.into_item(i)).collect()
}

fn payment_method(raw: Option<&str>) -> DomainResult<PaymentMethod> {
    raw.map(str::parse::<PaymentMethod>).transpose().map(Option::unwrap_or_default)
}

/// `POST /orders`; snake_case keys are accepted too.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(alias = "customer_name")]
    pub customer_name: Option<String>,
    #[serde(alias = "customer_email")]
    pub customer_email: Option<String>,
    #[serde(alias = "customer_phone", default)]
    pub customer_phone: String,
    #[serde(alias = "customer_address", default)]
    pub customer_address: String,
    #[serde(default)]
    pub items: Vec<OrderItemRequest>,
    #[serde(alias = "total_amount")]
    pub total_amount: Option<u64>,
    #[serde(alias = "delivery_fee")]
    pub delivery_fee: Option<u64>,
    #[serde(alias = "payment_method")]
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

impl CreateOrderRequest {
    pub fn into_new_order(self, user_id: Option<UserId>) -> DomainResult<NewOrder> {
        Ok(NewOrder {
            customer: Customer {
                name: self.customer_name.unwrap_or_default(),
                email: self.customer_email.unwrap_or_default(),
                phone: self.customer_phone,
                address: self.customer_address,
            },
            items: items(self.items)?,
            delivery_fee: Money::from_minor(self.delivery_fee.unwrap_or(0)),
            total_amount: self.total_amount.map(Money::from_minor),
            payment_method: payment_method(self.payment_method.as_deref())?,
            notes: self.notes,
            user_id,
            is_guest_order: false,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestCustomer {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub city: Option<String>,
    pub other_city: Option<String>,
}

impl GuestCustomer {
    fn address(&self) -> String {
        [&self.address1, &self.address2, &self.city, &self.other_city]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// `POST /orders/guest`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestOrderRequest {
    #[serde(default)]
    pub customer: GuestCustomer,
    #[serde(default)]
    pub items: Vec<OrderItemRequest>,
    /// Delivery fee.
    pub delivery: Option<u64>,
    /// Caller-supplied grand total.
    pub total: Option<u64>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

impl GuestOrderRequest {
    pub fn into_new_order(self) -> DomainResult<NewOrder> {
        let address = self.customer.address();
        Ok(NewOrder {
            customer: Customer {
                name: self.customer.name,
                email: self.customer.email,
                phone: self.customer.phone,
                address,
            },
            items: items(self.items)?,
            delivery_fee: Money::from_minor(self.delivery.unwrap_or(0)),
            total_amount: self.total.map(Money::from_minor),
            payment_method: payment_method(self.payment_method.as_deref())?,
            notes: self.notes,
            user_id: None,
            is_guest_order: true,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
    #[serde(alias = "payment_status")]
    pub payment_status: Option<String>,
}

impl UpdateStatusRequest {
    pub fn into_update(self) -> DomainResult<StatusUpdate> {
        Ok(StatusUpdate {
            status: self.status.as_deref().map(str::parse::<OrderStatus>).transpose()?,
            payment_status: self
                .payment_status
                .as_deref()
                .map(str::parse::<PaymentStatus>)
                .transpose()?,
        })
    }
}

// -------------------------
// Cart / auth
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: Option<ProductId>,
    pub quantity: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CartQuantityRequest {
    pub quantity: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Any client-supplied `role` is ignored.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl From<RegisterRequest> for Registration {
    fn from(req: RegisterRequest) -> Self {
        Registration {
            name: req.name,
            email: req.email,
            password: req.password,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_distinguishes_null_from_absent() {
        let req: UpdateProductRequest =
            serde_json::from_value(json!({ "brand": null, "colorStock": {"red": 2}, "clearImages": true })).unwrap();
        let patch = req.into_patch().unwrap();
        assert_eq!(patch.brand, Some(None));
        assert_eq!(patch.color, None);
        assert_eq!(patch.images, Some(vec![]));
        assert_eq!(patch.color_stock.unwrap().unwrap().get("red"), Some(2));
    }

    #[test]
    fn malformed_color_stock_is_a_validation_error() {
        let req: CreateProductRequest = serde_json::from_value(json!({
            "name": "Tee", "description": "d", "price": 100, "colorStock": {"red": -1}
        }))
        .unwrap();
        assert!(matches!(req.into_new_product(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn guest_address_is_joined() {
        let req: GuestOrderRequest = serde_json::from_value(json!({
            "customer": { "name": "Kim", "email": "kim@x.io", "address1": "1 Main", "city": "Lahore" },
            "items": [{ "productId": 3, "name": "Mug", "price": 800, "quantity": 1 }],
            "delivery": 200
        }))
        .unwrap();
        let order = req.into_new_order().unwrap();
        assert_eq!(order.customer.address, "1 Main Lahore");
        assert!(order.is_guest_order);
        assert_eq!(order.computed_total(), Money::from_minor(1_000));
    }

    #[test]
    fn snake_case_order_keys_are_accepted() {
        let req: CreateOrderRequest = serde_json::from_value(json!({
            "customer_name": "Kim", "customer_email": "kim@x.io",
            "items": [{ "productId": 3, "name": "Mug", "price": 800, "quantity": 2 }],
            "payment_method": "paypal"
        }))
        .unwrap();
        let order = req.into_new_order(None).unwrap();
        assert_eq!(order.customer.name, "Kim");
        assert_eq!(order.payment_method, PaymentMethod::Paypal);
    }

    #[test]
    fn status_aliases_parse() {
        let req = UpdateStatusRequest {
            status: Some("completed".into()),
            payment_status: None,
        };
        assert_eq!(req.into_update().unwrap().status, Some(OrderStatus::Delivered));
    }
}
