use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopfront_core::{DomainError, DomainResult, Money, ProductId, ensure_units};

use crate::stock::{StockLevels, VariantStock};

/// Category assigned when none is supplied.
pub const DEFAULT_CATEGORY: &str = "Others";

/// Catalog entry as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub original_price: Option<Money>,
    pub category: String,
    pub brand: Option<String>,
    pub sku: String,
    pub weight: Option<f64>,
    pub length: Option<f64>,
    pub height: Option<f64>,
    pub size: Option<String>,
    pub color: Option<String>,
    #[serde(flatten)]
    pub stock: StockLevels,
    pub images: Vec<String>,
    pub tags: Vec<String>,
    pub is_active: bool,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Materialize a validated create request.
    pub fn create(id: ProductId, input: &NewProduct, sku: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: input.name.trim().to_string(),
            description: input.description.clone(),
            price: input.price,
            original_price: input.original_price,
            category: input.category_or_default(),
            brand: input.brand.clone(),
            sku,
            weight: input.weight,
            length: input.length,
            height: input.height,
            size: input.size.clone(),
            color: input.color.clone(),
            stock: input.stock_levels(),
            images: input.images.clone(),
            tags: input.tags.clone(),
            is_active: true,
            is_featured: input.is_featured,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn first_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    pub fn sold_out(&self) -> bool {
        matches!(self.stock.total(), Some(0))
    }
}

/// Validated input for creating a product.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Money,
    pub original_price: Option<Money>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub sku: Option<String>,
    pub weight: Option<f64>,
    pub length: Option<f64>,
    pub height: Option<f64>,
    pub size: Option<String>,
    pub color: Option<String>,
    pub stock: Option<u32>,
    pub color_stock: Option<VariantStock>,
    pub images: Vec<String>,
    pub tags: Vec<String>,
    pub is_featured: bool,
}

impl NewProduct {
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name is required"));
        }
        if self.description.trim().is_empty() {
            return Err(DomainError::validation("description is required"));
        }
        if self.price == Money::ZERO {
            return Err(DomainError::validation("price must be greater than zero"));
        }
        if let Some(sku) = &self.sku {
            if sku.trim().is_empty() {
                return Err(DomainError::validation("sku cannot be blank"));
            }
        }
        validate_stock(self.stock, self.color_stock.as_ref())?;
        validate_dimensions(self.weight, self.length, self.height)
    }

    /// Category with the default applied.
    pub fn category_or_default(&self) -> String {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CATEGORY)
            .to_string()
    }

    pub fn stock_levels(&self) -> StockLevels {
        StockLevels {
            scalar: self.stock,
            variants: self.color_stock.clone(),
        }
    }
}

/// Whitelisted admin edit. `None` leaves a field untouched; for nullable columns
/// `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub original_price: Option<Option<Money>>,
    pub category: Option<String>,
    pub brand: Option<Option<String>>,
    pub sku: Option<String>,
    pub weight: Option<Option<f64>>,
    pub length: Option<Option<f64>>,
    pub height: Option<Option<f64>>,
    pub size: Option<Option<String>>,
    pub color: Option<Option<String>>,
    pub stock: Option<Option<u32>>,
    pub color_stock: Option<Option<VariantStock>>,
    pub images: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.is_empty() {
            return Err(DomainError::validation("no fields to update"));
        }
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("name cannot be blank"));
            }
        }
        if let Some(description) = &self.description {
            if description.trim().is_empty() {
                return Err(DomainError::validation("description cannot be blank"));
            }
        }
        if self.price == Some(Money::ZERO) {
            return Err(DomainError::validation("price must be greater than zero"));
        }
        if let Some(sku) = &self.sku {
            if sku.trim().is_empty() {
                return Err(DomainError::validation("sku cannot be blank"));
            }
        }
        validate_stock(self.stock.flatten(), self.color_stock.as_ref().and_then(Option::as_ref))?;
        validate_dimensions(
            self.weight.flatten(),
            self.length.flatten(),
            self.height.flatten(),
        )
    }

    /// Apply to an in-memory copy. Persistent stores translate the same fields
    /// into a column list instead.
    pub fn apply_to(&self, product: &mut Product, now: DateTime<Utc>) {
        if let Some(v) = &self.name {
            product.name = v.clone();
        }
        if let Some(v) = &self.description {
            product.description = v.clone();
        }
        if let Some(v) = self.price {
            product.price = v;
        }
        if let Some(v) = self.original_price {
            product.original_price = v;
        }
        if let Some(v) = &self.category {
            product.category = v.clone();
        }
        if let Some(v) = &self.brand {
            product.brand = v.clone();
        }
        if let Some(v) = &self.sku {
            product.sku = v.clone();
        }
        if let Some(v) = self.weight {
            product.weight = v;
        }
        if let Some(v) = self.length {
            product.length = v;
        }
        if let Some(v) = self.height {
            product.height = v;
        }
        if let Some(v) = &self.size {
            product.size = v.clone();
        }
        if let Some(v) = &self.color {
            product.color = v.clone();
        }
        if let Some(v) = self.stock {
            product.stock.scalar = v;
        }
        if let Some(v) = &self.color_stock {
            product.stock.variants = v.clone();
        }
        if let Some(v) = &self.images {
            product.images = v.clone();
        }
        if let Some(v) = &self.tags {
            product.tags = v.clone();
        }
        if let Some(v) = self.is_active {
            product.is_active = v;
        }
        if let Some(v) = self.is_featured {
            product.is_featured = v;
        }
        product.updated_at = now;
    }
}

fn validate_stock(stock: Option<u32>, color_stock: Option<&VariantStock>) -> DomainResult<()> {
    if let Some(units) = stock {
        ensure_units("stock", units)?;
    }
    for (label, units) in color_stock.into_iter().flat_map(|v| v.iter()) {
        ensure_units(&format!("colorStock.{label}"), units)?;
    }
    Ok(())
}

fn validate_dimensions(weight: Option<f64>, length: Option<f64>, height: Option<f64>) -> DomainResult<()> {
    for (field, value) in [("weight", weight), ("length", length), ("height", height)] {
        if let Some(v) = value {
            if !v.is_finite() || v < 0.0 {
                return Err(DomainError::validation(format!("{field} must be a non-negative number")));
            }
        }
    }
    Ok(())
}

/// Build a SKU of the form `SKU-<millis>-<suffix>`.
///
/// The suffix is taken from a fresh v7 UUID so two products created in the same
/// millisecond still differ.
pub fn generate_sku(now: DateTime<Utc>) -> String {
    let random = uuid::Uuid::now_v7().simple().to_string();
    let suffix = &random[random.len() - 9..];
    format!("SKU-{}-{}", now.timestamp_millis(), suffix.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_product() -> NewProduct {
        NewProduct {
            name: "Desk Lamp".into(),
            description: "Warm light".into(),
            price: Money::from_minor(2_500),
            ..NewProduct::default()
        }
    }

    fn product() -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(1),
            name: "Desk Lamp".into(),
            description: "Warm light".into(),
            price: Money::from_minor(2_500),
            original_price: None,
            category: DEFAULT_CATEGORY.into(),
            brand: None,
            sku: "SKU-1".into(),
            weight: None,
            length: None,
            height: None,
            size: None,
            color: None,
            stock: StockLevels::scalar(3),
            images: vec!["/uploads/a.png".into()],
            tags: vec![],
            is_active: true,
            is_featured: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn stock_beyond_storable_range_is_rejected() {
        let mut scalar = new_product();
        scalar.stock = Some(shopfront_core::MAX_UNITS + 1);
        assert!(matches!(scalar.validate(), Err(DomainError::Validation(_))));

        let mut variants = new_product();
        variants.color_stock = Some([("red".to_string(), u32::MAX)].into_iter().collect());
        match variants.validate().unwrap_err() {
            DomainError::Validation(msg) if msg.contains("colorStock.red") => {}
            other => panic!("unexpected error: {other:?}"),
        }

        let patch = ProductPatch {
            stock: Some(Some(u32::MAX)),
            ..ProductPatch::default()
        };
        assert!(matches!(patch.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn new_product_requires_name_description_and_price() {
        assert!(new_product().validate().is_ok());

        let mut missing_name = new_product();
        missing_name.name = "  ".into();
        match missing_name.validate().unwrap_err() {
            DomainError::Validation(msg) if msg.contains("name") => {}
            other => panic!("unexpected error: {other:?}"),
        }

        let mut free = new_product();
        free.price = Money::ZERO;
        assert!(free.validate().is_err());
    }

    #[test]
    fn category_defaults_when_blank() {
        let mut input = new_product();
        assert_eq!(input.category_or_default(), DEFAULT_CATEGORY);
        input.category = Some("Lighting".into());
        assert_eq!(input.category_or_default(), "Lighting");
    }

    #[test]
    fn empty_patch_is_rejected() {
        match ProductPatch::default().validate().unwrap_err() {
            DomainError::Validation(msg) if msg.contains("no fields") => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn patch_applies_only_present_fields() {
        let mut p = product();
        let patch = ProductPatch {
            price: Some(Money::from_minor(1_999)),
            images: Some(vec![]),
            color_stock: Some(Some([("red".to_string(), 4)].into_iter().collect())),
            ..ProductPatch::default()
        };
        patch.validate().unwrap();
        patch.apply_to(&mut p, Utc::now());

        assert_eq!(p.price, Money::from_minor(1_999));
        assert!(p.images.is_empty());
        assert_eq!(p.name, "Desk Lamp");
        assert_eq!(p.stock.scalar, Some(3));
        assert_eq!(p.stock.total(), Some(4));
    }

    #[test]
    fn negative_dimensions_are_rejected() {
        let patch = ProductPatch {
            weight: Some(Some(-1.0)),
            ..ProductPatch::default()
        };
        assert!(patch.validate().is_err());
    }

    #[test]
    fn generated_skus_are_distinct() {
        let now = Utc::now();
        let a = generate_sku(now);
        let b = generate_sku(now);
        assert!(a.starts_with(&format!("SKU-{}-", now.timestamp_millis())));
        assert_ne!(a, b);
    }

    #[test]
    fn product_json_flattens_stock_fields() {
        let json = serde_json::to_value(product()).unwrap();
        assert_eq!(json["stock"], 3);
        assert!(json["colorStock"].is_null());
        assert_eq!(json["isActive"], true);
    }
}
