//! Stock representations for a product.
//!
//! A product may track a scalar unit count, a per-variant count, both, or neither.
//! `StockLevels` is the single place that decides which bucket an order line draws
//! from, so callers never special-case "has variants or not" themselves.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Variant label (e.g. a color name) → remaining units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantStock(BTreeMap<String, u32>);

impl VariantStock {
    pub fn new(levels: BTreeMap<String, u32>) -> Self {
        Self(levels)
    }

    pub fn get(&self, label: &str) -> Option<u32> {
        self.0.get(label).copied()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.contains_key(label)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all variant quantities (total sellable units).
    pub fn total(&self) -> u64 {
        self.0.values().map(|v| u64::from(*v)).sum()
    }

    fn set(&mut self, label: &str, quantity: u32) {
        if let Some(slot) = self.0.get_mut(label) {
            *slot = quantity;
        }
    }

    /// Decode a stored JSON object.
    ///
    /// Anything other than an object of non-negative integers is rejected; callers
    /// treat a rejected value as "no variant tracking".
    pub fn from_json(value: &serde_json::Value) -> Result<Self, String> {
        serde_json::from_value::<BTreeMap<String, u32>>(value.clone())
            .map(Self)
            .map_err(|e| format!("malformed variant stock: {e}"))
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.0).unwrap_or(serde_json::Value::Null)
    }
}

impl FromIterator<(String, u32)> for VariantStock {
    fn from_iter<T: IntoIterator<Item = (String, u32)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Which stock counter a movement applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "label")]
pub enum StockBucket {
    Scalar,
    Variant(String),
}

/// Result of applying a movement to one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockChange {
    pub bucket: StockBucket,
    pub previous: u32,
    pub new: u32,
}

impl StockChange {
    pub fn changed(&self) -> bool {
        self.previous != self.new
    }
}

/// Both stock representations of a product.
///
/// `scalar: None` means the scalar count is not tracked; `variants: None` means
/// the product has no variant tracking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockLevels {
    #[serde(rename = "stock")]
    pub scalar: Option<u32>,
    #[serde(rename = "colorStock")]
    pub variants: Option<VariantStock>,
}

impl StockLevels {
    pub fn scalar(units: u32) -> Self {
        Self {
            scalar: Some(units),
            variants: None,
        }
    }

    pub fn with_variants(mut self, variants: VariantStock) -> Self {
        self.variants = Some(variants);
        self
    }

    /// Resolve the bucket a line with an optional variant label draws from.
    ///
    /// A label only selects the variant bucket when it is a key of the variant
    /// map; otherwise the scalar count applies. `None` means nothing is tracked.
    pub fn bucket_for(&self, variant: Option<&str>) -> Option<StockBucket> {
        if let (Some(label), Some(variants)) = (variant, self.variants.as_ref()) {
            if variants.contains(label) {
                return Some(StockBucket::Variant(label.to_string()));
            }
        }
        self.scalar.map(|_| StockBucket::Scalar)
    }

    pub fn quantity(&self, bucket: &StockBucket) -> Option<u32> {
        match bucket {
            StockBucket::Scalar => self.scalar,
            StockBucket::Variant(label) => self.variants.as_ref().and_then(|v| v.get(label)),
        }
    }

    /// Remove `quantity` units, flooring at zero.
    pub fn take(&mut self, variant: Option<&str>, quantity: u32) -> Option<StockChange> {
        self.update(variant, |current| current.saturating_sub(quantity))
    }

    /// Return `quantity` units (no upper cap).
    pub fn put_back(&mut self, variant: Option<&str>, quantity: u32) -> Option<StockChange> {
        self.update(variant, |current| current.saturating_add(quantity))
    }

    fn update(&mut self, variant: Option<&str>, f: impl FnOnce(u32) -> u32) -> Option<StockChange> {
        let bucket = self.bucket_for(variant)?;
        let previous = self.quantity(&bucket)?;
        let new = f(previous);
        match &bucket {
            StockBucket::Scalar => self.scalar = Some(new),
            StockBucket::Variant(label) => {
                if let Some(variants) = self.variants.as_mut() {
                    variants.set(label, new);
                }
            }
        }
        Some(StockChange {
            bucket,
            previous,
            new,
        })
    }

    /// Total sellable units for display: the variant sum when variants are
    /// tracked, otherwise the scalar count.
    pub fn total(&self) -> Option<u64> {
        match (&self.variants, self.scalar) {
            (Some(variants), _) => Some(variants.total()),
            (None, Some(units)) => Some(u64::from(units)),
            (None, None) => None,
        }
    }
}
