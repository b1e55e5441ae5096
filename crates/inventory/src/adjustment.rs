use serde::{Deserialize, Serialize};

use shopfront_core::ProductId;
use shopfront_products::{StockBucket, StockChange, StockLevels};
use shopfront_sales::{OrderItem, OrderStatus};

/// Which way stock moves for a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Decrement,
    Restore,
}

/// Map a status transition to a stock direction.
///
/// Entering a fulfilling status from a non-fulfilling one decrements; leaving a
/// fulfilling status for `cancelled` restores. Everything else (including
/// re-applying the current status) leaves stock alone.
pub fn direction_for(previous: OrderStatus, next: OrderStatus) -> Option<Direction> {
    match (previous.is_fulfilling(), next.is_fulfilling()) {
        (false, true) => Some(Direction::Decrement),
        (true, false) if next == OrderStatus::Cancelled => Some(Direction::Restore),
        _ => None,
    }
}

/// One line item's worth of stock movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub product_id: ProductId,
    pub quantity: u32,
    pub variant: Option<String>,
    pub direction: Direction,
}

impl StockMovement {
    pub fn for_item(item: &OrderItem, direction: Direction) -> Self {
        Self {
            product_id: item.product_id,
            quantity: item.quantity,
            variant: item.variant().map(str::to_string),
            direction,
        }
    }

    /// Movements for every line, in item order.
    pub fn plan(items: &[OrderItem], direction: Direction) -> Vec<Self> {
        items.iter().map(|item| Self::for_item(item, direction)).collect()
    }

    /// Apply to a product's stock. `None` when no counter is tracked for the line.
    pub fn apply(&self, levels: &mut StockLevels) -> Option<StockChange> {
        let variant = self.variant.as_deref();
        match self.direction {
            Direction::Decrement => levels.take(variant, self.quantity),
            Direction::Restore => levels.put_back(variant, self.quantity),
        }
    }
}

/// Observable result of one applied movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentRecord {
    pub product_id: ProductId,
    pub name: String,
    /// Variant label when the variant counter moved; `None` for scalar stock.
    pub variant: Option<String>,
    pub previous_quantity: u32,
    pub new_quantity: u32,
}

impl AdjustmentRecord {
    pub fn new(product_id: ProductId, name: impl Into<String>, change: &StockChange) -> Self {
        let variant = match &change.bucket {
            StockBucket::Scalar => None,
            StockBucket::Variant(label) => Some(label.clone()),
        };
        Self {
            product_id,
            name: name.into(),
            variant,
            previous_quantity: change.previous,
            new_quantity: change.new,
        }
    }
}

/// A line that could not be adjusted. Logged and reported; never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "kind")]
pub enum AdjustmentWarning {
    ProductMissing { product_id: ProductId },
    StockUntracked { product_id: ProductId },
    MalformedVariantStock { product_id: ProductId, reason: String },
    Store { product_id: ProductId, message: String },
}

impl AdjustmentWarning {
    pub fn product_id(&self) -> ProductId {
        match self {
            AdjustmentWarning::ProductMissing { product_id }
            | AdjustmentWarning::StockUntracked { product_id }
            | AdjustmentWarning::MalformedVariantStock { product_id, .. }
            | AdjustmentWarning::Store { product_id, .. } => *product_id,
        }
    }
}

impl core::fmt::Display for AdjustmentWarning {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AdjustmentWarning::ProductMissing { product_id } => {
                write!(f, "product {product_id} not found; line skipped")
            }
            AdjustmentWarning::StockUntracked { product_id } => {
                write!(f, "product {product_id} has no tracked stock; line skipped")
            }
            AdjustmentWarning::MalformedVariantStock { product_id, reason } => {
                write!(f, "product {product_id}: {reason}; used scalar stock")
            }
            AdjustmentWarning::Store { product_id, message } => {
                write!(f, "product {product_id}: stock update failed: {message}")
            }
        }
    }
}

/// Aggregated outcome of running the movements for one transition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryAdjustment {
    pub direction: Option<Direction>,
    pub records: Vec<AdjustmentRecord>,
    pub warnings: Vec<AdjustmentWarning>,
}

impl InventoryAdjustment {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn started(direction: Direction) -> Self {
        Self {
            direction: Some(direction),
            ..Self::default()
        }
    }

    /// True when at least one stock counter was written.
    pub fn touched(&self) -> bool {
        !self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use shopfront_core::Money;
    use shopfront_products::VariantStock;
    use OrderStatus::*;

    fn line(product: i64, quantity: u32, color: Option<&str>) -> OrderItem {
        OrderItem {
            product_id: ProductId::new(product),
            name: format!("p{product}"),
            price: Money::from_minor(100),
            quantity,
            color: color.map(str::to_string),
            image: None,
        }
    }

    // Applies movements one line at a time, re-reading the map each time, the
    // same way the runner reads each product row per line.
    fn run(
        previous: OrderStatus,
        next: OrderStatus,
        items: &[OrderItem],
        stock: &mut BTreeMap<ProductId, StockLevels>,
    ) -> InventoryAdjustment {
        let Some(direction) = direction_for(previous, next) else {
            return InventoryAdjustment::none();
        };
        let mut out = InventoryAdjustment::started(direction);
        for movement in StockMovement::plan(items, direction) {
            let Some(levels) = stock.get_mut(&movement.product_id) else {
                out.warnings.push(AdjustmentWarning::ProductMissing {
                    product_id: movement.product_id,
                });
                continue;
            };
            match movement.apply(levels) {
                Some(change) => out
                    .records
                    .push(AdjustmentRecord::new(movement.product_id, "p", &change)),
                None => out.warnings.push(AdjustmentWarning::StockUntracked {
                    product_id: movement.product_id,
                }),
            }
        }
        out
    }

    #[test]
    fn direction_table() {
        assert_eq!(direction_for(Pending, Delivered), Some(Direction::Decrement));
        assert_eq!(direction_for(Shipped, Delivered), Some(Direction::Decrement));
        assert_eq!(direction_for(Delivered, Cancelled), Some(Direction::Restore));
        assert_eq!(direction_for(Delivered, Delivered), None);
        assert_eq!(direction_for(Pending, Processing), None);
        assert_eq!(direction_for(Shipped, Cancelled), None);
        assert_eq!(direction_for(Cancelled, Cancelled), None);
    }

    #[test]
    fn deliver_then_cancel_restores_scalar_stock() {
        let mut stock = BTreeMap::from([(ProductId::new(1), StockLevels::scalar(5))]);
        let items = [line(1, 2, None)];

        let delivered = run(Pending, Delivered, &items, &mut stock);
        assert!(delivered.touched());
        assert_eq!(stock[&ProductId::new(1)].scalar, Some(3));

        let cancelled = run(Delivered, Cancelled, &items, &mut stock);
        assert_eq!(cancelled.direction, Some(Direction::Restore));
        assert_eq!(stock[&ProductId::new(1)].scalar, Some(5));
    }

    #[test]
    fn variant_line_moves_only_its_variant() {
        let variants: VariantStock = [("red".to_string(), 3), ("blue".to_string(), 2)]
            .into_iter()
            .collect();
        let mut stock = BTreeMap::from([(
            ProductId::new(1),
            StockLevels::scalar(7).with_variants(variants),
        )]);

        let out = run(Shipped, Delivered, &[line(1, 2, Some("red"))], &mut stock);
        let levels = &stock[&ProductId::new(1)];
        assert_eq!(levels.variants.as_ref().unwrap().get("red"), Some(1));
        assert_eq!(levels.variants.as_ref().unwrap().get("blue"), Some(2));
        assert_eq!(levels.scalar, Some(7));
        assert_eq!(out.records[0].variant.as_deref(), Some("red"));
    }

    #[test]
    fn over_decrement_clamps_to_zero() {
        let mut stock = BTreeMap::from([(ProductId::new(1), StockLevels::scalar(4))]);
        let out = run(Pending, Delivered, &[line(1, 10, None)], &mut stock);
        assert_eq!(stock[&ProductId::new(1)].scalar, Some(0));
        assert_eq!(out.records[0].new_quantity, 0);
    }

    #[test]
    fn same_product_twice_applies_cumulatively() {
        let mut stock = BTreeMap::from([(ProductId::new(1), StockLevels::scalar(10))]);
        run(Pending, Delivered, &[line(1, 3, None), line(1, 4, None)], &mut stock);
        assert_eq!(stock[&ProductId::new(1)].scalar, Some(3));
    }

    #[test]
    fn missing_product_is_a_warning_and_later_lines_still_apply() {
        let mut stock = BTreeMap::from([(ProductId::new(2), StockLevels::scalar(3))]);
        let out = run(Pending, Delivered, &[line(1, 1, None), line(2, 1, None)], &mut stock);
        assert_eq!(
            out.warnings,
            vec![AdjustmentWarning::ProductMissing { product_id: ProductId::new(1) }]
        );
        assert_eq!(stock[&ProductId::new(2)].scalar, Some(2));
    }

    #[test]
    fn warnings_serialize_with_kind_tag() {
        let json = serde_json::to_value(AdjustmentWarning::StockUntracked {
            product_id: ProductId::new(9),
        })
        .unwrap();
        assert_eq!(json["kind"], "stockUntracked");
        assert_eq!(json["productId"], 9);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn status() -> impl Strategy<Value = OrderStatus> {
            prop::sample::select(OrderStatus::ALL.to_vec())
        }

        fn lines() -> impl Strategy<Value = Vec<(i64, u32, bool)>> {
            prop::collection::vec((1i64..4, 1u32..20, any::<bool>()), 1..8)
        }

        fn catalog(start: u32) -> BTreeMap<ProductId, StockLevels> {
            (1..4)
                .map(|id| {
                    let variants: VariantStock = [("red".to_string(), start)].into_iter().collect();
                    (ProductId::new(id), StockLevels::scalar(start).with_variants(variants))
                })
                .collect()
        }

        fn items(lines_in: &[(i64, u32, bool)]) -> Vec<OrderItem> {
            lines_in
                .iter()
                .map(|(id, qty, red)| line(*id, *qty, red.then_some("red")))
                .collect()
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: decrementing never produces a value below zero, and clamps exactly.
            #[test]
            fn decrement_floors_at_zero(start in 0u32..30, lines_in in lines()) {
                let mut stock = catalog(start);
                let out = run(Pending, Delivered, &items(&lines_in), &mut stock);
                for record in &out.records {
                    prop_assert!(record.new_quantity <= record.previous_quantity);
                }
                for levels in stock.values() {
                    prop_assert!(levels.scalar.unwrap() <= start);
                }
            }

            /// Property: deliver then cancel is the identity when nothing clamped.
            #[test]
            fn restore_round_trips_without_clamping(lines_in in lines()) {
                let mut stock = catalog(1_000);
                let before = stock.clone();
                let items = items(&lines_in);
                run(Processing, Delivered, &items, &mut stock);
                run(Delivered, Cancelled, &items, &mut stock);
                prop_assert_eq!(stock, before);
            }

            /// Property: transitions that do not cross the fulfilment boundary never move stock.
            #[test]
            fn non_crossing_transitions_do_not_mutate(prev in status(), next in status(), lines_in in lines()) {
                prop_assume!(direction_for(prev, next).is_none());
                let mut stock = catalog(10);
                let before = stock.clone();
                let out = run(prev, next, &items(&lines_in), &mut stock);
                prop_assert!(!out.touched());
                prop_assert_eq!(stock, before);
            }

            /// Property: re-applying the current status is a no-op.
            #[test]
            fn repeated_status_is_idempotent(s in status(), lines_in in lines()) {
                let mut stock = catalog(10);
                let before = stock.clone();
                run(s, s, &items(&lines_in), &mut stock);
                prop_assert_eq!(stock, before);
            }
        }
    }
}
