//! In-memory stores (dev/test).
//!
//! Each store guards its table with a `tokio::sync::Mutex`, which serialises
//! per-order status updates and per-product stock writes the same way row locks
//! do in Postgres.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use shopfront_core::{OrderId, ProductId, UserId};
use shopfront_inventory::StockMovement;
use shopfront_products::{NewProduct, Product, ProductPatch};
use shopfront_sales::{CartLine, NewOrder, Order, OrderStats, StatusUpdate};

use super::{
    CartStore, NewUser, OrderStore, Page, PageRequest, ProductStore, StatusChange, StockAdjustment,
    StoreError, UserRecord, UserStore, to_i32,
};

#[derive(Debug)]
struct Table<K, V> {
    next_id: i64,
    rows: BTreeMap<K, V>,
}

impl<K: Ord, V> Default for Table<K, V> {
    fn default() -> Self {
        Self {
            next_id: 1,
            rows: BTreeMap::new(),
        }
    }
}

impl<K: Ord, V> Table<K, V> {
    fn allocate(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

#[derive(Debug, Default)]
pub struct InMemoryProductStore {
    inner: Mutex<Table<ProductId, Product>>,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn create(&self, input: &NewProduct, sku: &str, now: DateTime<Utc>) -> Result<Product, StoreError> {
        let mut table = self.inner.lock().await;
        if table.rows.values().any(|p| p.sku == sku) {
            return Err(StoreError::Conflict(format!("sku '{sku}' already exists")));
        }
        let id = ProductId::new(table.allocate());
        let product = Product::create(id, input, sku.to_string(), now);
        table.rows.insert(id, product.clone());
        Ok(product)
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.inner.lock().await.rows.get(&id).cloned())
    }

    async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        let table = self.inner.lock().await;
        Ok(ids.iter().filter_map(|id| table.rows.get(id).cloned()).collect())
    }

    async fn list_active(&self, page: PageRequest) -> Result<Page<Product>, StoreError> {
        let table = self.inner.lock().await;
        let active: Vec<&Product> = table.rows.values().rev().filter(|p| p.is_active).collect();
        let total = active.len() as u64;
        let items = active
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .cloned()
            .collect();
        Ok(Page { items, total })
    }

    async fn featured(&self, limit: u32) -> Result<Vec<Product>, StoreError> {
        let table = self.inner.lock().await;
        Ok(table
            .rows
            .values()
            .rev()
            .filter(|p| p.is_active && p.is_featured)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn update(&self, id: ProductId, patch: &ProductPatch, now: DateTime<Utc>) -> Result<Product, StoreError> {
        let mut table = self.inner.lock().await;
        if let Some(sku) = &patch.sku {
            if table.rows.values().any(|p| p.id != id && &p.sku == sku) {
                return Err(StoreError::Conflict(format!("sku '{sku}' already exists")));
            }
        }
        let product = table
            .rows
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("product {id}")))?;
        patch.apply_to(product, now);
        Ok(product.clone())
    }

    async fn deactivate(&self, id: ProductId, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut table = self.inner.lock().await;
        match table.rows.get_mut(&id) {
            Some(p) if p.is_active => {
                p.is_active = false;
                p.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn deactivate_all(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut table = self.inner.lock().await;
        let mut count = 0;
        for p in table.rows.values_mut().filter(|p| p.is_active) {
            p.is_active = false;
            p.updated_at = now;
            count += 1;
        }
        Ok(count)
    }

    async fn adjust_stock(
        &self,
        id: ProductId,
        movement: &StockMovement,
        now: DateTime<Utc>,
    ) -> Result<StockAdjustment, StoreError> {
        let mut table = self.inner.lock().await;
        let Some(product) = table.rows.get_mut(&id) else {
            return Ok(StockAdjustment::Missing);
        };
        let mut levels = product.stock.clone();
        let change = movement.apply(&mut levels);
        if let Some(change) = change.as_ref().filter(|c| c.changed()) {
            to_i32("stock", change.new)?;
            product.stock = levels;
            product.updated_at = now;
        }
        Ok(StockAdjustment::Adjusted {
            name: product.name.clone(),
            change,
            variant_issue: None,
            total: product.stock.total(),
        })
    }
}

#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    inner: Mutex<Table<OrderId, Order>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(&self, input: &NewOrder, now: DateTime<Utc>) -> Result<Order, StoreError> {
        let mut table = self.inner.lock().await;
        let id = OrderId::new(table.allocate());
        let order = Order::place(id, input.clone(), now);
        table.rows.insert(id, order.clone());
        Ok(order)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.inner.lock().await.rows.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Order>, StoreError> {
        Ok(self.inner.lock().await.rows.values().rev().cloned().collect())
    }

    async fn update_status(
        &self,
        id: OrderId,
        update: &StatusUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<StatusChange>, StoreError> {
        let mut table = self.inner.lock().await;
        let Some(order) = table.rows.get_mut(&id) else {
            return Ok(None);
        };
        let previous = order.apply(update, now)?;
        Ok(Some(StatusChange {
            order: order.clone(),
            previous,
        }))
    }

    async fn delete(&self, id: OrderId) -> Result<bool, StoreError> {
        Ok(self.inner.lock().await.rows.remove(&id).is_some())
    }

    async fn delete_all(&self) -> Result<u64, StoreError> {
        let mut table = self.inner.lock().await;
        let count = table.rows.len() as u64;
        table.rows.clear();
        Ok(count)
    }

    async fn stats(&self) -> Result<OrderStats, StoreError> {
        Ok(OrderStats::from_orders(self.inner.lock().await.rows.values()))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    inner: Mutex<Table<UserId, UserRecord>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let table = self.inner.lock().await;
        Ok(table.rows.values().find(|u| u.email == email).cloned())
    }

    async fn get(&self, id: UserId) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.inner.lock().await.rows.get(&id).cloned())
    }

    async fn create(&self, user: NewUser, now: DateTime<Utc>) -> Result<UserRecord, StoreError> {
        let mut table = self.inner.lock().await;
        if table.rows.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!("email '{}' already registered", user.email)));
        }
        let id = UserId::new(table.allocate());
        let record = UserRecord {
            id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            is_active: true,
            created_at: now,
        };
        table.rows.insert(id, record.clone());
        Ok(record)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCartStore {
    inner: Mutex<BTreeMap<UserId, Vec<CartLine>>>,
}

impl InMemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn lines(&self, user: UserId) -> Result<Vec<CartLine>, StoreError> {
        Ok(self.inner.lock().await.get(&user).cloned().unwrap_or_default())
    }

    async fn add(&self, user: UserId, product: ProductId, quantity: u32) -> Result<CartLine, StoreError> {
        let mut carts = self.inner.lock().await;
        let lines = carts.entry(user).or_default();
        if let Some(line) = lines.iter_mut().find(|l| l.product_id == product) {
            let total = line.quantity.saturating_add(quantity);
            to_i32("quantity", total)?;
            line.quantity = total;
            return Ok(*line);
        }
        let line = CartLine {
            product_id: product,
            quantity,
        };
        lines.push(line);
        Ok(line)
    }

    async fn set_quantity(
        &self,
        user: UserId,
        product: ProductId,
        quantity: u32,
    ) -> Result<Option<CartLine>, StoreError> {
        let mut carts = self.inner.lock().await;
        let line = carts
            .get_mut(&user)
            .and_then(|lines| lines.iter_mut().find(|l| l.product_id == product));
        Ok(line.map(|l| {
            l.quantity = quantity;
            *l
        }))
    }

    async fn remove(&self, user: UserId, product: ProductId) -> Result<bool, StoreError> {
        let mut carts = self.inner.lock().await;
        let Some(lines) = carts.get_mut(&user) else {
            return Ok(false);
        };
        let before = lines.len();
        lines.retain(|l| l.product_id != product);
        Ok(lines.len() != before)
    }

    async fn clear(&self, user: UserId) -> Result<u64, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .remove(&user)
            .map(|lines| lines.len() as u64)
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopfront_core::Money;
    use shopfront_inventory::Direction;
    use shopfront_products::StockLevels;

    fn lamp() -> NewProduct {
        NewProduct {
            name: "Lamp".into(),
            description: "Warm".into(),
            price: Money::from_minor(1_000),
            stock: Some(5),
            ..NewProduct::default()
        }
    }

    #[tokio::test]
    async fn duplicate_sku_conflicts() {
        let store = InMemoryProductStore::new();
        store.create(&lamp(), "SKU-1", Utc::now()).await.unwrap();
        let err = store.create(&lamp(), "SKU-1", Utc::now()).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn list_active_pages_newest_first_and_skips_inactive() {
        let store = InMemoryProductStore::new();
        for i in 0..5 {
            store.create(&lamp(), &format!("SKU-{i}"), Utc::now()).await.unwrap();
        }
        store.deactivate(ProductId::new(5), Utc::now()).await.unwrap();

        let page = store.list_active(PageRequest::new(Some(1), Some(2))).await.unwrap();
        assert_eq!(page.total, 4);
        let ids: Vec<i64> = page.items.iter().map(|p| p.id.get()).collect();
        assert_eq!(ids, vec![4, 3]);
    }

    #[tokio::test]
    async fn adjust_stock_reports_missing_and_untracked() {
        let store = InMemoryProductStore::new();
        let mut untracked = lamp();
        untracked.stock = None;
        let p = store.create(&untracked, "SKU-U", Utc::now()).await.unwrap();
        let movement = StockMovement {
            product_id: p.id,
            quantity: 1,
            variant: None,
            direction: Direction::Decrement,
        };

        assert_eq!(
            store.adjust_stock(ProductId::new(99), &movement, Utc::now()).await.unwrap(),
            StockAdjustment::Missing
        );
        match store.adjust_stock(p.id, &movement, Utc::now()).await.unwrap() {
            StockAdjustment::Adjusted { change: None, .. } => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(store.get(p.id).await.unwrap().unwrap().stock, StockLevels::default());
    }

    #[tokio::test]
    async fn restore_past_integer_range_is_refused_and_leaves_stock() {
        let store = InMemoryProductStore::new();
        let mut full = lamp();
        full.stock = Some(shopfront_core::MAX_UNITS - 10);
        let p = store.create(&full, "SKU-F", Utc::now()).await.unwrap();
        let movement = StockMovement {
            product_id: p.id,
            quantity: 1_000,
            variant: None,
            direction: Direction::Restore,
        };

        match store.adjust_stock(p.id, &movement, Utc::now()).await {
            Err(StoreError::Conflict(msg)) if msg.contains("stock") => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(
            store.get(p.id).await.unwrap().unwrap().stock.scalar,
            Some(shopfront_core::MAX_UNITS - 10)
        );
    }

    #[tokio::test]
    async fn cart_accumulation_past_integer_range_is_refused() {
        let carts = InMemoryCartStore::new();
        let user = UserId::new(1);
        carts.add(user, ProductId::new(1), shopfront_core::MAX_UNITS).await.unwrap();
        assert!(matches!(
            carts.add(user, ProductId::new(1), 1).await,
            Err(StoreError::Conflict(_))
        ));
        assert_eq!(carts.lines(user).await.unwrap()[0].quantity, shopfront_core::MAX_UNITS);
    }

    #[tokio::test]
    async fn cart_add_accumulates_and_clear_counts_lines() {
        let carts = InMemoryCartStore::new();
        let user = UserId::new(1);
        carts.add(user, ProductId::new(1), 1).await.unwrap();
        let line = carts.add(user, ProductId::new(1), 2).await.unwrap();
        assert_eq!(line.quantity, 3);
        carts.add(user, ProductId::new(2), 1).await.unwrap();

        assert!(carts.set_quantity(user, ProductId::new(3), 1).await.unwrap().is_none());
        assert_eq!(carts.clear(user).await.unwrap(), 2);
        assert!(carts.lines(user).await.unwrap().is_empty());
    }
}
