use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use tracing::{Span, instrument};

use shopfront_core::{Money, OrderId, ProductId, UserId};
use shopfront_sales::{Customer, NewOrder, Order, OrderItem, OrderStats, OrderStatus, StatusUpdate};

use super::{map_sqlx_error, minor_units, non_negative, to_i32, to_i64};
use crate::store::{OrderStore, StatusChange, StoreError};

const ORDER_COLUMNS: &str = r#"
    id, user_id, customer_name, customer_email, customer_phone, customer_address,
    status, payment_status, payment_method, total_amount, delivery_fee, notes,
    is_guest_order, created_at, updated_at
"#;

/// Postgres-backed orders (`orders` + `order_items`).
#[derive(Debug, Clone)]
pub struct PostgresOrderStore {
    pool: Arc<PgPool>,
}

impl PostgresOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

fn parse_column<T: core::str::FromStr>(column: &str, raw: &str) -> Result<T, StoreError> {
    raw.parse()
        .map_err(|_| StoreError::Corrupt(format!("{column} has unknown value '{raw}'")))
}

fn order_from_row(row: &PgRow, items: Vec<OrderItem>) -> Result<Order, StoreError> {
    let get = |e| map_sqlx_error("decode_order", e);
    let status: String = row.try_get("status").map_err(get)?;
    let payment_status: String = row.try_get("payment_status").map_err(get)?;
    let payment_method: String = row.try_get("payment_method").map_err(get)?;
    let total: i64 = row.try_get("total_amount").map_err(get)?;
    let fee: i64 = row.try_get("delivery_fee").map_err(get)?;
    let user_id: Option<i64> = row.try_get("user_id").map_err(get)?;

    Ok(Order {
        id: OrderId::new(row.try_get("id").map_err(get)?),
        customer: Customer {
            name: row.try_get("customer_name").map_err(get)?,
            email: row.try_get("customer_email").map_err(get)?,
            phone: row.try_get("customer_phone").map_err(get)?,
            address: row.try_get("customer_address").map_err(get)?,
        },
        items,
        status: parse_column("status", &status)?,
        payment_status: parse_column("payment_status", &payment_status)?,
        payment_method: parse_column("payment_method", &payment_method)?,
        total_amount: Money::from_minor(minor_units("total_amount", total)?),
        delivery_fee: Money::from_minor(minor_units("delivery_fee", fee)?),
        notes: row.try_get("notes").map_err(get)?,
        user_id: user_id.map(UserId::new),
        is_guest_order: row.try_get("is_guest_order").map_err(get)?,
        created_at: row.try_get("created_at").map_err(get)?,
        updated_at: row.try_get("updated_at").map_err(get)?,
    })
}

fn item_from_row(row: &PgRow) -> Result<OrderItem, StoreError> {
    let get = |e| map_sqlx_error("decode_order_item", e);
    let price: i64 = row.try_get("price").map_err(get)?;
    let quantity: i32 = row.try_get("quantity").map_err(get)?;
    Ok(OrderItem {
        product_id: ProductId::new(row.try_get("product_id").map_err(get)?),
        name: row.try_get("name").map_err(get)?,
        price: Money::from_minor(minor_units("price", price)?),
        quantity: non_negative("quantity", quantity)?,
        color: row.try_get("color").map_err(get)?,
        image: row.try_get("image").map_err(get)?,
    })
}

async fn load_items(conn: &mut PgConnection, order_ids: &[i64]) -> Result<BTreeMap<i64, Vec<OrderItem>>, StoreError> {
    let rows = sqlx::query(
        r#"
        SELECT order_id, product_id, name, price, quantity, color, image
        FROM order_items
        WHERE order_id = ANY($1)
        ORDER BY order_id, position
        "#,
    )
    .bind(order_ids)
    .fetch_all(conn)
    .await
    .map_err(|e| map_sqlx_error("load_order_items", e))?;

    let mut by_order: BTreeMap<i64, Vec<OrderItem>> = BTreeMap::new();
    for row in &rows {
        let order_id: i64 = row
            .try_get("order_id")
            .map_err(|e| map_sqlx_error("decode_order_item", e))?;
        by_order.entry(order_id).or_default().push(item_from_row(row)?);
    }
    Ok(by_order)
}

async fn insert_order(conn: &mut PgConnection, input: &NewOrder, now: DateTime<Utc>) -> Result<Order, StoreError> {
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO orders (
            user_id, customer_name, customer_email, customer_phone, customer_address,
            status, payment_status, payment_method, total_amount, delivery_fee, notes,
            is_guest_order, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, 'pending', 'pending', $6, $7, $8, $9, $10, $11, $11)
        RETURNING {ORDER_COLUMNS}
        "#
    ))
    .bind(input.user_id.map(UserId::get))
    .bind(input.customer.name.trim())
    .bind(input.customer.email.trim())
    .bind(&input.customer.phone)
    .bind(&input.customer.address)
    .bind(input.payment_method.as_str())
    .bind(to_i64(input.total().minor()))
    .bind(to_i64(input.delivery_fee.minor()))
    .bind(&input.notes)
    .bind(input.is_guest_order)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("insert_order", e))?;

    let order_id: i64 = row.try_get("id").map_err(|e| map_sqlx_error("insert_order", e))?;

    for (position, item) in input.items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, position, product_id, name, price, quantity, color, image)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(order_id)
        .bind(i32::try_from(position).map_err(|_| StoreError::Conflict("too many order items".into()))?)
        .bind(item.product_id.get())
        .bind(&item.name)
        .bind(to_i64(item.price.minor()))
        .bind(to_i32("quantity", item.quantity)?)
        .bind(&item.color)
        .bind(&item.image)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("insert_order_item", e))?;
    }

    order_from_row(&row, input.items.clone())
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    /// Order row and item rows commit together or not at all.
    #[instrument(skip(self, input), fields(items = input.items.len(), order_id = tracing::field::Empty), err)]
    async fn create(&self, input: &NewOrder, now: DateTime<Utc>) -> Result<Order, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        match insert_order(&mut *tx, input, now).await {
            Ok(order) => {
                tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
                Span::current().record("order_id", order.id.get());
                Ok(order)
            }
            Err(e) => {
                tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
                Err(e)
            }
        }
    }

    #[instrument(skip(self), fields(order_id = %id), err)]
    async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;

        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.get())
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("get_order", e))?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut items = load_items(&mut *conn, &[id.get()]).await?;
        order_from_row(&row, items.remove(&id.get()).unwrap_or_default()).map(Some)
    }

    #[instrument(skip(self), err)]
    async fn list(&self) -> Result<Vec<Order>, StoreError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;

        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("list_orders", e))?;

        let ids = rows
            .iter()
            .map(|r| r.try_get::<i64, _>("id"))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("list_orders", e))?;
        let mut items = load_items(&mut *conn, &ids).await?;

        rows.iter()
            .zip(ids)
            .map(|(row, id)| order_from_row(row, items.remove(&id).unwrap_or_default()))
            .collect()
    }

    /// Lock the order row so concurrent updates observe distinct previous
    /// statuses, validate the transition in the domain, write, commit.
    #[instrument(skip(self, update), fields(order_id = %id, status = ?update.status), err)]
    async fn update_status(
        &self,
        id: OrderId,
        update: &StatusUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<StatusChange>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"))
            .bind(id.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_order", e))?;
        let Some(row) = row else {
            tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
            return Ok(None);
        };

        let mut items = load_items(&mut *tx, &[id.get()]).await?;
        let mut order = order_from_row(&row, items.remove(&id.get()).unwrap_or_default())?;

        let previous = match order.apply(update, now) {
            Ok(previous) => previous,
            Err(e) => {
                tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(e.into());
            }
        };

        sqlx::query("UPDATE orders SET status = $2, payment_status = $3, updated_at = $4 WHERE id = $1")
            .bind(id.get())
            .bind(order.status.as_str())
            .bind(order.payment_status.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("write_status", e))?;

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;

        Ok(Some(StatusChange { order, previous }))
    }

    #[instrument(skip(self), fields(order_id = %id), err)]
    async fn delete(&self, id: OrderId) -> Result<bool, StoreError> {
        // order_items cascade
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_order", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), err)]
    async fn delete_all(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM orders")
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_all_orders", e))?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self), err)]
    async fn stats(&self) -> Result<OrderStats, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT status, COUNT(*) AS orders, COALESCE(SUM(total_amount), 0)::BIGINT AS revenue
            FROM orders
            GROUP BY status
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("order_stats", e))?;

        let mut stats = OrderStats::default();
        for row in &rows {
            let get = |e| map_sqlx_error("order_stats", e);
            let status: String = row.try_get("status").map_err(get)?;
            let count: i64 = row.try_get("orders").map_err(get)?;
            let revenue: i64 = row.try_get("revenue").map_err(get)?;
            stats.add_group(
                parse_column::<OrderStatus>("status", &status)?,
                u64::try_from(count).unwrap_or(0),
                Money::from_minor(minor_units("revenue", revenue)?),
            );
        }
        Ok(stats)
    }
}
