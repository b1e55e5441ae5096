use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::instrument;

use shopfront_core::{ProductId, UserId};
use shopfront_sales::CartLine;

use super::{map_sqlx_error, non_negative, to_i32};
use crate::store::{CartStore, StoreError};

/// Cart lines keyed by `(user_id, product_id)`.
#[derive(Debug, Clone)]
pub struct PostgresCartStore {
    pool: Arc<PgPool>,
}

impl PostgresCartStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

fn line_from_row(row: &PgRow) -> Result<CartLine, StoreError> {
    let get = |e| map_sqlx_error("decode_cart_line", e);
    let quantity: i32 = row.try_get("quantity").map_err(get)?;
    Ok(CartLine {
        product_id: ProductId::new(row.try_get("product_id").map_err(get)?),
        quantity: non_negative("quantity", quantity)?,
    })
}

#[async_trait]
impl CartStore for PostgresCartStore {
    #[instrument(skip(self), fields(user_id = %user), err)]
    async fn lines(&self, user: UserId) -> Result<Vec<CartLine>, StoreError> {
        let rows = sqlx::query(
            "SELECT product_id, quantity FROM cart_items WHERE user_id = $1 ORDER BY created_at, product_id",
        )
        .bind(user.get())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("cart_lines", e))?;
        rows.iter().map(line_from_row).collect()
    }

    #[instrument(skip(self), fields(user_id = %user, product_id = %product), err)]
    async fn add(&self, user: UserId, product: ProductId, quantity: u32) -> Result<CartLine, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO cart_items (user_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET
                quantity = cart_items.quantity + EXCLUDED.quantity,
                updated_at = NOW()
            RETURNING product_id, quantity
            "#,
        )
        .bind(user.get())
        .bind(product.get())
        .bind(to_i32("quantity", quantity)?)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("add_cart_line", e))?;
        line_from_row(&row)
    }

    #[instrument(skip(self), fields(user_id = %user, product_id = %product), err)]
    async fn set_quantity(
        &self,
        user: UserId,
        product: ProductId,
        quantity: u32,
    ) -> Result<Option<CartLine>, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE cart_items SET quantity = $3, updated_at = NOW()
            WHERE user_id = $1 AND product_id = $2
            RETURNING product_id, quantity
            "#,
        )
        .bind(user.get())
        .bind(product.get())
        .bind(to_i32("quantity", quantity)?)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("set_cart_quantity", e))?;
        row.as_ref().map(line_from_row).transpose()
    }

    #[instrument(skip(self), fields(user_id = %user, product_id = %product), err)]
    async fn remove(&self, user: UserId, product: ProductId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(user.get())
            .bind(product.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("remove_cart_line", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(user_id = %user), err)]
    async fn clear(&self, user: UserId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("clear_cart", e))?;
        Ok(result.rows_affected())
    }
}
