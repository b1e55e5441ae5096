use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Row, postgres::PgRow, types::Json};
use tracing::{Span, instrument, warn};

use shopfront_core::{Money, ProductId};
use shopfront_inventory::StockMovement;
use shopfront_products::{NewProduct, Product, ProductPatch, StockBucket, StockLevels, VariantStock};

use super::{map_sqlx_error, minor_units, non_negative, to_i32, to_i64};
use crate::store::{Page, PageRequest, ProductStore, StockAdjustment, StoreError};

const PRODUCT_COLUMNS: &str = r#"
    id, name, description, price, original_price, category, brand, sku,
    weight, length, height, size, color, stock, color_stock, images, tags,
    is_active, is_featured, created_at, updated_at
"#;

/// Postgres-backed product catalog.
#[derive(Debug, Clone)]
pub struct PostgresProductStore {
    pool: Arc<PgPool>,
}

impl PostgresProductStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

/// Decode the stored variant stock leniently: anything malformed is reported
/// and treated as "no variant tracking".
fn decode_variants(id: i64, raw: Option<serde_json::Value>) -> (Option<VariantStock>, Option<String>) {
    match raw {
        None | Some(serde_json::Value::Null) => (None, None),
        Some(value) => match VariantStock::from_json(&value) {
            Ok(variants) => (Some(variants), None),
            Err(reason) => {
                warn!(product_id = id, %reason, "ignoring malformed color_stock");
                (None, Some(reason))
            }
        },
    }
}

fn decode_stock(row: &PgRow, id: i64) -> Result<(StockLevels, Option<String>), StoreError> {
    let scalar = row
        .try_get::<Option<i32>, _>("stock")
        .map_err(|e| map_sqlx_error("decode_product", e))?
        .map(|v| non_negative("stock", v))
        .transpose()?;
    let raw = row
        .try_get::<Option<serde_json::Value>, _>("color_stock")
        .map_err(|e| map_sqlx_error("decode_product", e))?;
    let (variants, issue) = decode_variants(id, raw);
    Ok((StockLevels { scalar, variants }, issue))
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    let get = |e| map_sqlx_error("decode_product", e);
    let id: i64 = row.try_get("id").map_err(get)?;
    let (stock, _issue) = decode_stock(row, id)?;
    let price: i64 = row.try_get("price").map_err(get)?;
    let original_price: Option<i64> = row.try_get("original_price").map_err(get)?;
    let Json(images): Json<Vec<String>> = row.try_get("images").map_err(get)?;
    let Json(tags): Json<Vec<String>> = row.try_get("tags").map_err(get)?;

    Ok(Product {
        id: ProductId::new(id),
        name: row.try_get("name").map_err(get)?,
        description: row.try_get("description").map_err(get)?,
        price: Money::from_minor(minor_units("price", price)?),
        original_price: original_price
            .map(|v| minor_units("original_price", v).map(Money::from_minor))
            .transpose()?,
        category: row.try_get("category").map_err(get)?,
        brand: row.try_get("brand").map_err(get)?,
        sku: row.try_get("sku").map_err(get)?,
        weight: row.try_get("weight").map_err(get)?,
        length: row.try_get("length").map_err(get)?,
        height: row.try_get("height").map_err(get)?,
        size: row.try_get("size").map_err(get)?,
        color: row.try_get("color").map_err(get)?,
        stock,
        images,
        tags,
        is_active: row.try_get("is_active").map_err(get)?,
        is_featured: row.try_get("is_featured").map_err(get)?,
        created_at: row.try_get("created_at").map_err(get)?,
        updated_at: row.try_get("updated_at").map_err(get)?,
    })
}

fn products_from_rows(rows: &[PgRow]) -> Result<Vec<Product>, StoreError> {
    rows.iter().map(product_from_row).collect()
}

fn variants_json(variants: &Option<VariantStock>) -> Option<serde_json::Value> {
    variants.as_ref().map(VariantStock::to_json)
}

#[async_trait]
impl ProductStore for PostgresProductStore {
    #[instrument(skip(self, input), fields(sku = %sku, product_id = tracing::field::Empty), err)]
    async fn create(&self, input: &NewProduct, sku: &str, now: DateTime<Utc>) -> Result<Product, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO products (
                name, description, price, original_price, category, brand, sku,
                weight, length, height, size, color, stock, color_stock, images, tags,
                is_active, is_featured, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, TRUE, $17, $18, $18)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(to_i64(input.price.minor()))
        .bind(input.original_price.map(|m| to_i64(m.minor())))
        .bind(input.category_or_default())
        .bind(&input.brand)
        .bind(sku)
        .bind(input.weight)
        .bind(input.length)
        .bind(input.height)
        .bind(&input.size)
        .bind(&input.color)
        .bind(input.stock.map(|v| to_i32("stock", v)).transpose()?)
        .bind(variants_json(&input.color_stock))
        .bind(Json(&input.images))
        .bind(Json(&input.tags))
        .bind(input.is_featured)
        .bind(now)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_product", e))?;

        let product = product_from_row(&row)?;
        Span::current().record("product_id", product.id.get());
        Ok(product)
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn get(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_product", e))?;
        row.as_ref().map(product_from_row).transpose()
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let raw: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let rows = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)"))
            .bind(&raw)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_products", e))?;
        products_from_rows(&rows)
    }

    #[instrument(skip(self), fields(page = page.page, limit = page.limit), err)]
    async fn list_active(&self, page: PageRequest) -> Result<Page<Product>, StoreError> {
        let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM products WHERE is_active")
            .fetch_one(&*self.pool)
            .await
            .and_then(|row| row.try_get("total"))
            .map_err(|e| map_sqlx_error("count_products", e))?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE is_active
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "#
        ))
        .bind(i64::from(page.limit))
        .bind(to_i64(page.offset()))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_products", e))?;

        Ok(Page {
            items: products_from_rows(&rows)?,
            total: u64::try_from(total).unwrap_or(0),
        })
    }

    #[instrument(skip(self), err)]
    async fn featured(&self, limit: u32) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE is_active AND is_featured
            ORDER BY created_at DESC, id DESC
            LIMIT $1
            "#
        ))
        .bind(i64::from(limit))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("featured_products", e))?;
        products_from_rows(&rows)
    }

    #[instrument(skip(self, patch), fields(product_id = %id), err)]
    async fn update(&self, id: ProductId, patch: &ProductPatch, now: DateTime<Utc>) -> Result<Product, StoreError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE products SET ");
        let mut set = qb.separated(", ");
        if let Some(v) = &patch.name {
            set.push("name = ").push_bind_unseparated(v.trim().to_string());
        }
        if let Some(v) = &patch.description {
            set.push("description = ").push_bind_unseparated(v.clone());
        }
        if let Some(v) = patch.price {
            set.push("price = ").push_bind_unseparated(to_i64(v.minor()));
        }
        if let Some(v) = patch.original_price {
            set.push("original_price = ")
                .push_bind_unseparated(v.map(|m| to_i64(m.minor())));
        }
        if let Some(v) = &patch.category {
            set.push("category = ").push_bind_unseparated(v.clone());
        }
        if let Some(v) = &patch.brand {
            set.push("brand = ").push_bind_unseparated(v.clone());
        }
        if let Some(v) = &patch.sku {
            set.push("sku = ").push_bind_unseparated(v.clone());
        }
        if let Some(v) = patch.weight {
            set.push("weight = ").push_bind_unseparated(v);
        }
        if let Some(v) = patch.length {
            set.push("length = ").push_bind_unseparated(v);
        }
        if let Some(v) = patch.height {
            set.push("height = ").push_bind_unseparated(v);
        }
        if let Some(v) = &patch.size {
            set.push("size = ").push_bind_unseparated(v.clone());
        }
        if let Some(v) = &patch.color {
            set.push("color = ").push_bind_unseparated(v.clone());
        }
        if let Some(v) = patch.stock {
            set.push("stock = ").push_bind_unseparated(v.map(|v| to_i32("stock", v)).transpose()?);
        }
        if let Some(v) = &patch.color_stock {
            set.push("color_stock = ").push_bind_unseparated(variants_json(v));
        }
        if let Some(v) = &patch.images {
            set.push("images = ").push_bind_unseparated(Json(v.clone()));
        }
        if let Some(v) = &patch.tags {
            set.push("tags = ").push_bind_unseparated(Json(v.clone()));
        }
        if let Some(v) = patch.is_active {
            set.push("is_active = ").push_bind_unseparated(v);
        }
        if let Some(v) = patch.is_featured {
            set.push("is_featured = ").push_bind_unseparated(v);
        }
        set.push("updated_at = ").push_bind_unseparated(now);
        qb.push(" WHERE id = ").push_bind(id.get());
        qb.push(format!(" RETURNING {PRODUCT_COLUMNS}"));

        let row = qb
            .build()
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_product", e))?
            .ok_or_else(|| StoreError::NotFound(format!("product {id}")))?;
        product_from_row(&row)
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn deactivate(&self, id: ProductId, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE products SET is_active = FALSE, updated_at = $2 WHERE id = $1 AND is_active")
            .bind(id.get())
            .bind(now)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("deactivate_product", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), err)]
    async fn deactivate_all(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("UPDATE products SET is_active = FALSE, updated_at = $1 WHERE is_active")
            .bind(now)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("deactivate_all_products", e))?;
        Ok(result.rows_affected())
    }

    /// Lock the row, apply the movement in the domain, write back only the
    /// counter that moved, commit.
    #[instrument(
        skip(self, movement),
        fields(product_id = %id, direction = ?movement.direction, quantity = movement.quantity),
        err
    )]
    async fn adjust_stock(
        &self,
        id: ProductId,
        movement: &StockMovement,
        now: DateTime<Utc>,
    ) -> Result<StockAdjustment, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let row = sqlx::query("SELECT id, name, stock, color_stock FROM products WHERE id = $1 FOR UPDATE")
            .bind(id.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_product", e))?;

        let Some(row) = row else {
            tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
            return Ok(StockAdjustment::Missing);
        };

        let name: String = row.try_get("name").map_err(|e| map_sqlx_error("lock_product", e))?;
        let (mut levels, variant_issue) = decode_stock(&row, id.get())?;
        let change = movement.apply(&mut levels);

        if let Some(change) = change.as_ref().filter(|c| c.changed()) {
            // An out-of-range restore returns early; dropping `tx` rolls back.
            let units = to_i32("stock", change.new)?;
            let query = match &change.bucket {
                StockBucket::Scalar => sqlx::query("UPDATE products SET stock = $2, updated_at = $3 WHERE id = $1")
                    .bind(id.get())
                    .bind(units)
                    .bind(now),
                StockBucket::Variant(_) => {
                    sqlx::query("UPDATE products SET color_stock = $2, updated_at = $3 WHERE id = $1")
                        .bind(id.get())
                        .bind(variants_json(&levels.variants))
                        .bind(now)
                }
            };
            query
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("write_stock", e))?;
        }

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;

        Ok(StockAdjustment::Adjusted {
            name,
            change,
            variant_issue,
            total: levels.total(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn malformed_color_stock_decodes_as_untracked_with_reason() {
        for raw in [json!({ "red": -1 }), json!(["red"]), json!("red:3")] {
            match decode_variants(7, Some(raw.clone())) {
                (None, Some(reason)) => assert!(reason.contains("malformed"), "{raw}: {reason}"),
                other => panic!("{raw} decoded as {other:?}"),
            }
        }
    }

    #[test]
    fn absent_or_null_color_stock_is_untracked_without_reason() {
        assert_eq!(decode_variants(7, None), (None, None));
        assert_eq!(decode_variants(7, Some(serde_json::Value::Null)), (None, None));

        let (variants, issue) = decode_variants(7, Some(json!({ "red": 3 })));
        assert_eq!(variants.and_then(|v| v.get("red")), Some(3));
        assert_eq!(issue, None);
    }
}
