use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder, Transaction};
use tracing::instrument;

use super::schema::{HistoryTable, Table};
use super::{HistoryRecorder, ProductStore, Store, StoreError, UnitOfWork};
use crate::models::history::{PriceChange, PriceHistory, StockChange, StockHistory};
use crate::models::product::{NewProduct, Product, ProductFilter, ProductPatch};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

/// One database transaction. Rolled back on drop unless committed.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

fn product_where(clause: &str) -> String {
    format!("{} {}", Product::select_sql(), clause)
}

/// ILIKE treats `%`, `_` and `\` specially; user input must match literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

async fn list_history<T>(conn: &mut PgConnection, product_id: i64) -> Result<Vec<T>, sqlx::Error>
where
    T: HistoryTable + for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let sql = T::list_for_product_sql();
    sqlx::query_as::<_, T>(&sql)
        .bind(product_id)
        .fetch_all(conn)
        .await
}

#[async_trait]
impl ProductStore for PgUnitOfWork {
    #[instrument(skip(self))]
    async fn list_products(&mut self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new(Product::select_sql());
        builder.push(" WHERE TRUE");

        if let Some(needle) = &filter.name_contains {
            builder
                .push(" AND name ILIKE ")
                .push_bind(format!("%{}%", escape_like(needle)));
        }
        if let Some(min) = filter.stock_min {
            builder.push(" AND stock_quantity >= ").push_bind(min);
        }
        if let Some(max) = filter.stock_max {
            builder.push(" AND stock_quantity <= ").push_bind(max);
        }
        builder.push(" ORDER BY id");

        let products = builder
            .build_query_as::<Product>()
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(products)
    }

    async fn find_by_id(&mut self, id: i64) -> Result<Option<Product>, StoreError> {
        let sql = product_where("WHERE id = $1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(product)
    }

    async fn find_by_name(&mut self, name: &str) -> Result<Option<Product>, StoreError> {
        let sql = product_where("WHERE LOWER(name) = LOWER($1)");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(name)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(product)
    }

    async fn lock_by_id(&mut self, id: i64) -> Result<Option<Product>, StoreError> {
        let sql = product_where("WHERE id = $1 FOR UPDATE");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(product)
    }

    async fn name_taken(&mut self, name: &str, except: Option<i64>) -> Result<bool, StoreError> {
        let sql = format!(
            "SELECT EXISTS (
                SELECT 1 FROM {}
                WHERE LOWER(name) = LOWER($1)
                  AND ($2::BIGINT IS NULL OR id <> $2)
             )",
            Product::NAME
        );
        let taken = sqlx::query_scalar::<_, bool>(&sql)
            .bind(name)
            .bind(except)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(taken)
    }

    #[instrument(skip(self, product), fields(name = %product.name))]
    async fn insert_product(
        &mut self,
        product: &NewProduct,
        now: DateTime<Utc>,
    ) -> Result<Product, StoreError> {
        let sql = format!(
            "INSERT INTO {} (name, price, stock_quantity, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $4) {}",
            Product::NAME,
            Product::returning_sql()
        );
        let created = sqlx::query_as::<_, Product>(&sql)
            .bind(&product.name)
            .bind(product.price)
            .bind(product.stock_quantity)
            .bind(now)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(created)
    }

    #[instrument(skip(self, patch))]
    async fn update_product(
        &mut self,
        id: i64,
        patch: &ProductPatch,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let sql = format!(
            "UPDATE {} SET
             name = COALESCE($1, name),
             price = COALESCE($2, price),
             stock_quantity = COALESCE($3, stock_quantity),
             updated_at = $4
             WHERE id = $5",
            Product::NAME
        );
        let result = sqlx::query(&sql)
            .bind(patch.name.as_deref())
            .bind(patch.price)
            .bind(patch.stock_quantity)
            .bind(now)
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // price_history and stock_history rows go with it (ON DELETE CASCADE)
    #[instrument(skip(self))]
    async fn delete_product(&mut self, id: i64) -> Result<bool, StoreError> {
        let sql = Product::delete_by_id_sql();
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl HistoryRecorder for PgUnitOfWork {
    async fn record_price_change(
        &mut self,
        change: &PriceChange,
    ) -> Result<PriceHistory, StoreError> {
        let sql = format!(
            "INSERT INTO {} (product_id, old_price, new_price, changed_at)
             VALUES ($1, $2, $3, $4) {}",
            PriceHistory::NAME,
            PriceHistory::returning_sql()
        );
        let row = sqlx::query_as::<_, PriceHistory>(&sql)
            .bind(change.product_id)
            .bind(change.old_price)
            .bind(change.new_price)
            .bind(change.changed_at)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn record_stock_change(
        &mut self,
        change: &StockChange,
    ) -> Result<StockHistory, StoreError> {
        let sql = format!(
            "INSERT INTO {} (product_id, old_quantity, new_quantity, changed_at)
             VALUES ($1, $2, $3, $4) {}",
            StockHistory::NAME,
            StockHistory::returning_sql()
        );
        let row = sqlx::query_as::<_, StockHistory>(&sql)
            .bind(change.product_id)
            .bind(change.old_quantity)
            .bind(change.new_quantity)
            .bind(change.changed_at)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn list_price_history(
        &mut self,
        product_id: i64,
    ) -> Result<Vec<PriceHistory>, StoreError> {
        Ok(list_history::<PriceHistory>(&mut *self.tx, product_id).await?)
    }

    async fn list_stock_history(
        &mut self,
        product_id: i64,
    ) -> Result<Vec<StockHistory>, StoreError> {
        Ok(list_history::<StockHistory>(&mut *self.tx, product_id).await?)
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}
