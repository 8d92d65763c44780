//! Persistence seams.
//!
//! Every read and write happens inside a [`UnitOfWork`], which is both the
//! product store and the history recorder for the duration of one request.
//! Nothing a unit of work does is visible to others until [`UnitOfWork::commit`];
//! dropping it uncommitted discards everything.

pub mod memory;
pub mod postgres;
pub mod schema;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::error::{DatabaseError, ErrorKind};
use thiserror::Error;

use crate::models::history::{PriceChange, PriceHistory, StockChange, StockHistory};
use crate::models::product::{NewProduct, Product, ProductFilter, ProductPatch};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("product name already taken")]
    DuplicateName,

    #[error("referenced product does not exist")]
    MissingProduct,

    #[error("storage error")]
    Sql(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        match error.as_database_error().map(DatabaseError::kind) {
            Some(ErrorKind::UniqueViolation) => Self::DuplicateName,
            Some(ErrorKind::ForeignKeyViolation) => Self::MissingProduct,
            _ => Self::Sql(error),
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync + std::fmt::Debug {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;
}

#[async_trait]
pub trait ProductStore: Send {
    /// Products matching every predicate of `filter`, ascending by id.
    async fn list_products(&mut self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError>;

    async fn find_by_id(&mut self, id: i64) -> Result<Option<Product>, StoreError>;

    /// Exact, case-insensitive name match.
    async fn find_by_name(&mut self, name: &str) -> Result<Option<Product>, StoreError>;

    /// Reads the product and holds it against concurrent writers until the
    /// unit of work ends.
    async fn lock_by_id(&mut self, id: i64) -> Result<Option<Product>, StoreError>;

    /// Whether another product (other than `except`) already uses `name`,
    /// compared case-insensitively.
    async fn name_taken(&mut self, name: &str, except: Option<i64>) -> Result<bool, StoreError>;

    async fn insert_product(
        &mut self,
        product: &NewProduct,
        now: DateTime<Utc>,
    ) -> Result<Product, StoreError>;

    /// Writes the supplied fields and refreshes `updated_at`. Returns `false`
    /// when no such product exists.
    async fn update_product(
        &mut self,
        id: i64,
        patch: &ProductPatch,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Removes the product together with its history. Returns `false` when no
    /// such product exists.
    async fn delete_product(&mut self, id: i64) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait HistoryRecorder: Send {
    async fn record_price_change(&mut self, change: &PriceChange)
        -> Result<PriceHistory, StoreError>;

    async fn record_stock_change(&mut self, change: &StockChange)
        -> Result<StockHistory, StoreError>;

    /// Most recent first.
    async fn list_price_history(&mut self, product_id: i64)
        -> Result<Vec<PriceHistory>, StoreError>;

    /// Most recent first.
    async fn list_stock_history(&mut self, product_id: i64)
        -> Result<Vec<StockHistory>, StoreError>;
}

#[async_trait]
pub trait UnitOfWork: ProductStore + HistoryRecorder {
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
