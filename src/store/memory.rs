//! In-process backend used when no database is configured.
//!
//! A unit of work holds the store's lock for its whole lifetime. Reads go
//! straight to the locked tables; the first write takes a private copy, which
//! commit swaps in. Units of work are therefore fully serialized, and
//! read-only ones never copy anything.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{HistoryRecorder, ProductStore, Store, StoreError, UnitOfWork};
use crate::models::history::{PriceChange, PriceHistory, StockChange, StockHistory};
use crate::models::product::{NewProduct, Product, ProductFilter, ProductPatch};

#[derive(Debug, Clone, Default)]
struct Tables {
    products: BTreeMap<i64, Product>,
    price_history: Vec<PriceHistory>,
    stock_history: Vec<StockHistory>,
    last_product_id: i64,
    last_price_history_id: i64,
    last_stock_history_id: i64,
}

impl Tables {
    fn name_taken(&self, name: &str, except: Option<i64>) -> bool {
        let name = name.to_lowercase();
        self.products
            .values()
            .any(|product| Some(product.id) != except && product.name.to_lowercase() == name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn open(&self) -> MemoryUnitOfWork {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        MemoryUnitOfWork {
            guard,
            staged: None,
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        Ok(Box::new(self.open().await))
    }
}

struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<Tables>,
    /// `None` until the first write.
    staged: Option<Tables>,
}

impl MemoryUnitOfWork {
    fn tables(&self) -> &Tables {
        self.staged.as_ref().unwrap_or(&*self.guard)
    }

    fn tables_mut(&mut self) -> &mut Tables {
        let committed: &Tables = &self.guard;
        self.staged.get_or_insert_with(|| committed.clone())
    }
}

fn newest_first<T>(rows: &mut [T], key: impl Fn(&T) -> (DateTime<Utc>, i64)) {
    rows.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[async_trait]
impl ProductStore for MemoryUnitOfWork {
    async fn list_products(&mut self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError> {
        Ok(self
            .tables()
            .products
            .values()
            .filter(|product| filter.matches(product))
            .cloned()
            .collect())
    }

    async fn find_by_id(&mut self, id: i64) -> Result<Option<Product>, StoreError> {
        Ok(self.tables().products.get(&id).cloned())
    }

    async fn find_by_name(&mut self, name: &str) -> Result<Option<Product>, StoreError> {
        let name = name.to_lowercase();
        Ok(self
            .tables()
            .products
            .values()
            .find(|product| product.name.to_lowercase() == name)
            .cloned())
    }

    async fn lock_by_id(&mut self, id: i64) -> Result<Option<Product>, StoreError> {
        // the whole store is already held by this unit of work
        self.find_by_id(id).await
    }

    async fn name_taken(&mut self, name: &str, except: Option<i64>) -> Result<bool, StoreError> {
        Ok(self.tables().name_taken(name, except))
    }

    async fn insert_product(
        &mut self,
        product: &NewProduct,
        now: DateTime<Utc>,
    ) -> Result<Product, StoreError> {
        if self.tables().name_taken(&product.name, None) {
            return Err(StoreError::DuplicateName);
        }

        let tables = self.tables_mut();
        tables.last_product_id += 1;
        let created = Product {
            id: tables.last_product_id,
            name: product.name.clone(),
            price: product.price,
            stock_quantity: product.stock_quantity,
            created_at: now,
            updated_at: now,
        };
        tables.products.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_product(
        &mut self,
        id: i64,
        patch: &ProductPatch,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        if let Some(name) = &patch.name {
            if self.tables().name_taken(name, Some(id)) {
                return Err(StoreError::DuplicateName);
            }
        }
        if !self.tables().products.contains_key(&id) {
            return Ok(false);
        }

        let Some(product) = self.tables_mut().products.get_mut(&id) else {
            return Ok(false);
        };
        if let Some(name) = &patch.name {
            product.name.clone_from(name);
        }
        if let Some(price) = patch.price {
            product.price = price;
        }
        if let Some(stock_quantity) = patch.stock_quantity {
            product.stock_quantity = stock_quantity;
        }
        product.updated_at = now;
        Ok(true)
    }

    async fn delete_product(&mut self, id: i64) -> Result<bool, StoreError> {
        if !self.tables().products.contains_key(&id) {
            return Ok(false);
        }

        let tables = self.tables_mut();
        tables.products.remove(&id);
        tables.price_history.retain(|row| row.product_id != id);
        tables.stock_history.retain(|row| row.product_id != id);
        Ok(true)
    }
}

#[async_trait]
impl HistoryRecorder for MemoryUnitOfWork {
    async fn record_price_change(
        &mut self,
        change: &PriceChange,
    ) -> Result<PriceHistory, StoreError> {
        if !self.tables().products.contains_key(&change.product_id) {
            return Err(StoreError::MissingProduct);
        }

        let tables = self.tables_mut();
        tables.last_price_history_id += 1;
        let row = PriceHistory {
            id: tables.last_price_history_id,
            product_id: change.product_id,
            old_price: change.old_price,
            new_price: change.new_price,
            changed_at: change.changed_at,
        };
        tables.price_history.push(row.clone());
        Ok(row)
    }

    async fn record_stock_change(
        &mut self,
        change: &StockChange,
    ) -> Result<StockHistory, StoreError> {
        if !self.tables().products.contains_key(&change.product_id) {
            return Err(StoreError::MissingProduct);
        }

        let tables = self.tables_mut();
        tables.last_stock_history_id += 1;
        let row = StockHistory {
            id: tables.last_stock_history_id,
            product_id: change.product_id,
            old_quantity: change.old_quantity,
            new_quantity: change.new_quantity,
            changed_at: change.changed_at,
        };
        tables.stock_history.push(row.clone());
        Ok(row)
    }

    async fn list_price_history(
        &mut self,
        product_id: i64,
    ) -> Result<Vec<PriceHistory>, StoreError> {
        let mut rows: Vec<PriceHistory> = self
            .tables()
            .price_history
            .iter()
            .filter(|row| row.product_id == product_id)
            .cloned()
            .collect();
        newest_first(&mut rows, |row| (row.changed_at, row.id));
        Ok(rows)
    }

    async fn list_stock_history(
        &mut self,
        product_id: i64,
    ) -> Result<Vec<StockHistory>, StoreError> {
        let mut rows: Vec<StockHistory> = self
            .tables()
            .stock_history
            .iter()
            .filter(|row| row.product_id == product_id)
            .cloned()
            .collect();
        newest_first(&mut rows, |row| (row.changed_at, row.id));
        Ok(rows)
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryUnitOfWork { mut guard, staged } = *self;
        if let Some(staged) = staged {
            *guard = staged;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testresult::TestResult;

    fn apple() -> NewProduct {
        NewProduct {
            name: "Apple".to_string(),
            price: 10.5,
            stock_quantity: 100,
        }
    }

    #[tokio::test]
    async fn committed_writes_are_visible_to_later_units() -> TestResult {
        let store = MemoryStore::new();

        let mut uow = store.begin().await?;
        let created = uow.insert_product(&apple(), Utc::now()).await?;
        uow.commit().await?;

        let mut uow = store.begin().await?;
        assert_eq!(uow.find_by_id(created.id).await?, Some(created));

        Ok(())
    }

    #[tokio::test]
    async fn dropped_unit_discards_its_writes() -> TestResult {
        let store = MemoryStore::new();

        let mut uow = store.begin().await?;
        uow.insert_product(&apple(), Utc::now()).await?;
        drop(uow);

        let mut uow = store.begin().await?;
        assert!(uow.list_products(&ProductFilter::default()).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected_case_insensitively() -> TestResult {
        let store = MemoryStore::new();
        let mut uow = store.begin().await?;
        uow.insert_product(&apple(), Utc::now()).await?;

        let mut shouting = apple();
        shouting.name = "APPLE".to_string();
        let result = uow.insert_product(&shouting, Utc::now()).await;

        assert!(
            matches!(result, Err(StoreError::DuplicateName)),
            "expected DuplicateName, got {result:?}"
        );
        assert!(uow.find_by_name("aPpLe").await?.is_some());

        Ok(())
    }

    #[tokio::test]
    async fn history_needs_an_existing_product() -> TestResult {
        let store = MemoryStore::new();
        let mut uow = store.begin().await?;

        let result = uow
            .record_stock_change(&StockChange {
                product_id: 99,
                old_quantity: 1,
                new_quantity: 2,
                changed_at: Utc::now(),
            })
            .await;

        assert!(
            matches!(result, Err(StoreError::MissingProduct)),
            "expected MissingProduct, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn delete_cascades_to_history() -> TestResult {
        let store = MemoryStore::new();
        let mut uow = store.begin().await?;
        let product = uow.insert_product(&apple(), Utc::now()).await?;
        uow.record_price_change(&PriceChange {
            product_id: product.id,
            old_price: 10.5,
            new_price: 12.0,
            changed_at: Utc::now(),
        })
        .await?;

        assert!(uow.delete_product(product.id).await?);
        assert!(uow.list_price_history(product.id).await?.is_empty());
        assert!(!uow.delete_product(product.id).await?);

        Ok(())
    }

    #[tokio::test]
    async fn reads_work_on_the_committed_tables_until_the_first_write() -> TestResult {
        let store = MemoryStore::new();
        let mut uow = store.begin().await?;
        let product = uow.insert_product(&apple(), Utc::now()).await?;
        uow.commit().await?;

        let mut uow = store.open().await;
        assert_eq!(uow.find_by_id(product.id).await?, Some(product.clone()));
        assert_eq!(uow.list_products(&ProductFilter::default()).await?.len(), 1);
        assert!(uow.name_taken("apple", None).await?);
        assert!(uow.list_stock_history(product.id).await?.is_empty());
        assert!(!uow.delete_product(product.id + 1).await?);
        assert!(uow.staged.is_none());

        let patch = ProductPatch {
            stock_quantity: Some(1),
            ..ProductPatch::default()
        };
        assert!(uow.update_product(product.id, &patch, Utc::now()).await?);
        assert!(uow.staged.is_some());
        assert_eq!(
            uow.find_by_id(product.id).await?.map(|p| p.stock_quantity),
            Some(1)
        );
        drop(uow);

        let mut uow = store.begin().await?;
        assert_eq!(uow.find_by_id(product.id).await?, Some(product));
        uow.commit().await?;

        Ok(())
    }
}
