//! Product service.
//!
//! Owns the write path: every update that moves a product's price or stock
//! quantity records the transition in the matching history table within the
//! same unit of work as the product write itself.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::dtos::product::{CreateProductRequest, UpdateProductRequest};
use crate::identifier::Identifier;
use crate::models::history::{PriceChange, PriceHistory, StockChange, StockHistory};
use crate::models::product::{Product, ProductFilter, ProductPatch};
use crate::store::{HistoryRecorder, ProductStore, Store, StoreError, UnitOfWork};
use crate::validation::{self, Violations};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(Violations),

    #[error("product not found")]
    NotFound,

    #[error(transparent)]
    Storage(StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(error: StoreError) -> Self {
        match error {
            // lost a race against a concurrent insert; same answer as the pre-check
            StoreError::DuplicateName => Self::Validation(Violations::name_taken()),
            StoreError::MissingProduct => Self::NotFound,
            other => Self::Storage(other),
        }
    }
}

/// History rows an update will produce: one per supplied field whose value
/// numerically differs from the persisted one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldChanges {
    pub price: Option<PriceChange>,
    pub stock: Option<StockChange>,
}

impl FieldChanges {
    pub fn between(current: &Product, patch: &ProductPatch, at: DateTime<Utc>) -> Self {
        Self {
            price: patch
                .price
                .filter(|new_price| *new_price != current.price)
                .map(|new_price| PriceChange {
                    product_id: current.id,
                    old_price: current.price,
                    new_price,
                    changed_at: at,
                }),
            stock: patch
                .stock_quantity
                .filter(|new_quantity| *new_quantity != current.stock_quantity)
                .map(|new_quantity| StockChange {
                    product_id: current.id,
                    old_quantity: current.stock_quantity,
                    new_quantity,
                    changed_at: at,
                }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.price.is_none() && self.stock.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct ProductService {
    store: Arc<dyn Store>,
}

impl ProductService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, ServiceError> {
        let mut uow = self.store.begin().await?;
        let products = uow.list_products(filter).await?;
        uow.commit().await?;
        Ok(products)
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, identifier: &Identifier) -> Result<Product, ServiceError> {
        let mut uow = self.store.begin().await?;
        let product = resolve(uow.as_mut(), identifier).await?;
        uow.commit().await?;
        Ok(product)
    }

    /// New products start without history.
    #[instrument(skip(self, request))]
    pub async fn create_product(
        &self,
        request: &CreateProductRequest,
        now: DateTime<Utc>,
    ) -> Result<Product, ServiceError> {
        let product = validation::validate_new_product(request).map_err(rejected)?;

        let mut uow = self.store.begin().await?;
        if uow.name_taken(&product.name, None).await? {
            return Err(rejected(Violations::name_taken()));
        }
        let created = uow.insert_product(&product, now).await?;
        uow.commit().await?;

        info!(id = created.id, name = %created.name, "product created");
        Ok(created)
    }

    /// Applies a partial update and records price/stock transitions.
    ///
    /// The target row is locked before its current values are read, so the
    /// "old" side of every history row is the value this update replaced.
    /// Any failure drops the unit of work and nothing is written.
    #[instrument(skip(self, request))]
    pub async fn update_product(
        &self,
        identifier: &Identifier,
        request: &UpdateProductRequest,
        now: DateTime<Utc>,
    ) -> Result<Product, ServiceError> {
        let mut uow = self.store.begin().await?;

        let target = resolve(uow.as_mut(), identifier).await?;
        let current = uow
            .lock_by_id(target.id)
            .await?
            .ok_or(ServiceError::NotFound)?;

        let patch = validation::validate_product_patch(request).map_err(rejected)?;
        if let Some(name) = &patch.name {
            if uow.name_taken(name, Some(current.id)).await? {
                return Err(rejected(Violations::name_taken()));
            }
        }

        let changes = FieldChanges::between(&current, &patch, now);
        if changes.is_empty() {
            debug!(id = current.id, "no price or stock change to record");
        }
        if let Some(change) = &changes.price {
            uow.record_price_change(change).await?;
            info!(
                id = current.id,
                old_price = change.old_price,
                new_price = change.new_price,
                "price changed"
            );
        }
        if let Some(change) = &changes.stock {
            uow.record_stock_change(change).await?;
            info!(
                id = current.id,
                old_quantity = change.old_quantity,
                new_quantity = change.new_quantity,
                "stock changed"
            );
        }

        if !patch.is_empty() && !uow.update_product(current.id, &patch, now).await? {
            return Err(ServiceError::NotFound);
        }

        let updated = uow
            .find_by_id(current.id)
            .await?
            .ok_or(ServiceError::NotFound)?;
        uow.commit().await?;

        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: i64) -> Result<(), ServiceError> {
        let mut uow = self.store.begin().await?;
        if !uow.delete_product(id).await? {
            return Err(ServiceError::NotFound);
        }
        uow.commit().await?;

        info!(id, "product deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_price_history(
        &self,
        identifier: &Identifier,
    ) -> Result<Vec<PriceHistory>, ServiceError> {
        let mut uow = self.store.begin().await?;
        let product = resolve(uow.as_mut(), identifier).await?;
        let rows = uow.list_price_history(product.id).await?;
        uow.commit().await?;
        Ok(rows)
    }

    #[instrument(skip(self))]
    pub async fn get_stock_history(
        &self,
        identifier: &Identifier,
    ) -> Result<Vec<StockHistory>, ServiceError> {
        let mut uow = self.store.begin().await?;
        let product = resolve(uow.as_mut(), identifier).await?;
        let rows = uow.list_stock_history(product.id).await?;
        uow.commit().await?;
        Ok(rows)
    }
}

async fn resolve(uow: &mut dyn UnitOfWork, identifier: &Identifier) -> Result<Product, ServiceError> {
    let product = match identifier {
        Identifier::ById(id) => uow.find_by_id(*id).await?,
        Identifier::ByName(name) => uow.find_by_name(name).await?,
    };
    product.ok_or(ServiceError::NotFound)
}

fn rejected(violations: Violations) -> ServiceError {
    debug!(%violations, "rejected product input");
    ServiceError::Validation(violations)
}
