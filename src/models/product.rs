use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub stock_quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A validated product ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub name: String,
    pub price: f64,
    pub stock_quantity: i32,
}

/// A validated partial update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub stock_quantity: Option<i32>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.price.is_none() && self.stock_quantity.is_none()
    }
}

/// List predicates; every supplied bound must hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductFilter {
    pub name_contains: Option<String>,
    pub stock_min: Option<i64>,
    pub stock_max: Option<i64>,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(needle) = &self.name_contains {
            if !product.name.to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }
        let stock = i64::from(product.stock_quantity);
        if self.stock_min.is_some_and(|min| stock < min) {
            return false;
        }
        if self.stock_max.is_some_and(|max| stock > max) {
            return false;
        }
        true
    }
}
