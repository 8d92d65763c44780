use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct PriceHistory {
    pub id: i64,
    pub product_id: i64,
    pub old_price: f64,
    pub new_price: f64,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct StockHistory {
    pub id: i64,
    pub product_id: i64,
    pub old_quantity: i32,
    pub new_quantity: i32,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceChange {
    pub product_id: i64,
    pub old_price: f64,
    pub new_price: f64,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StockChange {
    pub product_id: i64,
    pub old_quantity: i32,
    pub new_quantity: i32,
    pub changed_at: DateTime<Utc>,
}
