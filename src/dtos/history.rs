use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::history::{PriceHistory, StockHistory};

#[derive(Debug, Serialize)]
pub struct PriceHistoryResponse {
    pub id: i64,
    pub product_id: i64,
    pub old_price: f64,
    pub new_price: f64,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct StockHistoryResponse {
    pub id: i64,
    pub product_id: i64,
    pub old_quantity: i32,
    pub new_quantity: i32,
    pub changed_at: DateTime<Utc>,
}

impl From<PriceHistory> for PriceHistoryResponse {
    fn from(row: PriceHistory) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            old_price: row.old_price,
            new_price: row.new_price,
            changed_at: row.changed_at,
        }
    }
}

impl From<StockHistory> for StockHistoryResponse {
    fn from(row: StockHistory) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            old_quantity: row.old_quantity,
            new_quantity: row.new_quantity,
            changed_at: row.changed_at,
        }
    }
}
