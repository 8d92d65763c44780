//! Request builders and a fixed instant shared by service and store tests.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::dtos::product::{CreateProductRequest, UpdateProductRequest};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 1, 12, 0, 0)
        .single()
        .unwrap_or_default()
}

pub fn create_body(body: Value) -> CreateProductRequest {
    serde_json::from_value(body).unwrap_or_default()
}

pub fn update_body(body: Value) -> UpdateProductRequest {
    serde_json::from_value(body).unwrap_or_default()
}
