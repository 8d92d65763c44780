// src/dtos/product.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::models::product::{Product, ProductFilter};

// Fields stay untyped until validation so that "not a number" is reported
// as a field violation instead of a body rejection.
#[derive(Debug, Default, Deserialize)]
pub struct CreateProductRequest {
    #[serde(default, deserialize_with = "present")]
    pub name: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub price: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub stock_quantity: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductRequest {
    #[serde(default, deserialize_with = "present")]
    pub name: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub price: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub stock_quantity: Option<Value>,
}

/// A field that is sent as `null` becomes `Some(Value::Null)`; only a missing
/// key is `None`.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// `GET /products` query string. Bounds are kept as text; anything that is
/// not numeric is ignored.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub name: Option<String>,
    pub stock_from: Option<String>,
    pub stock_to: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub stock_quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Convert from Model to Response DTO
impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            name: product.name,
            price: product.price,
            stock_quantity: product.stock_quantity,
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

impl From<ProductQuery> for ProductFilter {
    fn from(query: ProductQuery) -> Self {
        Self {
            name_contains: query
                .name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            stock_min: query.stock_from.as_deref().and_then(parse_bound),
            stock_max: query.stock_to.as_deref().and_then(parse_bound),
        }
    }
}

fn parse_bound(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(value) = raw.parse::<i64>() {
        return Some(value);
    }
    // "10.7" is numeric and bounds by its integer part
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .map(|value| value.trunc() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_maps_to_filter() {
        let filter = ProductFilter::from(ProductQuery {
            name: Some("app".to_string()),
            stock_from: Some("10".to_string()),
            stock_to: Some("100".to_string()),
        });

        assert_eq!(filter.name_contains.as_deref(), Some("app"));
        assert_eq!(filter.stock_min, Some(10));
        assert_eq!(filter.stock_max, Some(100));
    }

    #[test]
    fn non_numeric_and_blank_values_are_ignored() {
        let filter = ProductFilter::from(ProductQuery {
            name: Some("   ".to_string()),
            stock_from: Some("lots".to_string()),
            stock_to: Some(String::new()),
        });

        assert_eq!(filter, ProductFilter::default());
    }

    #[test]
    fn name_filter_is_trimmed() {
        let filter = ProductFilter::from(ProductQuery {
            name: Some("  app ".to_string()),
            ..Default::default()
        });

        assert_eq!(filter.name_contains.as_deref(), Some("app"));
    }

    #[test]
    fn explicit_null_is_kept_apart_from_a_missing_field() {
        let request: UpdateProductRequest =
            serde_json::from_value(serde_json::json!({"price": null, "name": null}))
                .expect("valid body");

        assert_eq!(request.name, Some(Value::Null));
        assert_eq!(request.price, Some(Value::Null));
        assert_eq!(request.stock_quantity, None);
    }

    #[test]
    fn fractional_bounds_truncate() {
        assert_eq!(parse_bound("10.7"), Some(10));
        assert_eq!(parse_bound("NaN"), None);
    }
}
