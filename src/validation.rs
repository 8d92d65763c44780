//! Field rules applied before anything is written.
//!
//! Both entry points return either the typed, validated value or every
//! violation found, keyed by field name.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::dtos::product::{CreateProductRequest, UpdateProductRequest};
use crate::models::product::{NewProduct, ProductPatch};

pub const NAME_MAX_CHARS: usize = 255;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Violations(BTreeMap<String, Vec<String>>);

impl Violations {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn name_taken() -> Self {
        let mut violations = Self::default();
        violations.add("name", "The name has already been taken.");
        violations
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    fn into_result<T>(self, value: T) -> Result<T, Violations> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for message in self.0.values().flatten() {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(message)?;
            first = false;
        }
        Ok(())
    }
}

pub fn validate_new_product(request: &CreateProductRequest) -> Result<NewProduct, Violations> {
    let mut violations = Violations::default();

    let name = required(&request.name, "name", &mut violations)
        .and_then(|value| check_name(value, &mut violations));
    let price = required(&request.price, "price", &mut violations)
        .and_then(|value| check_price(value, &mut violations));
    let stock_quantity = required(&request.stock_quantity, "stock_quantity", &mut violations)
        .and_then(|value| check_stock_quantity(value, &mut violations));

    match (name, price, stock_quantity) {
        (Some(name), Some(price), Some(stock_quantity)) => violations.into_result(NewProduct {
            name,
            price,
            stock_quantity,
        }),
        _ => Err(violations),
    }
}

/// Only supplied fields are checked and absent fields stay untouched. A field
/// sent as `null` is supplied and fails its type rule.
pub fn validate_product_patch(request: &UpdateProductRequest) -> Result<ProductPatch, Violations> {
    let mut violations = Violations::default();

    let patch = ProductPatch {
        name: request
            .name
            .as_ref()
            .and_then(|value| check_name(value, &mut violations)),
        price: request
            .price
            .as_ref()
            .and_then(|value| check_price(value, &mut violations)),
        stock_quantity: request
            .stock_quantity
            .as_ref()
            .and_then(|value| check_stock_quantity(value, &mut violations)),
    };

    violations.into_result(patch)
}

fn required<'a>(
    value: &'a Option<Value>,
    field: &str,
    violations: &mut Violations,
) -> Option<&'a Value> {
    match value {
        None | Some(Value::Null) => {
            violations.add(field, format!("The {field} field is required."));
            None
        }
        Some(value) => Some(value),
    }
}

fn check_name(value: &Value, violations: &mut Violations) -> Option<String> {
    let Value::String(raw) = value else {
        violations.add("name", "The name field must be a string.");
        return None;
    };

    let name = raw.trim();
    if name.is_empty() {
        violations.add("name", "The name field is required.");
        return None;
    }
    if name.chars().count() > NAME_MAX_CHARS {
        violations.add(
            "name",
            format!("The name field must not be greater than {NAME_MAX_CHARS} characters."),
        );
        return None;
    }

    Some(name.to_string())
}

fn check_price(value: &Value, violations: &mut Violations) -> Option<f64> {
    let price = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|price| price.is_finite());

    let Some(price) = price else {
        violations.add("price", "The price field must be a number.");
        return None;
    };
    if price < 0.0 {
        violations.add("price", "The price field must be at least 0.");
        return None;
    }

    // -0.0 compares equal to 0.0 but would serialize with a sign
    Some(price + 0.0)
}

fn check_stock_quantity(value: &Value, violations: &mut Violations) -> Option<i32> {
    let quantity = match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|float| float.is_finite() && float.fract() == 0.0)
                .filter(|float| float.abs() <= i64::MAX as f64)
                .map(|float| float as i64)
        }),
        Value::String(raw) => raw.trim().parse::<i64>().ok(),
        _ => None,
    };

    let Some(quantity) = quantity else {
        violations.add("stock_quantity", "The stock quantity field must be an integer.");
        return None;
    };
    if quantity < 0 {
        violations.add("stock_quantity", "The stock quantity field must be at least 0.");
        return None;
    }

    match i32::try_from(quantity) {
        Ok(quantity) => Some(quantity),
        Err(_) => {
            violations.add(
                "stock_quantity",
                format!("The stock quantity field must not be greater than {}.", i32::MAX),
            );
            None
        }
    }
}
