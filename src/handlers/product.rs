// src/handlers/product.rs
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::instrument;

use crate::dtos::product::{CreateProductRequest, ProductQuery, ProductResponse, UpdateProductRequest};
use crate::error::AppError;
use crate::identifier::Identifier;
use crate::models::product::ProductFilter;
use crate::state::AppState;

// GET /products - List products, optionally filtered
#[instrument(skip(state))]
pub async fn get_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<ProductResponse>>, AppError> {
    let filter = ProductFilter::from(query);
    let products = state.service.list_products(&filter).await?;

    Ok(Json(products.into_iter().map(ProductResponse::from).collect()))
}

// GET /products/{identifier} - Get single product by id or name
#[instrument(skip(state))]
pub async fn get_product(
    Path(identifier): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ProductResponse>, AppError> {
    let product = state
        .service
        .get_product(&Identifier::parse(&identifier))
        .await?;

    Ok(Json(ProductResponse::from(product)))
}

// POST /products - Create new product
#[instrument(skip(state, payload))]
pub async fn create_product(
    State(state): State<AppState>,
    payload: Result<Json<CreateProductRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ProductResponse>), AppError> {
    let Json(payload) = payload?;
    let now = state.clock.now();
    let product = state.service.create_product(&payload, now).await?;

    Ok((StatusCode::CREATED, Json(ProductResponse::from(product))))
}

// PUT /products/{identifier} - Partial update, recording price/stock history
#[instrument(skip(state, payload))]
pub async fn update_product(
    Path(identifier): Path<String>,
    State(state): State<AppState>,
    payload: Result<Json<UpdateProductRequest>, JsonRejection>,
) -> Result<Json<ProductResponse>, AppError> {
    let Json(payload) = payload?;
    let now = state.clock.now();
    let product = state
        .service
        .update_product(&Identifier::parse(&identifier), &payload, now)
        .await?;

    Ok(Json(ProductResponse::from(product)))
}

// DELETE /products/{identifier} - Delete product (by id only)
#[instrument(skip(state))]
pub async fn delete_product(
    Path(identifier): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let Identifier::ById(id) = Identifier::parse(&identifier) else {
        return Err(AppError::not_found("Product not found"));
    };

    state.service.delete_product(id).await?;

    Ok(StatusCode::NO_CONTENT)
}
