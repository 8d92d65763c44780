use axum::{
    extract::{Path, State},
    Json,
};
use tracing::instrument;

use crate::dtos::history::{PriceHistoryResponse, StockHistoryResponse};
use crate::error::AppError;
use crate::identifier::Identifier;
use crate::state::AppState;

// GET /products/{identifier}/price-history - newest first
#[instrument(skip(state))]
pub async fn get_price_history(
    Path(identifier): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<PriceHistoryResponse>>, AppError> {
    let rows = state
        .service
        .get_price_history(&Identifier::parse(&identifier))
        .await?;

    Ok(Json(rows.into_iter().map(PriceHistoryResponse::from).collect()))
}

// GET /products/{identifier}/stock-history - newest first
#[instrument(skip(state))]
pub async fn get_stock_history(
    Path(identifier): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<StockHistoryResponse>>, AppError> {
    let rows = state
        .service
        .get_stock_history(&Identifier::parse(&identifier))
        .await?;

    Ok(Json(rows.into_iter().map(StockHistoryResponse::from).collect()))
}
