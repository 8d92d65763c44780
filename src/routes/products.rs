use axum::{routing::get, Router};

use crate::handlers::history::{get_price_history, get_stock_history};
use crate::handlers::product::{
    create_product, delete_product, get_product, get_products, update_product,
};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(get_products).post(create_product))
        .route(
            "/products/{identifier}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/products/{identifier}/price-history", get(get_price_history))
        .route("/products/{identifier}/stock-history", get(get_stock_history))
}
