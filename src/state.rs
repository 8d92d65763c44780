use std::sync::Arc;

use crate::clock::Clock;
use crate::services::ProductService;
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct AppState {
    pub service: ProductService,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self {
            service: ProductService::new(store),
            clock,
        }
    }
}
