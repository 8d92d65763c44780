pub mod product;

pub use product::{ProductService, ServiceError};
