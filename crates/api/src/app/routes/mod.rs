use axum::Router;

pub mod orders;
pub mod products;
pub mod system;

/// Catalog and kitchen-order endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/products", products::router())
        .nest("/orders", orders::router())
}
