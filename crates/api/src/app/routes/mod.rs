use axum::Router;

pub mod auth;
pub mod cart;
pub mod orders;
pub mod products;
pub mod system;

/// Router for every resource endpoint. Each handler decides whether it needs
/// a principal; the auth middleware only resolves one.
pub fn router(upload_body_limit: usize) -> Router {
    Router::new()
        .nest("/products", products::router(upload_body_limit))
        .nest("/orders", orders::router())
        .nest("/cart", cart::router())
        .nest("/auth", auth::router())
}
