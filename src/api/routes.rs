// API route configuration

use crate::api::handlers;
use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Health check (no auth required)
        .route("/health", web::get().to(handlers::health_check))
        // Scraping
        .route("/pop", web::post().to(handlers::pop))
        .route("/read", web::post().to(handlers::read))
        // Catalog listing
        .route("/products", web::get().to(handlers::list_products));
}
