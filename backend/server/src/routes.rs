use crate::handlers;
use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(handlers::health))
        // Model packaging endpoints
        .route("/api/models/import", web::post().to(handlers::import_model))
        .route(
            "/api/models/{id}/export",
            web::get().to(handlers::export_model),
        );
}
