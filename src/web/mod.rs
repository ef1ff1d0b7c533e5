//! Read service over the reconciled postal codes.

pub mod error;
pub mod handlers;
pub mod repository;
pub mod state;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

pub use error::{AppError, AppResult, NOT_FOUND_MESSAGE};
pub use repository::{PostalCodeRepository, Resolution, StoreRepository, resolve};
pub use state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::healthcheck))
        .route("/codigos_postais", get(handlers::list_postal_codes))
        .route("/codigos_postais/:code", get(handlers::get_postal_code))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
