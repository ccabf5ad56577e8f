use std::sync::Arc;

use axum::{routing::get, Router};

use crate::AppState;

pub mod auth;
pub mod bookings;
pub mod dashboard;
pub mod health;
pub mod rooms;
pub mod telegram;

/// Everything under `/api` except the Telegram webhook, which gets its own
/// rate limiter in `main`.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/dashboard", get(dashboard::get_dashboard))
        .nest("/bookings", bookings::router())
        .nest("/rooms", rooms::router())
}
