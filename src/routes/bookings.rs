use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::models::{Booking, BookingInput, BookingStatus};
use crate::error::AppResult;
use crate::routes::auth::Operator;
use crate::services::bookings::BookingService;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_bookings).post(create_booking))
        .route(
            "/:id",
            get(get_booking).put(update_booking).delete(delete_booking),
        )
        .route("/:id/status", patch(update_status))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: BookingStatus,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}

// ============================================================================
// Handlers
// ============================================================================

async fn list_bookings(
    State(state): State<Arc<AppState>>,
    _operator: Operator,
) -> AppResult<Json<Vec<Booking>>> {
    let bookings = BookingService::list(&state.db).await?;
    Ok(Json(bookings))
}

async fn get_booking(
    State(state): State<Arc<AppState>>,
    _operator: Operator,
    Path(id): Path<String>,
) -> AppResult<Json<Booking>> {
    let booking = BookingService::get(&state.db, &id).await?;
    Ok(Json(booking))
}

async fn create_booking(
    State(state): State<Arc<AppState>>,
    operator: Operator,
    Json(input): Json<BookingInput>,
) -> AppResult<(StatusCode, Json<Booking>)> {
    let booking = BookingService::create(&state.db, &state.clock, input).await?;
    tracing::info!("Booking {} created by {}", booking.id, operator.describe());
    Ok((StatusCode::CREATED, Json(booking)))
}

async fn update_booking(
    State(state): State<Arc<AppState>>,
    operator: Operator,
    Path(id): Path<String>,
    Json(input): Json<BookingInput>,
) -> AppResult<Json<Booking>> {
    let booking = BookingService::update(&state.db, &id, input).await?;
    tracing::info!("Booking {} updated by {}", id, operator.describe());
    Ok(Json(booking))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    operator: Operator,
    Path(id): Path<String>,
    Json(body): Json<UpdateStatusRequest>,
) -> AppResult<Json<Booking>> {
    let booking = BookingService::update_status(&state.db, &id, body.status).await?;
    tracing::info!("Booking {} set to {} by {}", id, body.status.as_str(), operator.describe());
    Ok(Json(booking))
}

async fn delete_booking(
    State(state): State<Arc<AppState>>,
    operator: Operator,
    Path(id): Path<String>,
) -> AppResult<Json<DeleteResponse>> {
    BookingService::delete(&state.db, &id).await?;
    tracing::info!("Booking {} deleted by {}", id, operator.describe());
    Ok(Json(DeleteResponse { success: true }))
}
