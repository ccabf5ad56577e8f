use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::Datelike;
use serde::Deserialize;

use crate::db::models::{Room, ROOMS};
use crate::error::{AppError, AppResult};
use crate::routes::auth::Operator;
use crate::services::bookings::BookingService;
use crate::services::dashboard::{parse_month, room_month_occupancy, RoomMonthOccupancy};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_rooms))
        .route("/:id/occupancy", get(room_occupancy))
}

#[derive(Debug, Deserialize)]
pub struct OccupancyQuery {
    /// `YYYY-MM`, defaults to the current property-local month.
    pub month: Option<String>,
}

async fn list_rooms(_operator: Operator) -> Json<&'static [Room]> {
    Json(&ROOMS[..])
}

async fn room_occupancy(
    State(state): State<Arc<AppState>>,
    _operator: Operator,
    Path(id): Path<String>,
    Query(query): Query<OccupancyQuery>,
) -> AppResult<Json<RoomMonthOccupancy>> {
    let room = Room::find(&id).ok_or_else(|| AppError::NotFound(format!("Room {} not found", id)))?;

    let (year, month) = match query.month.as_deref() {
        Some(value) => parse_month(value)?,
        None => {
            let today = state.clock.today();
            (today.year(), today.month())
        }
    };

    let bookings = BookingService::list(&state.db).await?;
    let occupancy = room_month_occupancy(&bookings, room, year, month)?;
    Ok(Json(occupancy))
}
