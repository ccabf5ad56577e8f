use std::sync::Arc;

use axum::{extract::State, Json};

use crate::error::AppResult;
use crate::routes::auth::Operator;
use crate::services::bookings::BookingService;
use crate::services::dashboard::{summarize, DashboardSummary};
use crate::AppState;

pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    _operator: Operator,
) -> AppResult<Json<DashboardSummary>> {
    let bookings = BookingService::list(&state.db).await?;
    Ok(Json(summarize(&bookings, state.clock.today())))
}
