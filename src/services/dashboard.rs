use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::db::models::*;
use crate::error::{AppError, AppResult};
use crate::services::bookings::StayDates;

const UPCOMING_LIMIT: usize = 5;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub today: NaiveDate,
    pub arrivals_today: Vec<Booking>,
    pub departures_today: Vec<Booking>,
    pub upcoming: Vec<Booking>,
    pub current_guests: usize,
    pub total_rooms: usize,
    pub occupancy_rate: u32,
    pub total_revenue: i64,
}

fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    (part as f64 * 100.0 / whole as f64).round() as u32
}

/// Front-desk overview for the property-local `today`.
pub fn summarize(bookings: &[Booking], today: NaiveDate) -> DashboardSummary {
    let mut active: Vec<&Booking> = bookings
        .iter()
        .filter(|b| !matches!(b.status, BookingStatus::Cancelled | BookingStatus::CheckedOut))
        .collect();
    active.sort_by_key(|b| b.check_in);

    let arrivals_today = active
        .iter()
        .filter(|b| b.check_in.date() == today)
        .map(|b| (*b).clone())
        .collect();

    let departures_today = bookings
        .iter()
        .filter(|b| b.status == BookingStatus::CheckedIn && b.check_out.date() == today)
        .cloned()
        .collect();

    let upcoming = active
        .iter()
        .filter(|b| b.check_in.date() > today && b.status != BookingStatus::CheckedIn)
        .take(UPCOMING_LIMIT)
        .map(|b| (*b).clone())
        .collect();

    let current_guests = bookings
        .iter()
        .filter(|b| b.status == BookingStatus::CheckedIn)
        .count();

    let total_revenue = bookings
        .iter()
        .filter(|b| b.status != BookingStatus::Cancelled)
        .map(|b| b.total_price)
        .sum();

    DashboardSummary {
        today,
        arrivals_today,
        departures_today,
        upcoming,
        current_guests,
        total_rooms: ROOMS.len(),
        occupancy_rate: percent(current_guests, ROOMS.len()),
        total_revenue,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayOccupancy {
    pub date: NaiveDate,
    pub booking_id: Option<String>,
    pub guest_name: Option<String>,
    pub status: Option<BookingStatus>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomMonthOccupancy {
    pub room_id: String,
    pub year: i32,
    pub month: u32,
    /// Weekday of the 1st, Monday = 0.
    pub first_weekday: u32,
    pub days: Vec<DayOccupancy>,
    pub occupied_days: usize,
    pub occupancy_percent: u32,
}

/// Parse `YYYY-MM`.
pub fn parse_month(value: &str) -> AppResult<(i32, u32)> {
    let invalid = || AppError::BadRequest(format!("Invalid month '{}', expected YYYY-MM", value));
    let (year, month) = value.trim().split_once('-').ok_or_else(invalid)?;
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    Ok((year, month))
}

/// Which booking occupies `room` on each day of the month. A booking holds
/// the nights from its check-in date up to, not including, its check-out date.
pub fn room_month_occupancy(
    bookings: &[Booking],
    room: &Room,
    year: i32,
    month: u32,
) -> AppResult<RoomMonthOccupancy> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid month {}-{}", year, month)))?;

    let room_bookings: Vec<&Booking> = bookings
        .iter()
        .filter(|b| b.room_id == room.id && b.status != BookingStatus::Cancelled)
        .collect();

    let days: Vec<DayOccupancy> = first
        .iter_days()
        .take_while(|d| d.month() == month)
        .map(|date| {
            let booking = room_bookings
                .iter()
                .find(|b| StayDates::from(**b).contains(date));
            DayOccupancy {
                date,
                booking_id: booking.map(|b| b.id.clone()),
                guest_name: booking.map(|b| b.guest_name.clone()),
                status: booking.map(|b| b.status),
            }
        })
        .collect();

    let occupied_days = days.iter().filter(|d| d.booking_id.is_some()).count();

    Ok(RoomMonthOccupancy {
        room_id: room.id.to_string(),
        year,
        month,
        first_weekday: first.weekday().num_days_from_monday(),
        occupancy_percent: percent(occupied_days, days.len()),
        occupied_days,
        days,
    })
}
