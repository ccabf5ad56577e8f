use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::models::*;
use crate::db::BookingRepository;
use crate::error::AppResult;
use crate::i18n;
use crate::services::bookings::parse_clock_time;
use crate::services::clock::PropertyClock;
use crate::services::notifications::{broadcast, Notifier, OperatorMessage};

/// Check-in moment the reminders count down to. A valid early check-in time
/// replaces the time of day on the check-in date.
pub fn effective_check_in(booking: &Booking) -> NaiveDateTime {
    if booking.early_check_in {
        if let Some(time) = booking
            .early_check_in_time
            .as_deref()
            .and_then(parse_clock_time)
        {
            return booking.check_in.date().and_time(time);
        }
    }
    booking.check_in
}

/// Fractional hours from `now` until the local wall-clock moment `at`.
pub fn hours_until(at: NaiveDateTime, now: DateTime<Utc>, clock: &PropertyClock) -> f64 {
    let delta = clock.instant(at) - now;
    delta.num_milliseconds() as f64 / 3_600_000.0
}

/// The window whose reminder should go out now, if any.
pub fn due_window(booking: &Booking, hours_remaining: f64) -> Option<ReminderWindow> {
    ReminderWindow::ALL
        .into_iter()
        .find(|w| w.contains(hours_remaining) && !booking.reminder_sent(*w))
}

/// `18 октября, 14:00`
pub fn format_check_in(at: NaiveDateTime) -> String {
    format!(
        "{} {}, {}",
        at.day(),
        i18n::t(&format!("month.{}", at.month())),
        at.format("%H:%M")
    )
}

/// Thousands separated with a non-breaking space: `14 000`.
pub fn format_amount(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('\u{a0}');
        }
        out.push(ch);
    }
    if amount < 0 {
        out.insert(0, '-');
    }
    out
}

pub fn render_reminder(booking: &Booking, window: ReminderWindow, public_url: &str) -> OperatorMessage {
    let room = Room::find(&booking.room_id)
        .map(|r| r.name.to_string())
        .unwrap_or_else(|| i18n::t_with("reminder.room_fallback", &[("room", booking.room_id.as_str())]));

    let mut lines = vec![
        i18n::t_with("reminder.title", &[("window", i18n::t(window.label_key()).as_str())]),
        String::new(),
        i18n::t_with("reminder.guest", &[("name", booking.guest_name.as_str())]),
        i18n::t_with("reminder.phone", &[("phone", booking.guest_phone.as_str())]),
        i18n::t_with("reminder.room", &[("room", room.as_str())]),
        i18n::t_with("reminder.check_in", &[("date", format_check_in(booking.check_in).as_str())]),
    ];

    let mut guests = i18n::t_with("reminder.adults", &[("adults", booking.adults.to_string().as_str())]);
    if booking.kids > 0 {
        guests.push_str(&i18n::t_with("reminder.kids", &[("kids", booking.kids.to_string().as_str())]));
    }
    lines.push(guests);

    let remaining = booking.remaining_payment();
    if remaining > 0 {
        lines.push(i18n::t_with("reminder.remaining", &[("amount", format_amount(remaining).as_str())]));
    } else {
        lines.push(i18n::t("reminder.paid"));
    }

    let mut special = Vec::new();
    if booking.parking {
        special.push(i18n::t("reminder.parking"));
    }
    if booking.early_check_in {
        let time = booking.early_check_in_time.as_deref().unwrap_or("—");
        special.push(i18n::t_with("reminder.early_check_in", &[("time", time)]));
    }
    if booking.late_check_out {
        let time = booking.late_check_out_time.as_deref().unwrap_or("—");
        special.push(i18n::t_with("reminder.late_check_out", &[("time", time)]));
    }
    if !special.is_empty() {
        lines.push(String::new());
        lines.push(i18n::t("reminder.special_header"));
        lines.extend(special);
    }

    if let Some(comment) = booking.comment.as_deref().filter(|c| !c.is_empty()) {
        lines.push(String::new());
        lines.push(i18n::t_with("reminder.comment", &[("comment", comment)]));
    }

    OperatorMessage::text(lines.join("\n")).with_button(
        i18n::t("reminder.open_booking"),
        format!("{}/?booking={}", public_url, booking.id),
    )
}

/// Outcome of one scan, for logs and tests.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ScanReport {
    pub examined: usize,
    pub sent_24h: usize,
    pub sent_2h: usize,
    pub failed_deliveries: usize,
}

impl ScanReport {
    fn record(&mut self, window: ReminderWindow) {
        match window {
            ReminderWindow::DayBefore => self.sent_24h += 1,
            ReminderWindow::TwoHoursBefore => self.sent_2h += 1,
        }
    }
}

/// Periodically checks upcoming check-ins and notifies operator chats once
/// per reminder window.
pub struct ReminderDispatcher {
    pool: SqlitePool,
    notifier: Arc<dyn Notifier>,
    operators: Vec<i64>,
    clock: PropertyClock,
    delivery_timeout: Duration,
    public_url: String,
}

impl ReminderDispatcher {
    pub fn new(
        pool: SqlitePool,
        notifier: Arc<dyn Notifier>,
        operators: Vec<i64>,
        clock: PropertyClock,
        delivery_timeout: Duration,
        public_url: String,
    ) -> Self {
        Self {
            pool,
            notifier,
            operators,
            clock,
            delivery_timeout,
            public_url,
        }
    }

    /// One pass over confirmed and prepaid bookings that have not checked in yet.
    ///
    /// A window's flag is set once the delivery attempt finishes, whether or
    /// not any chat actually received the message. A reminder that failed for
    /// every chat is therefore not retried.
    pub async fn scan(&self, now: DateTime<Utc>) -> AppResult<ScanReport> {
        let mut report = ScanReport::default();

        if self.operators.is_empty() {
            tracing::warn!("Reminder scan skipped: no operator chats configured");
            return Ok(report);
        }

        let local_now = self.clock.local(now);
        let upcoming = BookingRepository::list_awaiting_arrival_after(&self.pool, local_now).await?;
        tracing::debug!("Reminder scan at {}: {} upcoming bookings", local_now, upcoming.len());

        for booking in &upcoming {
            report.examined += 1;

            let effective = effective_check_in(booking);
            let hours = hours_until(effective, now, &self.clock);
            tracing::debug!(
                "Booking {} ({}): {:.2}h until check-in at {}, state {:?}",
                booking.id,
                booking.guest_name,
                hours,
                effective,
                booking.reminder_state()
            );

            let Some(window) = due_window(booking, hours) else {
                continue;
            };

            tracing::info!("Sending {} reminder for booking {}", window.as_str(), booking.id);
            let message = render_reminder(booking, window, &self.public_url);
            let results = broadcast(&self.notifier, &self.operators, &message, self.delivery_timeout).await;
            for failed in results.iter().filter(|r| !r.success) {
                tracing::warn!(
                    "{} reminder for booking {} not delivered to chat {}: {}",
                    window.as_str(),
                    booking.id,
                    failed.chat_id,
                    failed.error.as_deref().unwrap_or("unknown error")
                );
                report.failed_deliveries += 1;
            }

            BookingRepository::mark_reminder_sent(&self.pool, &booking.id, window).await?;
            report.record(window);
        }

        Ok(report)
    }
}
