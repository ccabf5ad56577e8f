use serde::Serialize;

use super::Booking;

/// Fixed hours-before-check-in brackets in which exactly one reminder attempt is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderWindow {
    /// `23h < remaining <= 24h`
    DayBefore,
    /// `1h < remaining <= 2h`
    TwoHoursBefore,
}

impl ReminderWindow {
    pub const ALL: [ReminderWindow; 2] = [ReminderWindow::DayBefore, ReminderWindow::TwoHoursBefore];

    /// Upper bound of the window, in hours before the effective check-in.
    pub fn hours(self) -> f64 {
        match self {
            ReminderWindow::DayBefore => 24.0,
            ReminderWindow::TwoHoursBefore => 2.0,
        }
    }

    /// Windows are one hour wide and closed at the top: `(hours - 1, hours]`.
    pub fn contains(self, hours_remaining: f64) -> bool {
        hours_remaining <= self.hours() && hours_remaining > self.hours() - 1.0
    }

    /// Column holding the persisted "sent" flag.
    pub fn flag_column(self) -> &'static str {
        match self {
            ReminderWindow::DayBefore => "notification_24h_sent",
            ReminderWindow::TwoHoursBefore => "notification_2h_sent",
        }
    }

    pub fn label_key(self) -> &'static str {
        match self {
            ReminderWindow::DayBefore => "reminder.window.24h",
            ReminderWindow::TwoHoursBefore => "reminder.window.2h",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReminderWindow::DayBefore => "24h",
            ReminderWindow::TwoHoursBefore => "2h",
        }
    }
}

/// Reminder progress of a booking, derived from the two persisted flags.
///
/// Monotonic. `TwoHoursSent` does not imply the 24h reminder went out: a scan
/// may first see the booking inside the 2h window (e.g. after downtime) and
/// nothing backfills the missed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderState {
    NotYetDue,
    DaySent,
    TwoHoursSent,
}

impl ReminderState {
    pub fn from_flags(sent_24h: bool, sent_2h: bool) -> Self {
        if sent_2h {
            ReminderState::TwoHoursSent
        } else if sent_24h {
            ReminderState::DaySent
        } else {
            ReminderState::NotYetDue
        }
    }
}

impl Booking {
    pub fn reminder_sent(&self, window: ReminderWindow) -> bool {
        match window {
            ReminderWindow::DayBefore => self.notification_24h_sent,
            ReminderWindow::TwoHoursBefore => self.notification_2h_sent,
        }
    }

    pub fn reminder_state(&self) -> ReminderState {
        ReminderState::from_flags(self.notification_24h_sent, self.notification_2h_sent)
    }
}
