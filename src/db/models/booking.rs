use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    #[default]
    Confirmed,
    Prepaid,
    CheckedIn,
    CheckedOut,
    Cancelled,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 5] = [
        BookingStatus::Confirmed,
        BookingStatus::Prepaid,
        BookingStatus::CheckedIn,
        BookingStatus::CheckedOut,
        BookingStatus::Cancelled,
    ];

    /// Convert from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "confirmed" => Some(BookingStatus::Confirmed),
            "prepaid" => Some(BookingStatus::Prepaid),
            "checked_in" => Some(BookingStatus::CheckedIn),
            "checked_out" => Some(BookingStatus::CheckedOut),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    /// Convert to string
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Prepaid => "prepaid",
            BookingStatus::CheckedIn => "checked_in",
            BookingStatus::CheckedOut => "checked_out",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// Bookings that still expect the guest to arrive. Only these get reminders.
    pub fn awaits_arrival(self) -> bool {
        matches!(self, BookingStatus::Confirmed | BookingStatus::Prepaid)
    }
}

impl TryFrom<&str> for BookingStatus {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_str(value).ok_or_else(|| format!("Invalid booking status: {}", value))
    }
}

/// How the guest got in touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactChannel {
    Telegram,
    Whatsapp,
    Vk,
    Max,
    Other,
}

impl ContactChannel {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "telegram" => Some(ContactChannel::Telegram),
            "whatsapp" => Some(ContactChannel::Whatsapp),
            "vk" => Some(ContactChannel::Vk),
            "max" => Some(ContactChannel::Max),
            "other" => Some(ContactChannel::Other),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContactChannel::Telegram => "telegram",
            ContactChannel::Whatsapp => "whatsapp",
            ContactChannel::Vk => "vk",
            ContactChannel::Max => "max",
            ContactChannel::Other => "other",
        }
    }
}

/// A reservation of one room for a guest over a date range.
///
/// `check_in` / `check_out` are wall-clock values in the property's offset
/// (see `services::clock::PropertyClock`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub room_id: String,
    pub guest_name: String,
    pub guest_phone: String,
    pub contact_channel: Option<ContactChannel>,
    pub contact_source: Option<String>,
    #[serde(with = "local_datetime")]
    pub check_in: NaiveDateTime,
    #[serde(with = "local_datetime")]
    pub check_out: NaiveDateTime,
    pub adults: i64,
    pub kids: i64,
    pub parking: bool,
    pub early_check_in: bool,
    pub early_check_in_time: Option<String>,
    pub late_check_out: bool,
    pub late_check_out_time: Option<String>,
    pub daily_price: i64,
    pub total_price: i64,
    pub prepayment: i64,
    pub status: BookingStatus,
    pub comment: Option<String>,
    pub created_at: NaiveDateTime,
    #[serde(rename = "notification24hSent")]
    pub notification_24h_sent: bool,
    #[serde(rename = "notification2hSent")]
    pub notification_2h_sent: bool,
}

impl Booking {
    /// Amount still to be collected from the guest.
    pub fn remaining_payment(&self) -> i64 {
        self.total_price - self.prepayment
    }
}

// Intermediate structure for reading from DB (strings for enums)
#[derive(Debug, FromRow)]
pub struct BookingRow {
    pub id: String,
    pub room_id: String,
    pub guest_name: String,
    pub guest_phone: String,
    pub contact_channel: Option<String>,
    pub contact_source: Option<String>,
    pub check_in: NaiveDateTime,
    pub check_out: NaiveDateTime,
    pub adults: i64,
    pub kids: i64,
    pub parking: bool,
    pub early_check_in: bool,
    pub early_check_in_time: Option<String>,
    pub late_check_out: bool,
    pub late_check_out_time: Option<String>,
    pub daily_price: i64,
    pub total_price: i64,
    pub prepayment: i64,
    pub status: String,
    pub comment: Option<String>,
    pub created_at: NaiveDateTime,
    pub notification_24h_sent: bool,
    pub notification_2h_sent: bool,
}

impl TryFrom<BookingRow> for Booking {
    type Error = String;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            status: BookingStatus::try_from(row.status.as_str())?,
            contact_channel: row
                .contact_channel
                .as_deref()
                .and_then(ContactChannel::from_str),
            id: row.id,
            room_id: row.room_id,
            guest_name: row.guest_name,
            guest_phone: row.guest_phone,
            contact_source: row.contact_source,
            check_in: row.check_in,
            check_out: row.check_out,
            adults: row.adults,
            kids: row.kids,
            parking: row.parking,
            early_check_in: row.early_check_in,
            early_check_in_time: row.early_check_in_time,
            late_check_out: row.late_check_out,
            late_check_out_time: row.late_check_out_time,
            daily_price: row.daily_price,
            total_price: row.total_price,
            prepayment: row.prepayment,
            comment: row.comment,
            created_at: row.created_at,
            notification_24h_sent: row.notification_24h_sent,
            notification_2h_sent: row.notification_2h_sent,
        })
    }
}

/// Client payload for create/update. `totalPrice` is accepted for
/// compatibility with the front-end but always recomputed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingInput {
    #[serde(default)]
    pub id: Option<String>,
    pub room_id: String,
    pub guest_name: String,
    #[serde(default)]
    pub guest_phone: String,
    #[serde(default)]
    pub contact_channel: Option<ContactChannel>,
    #[serde(default)]
    pub contact_source: Option<String>,
    #[serde(with = "local_datetime")]
    pub check_in: NaiveDateTime,
    #[serde(with = "local_datetime")]
    pub check_out: NaiveDateTime,
    pub adults: i64,
    #[serde(default)]
    pub kids: i64,
    #[serde(default)]
    pub parking: bool,
    #[serde(default)]
    pub early_check_in: bool,
    #[serde(default)]
    pub early_check_in_time: Option<String>,
    #[serde(default)]
    pub late_check_out: bool,
    #[serde(default)]
    pub late_check_out_time: Option<String>,
    pub daily_price: i64,
    #[serde(default)]
    pub total_price: Option<i64>,
    #[serde(default)]
    pub prepayment: i64,
    #[serde(default)]
    pub status: BookingStatus,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Fully validated values ready to be written. Built by `BookingService`.
#[derive(Debug, Clone)]
pub struct BookingRecord {
    pub id: String,
    pub room_id: String,
    pub guest_name: String,
    pub guest_phone: String,
    pub contact_channel: Option<ContactChannel>,
    pub contact_source: Option<String>,
    pub check_in: NaiveDateTime,
    pub check_out: NaiveDateTime,
    pub adults: i64,
    pub kids: i64,
    pub parking: bool,
    pub early_check_in: bool,
    pub early_check_in_time: Option<String>,
    pub late_check_out: bool,
    pub late_check_out_time: Option<String>,
    pub daily_price: i64,
    pub total_price: i64,
    pub prepayment: i64,
    pub status: BookingStatus,
    pub comment: Option<String>,
}

/// Serde helpers for property-local timestamps.
///
/// Serializes as `YYYY-MM-DDTHH:MM:SS`. Accepts that form, fractional seconds,
/// the `YYYY-MM-DDTHH:MM` form produced by `datetime-local` inputs, and a
/// space separator.
pub mod local_datetime {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
    const ACCEPTED: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];

    pub fn parse(value: &str) -> Option<NaiveDateTime> {
        let value = value.trim();
        ACCEPTED
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
    }

    pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid local date-time: {}", raw))
        })
    }
}
