use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, Utc};

/// Converts between absolute instants and the guesthouse's wall clock.
///
/// Booking times are stored as naive local values; this is the only place
/// that knows which offset they are in. The process time zone is never
/// consulted or changed.
#[derive(Debug, Clone, Copy)]
pub struct PropertyClock {
    offset: FixedOffset,
}

impl PropertyClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Wall-clock time at the property for an absolute instant.
    pub fn local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&self.offset).naive_local()
    }

    pub fn now(&self) -> NaiveDateTime {
        self.local(Utc::now())
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date()
    }

    /// Absolute instant for a property-local wall-clock value.
    pub fn instant(&self, local: NaiveDateTime) -> DateTime<Utc> {
        let utc = local - Duration::seconds(i64::from(self.offset.local_minus_utc()));
        DateTime::from_naive_utc_and_offset(utc, Utc)
    }
}
