use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::db::BookingRepository;
use crate::error::{AppError, AppResult};
use crate::i18n;
use crate::services::clock::PropertyClock;

/// Date-only stay interval `[start, end)`. Time of day never matters for
/// occupancy or pricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StayDates {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl StayDates {
    pub fn from_timestamps(check_in: NaiveDateTime, check_out: NaiveDateTime) -> Self {
        Self {
            start: check_in.date(),
            end: check_out.date(),
        }
    }

    /// Calendar nights between the two dates, never negative.
    pub fn nights(&self) -> i64 {
        (self.end - self.start).num_days().max(0)
    }

    /// Exclusive endpoints: a stay ending on the day another begins does not overlap it.
    pub fn overlaps(&self, other: &StayDates) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day < self.end
    }
}

impl From<&Booking> for StayDates {
    fn from(booking: &Booking) -> Self {
        StayDates::from_timestamps(booking.check_in, booking.check_out)
    }
}

/// `None` when the product does not fit in an `i64`.
pub fn total_price(daily_price: i64, nights: i64) -> Option<i64> {
    daily_price.checked_mul(nights)
}

/// The booking form pre-fills `+7 `, which on its own is not a phone number.
fn is_blank_phone(phone: &str) -> bool {
    matches!(phone.trim(), "" | "+7" | "+")
}

/// What is being saved, as far as the collision check is concerned.
#[derive(Debug, Clone, Copy)]
pub struct CollisionCandidate<'a> {
    pub id: &'a str,
    pub room_id: &'a str,
    pub stay: StayDates,
}

impl<'a> From<&'a BookingRecord> for CollisionCandidate<'a> {
    fn from(record: &'a BookingRecord) -> Self {
        Self {
            id: &record.id,
            room_id: &record.room_id,
            stay: StayDates::from_timestamps(record.check_in, record.check_out),
        }
    }
}

impl<'a> From<&'a Booking> for CollisionCandidate<'a> {
    fn from(booking: &'a Booking) -> Self {
        Self {
            id: &booking.id,
            room_id: &booking.room_id,
            stay: StayDates::from(booking),
        }
    }
}

/// First stored booking that blocks `candidate`: another id, same room,
/// not cancelled, overlapping dates.
pub fn find_collision<'b>(
    bookings: &'b [Booking],
    candidate: CollisionCandidate<'_>,
) -> Option<&'b Booking> {
    bookings.iter().find(|existing| {
        existing.id != candidate.id
            && existing.room_id == candidate.room_id
            && existing.status != BookingStatus::Cancelled
            && StayDates::from(*existing).overlaps(&candidate.stay)
    })
}

fn collision_error(booking: &Booking) -> AppError {
    AppError::BookingCollision {
        booking_id: booking.id.clone(),
        guest_name: booking.guest_name.clone(),
    }
}

/// `HH:MM`, with an optional `:SS` tolerated.
pub fn parse_clock_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

fn normalize_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_time_field(value: Option<String>, field: &str) -> AppResult<Option<String>> {
    match normalize_text(value) {
        Some(v) => {
            let time = parse_clock_time(&v).ok_or_else(|| {
                AppError::Validation(i18n::t_with("validation.time_format", &[("field", field)]))
            })?;
            Ok(Some(time.format("%H:%M").to_string()))
        }
        None => Ok(None),
    }
}

pub struct BookingService;

impl BookingService {
    /// Check the client payload and derive the values that get stored.
    /// The total price is always recomputed from the nightly price.
    pub fn validate(input: BookingInput, id: String) -> AppResult<BookingRecord> {
        let room_id = input.room_id.trim().to_string();
        if Room::find(&room_id).is_none() {
            return Err(AppError::Validation(i18n::t_with(
                "validation.unknown_room",
                &[("room", room_id.as_str())],
            )));
        }

        let guest_name = input.guest_name.trim().to_string();
        if guest_name.is_empty() {
            return Err(AppError::Validation(i18n::t("validation.guest_name_required")));
        }

        if is_blank_phone(&input.guest_phone) {
            return Err(AppError::Validation(i18n::t("validation.guest_phone_required")));
        }

        // Same-day stays are allowed and cost zero nights.
        let stay = StayDates::from_timestamps(input.check_in, input.check_out);
        if stay.end < stay.start {
            return Err(AppError::Validation(i18n::t("validation.dates_order")));
        }

        if input.adults < 1 {
            return Err(AppError::Validation(i18n::t("validation.adults")));
        }
        if input.kids < 0 {
            return Err(AppError::Validation(i18n::t("validation.kids")));
        }
        if input.daily_price < 0 || input.prepayment < 0 {
            return Err(AppError::Validation(i18n::t("validation.prices")));
        }

        let early_check_in_time = validate_time_field(input.early_check_in_time, "earlyCheckInTime")?;
        let late_check_out_time = validate_time_field(input.late_check_out_time, "lateCheckOutTime")?;

        let total_price = total_price(input.daily_price, stay.nights())
            .ok_or_else(|| AppError::Validation(i18n::t("validation.total_too_large")))?;

        Ok(BookingRecord {
            id,
            room_id,
            guest_name,
            guest_phone: input.guest_phone.trim().to_string(),
            contact_channel: input.contact_channel,
            contact_source: normalize_text(input.contact_source),
            check_in: input.check_in,
            check_out: input.check_out,
            adults: input.adults,
            kids: input.kids,
            parking: input.parking,
            early_check_in: input.early_check_in,
            early_check_in_time,
            late_check_out: input.late_check_out,
            late_check_out_time,
            daily_price: input.daily_price,
            total_price,
            prepayment: input.prepayment,
            status: input.status,
            comment: normalize_text(input.comment),
        })
    }

    pub async fn list(pool: &SqlitePool) -> AppResult<Vec<Booking>> {
        BookingRepository::list_all(pool).await
    }

    pub async fn get(pool: &SqlitePool, id: &str) -> AppResult<Booking> {
        BookingRepository::find_by_id(pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound(i18n::t("not_found.booking")))
    }

    pub async fn create(
        pool: &SqlitePool,
        clock: &PropertyClock,
        input: BookingInput,
    ) -> AppResult<Booking> {
        let id = normalize_text(input.id.clone()).unwrap_or_else(|| Uuid::new_v4().to_string());
        let record = Self::validate(input, id)?;

        let mut tx = pool.begin().await?;

        if record.status != BookingStatus::Cancelled {
            let existing = BookingRepository::list_all(&mut *tx).await?;
            if let Some(conflict) = find_collision(&existing, CollisionCandidate::from(&record)) {
                tracing::info!(
                    "Booking {} rejected: room {} already taken by {}",
                    record.id,
                    record.room_id,
                    conflict.id
                );
                return Err(collision_error(conflict));
            }
        }

        let booking = BookingRepository::insert(&mut *tx, &record, clock.now()).await?;
        tx.commit().await?;

        tracing::info!(
            "Booking {} created for room {} ({} nights)",
            booking.id,
            booking.room_id,
            StayDates::from(&booking).nights()
        );
        Ok(booking)
    }

    pub async fn update(pool: &SqlitePool, id: &str, input: BookingInput) -> AppResult<Booking> {
        let record = Self::validate(input, id.to_string())?;

        let mut tx = pool.begin().await?;

        let existing = BookingRepository::list_all(&mut *tx).await?;
        if !existing.iter().any(|b| b.id == id) {
            return Err(AppError::NotFound(i18n::t("not_found.booking")));
        }

        if record.status != BookingStatus::Cancelled {
            if let Some(conflict) = find_collision(&existing, CollisionCandidate::from(&record)) {
                tracing::info!(
                    "Update of booking {} rejected: collides with {}",
                    id,
                    conflict.id
                );
                return Err(collision_error(conflict));
            }
        }

        let booking = BookingRepository::update(&mut *tx, &record)
            .await?
            .ok_or_else(|| AppError::NotFound(i18n::t("not_found.booking")))?;
        tx.commit().await?;

        tracing::info!("Booking {} updated", booking.id);
        Ok(booking)
    }

    /// Moving a booking out of `cancelled` puts it back on the calendar, so
    /// that transition is collision-checked like a new booking.
    pub async fn update_status(
        pool: &SqlitePool,
        id: &str,
        status: BookingStatus,
    ) -> AppResult<Booking> {
        let mut tx = pool.begin().await?;

        let existing = BookingRepository::list_all(&mut *tx).await?;
        let current = existing
            .iter()
            .find(|b| b.id == id)
            .ok_or_else(|| AppError::NotFound(i18n::t("not_found.booking")))?;

        if current.status == BookingStatus::Cancelled && status != BookingStatus::Cancelled {
            if let Some(conflict) = find_collision(&existing, CollisionCandidate::from(current)) {
                return Err(collision_error(conflict));
            }
        }

        let previous = current.status;
        let booking = BookingRepository::update_status(&mut *tx, id, status)
            .await?
            .ok_or_else(|| AppError::NotFound(i18n::t("not_found.booking")))?;
        tx.commit().await?;

        tracing::info!(
            "Booking {} status: {} -> {}",
            id,
            previous.as_str(),
            status.as_str()
        );
        Ok(booking)
    }

    pub async fn delete(pool: &SqlitePool, id: &str) -> AppResult<()> {
        if !BookingRepository::delete(pool, id).await? {
            return Err(AppError::NotFound(i18n::t("not_found.booking")));
        }
        tracing::info!("Booking {} deleted", id);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::test_pool;
    use chrono::FixedOffset;

    pub(crate) fn dt(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{} {}", date, time), "%Y-%m-%d %H:%M").unwrap()
    }

    pub(crate) fn booking(id: &str, room: &str, check_in: &str, check_out: &str) -> Booking {
        Booking {
            id: id.to_string(),
            room_id: room.to_string(),
            guest_name: format!("Guest {}", id),
            guest_phone: "+79001234567".to_string(),
            contact_channel: None,
            contact_source: None,
            check_in: dt(check_in, "14:00"),
            check_out: dt(check_out, "12:00"),
            adults: 2,
            kids: 0,
            parking: false,
            early_check_in: false,
            early_check_in_time: None,
            late_check_out: false,
            late_check_out_time: None,
            daily_price: 3500,
            total_price: 0,
            prepayment: 0,
            status: BookingStatus::Confirmed,
            comment: None,
            created_at: dt("2026-01-01", "10:00"),
            notification_24h_sent: false,
            notification_2h_sent: false,
        }
    }

    pub(crate) fn input(room: &str, check_in: &str, check_out: &str) -> BookingInput {
        BookingInput {
            id: None,
            room_id: room.to_string(),
            guest_name: "Ирина Иванова".to_string(),
            guest_phone: "+79001234567".to_string(),
            contact_channel: Some(ContactChannel::Telegram),
            contact_source: None,
            check_in: dt(check_in, "14:00"),
            check_out: dt(check_out, "12:00"),
            adults: 2,
            kids: 1,
            parking: false,
            early_check_in: false,
            early_check_in_time: None,
            late_check_out: false,
            late_check_out_time: None,
            daily_price: 3500,
            total_price: None,
            prepayment: 0,
            status: BookingStatus::Confirmed,
            comment: None,
        }
    }

    fn candidate<'a>(id: &'a str, room: &'a str, check_in: &str, check_out: &str) -> CollisionCandidate<'a> {
        CollisionCandidate {
            id,
            room_id: room,
            stay: StayDates::from_timestamps(dt(check_in, "14:00"), dt(check_out, "12:00")),
        }
    }

    fn clock() -> PropertyClock {
        PropertyClock::new(FixedOffset::east_opt(3 * 3600).unwrap())
    }

    #[test]
    fn exact_match_collides() {
        let stored = vec![booking("a", "1", "2026-02-05", "2026-02-07")];
        let hit = find_collision(&stored, candidate("new", "1", "2026-02-05", "2026-02-07"));
        assert_eq!(hit.map(|b| b.id.as_str()), Some("a"));
    }

    #[test]
    fn back_to_back_does_not_collide() {
        let stored = vec![booking("a", "1", "2026-02-05", "2026-02-07")];
        assert!(find_collision(&stored, candidate("new", "1", "2026-02-07", "2026-02-09")).is_none());
        assert!(find_collision(&stored, candidate("new", "1", "2026-02-03", "2026-02-05")).is_none());
    }

    #[test]
    fn nested_and_partial_overlaps_collide() {
        let stored = vec![booking("a", "1", "2026-02-05", "2026-02-10")];
        assert!(find_collision(&stored, candidate("new", "1", "2026-02-06", "2026-02-08")).is_some());
        assert!(find_collision(&stored, candidate("new", "1", "2026-02-01", "2026-02-20")).is_some());
        assert!(find_collision(&stored, candidate("new", "1", "2026-02-09", "2026-02-12")).is_some());
    }

    #[test]
    fn collision_is_symmetric() {
        let a = booking("a", "1", "2026-02-05", "2026-02-08");
        let b = booking("b", "1", "2026-02-07", "2026-02-10");
        assert!(find_collision(std::slice::from_ref(&a), CollisionCandidate::from(&b)).is_some());
        assert!(find_collision(std::slice::from_ref(&b), CollisionCandidate::from(&a)).is_some());
    }

    #[test]
    fn cancelled_other_room_and_self_are_ignored() {
        let mut cancelled = booking("c", "1", "2026-02-05", "2026-02-07");
        cancelled.status = BookingStatus::Cancelled;
        let other_room = booking("o", "2", "2026-02-05", "2026-02-07");
        let itself = booking("self", "1", "2026-02-05", "2026-02-07");
        let stored = vec![cancelled, other_room, itself];

        assert!(find_collision(&stored, candidate("self", "1", "2026-02-05", "2026-02-07")).is_none());
    }

    #[test]
    fn checked_out_bookings_still_block() {
        let mut done = booking("d", "1", "2026-02-05", "2026-02-07");
        done.status = BookingStatus::CheckedOut;
        let stored = vec![done];
        assert!(find_collision(&stored, candidate("new", "1", "2026-02-06", "2026-02-08")).is_some());
    }

    #[test]
    fn time_of_day_is_ignored() {
        // Leaving at 23:00 on the day the next guest arrives at 08:00 is still back-to-back.
        let mut a = booking("a", "1", "2026-02-05", "2026-02-07");
        a.check_out = dt("2026-02-07", "23:00");
        let stay = StayDates::from_timestamps(dt("2026-02-07", "08:00"), dt("2026-02-08", "12:00"));
        let hit = find_collision(
            std::slice::from_ref(&a),
            CollisionCandidate { id: "b", room_id: "1", stay },
        );
        assert!(hit.is_none());
    }

    #[test]
    fn nights_and_total_price() {
        let stay = StayDates::from_timestamps(dt("2026-02-01", "14:00"), dt("2026-02-05", "12:00"));
        assert_eq!(stay.nights(), 4);
        assert_eq!(total_price(3500, stay.nights()), Some(14000));

        // a late check-in and early check-out on consecutive days is one night
        let stay = StayDates::from_timestamps(dt("2026-02-01", "23:59"), dt("2026-02-02", "00:01"));
        assert_eq!(stay.nights(), 1);

        let reversed = StayDates::from_timestamps(dt("2026-02-05", "14:00"), dt("2026-02-01", "12:00"));
        assert_eq!(reversed.nights(), 0);
    }

    #[test]
    fn validate_recomputes_total_and_normalizes() {
        let mut payload = input("2", "2026-02-01", "2026-02-05");
        payload.total_price = Some(1);
        payload.early_check_in = true;
        payload.early_check_in_time = Some(" 8:00 ".to_string());
        payload.comment = Some("   ".to_string());

        let record = BookingService::validate(payload, "x".to_string()).unwrap();
        assert_eq!(record.total_price, 14000);
        assert_eq!(record.early_check_in_time.as_deref(), Some("08:00"));
        assert!(record.comment.is_none());
    }

    #[test]
    fn validate_rejects_bad_payloads() {
        let bad_room = input("9", "2026-02-01", "2026-02-05");
        assert!(matches!(
            BookingService::validate(bad_room, "x".into()),
            Err(AppError::Validation(_))
        ));

        let reversed = input("1", "2026-02-03", "2026-02-01");
        assert!(matches!(
            BookingService::validate(reversed, "x".into()),
            Err(AppError::Validation(_))
        ));

        for phone in ["", "  ", "+7 "] {
            let mut no_phone = input("1", "2026-02-01", "2026-02-03");
            no_phone.guest_phone = phone.into();
            assert!(matches!(
                BookingService::validate(no_phone, "x".into()),
                Err(AppError::Validation(_))
            ));
        }

        let mut no_adults = input("1", "2026-02-01", "2026-02-03");
        no_adults.adults = 0;
        assert!(BookingService::validate(no_adults, "x".into()).is_err());

        let mut blank_name = input("1", "2026-02-01", "2026-02-03");
        blank_name.guest_name = "  ".into();
        assert!(BookingService::validate(blank_name, "x".into()).is_err());

        let mut negative = input("1", "2026-02-01", "2026-02-03");
        negative.prepayment = -1;
        assert!(BookingService::validate(negative, "x".into()).is_err());

        let mut bad_time = input("1", "2026-02-01", "2026-02-03");
        bad_time.late_check_out_time = Some("noon".into());
        assert!(BookingService::validate(bad_time, "x".into()).is_err());
    }

    #[test]
    fn same_day_stay_costs_nothing() {
        let record = BookingService::validate(input("1", "2026-02-01", "2026-02-01"), "x".into()).unwrap();
        assert_eq!(record.total_price, 0);
    }

    #[test]
    fn huge_nightly_price_is_rejected_instead_of_overflowing() {
        let mut payload = input("1", "2026-02-01", "2026-02-03");
        payload.daily_price = i64::MAX / 2 + 1;
        assert!(matches!(
            BookingService::validate(payload, "x".into()),
            Err(AppError::Validation(_))
        ));

        // a single night at the same price still fits
        let mut payload = input("1", "2026-02-01", "2026-02-02");
        payload.daily_price = i64::MAX / 2 + 1;
        let record = BookingService::validate(payload, "x".into()).unwrap();
        assert_eq!(record.total_price, i64::MAX / 2 + 1);
    }

    #[tokio::test]
    async fn create_rejects_overlap_with_guest_name() {
        let pool = test_pool().await;
        let first = BookingService::create(&pool, &clock(), input("1", "2026-02-05", "2026-02-08"))
            .await
            .unwrap();
        assert_eq!(first.total_price, 10500);

        let err = BookingService::create(&pool, &clock(), input("1", "2026-02-07", "2026-02-09"))
            .await
            .unwrap_err();
        match err {
            AppError::BookingCollision { booking_id, guest_name } => {
                assert_eq!(booking_id, first.id);
                assert_eq!(guest_name, "Ирина Иванова");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        // other room and back-to-back in the same room are fine
        BookingService::create(&pool, &clock(), input("2", "2026-02-07", "2026-02-09"))
            .await
            .unwrap();
        BookingService::create(&pool, &clock(), input("1", "2026-02-08", "2026-02-10"))
            .await
            .unwrap();
        assert_eq!(BookingService::list(&pool).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn create_uses_client_id_when_given() {
        let pool = test_pool().await;
        let mut payload = input("3", "2026-03-01", "2026-03-02");
        payload.id = Some("client-id".to_string());
        let booking = BookingService::create(&pool, &clock(), payload).await.unwrap();
        assert_eq!(booking.id, "client-id");
        assert_eq!(BookingService::get(&pool, "client-id").await.unwrap().room_id, "3");
    }

    #[tokio::test]
    async fn update_excludes_itself_and_checks_others() {
        let pool = test_pool().await;
        let a = BookingService::create(&pool, &clock(), input("1", "2026-02-05", "2026-02-08"))
            .await
            .unwrap();
        BookingService::create(&pool, &clock(), input("1", "2026-02-10", "2026-02-12"))
            .await
            .unwrap();

        // extend within free nights
        let updated = BookingService::update(&pool, &a.id, input("1", "2026-02-05", "2026-02-10"))
            .await
            .unwrap();
        assert_eq!(updated.total_price, 17500);

        // extend into the second booking
        let err = BookingService::update(&pool, &a.id, input("1", "2026-02-05", "2026-02-11"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BookingCollision { .. }));

        let missing = BookingService::update(&pool, "nope", input("2", "2026-02-05", "2026-02-06")).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn reactivating_cancelled_booking_is_collision_checked() {
        let pool = test_pool().await;
        let mut cancelled = input("1", "2026-02-05", "2026-02-08");
        cancelled.status = BookingStatus::Cancelled;
        let old = BookingService::create(&pool, &clock(), cancelled).await.unwrap();

        // the freed dates can be rebooked
        BookingService::create(&pool, &clock(), input("1", "2026-02-06", "2026-02-07"))
            .await
            .unwrap();

        let err = BookingService::update_status(&pool, &old.id, BookingStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BookingCollision { .. }));

        // staying cancelled never collides
        let still = BookingService::update_status(&pool, &old.id, BookingStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(still.status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn delete_reports_missing() {
        let pool = test_pool().await;
        let b = BookingService::create(&pool, &clock(), input("1", "2026-02-05", "2026-02-08"))
            .await
            .unwrap();
        BookingService::delete(&pool, &b.id).await.unwrap();
        assert!(matches!(
            BookingService::delete(&pool, &b.id).await,
            Err(AppError::NotFound(_))
        ));
    }
}
