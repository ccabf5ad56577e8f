use chrono::NaiveDateTime;
use sqlx::{SqliteExecutor, SqlitePool};

use crate::db::models::*;
use crate::error::{AppError, AppResult};

const COLUMNS: &str = "id, room_id, guest_name, guest_phone, contact_channel, contact_source, \
     check_in, check_out, adults, kids, parking, early_check_in, early_check_in_time, \
     late_check_out, late_check_out_time, daily_price, total_price, prepayment, status, \
     comment, created_at, notification_24h_sent, notification_2h_sent";

fn into_booking(row: BookingRow) -> AppResult<Booking> {
    Booking::try_from(row).map_err(|e| AppError::Internal(anyhow::anyhow!(e)))
}

fn into_bookings(rows: Vec<BookingRow>) -> AppResult<Vec<Booking>> {
    rows.into_iter().map(into_booking).collect()
}

// ============================================================================
// Booking Repository
// ============================================================================

/// Storage for bookings. Every method takes an executor so callers can run
/// a read-check-write sequence inside one transaction.
pub struct BookingRepository;

impl BookingRepository {
    /// All bookings, newest first.
    pub async fn list_all<'e, E>(executor: E) -> AppResult<Vec<Booking>>
    where
        E: SqliteExecutor<'e>,
    {
        let sql = format!(
            "SELECT {} FROM bookings ORDER BY created_at DESC, id DESC",
            COLUMNS
        );
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .fetch_all(executor)
            .await
            .map_err(AppError::Database)?;

        into_bookings(rows)
    }

    pub async fn find_by_id<'e, E>(executor: E, id: &str) -> AppResult<Option<Booking>>
    where
        E: SqliteExecutor<'e>,
    {
        let sql = format!("SELECT {} FROM bookings WHERE id = ?", COLUMNS);
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await
            .map_err(AppError::Database)?;

        row.map(into_booking).transpose()
    }

    pub async fn insert<'e, E>(
        executor: E,
        record: &BookingRecord,
        created_at: NaiveDateTime,
    ) -> AppResult<Booking>
    where
        E: SqliteExecutor<'e>,
    {
        let sql = format!(
            r#"
            INSERT INTO bookings (
                id, room_id, guest_name, guest_phone, contact_channel, contact_source,
                check_in, check_out, adults, kids, parking, early_check_in, early_check_in_time,
                late_check_out, late_check_out_time, daily_price, total_price, prepayment,
                status, comment, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            COLUMNS
        );

        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(&record.id)
            .bind(&record.room_id)
            .bind(&record.guest_name)
            .bind(&record.guest_phone)
            .bind(record.contact_channel.map(ContactChannel::as_str))
            .bind(&record.contact_source)
            .bind(record.check_in)
            .bind(record.check_out)
            .bind(record.adults)
            .bind(record.kids)
            .bind(record.parking)
            .bind(record.early_check_in)
            .bind(&record.early_check_in_time)
            .bind(record.late_check_out)
            .bind(&record.late_check_out_time)
            .bind(record.daily_price)
            .bind(record.total_price)
            .bind(record.prepayment)
            .bind(record.status.as_str())
            .bind(&record.comment)
            .bind(created_at)
            .fetch_one(executor)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    AppError::Conflict(format!("Booking {} already exists", record.id))
                }
                other => AppError::Database(other),
            })?;

        into_booking(row)
    }

    /// Overwrite every editable field. Reminder flags and `created_at` are kept.
    pub async fn update<'e, E>(executor: E, record: &BookingRecord) -> AppResult<Option<Booking>>
    where
        E: SqliteExecutor<'e>,
    {
        let sql = format!(
            r#"
            UPDATE bookings
            SET room_id = ?, guest_name = ?, guest_phone = ?, contact_channel = ?,
                contact_source = ?, check_in = ?, check_out = ?, adults = ?, kids = ?,
                parking = ?, early_check_in = ?, early_check_in_time = ?, late_check_out = ?,
                late_check_out_time = ?, daily_price = ?, total_price = ?, prepayment = ?,
                status = ?, comment = ?
            WHERE id = ?
            RETURNING {}
            "#,
            COLUMNS
        );

        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(&record.room_id)
            .bind(&record.guest_name)
            .bind(&record.guest_phone)
            .bind(record.contact_channel.map(ContactChannel::as_str))
            .bind(&record.contact_source)
            .bind(record.check_in)
            .bind(record.check_out)
            .bind(record.adults)
            .bind(record.kids)
            .bind(record.parking)
            .bind(record.early_check_in)
            .bind(&record.early_check_in_time)
            .bind(record.late_check_out)
            .bind(&record.late_check_out_time)
            .bind(record.daily_price)
            .bind(record.total_price)
            .bind(record.prepayment)
            .bind(record.status.as_str())
            .bind(&record.comment)
            .bind(&record.id)
            .fetch_optional(executor)
            .await
            .map_err(AppError::Database)?;

        row.map(into_booking).transpose()
    }

    pub async fn update_status<'e, E>(
        executor: E,
        id: &str,
        status: BookingStatus,
    ) -> AppResult<Option<Booking>>
    where
        E: SqliteExecutor<'e>,
    {
        let sql = format!(
            "UPDATE bookings SET status = ? WHERE id = ? RETURNING {}",
            COLUMNS
        );
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(status.as_str())
            .bind(id)
            .fetch_optional(executor)
            .await
            .map_err(AppError::Database)?;

        row.map(into_booking).transpose()
    }

    /// Returns `false` when nothing was deleted.
    pub async fn delete<'e, E>(executor: E, id: &str) -> AppResult<bool>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM bookings WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    /// Confirmed or prepaid bookings whose check-in is strictly after `after`,
    /// earliest first. This is the reminder scan's candidate set.
    pub async fn list_awaiting_arrival_after(
        pool: &SqlitePool,
        after: NaiveDateTime,
    ) -> AppResult<Vec<Booking>> {
        let statuses: Vec<BookingStatus> = BookingStatus::ALL
            .into_iter()
            .filter(|s| s.awaits_arrival())
            .collect();
        let placeholders = vec!["?"; statuses.len()].join(", ");
        let sql = format!(
            r#"
            SELECT {} FROM bookings
            WHERE status IN ({}) AND check_in > ?
            ORDER BY check_in ASC
            "#,
            COLUMNS, placeholders
        );
        let mut query = sqlx::query_as::<_, BookingRow>(&sql);
        for status in statuses {
            query = query.bind(status.as_str());
        }
        let rows = query
            .bind(after)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)?;

        into_bookings(rows)
    }

    /// Persist that the reminder for `window` has been attempted. Never cleared.
    pub async fn mark_reminder_sent(
        pool: &SqlitePool,
        id: &str,
        window: ReminderWindow,
    ) -> AppResult<()> {
        let sql = format!(
            "UPDATE bookings SET {} = TRUE WHERE id = ?",
            window.flag_column()
        );
        sqlx::query(&sql)
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }

    pub async fn count(pool: &SqlitePool) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings")
            .fetch_one(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(count)
    }
}
