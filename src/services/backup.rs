use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use sqlx::SqlitePool;

use crate::db::BookingRepository;
use crate::error::{AppError, AppResult};
use crate::i18n;
use crate::services::clock::PropertyClock;
use crate::services::notifications::Notifier;

/// First instant strictly after `now` at which the property clock shows `at`.
pub fn next_daily_run(now: DateTime<Utc>, clock: &PropertyClock, at: NaiveTime) -> DateTime<Utc> {
    let local_now = clock.local(now);
    let mut next = local_now.date().and_time(at);
    if next <= local_now {
        next += Duration::days(1);
    }
    clock.instant(next)
}

/// `5 февраля 2026`
fn format_caption_date(date: NaiveDate) -> String {
    format!(
        "{} {} {}",
        date.day(),
        i18n::t(&format!("month.{}", date.month())),
        date.year()
    )
}

/// Outcome of a completed backup run.
#[derive(Debug, Clone)]
pub struct BackupReport {
    pub file_name: String,
    pub size_bytes: u64,
    pub bookings: i64,
    pub delivered: usize,
}

/// Snapshots the database and ships the file to every operator chat.
pub struct BackupService {
    pool: SqlitePool,
    notifier: Arc<dyn Notifier>,
    operators: Vec<i64>,
    clock: PropertyClock,
    dir: PathBuf,
}

impl BackupService {
    pub fn new(
        pool: SqlitePool,
        notifier: Arc<dyn Notifier>,
        operators: Vec<i64>,
        clock: PropertyClock,
        dir: PathBuf,
    ) -> Self {
        Self {
            pool,
            notifier,
            operators,
            clock,
            dir,
        }
    }

    /// Returns `Ok(None)` when there is nobody to send the backup to.
    /// The snapshot file is removed afterwards whatever happened.
    pub async fn create_and_send(&self, now: DateTime<Utc>) -> AppResult<Option<BackupReport>> {
        if self.operators.is_empty() {
            tracing::warn!("Backup skipped: no operator chats configured");
            return Ok(None);
        }

        let today = self.clock.local(now).date();
        let file_name = format!("backup-{}.db", today.format("%Y-%m-%d"));
        let path = self.dir.join(&file_name);

        tracing::info!("Creating database backup {}", path.display());
        let result = self.snapshot_and_send(&path, today).await;

        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove backup file {}: {}", path.display(), e);
            }
        }

        match result {
            Ok((size_bytes, bookings, delivered)) => {
                tracing::info!(
                    "Backup {} sent to {}/{} chats",
                    file_name,
                    delivered,
                    self.operators.len()
                );
                Ok(Some(BackupReport {
                    file_name,
                    size_bytes,
                    bookings,
                    delivered,
                }))
            }
            Err(e) => {
                tracing::error!("Backup failed: {}", e);
                Err(e)
            }
        }
    }

    async fn snapshot_and_send(&self, path: &Path, today: NaiveDate) -> AppResult<(u64, i64, usize)> {
        tokio::fs::create_dir_all(&self.dir).await?;
        // VACUUM INTO refuses to overwrite
        if tokio::fs::try_exists(path).await? {
            tokio::fs::remove_file(path).await?;
        }

        let target = path
            .to_str()
            .ok_or_else(|| AppError::Config(format!("Non UTF-8 backup path: {}", path.display())))?;
        sqlx::query("VACUUM INTO ?")
            .bind(target)
            .execute(&self.pool)
            .await?;

        let size_bytes = tokio::fs::metadata(path).await?.len();
        let bookings = BookingRepository::count(&self.pool).await?;

        let caption = i18n::t_with(
            "backup.caption",
            &[
                ("date", format_caption_date(today).as_str()),
                ("size", format!("{:.2}", size_bytes as f64 / 1024.0).as_str()),
                ("count", bookings.to_string().as_str()),
            ],
        );

        let mut delivered = 0;
        for &chat_id in &self.operators {
            match self.notifier.send_document(chat_id, path, &caption).await {
                Ok(()) => {
                    delivered += 1;
                    tracing::debug!("Backup sent to chat {}", chat_id);
                }
                Err(e) => tracing::warn!("Failed to send backup to chat {}: {}", chat_id, e),
            }
        }

        Ok((size_bytes, bookings, delivered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{file_test_pool, test_pool};
    use crate::services::notifications::tests::RecordingNotifier;
    use chrono::{FixedOffset, TimeZone};

    fn clock() -> PropertyClock {
        PropertyClock::new(FixedOffset::east_opt(3 * 3600).unwrap())
    }

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("guesthouse-backup-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn next_run_is_later_today_or_tomorrow() {
        let three = NaiveTime::from_hms_opt(3, 0, 0).unwrap();

        // 01:00 Moscow -> 03:00 the same day
        let now = Utc.with_ymd_and_hms(2026, 2, 4, 22, 0, 0).unwrap();
        assert_eq!(
            next_daily_run(now, &clock(), three),
            Utc.with_ymd_and_hms(2026, 2, 5, 0, 0, 0).unwrap()
        );

        // exactly 03:00 Moscow -> tomorrow
        let now = Utc.with_ymd_and_hms(2026, 2, 5, 0, 0, 0).unwrap();
        assert_eq!(
            next_daily_run(now, &clock(), three),
            Utc.with_ymd_and_hms(2026, 2, 6, 0, 0, 0).unwrap()
        );

        // noon Moscow -> tomorrow 03:00
        let now = Utc.with_ymd_and_hms(2026, 2, 5, 9, 0, 0).unwrap();
        let next = next_daily_run(now, &clock(), three);
        assert!(next > now);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 2, 6, 0, 0, 0).unwrap());
    }

    #[test]
    fn caption_date_is_russian() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 5).unwrap();
        assert_eq!(format_caption_date(date), "5 февраля 2026");
    }

    #[tokio::test]
    async fn backup_is_sent_to_every_operator_and_removed() {
        let scratch = scratch_dir();
        let pool = file_test_pool(&scratch).await;
        let dir = scratch.join("backups");
        let recorder = Arc::new(RecordingNotifier {
            failing: vec![2],
            ..Default::default()
        });
        let service = BackupService::new(pool, recorder.clone(), vec![1, 2, 3], clock(), dir.clone());

        let now = Utc.with_ymd_and_hms(2026, 2, 5, 0, 0, 0).unwrap();
        let report = service.create_and_send(now).await.unwrap().unwrap();

        assert_eq!(report.file_name, "backup-2026-02-05.db");
        assert_eq!(report.bookings, 0);
        assert_eq!(report.delivered, 2);
        assert!(report.size_bytes > 0);

        let documents = recorder.documents.lock().unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].0, 1);
        assert_eq!(documents[1].0, 3);
        assert!(documents[0].2.contains("5 февраля 2026"));
        assert!(documents[0].2.contains("Бронирований: 0"));
        assert!(!dir.join("backup-2026-02-05.db").exists());

        let _ = std::fs::remove_dir_all(&scratch);
    }

    #[tokio::test]
    async fn failed_backup_removes_the_snapshot() {
        let scratch = scratch_dir();
        let pool = file_test_pool(&scratch).await;
        let dir = scratch.join("backups");

        // The snapshot still succeeds, counting bookings afterwards does not.
        sqlx::query("DROP TABLE bookings").execute(&pool).await.unwrap();

        let recorder = Arc::new(RecordingNotifier::default());
        let service = BackupService::new(pool, recorder.clone(), vec![1], clock(), dir.clone());

        let now = Utc.with_ymd_and_hms(2026, 2, 5, 0, 0, 0).unwrap();
        let result = service.create_and_send(now).await;

        assert!(matches!(result, Err(AppError::Database(_))));
        assert!(dir.exists());
        assert!(!dir.join("backup-2026-02-05.db").exists());
        assert!(recorder.documents.lock().unwrap().is_empty());

        let _ = std::fs::remove_dir_all(&scratch);
    }

    #[tokio::test]
    async fn no_operators_skips_backup() {
        let pool = test_pool().await;
        let recorder = Arc::new(RecordingNotifier::default());
        let service = BackupService::new(pool, recorder.clone(), vec![], clock(), scratch_dir());

        let report = service.create_and_send(Utc::now()).await.unwrap();
        assert!(report.is_none());
        assert!(recorder.documents.lock().unwrap().is_empty());
    }
}
