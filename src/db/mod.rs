pub mod models;
pub mod repository;

pub use repository::*;

use sqlx::SqlitePool;

use crate::error::AppResult;

/// Cheap round-trip used by the health endpoint.
pub async fn ping(pool: &SqlitePool) -> AppResult<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Fresh in-memory database with all migrations applied.
///
/// A single connection that never expires, otherwise every new connection
/// would open a different empty in-memory database.
#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");
    pool
}

/// Migrated database in a file under `dir`. Needed where SQLite must write
/// real files, such as `VACUUM INTO`.
#[cfg(test)]
pub async fn file_test_pool(dir: &std::path::Path) -> SqlitePool {
    std::fs::create_dir_all(dir).expect("test database dir");
    let options = sqlx::sqlite::SqliteConnectOptions::new()
        .filename(dir.join("guesthouse.db"))
        .create_if_missing(true);
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("file sqlite");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");
    pool
}
