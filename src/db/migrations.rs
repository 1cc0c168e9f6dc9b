//! Watermark database setup.
//!
//! Migrations are numbered; the last one applied is recorded in SQLite's
//! `user_version` so restarts only run what is new.

use sqlx::sqlite::{SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use tracing::{debug, info};

/// `(version, sql)` in apply order.
const MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("schema.sql"))];

/// Open the watermark database and bring its schema up to date.
///
/// `":memory:"` opens a private in-memory database on a single connection.
pub async fn init_db(db_path: &str) -> Result<SqlitePool, sqlx::Error> {
    let in_memory = db_path == ":memory:";
    let url = if in_memory {
        "sqlite::memory:".to_string()
    } else {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        format!("sqlite:{}?mode=rwc", db_path)
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(if in_memory { 1 } else { 2 })
        .after_connect(move |conn, _meta| {
            Box::pin(async move { configure_connection(conn, in_memory).await })
        })
        .connect(&url)
        .await?;

    let version = run_migrations(&pool).await?;
    info!(path = %db_path, schema_version = version, "Watermark database ready");
    Ok(pool)
}

/// Apply pending migrations; returns the resulting schema version.
async fn run_migrations(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    let applied: i64 = sqlx::query("PRAGMA user_version")
        .fetch_one(pool)
        .await?
        .get(0);

    let mut current = applied;
    for (version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > applied) {
        debug!(version, "Applying watermark migration");
        let mut tx = pool.begin().await?;
        for statement in sql.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        // PRAGMA does not accept bound parameters.
        sqlx::query(&format!("PRAGMA user_version = {}", version))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        current = *version;
    }

    Ok(current)
}

async fn configure_connection(
    conn: &mut SqliteConnection,
    in_memory: bool,
) -> Result<(), sqlx::Error> {
    if !in_memory {
        let mode: String = sqlx::query("PRAGMA journal_mode = WAL")
            .fetch_one(&mut *conn)
            .await?
            .get(0);
        debug!(journal_mode = %mode, "SQLite journal mode");
        sqlx::query("PRAGMA synchronous = NORMAL")
            .execute(&mut *conn)
            .await?;
    }
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&mut *conn)
        .await?;
    Ok(())
}
