//! database.rs
//! Conexión SQLite compartida por el servidor y los workers.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use crate::config::app_config::AppConfig;

/// Varios procesos escriben el mismo archivo: WAL + busy_timeout.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn setup_database(config: &AppConfig) -> Result<Pool<Sqlite>> {
    // 1) Crear carpeta de datos
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create data dir {:?}", config.data_dir))?;

    // 2) Ruta final: <data_dir>/campaigns.db
    let db_url = format!("sqlite:{}", config.database_path().to_string_lossy());
    log::info!("Conectando a SQLite en {}", db_url);

    let options = SqliteConnectOptions::from_str(&db_url)
        .context("Invalid SQLite URL")?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    // 3) Conectarnos con SQLx
    let db_pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await
        .context("Failed to connect to SQLite database")?;

    run_migrations(&db_pool).await?;
    Ok(db_pool)
}

/// Corre migraciones con sqlx (campaigns + activity_logs)
pub async fn run_migrations(db_pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(db_pool)
        .await
        .context("Failed to run migrations")?;
    Ok(())
}
