//! services/activity_log_service.rs
//! Bitácora estructurada (timestamp, nivel, categoría, mensaje, detalles) persistida
//! en `activity_logs`, recortada a las N entradas más recientes.
//! Escribir en la bitácora nunca debe romper al llamador.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Pool, Row, Sqlite};

use crate::config::app_config::DEFAULT_LOG_LIMIT;
use crate::models::log_model::{LogCategory, LogEntry, LogLevel};

#[derive(Clone, Debug)]
pub struct ActivityLogService {
    db_pool: Pool<Sqlite>,
    max_entries: u32,
}

impl ActivityLogService {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        Self::with_limit(db_pool, DEFAULT_LOG_LIMIT)
    }

    pub fn with_limit(db_pool: Pool<Sqlite>, max_entries: u32) -> Self {
        ActivityLogService {
            db_pool,
            max_entries: max_entries.max(1),
        }
    }

    /// Agrega una entrada y la replica en el log del proceso.
    pub async fn write(
        &self,
        level: LogLevel,
        category: LogCategory,
        message: &str,
        details: Option<serde_json::Value>,
    ) {
        match level {
            LogLevel::Error => log::error!("[{}] {}", category, message),
            LogLevel::Warning => log::warn!("[{}] {}", category, message),
            LogLevel::Info | LogLevel::Success => log::info!("[{}] {}", category, message),
        }

        if let Err(e) = self.append(level, category, message, details).await {
            log::warn!("(ActivityLogService::write) No se pudo persistir la entrada: {:?}", e);
        }
    }

    async fn append(
        &self,
        level: LogLevel,
        category: LogCategory,
        message: &str,
        details: Option<serde_json::Value>,
    ) -> Result<()> {
        let now = Utc::now().timestamp_millis();
        let details = details.map(|d| d.to_string());

        sqlx::query(
            r#"
            INSERT INTO activity_logs (timestamp, level, category, message, details)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(now)
        .bind(level.as_str())
        .bind(category.as_str())
        .bind(message)
        .bind(details)
        .execute(&self.db_pool)
        .await
        .context("Failed to insert activity log entry")?;

        // Recortar: sólo las últimas `max_entries`
        sqlx::query(
            r#"
            DELETE FROM activity_logs
            WHERE id NOT IN (
                SELECT id FROM activity_logs ORDER BY id DESC LIMIT ?1
            )
            "#,
        )
        .bind(i64::from(self.max_entries))
        .execute(&self.db_pool)
        .await
        .context("Failed to trim activity log")?;

        Ok(())
    }

    pub async fn info(&self, category: LogCategory, message: &str) {
        self.write(LogLevel::Info, category, message, None).await
    }

    pub async fn success(&self, category: LogCategory, message: &str) {
        self.write(LogLevel::Success, category, message, None).await
    }

    pub async fn warning(&self, category: LogCategory, message: &str, details: serde_json::Value) {
        self.write(LogLevel::Warning, category, message, Some(details))
            .await
    }

    pub async fn error(&self, category: LogCategory, message: &str, details: serde_json::Value) {
        self.write(LogLevel::Error, category, message, Some(details))
            .await
    }

    /// Últimas `limit` entradas, en orden cronológico.
    pub async fn read_recent(&self, limit: u32) -> Result<Vec<LogEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, timestamp, level, category, message, details
            FROM activity_logs
            ORDER BY id DESC
            LIMIT ?1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.db_pool)
        .await
        .context("Failed to read activity log")?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows.iter().rev() {
            let level: String = row.try_get("level")?;
            let category: String = row.try_get("category")?;
            let details: Option<String> = row.try_get("details")?;
            entries.push(LogEntry {
                id: row.try_get("id")?,
                timestamp: row.try_get("timestamp")?,
                level: level.parse()?,
                category: category.parse()?,
                message: row.try_get("message")?,
                details: details.and_then(|d| serde_json::from_str(&d).ok()),
            });
        }
        Ok(entries)
    }

    pub async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM activity_logs")
            .execute(&self.db_pool)
            .await
            .context("Failed to clear activity log")?;
        Ok(())
    }
}
