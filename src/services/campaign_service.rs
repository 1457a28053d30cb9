//! services/campaign_service.rs
//! Almacén de campañas sobre SQLite. Cada `save` sobrescribe el registro completo;
//! no hay locks: el worker relee antes de confiar en su copia.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};
use uuid::Uuid;

use crate::models::campaign_model::{Campaign, CampaignStatus, NewCampaign, StatusChange};

const SELECT_COLUMNS: &str = r#"
    SELECT id, name, status, provider_kind, provider_name, template_path, list_path,
           from_address, subject, start_time, rate_limit_per_minute, progress, total,
           rejected, error_message, created_at, updated_at
    FROM campaigns
"#;

#[derive(Clone, Debug)]
pub struct CampaignService {
    db_pool: Pool<Sqlite>,
}

impl CampaignService {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        CampaignService { db_pool }
    }

    /// Crea la campaña con estado "pending" (o "scheduled" si empieza en el futuro).
    pub async fn create_campaign(&self, new: NewCampaign) -> Result<Campaign> {
        let now = Utc::now();
        let status = if new.start_time > now.timestamp_millis() {
            CampaignStatus::Scheduled
        } else {
            CampaignStatus::Pending
        };

        let mut campaign = Campaign {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            status,
            provider_kind: new.provider_kind,
            provider_name: new.provider_name,
            template_path: new.template_path,
            list_path: new.list_path,
            from: new.from,
            subject: new.subject,
            start_time: new.start_time,
            rate_limit_per_minute: new.rate_limit_per_minute,
            progress: 0,
            total: 0,
            rejected: 0,
            error: None,
            created_at: now,
            updated_at: now,
        };

        self.save(&mut campaign, false)
            .await
            .context("Failed to insert campaign")?;
        Ok(campaign)
    }

    /// Obtiene una campaña; `None` si no existe.
    pub async fn load(&self, id: &str) -> Result<Option<Campaign>> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await
            .context("Failed to read campaign")?;

        row.map(|r| campaign_from_row(&r)).transpose()
    }

    /// Sobrescribe el registro completo (sin merge de campos).
    pub async fn save(&self, campaign: &mut Campaign, bump_timestamp: bool) -> Result<()> {
        if bump_timestamp {
            campaign.updated_at = Utc::now();
        }

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO campaigns (
                id, name, status, provider_kind, provider_name, template_path, list_path,
                from_address, subject, start_time, rate_limit_per_minute, progress, total,
                rejected, error_message, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
        )
        .bind(&campaign.id)
        .bind(&campaign.name)
        .bind(campaign.status.as_str())
        .bind(campaign.provider_kind.as_str())
        .bind(&campaign.provider_name)
        .bind(&campaign.template_path)
        .bind(&campaign.list_path)
        .bind(&campaign.from)
        .bind(&campaign.subject)
        .bind(campaign.start_time)
        .bind(i64::from(campaign.rate_limit_per_minute))
        .bind(campaign.progress as i64)
        .bind(campaign.total as i64)
        .bind(campaign.rejected as i64)
        .bind(campaign.error.as_deref())
        .bind(campaign.created_at.to_rfc3339())
        .bind(campaign.updated_at.to_rfc3339())
        .execute(&self.db_pool)
        .await
        .context("Failed to save campaign")?;

        Ok(())
    }

    /// Lista todas las campañas, las más recientes primero. Si la tabla no se
    /// puede leer se devuelve una lista vacía; filas corruptas se omiten.
    pub async fn list_campaigns(&self) -> Vec<Campaign> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY start_time DESC");
        let rows = match sqlx::query(&sql).fetch_all(&self.db_pool).await {
            Ok(rows) => rows,
            Err(e) => {
                log::warn!("(list_campaigns) No se pudo leer campaigns: {:?}", e);
                return Vec::new();
            }
        };

        rows.iter()
            .filter_map(|row| match campaign_from_row(row) {
                Ok(c) => Some(c),
                Err(e) => {
                    log::warn!("(list_campaigns) Fila de campaña inválida, se omite: {:?}", e);
                    None
                }
            })
            .collect()
    }

    /// Cambio de estado hecho por un actor externo (cancel/stop desde la API).
    pub async fn set_status(&self, id: &str, status: CampaignStatus) -> Result<StatusChange> {
        let mut campaign = match self.load(id).await? {
            Some(c) => c,
            None => return Ok(StatusChange::NotFound),
        };

        if !campaign.status.can_transition_to(status) {
            return Ok(StatusChange::Rejected(campaign.status));
        }

        campaign.status = status;
        self.save(&mut campaign, true).await?;
        Ok(StatusChange::Updated(campaign))
    }

    pub async fn delete_campaign(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM campaigns WHERE id = ?1")
            .bind(id)
            .execute(&self.db_pool)
            .await
            .context("Failed to delete campaign")?;
        Ok(result.rows_affected() > 0)
    }
}

fn campaign_from_row(row: &SqliteRow) -> Result<Campaign> {
    let status: String = row.try_get("status")?;
    let provider_kind: String = row.try_get("provider_kind")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Campaign {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        status: status.parse()?,
        provider_kind: provider_kind.parse()?,
        provider_name: row.try_get("provider_name")?,
        template_path: row.try_get("template_path")?,
        list_path: row.try_get("list_path")?,
        from: row.try_get("from_address")?,
        subject: row.try_get("subject")?,
        start_time: row.try_get("start_time")?,
        rate_limit_per_minute: u32::try_from(non_negative(row.try_get("rate_limit_per_minute")?))
            .unwrap_or(u32::MAX),
        progress: non_negative(row.try_get("progress")?),
        total: non_negative(row.try_get("total")?),
        rejected: non_negative(row.try_get("rejected")?),
        error: row.try_get("error_message")?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn non_negative(value: i64) -> u64 {
    value.max(0) as u64
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Invalid timestamp '{}'", raw))?
        .with_timezone(&Utc))
}
