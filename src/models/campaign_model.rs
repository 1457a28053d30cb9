//! models/campaign_model.rs
//! Registro de campaña y su máquina de estados.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail, Error, Result};

use crate::models::provider_model::ProviderKind;

pub const DEFAULT_CAMPAIGN_NAME: &str = "Untitled Campaign";
pub const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Pending,
    Scheduled,
    Running,
    Completed,
    Failed,
    Stopped,
    Cancelled,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Pending => "pending",
            CampaignStatus::Scheduled => "scheduled",
            CampaignStatus::Running => "running",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Failed => "failed",
            CampaignStatus::Stopped => "stopped",
            CampaignStatus::Cancelled => "cancelled",
        }
    }

    /// completed, failed y cancelled: no hay más transiciones.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CampaignStatus::Completed | CampaignStatus::Failed | CampaignStatus::Cancelled
        )
    }

    /// Estados en los que el worker debe dejar de trabajar sin tocar nada.
    pub fn halts_engine(&self) -> bool {
        self.is_terminal() || *self == CampaignStatus::Stopped
    }

    pub fn can_transition_to(&self, next: CampaignStatus) -> bool {
        use CampaignStatus::*;
        match (*self, next) {
            (current, next) if current == next => !current.is_terminal(),
            (Pending, Scheduled) | (Pending, Running) | (Scheduled, Running) => true,
            (Running, Completed) => true,
            (Pending | Scheduled | Running, Failed | Cancelled | Stopped) => true,
            (Stopped, Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CampaignStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(CampaignStatus::Pending),
            "scheduled" => Ok(CampaignStatus::Scheduled),
            "running" => Ok(CampaignStatus::Running),
            "completed" => Ok(CampaignStatus::Completed),
            "failed" => Ok(CampaignStatus::Failed),
            "stopped" => Ok(CampaignStatus::Stopped),
            "cancelled" => Ok(CampaignStatus::Cancelled),
            other => Err(anyhow!("Unknown campaign status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub name: String,
    pub status: CampaignStatus,
    pub provider_kind: ProviderKind,
    pub provider_name: String,
    pub template_path: String,
    pub list_path: String,
    pub from: String,
    pub subject: String,
    /// Epoch en milisegundos
    pub start_time: i64,
    pub rate_limit_per_minute: u32,
    pub progress: u64,
    pub total: u64,
    pub rejected: u64,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// Límite por minuto efectivo (0 = usar el valor por defecto).
    pub fn effective_rate_limit(&self) -> u32 {
        if self.rate_limit_per_minute == 0 {
            DEFAULT_RATE_LIMIT_PER_MINUTE
        } else {
            self.rate_limit_per_minute
        }
    }

    pub fn remaining(&self) -> u64 {
        self.total.saturating_sub(self.progress)
    }
}

/// Datos validados para insertar una campaña nueva.
#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub name: String,
    pub provider_kind: ProviderKind,
    pub provider_name: String,
    pub template_path: String,
    pub list_path: String,
    pub from: String,
    pub subject: String,
    pub start_time: i64,
    pub rate_limit_per_minute: u32,
}

/// Resultado de un cambio de estado externo (cancel/stop).
#[derive(Debug, Clone, PartialEq)]
pub enum StatusChange {
    Updated(Campaign),
    NotFound,
    Rejected(CampaignStatus),
}

/// Request para crear una campaña (POST /api/campaigns)
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCampaignRequest {
    pub name: Option<String>,
    pub template_path: String,
    pub list_path: String,
    pub provider_kind: ProviderKind,
    #[serde(default)]
    pub provider_name: String,
    pub from: String,
    pub subject: String,
    pub rate_limit_per_minute: Option<u32>,
    /// Fecha RFC 3339 ("2025-01-10T10:00:00Z") o minutos desde ahora ("30").
    pub start_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateCampaignResponse {
    pub id: String,
    pub status: CampaignStatus,
    pub start_time: i64,
    pub message: String,
}

/// Interpreta el inicio programado: con ':' o '-' es una fecha, si no son minutos.
pub fn parse_start_at(raw: Option<&str>, now_ms: i64) -> Result<i64> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(now_ms),
        Some(v) => v,
    };

    if raw.contains(':') || raw.contains('-') {
        let parsed = DateTime::parse_from_rfc3339(raw)
            .map_err(|e| anyhow!("Invalid start_at '{}': {}", raw, e))?;
        return Ok(parsed.with_timezone(&Utc).timestamp_millis());
    }

    let minutes: i64 = raw
        .parse()
        .map_err(|_| anyhow!("Invalid start_at '{}': expected minutes or RFC 3339", raw))?;
    if minutes < 0 {
        bail!("Invalid start_at '{}': minutes must not be negative", raw);
    }
    minutes
        .checked_mul(60_000)
        .and_then(|delay| now_ms.checked_add(delay))
        .ok_or_else(|| anyhow!("Invalid start_at '{}': too far in the future", raw))
}
