//! tests/support.rs
//! Utilidades compartidas: SQLite temporal, reloj virtual y un proveedor falso.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Sqlite};
use tempfile::TempDir;

use crate::config::app_config::AppConfig;
use crate::config::provider_config::Settings;
use crate::database::setup_database;
use crate::models::campaign_model::{Campaign, CampaignStatus, NewCampaign};
use crate::models::email_model::{OutgoingEmail, SendReceipt};
use crate::models::provider_model::{ProviderAccount, ProviderKind};
use crate::services::campaign_service::CampaignService;
use crate::services::clock::Clock;
use crate::services::providers::{AdapterFactory, ProviderAdapter};

/// Base de datos nueva en un directorio temporal (se borra al soltar el TempDir).
pub async fn test_pool() -> (TempDir, Pool<Sqlite>) {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = AppConfig::for_data_dir(dir.path());
    let pool = setup_database(&config).await.expect("setup_database");
    (dir, pool)
}

pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write fixture");
    path
}

/// Una cuenta SMTP "main" sin límite de proveedor y una SES limitada.
pub fn test_settings() -> Settings {
    Settings::from_json(
        r#"{
            "smtpProviders": [{
                "name": "main",
                "host": "smtp.example.com",
                "port": 587,
                "username": "mailer",
                "password": "s3cret"
            }],
            "sesProviders": [{
                "name": "limited",
                "accessKeyId": "AKIDEXAMPLE",
                "secretAccessKey": "wJalrXUtnFEMI",
                "region": "us-east-1",
                "rateLimitCount": 100,
                "rateLimitPeriod": 1
            }],
            "fromEmails": ["news@example.com"]
        }"#,
    )
    .expect("settings json")
}

pub fn new_campaign(template: &Path, list: &Path, start_time: i64) -> NewCampaign {
    NewCampaign {
        name: "Spring News".to_string(),
        provider_kind: ProviderKind::Smtp,
        provider_name: "main".to_string(),
        template_path: template.to_string_lossy().to_string(),
        list_path: list.to_string_lossy().to_string(),
        from: "news@example.com".to_string(),
        subject: "Hello".to_string(),
        start_time,
        rate_limit_per_minute: 600,
    }
}

/// Inserta una campaña lista para correr ya mismo, con template y lista en `dir`.
pub async fn seed_campaign(
    campaigns: &CampaignService,
    dir: &Path,
    csv: &str,
    start_time: i64,
) -> Campaign {
    let template = write_file(dir, "template.html", "<p>Hi {{name}}</p>");
    let list = write_file(dir, "list.csv", csv);
    campaigns
        .create_campaign(new_campaign(&template, &list, start_time))
        .await
        .expect("create campaign")
}

pub async fn force_status(campaigns: &CampaignService, id: &str, status: CampaignStatus) {
    let mut c = campaigns.load(id).await.unwrap().unwrap();
    c.status = status;
    campaigns.save(&mut c, true).await.unwrap();
}

/// Reloj virtual: `sleep` avanza el tiempo al instante.
/// Opcionalmente observa el estado de una campaña en cada sleep y puede
/// cancelarla al llegar al sleep número N.
pub struct ManualClock {
    now_ms: Mutex<i64>,
    sleeps: Mutex<u32>,
    watched: Option<(CampaignService, String)>,
    cancel_on_sleep: Option<u32>,
    pub seen_statuses: Mutex<Vec<CampaignStatus>>,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        ManualClock {
            now_ms: Mutex::new(start_ms),
            sleeps: Mutex::new(0),
            watched: None,
            cancel_on_sleep: None,
            seen_statuses: Mutex::new(Vec::new()),
        }
    }

    pub fn starting_now() -> Self {
        Self::new(Utc::now().timestamp_millis())
    }

    pub fn watching(mut self, campaigns: CampaignService, id: &str) -> Self {
        self.watched = Some((campaigns, id.to_string()));
        self
    }

    pub fn cancel_on_sleep(mut self, n: u32) -> Self {
        self.cancel_on_sleep = Some(n);
        self
    }

    pub fn statuses(&self) -> Vec<CampaignStatus> {
        self.seen_statuses.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        *self.now_ms.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        let count = {
            let mut sleeps = self.sleeps.lock().unwrap();
            *sleeps += 1;
            *sleeps
        };

        if let Some((campaigns, id)) = &self.watched {
            if let Ok(Some(c)) = campaigns.load(id).await {
                self.seen_statuses.lock().unwrap().push(c.status);
            }
            if self.cancel_on_sleep == Some(count) {
                campaigns
                    .set_status(id, CampaignStatus::Cancelled)
                    .await
                    .unwrap();
            }
        }

        let millis = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        let mut now = self.now_ms.lock().unwrap();
        *now = now.saturating_add(millis);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentRecord {
    pub to: String,
    pub html_body: String,
    pub at_ms: i64,
}

/// Proveedor en memoria que registra cada envío.
pub struct FakeAdapter {
    sent: Mutex<Vec<SentRecord>>,
    failing: Vec<String>,
    connection_error: Option<String>,
    clock: Option<Arc<ManualClock>>,
    cancel_after: Option<(usize, CampaignService, String)>,
}

impl FakeAdapter {
    pub fn new() -> Self {
        FakeAdapter {
            sent: Mutex::new(Vec::new()),
            failing: Vec::new(),
            connection_error: None,
            clock: None,
            cancel_after: None,
        }
    }

    pub fn failing_for(mut self, address: &str) -> Self {
        self.failing.push(address.to_string());
        self
    }

    pub fn refusing_connection(mut self, error: &str) -> Self {
        self.connection_error = Some(error.to_string());
        self
    }

    pub fn with_clock(mut self, clock: Arc<ManualClock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Cancela la campaña desde "afuera" justo después del envío número `n`.
    pub fn cancel_after(mut self, n: usize, campaigns: CampaignService, id: &str) -> Self {
        self.cancel_after = Some((n, campaigns, id.to_string()));
        self
    }

    pub fn sent(&self) -> Vec<SentRecord> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderAdapter for FakeAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Smtp
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<SendReceipt> {
        let to = email.to.join(",");
        let at_ms = self.clock.as_ref().map(|c| c.now_ms()).unwrap_or_default();

        let count = {
            let mut sent = self.sent.lock().unwrap();
            sent.push(SentRecord {
                to: to.clone(),
                html_body: email.html_body.clone(),
                at_ms,
            });
            sent.len()
        };

        if let Some((n, campaigns, id)) = &self.cancel_after {
            if *n == count {
                campaigns
                    .set_status(id, CampaignStatus::Cancelled)
                    .await
                    .unwrap();
            }
        }

        if self.failing.contains(&to) {
            bail!("550 mailbox unavailable: {}", to);
        }
        Ok(SendReceipt {
            provider_message_id: Some(format!("fake-{}", count)),
        })
    }

    async fn test_connection(&self) -> Result<()> {
        match &self.connection_error {
            Some(e) => bail!("{}", e),
            None => Ok(()),
        }
    }
}

pub fn fake_factory(adapter: Arc<FakeAdapter>) -> AdapterFactory {
    Arc::new(
        move |_account: &ProviderAccount| -> Result<Arc<dyn ProviderAdapter>> {
            Ok(adapter.clone() as Arc<dyn ProviderAdapter>)
        },
    )
}
