//! services/campaign_runner.rs
//! Motor de una campaña: valida, espera el inicio, envía en ráfagas y persiste el
//! avance después de cada destinatario. Corre en su propio proceso (mailout-worker).
//!
//! Antes de cada espera, ráfaga, envío y escritura se relee el registro: si otro
//! actor lo dejó en cancelled/stopped/completed/failed (o lo borró) el motor se
//! retira sin tocar el estado.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;

use crate::config::provider_config::ConfigProvider;
use crate::models::campaign_model::{Campaign, CampaignStatus};
use crate::models::email_model::OutgoingEmail;
use crate::models::log_model::LogCategory;
use crate::models::recipient_model::Recipient;
use crate::services::activity_log_service::ActivityLogService;
use crate::services::campaign_service::CampaignService;
use crate::services::clock::{Clock, SystemClock};
use crate::services::providers::{default_adapter_factory, AdapterFactory, ProviderAdapter};
use crate::services::rate_scheduler::{RatePlan, SEND_PACING};
use crate::services::recipient_loader::parse_recipients;
use crate::services::template_service;

/// Intervalo máximo entre relecturas del registro durante una espera.
pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// El registro ya estaba en un estado que no se retoma.
    AlreadyFinished(CampaignStatus),
    /// Un actor externo detuvo la campaña durante la ejecución.
    Interrupted(CampaignStatus),
    Deleted,
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Campaign {0} not found")]
    NotFound(String),
    #[error("Campaign store error: {0:#}")]
    Store(anyhow::Error),
    /// La campaña quedó en `failed` con este mensaje.
    #[error("Campaign failed: {0}")]
    Failed(String),
}

/// Motivo por el que el motor debe retirarse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Halt {
    Status(CampaignStatus),
    Deleted,
}

impl From<Halt> for RunOutcome {
    fn from(halt: Halt) -> Self {
        match halt {
            Halt::Status(status) => RunOutcome::Interrupted(status),
            Halt::Deleted => RunOutcome::Deleted,
        }
    }
}

/// Todo lo que la validación deja listo para el loop de envío.
struct Prepared {
    template: String,
    recipients: Vec<Recipient>,
    adapter: Arc<dyn ProviderAdapter>,
    plan: RatePlan,
}

pub struct CampaignRunner {
    campaigns: CampaignService,
    activity: ActivityLogService,
    settings: Arc<dyn ConfigProvider>,
    adapters: AdapterFactory,
    clock: Arc<dyn Clock>,
    rng: StdRng,
    send_pacing: Duration,
    poll_interval: Duration,
}

impl CampaignRunner {
    pub fn new(
        campaigns: CampaignService,
        activity: ActivityLogService,
        settings: Arc<dyn ConfigProvider>,
    ) -> Self {
        CampaignRunner {
            campaigns,
            activity,
            settings,
            adapters: default_adapter_factory(),
            clock: Arc::new(SystemClock),
            rng: StdRng::from_entropy(),
            send_pacing: SEND_PACING,
            poll_interval: POLL_INTERVAL,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_adapter_factory(mut self, adapters: AdapterFactory) -> Self {
        self.adapters = adapters;
        self
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Ejecuta la campaña `id` hasta completarla, fallar o ser detenida.
    pub async fn run(&mut self, id: &str) -> Result<RunOutcome, RunError> {
        let campaign = self
            .campaigns
            .load(id)
            .await
            .map_err(RunError::Store)?
            .ok_or_else(|| RunError::NotFound(id.to_string()))?;

        if campaign.status.halts_engine() {
            log::info!(
                "(run) Campaña {} ya está en estado '{}', nada que hacer",
                id,
                campaign.status
            );
            return Ok(RunOutcome::AlreadyFinished(campaign.status));
        }

        let result = self.execute(campaign).await;
        match result {
            Ok(outcome) => Ok(outcome),
            Err(e) => self.fail(id, format!("{:#}", e)).await,
        }
    }

    async fn execute(&mut self, mut campaign: Campaign) -> Result<RunOutcome> {
        self.activity
            .info(
                LogCategory::Campaign,
                &format!("Starting campaign '{}' ({})", campaign.name, campaign.id),
            )
            .await;

        let prepared = self.prepare(&campaign).await?;

        if campaign.total != 0 && campaign.total != prepared.recipients.len() as u64 {
            bail!(
                "Recipient list changed: expected {} rows, found {}",
                campaign.total,
                prepared.recipients.len()
            );
        }
        campaign.total = prepared.recipients.len() as u64;

        if campaign.start_time > self.clock.now_ms() && campaign.status == CampaignStatus::Pending
        {
            campaign.status = CampaignStatus::Scheduled;
        }
        if let Some(halt) = self.persist(&mut campaign).await? {
            return Ok(halt.into());
        }

        if let Some(halt) = self.wait_until(&campaign.id, campaign.start_time).await? {
            return Ok(halt.into());
        }

        campaign.status = CampaignStatus::Running;
        if let Some(halt) = self.persist(&mut campaign).await? {
            return Ok(halt.into());
        }
        self.activity
            .info(
                LogCategory::Campaign,
                &format!(
                    "Campaign '{}' running: {} of {} recipients left, {} per window of {}s",
                    campaign.name,
                    campaign.remaining(),
                    campaign.total,
                    prepared.plan.burst_size,
                    prepared.plan.window.as_secs()
                ),
            )
            .await;

        if let Some(halt) = self.send_loop(&mut campaign, &prepared).await? {
            return Ok(halt.into());
        }

        campaign.status = CampaignStatus::Completed;
        if let Some(halt) = self.persist(&mut campaign).await? {
            return Ok(halt.into());
        }
        self.activity
            .success(
                LogCategory::Campaign,
                &format!(
                    "Campaign '{}' completed: {} sent, {} rejected",
                    campaign.name,
                    campaign.progress.saturating_sub(campaign.rejected),
                    campaign.rejected
                ),
            )
            .await;

        Ok(RunOutcome::Completed)
    }

    /// Validación previa: template, lista, cuenta y prueba de conexión.
    /// Cualquier error aquí es fatal y no se envía nada.
    async fn prepare(&self, campaign: &Campaign) -> Result<Prepared> {
        let template = tokio::fs::read_to_string(&campaign.template_path)
            .await
            .with_context(|| format!("Failed to read template '{}'", campaign.template_path))?;

        let raw_list = tokio::fs::read_to_string(&campaign.list_path)
            .await
            .with_context(|| format!("Failed to read recipient list '{}'", campaign.list_path))?;
        let recipients = parse_recipients(&raw_list)
            .map_err(|e| anyhow!("Invalid recipient list '{}': {}", campaign.list_path, e))?;

        let account = self
            .settings
            .provider_account(campaign.provider_kind, &campaign.provider_name)
            .ok_or_else(|| {
                anyhow!(
                    "Provider {} '{}' not found in settings",
                    campaign.provider_kind,
                    campaign.provider_name
                )
            })?;

        let adapter = (self.adapters)(&account)?;
        adapter.test_connection().await.with_context(|| {
            format!(
                "Connection test failed for {} '{}'",
                account.kind(),
                account.name()
            )
        })?;

        let plan = RatePlan::derive(account.rate_limit(), campaign.effective_rate_limit());
        log::info!(
            "(prepare) Campaña {}: {} destinatarios vía {} '{}', plan {:?}",
            campaign.id,
            recipients.len(),
            account.kind(),
            account.name(),
            plan
        );

        Ok(Prepared {
            template,
            recipients,
            adapter,
            plan,
        })
    }

    async fn send_loop(
        &mut self,
        campaign: &mut Campaign,
        prepared: &Prepared,
    ) -> Result<Option<Halt>> {
        let window_ms = duration_ms(prepared.plan.window);

        while campaign.progress < campaign.total {
            let window_start = self.clock.now_ms();
            let bursts = prepared
                .plan
                .plan_window(&mut self.rng, campaign.remaining());

            for burst in bursts {
                let due = window_start.saturating_add(duration_ms(burst.offset));
                if let Some(halt) = self.wait_until(&campaign.id, due).await? {
                    return Ok(Some(halt));
                }

                for i in 0..burst.size {
                    if i > 0 {
                        self.clock.sleep(self.send_pacing).await;
                    }
                    if let Some(halt) = self.check_halt(&campaign.id).await? {
                        return Ok(Some(halt));
                    }
                    if campaign.progress >= campaign.total {
                        break;
                    }

                    self.send_next(campaign, prepared).await;

                    if let Some(halt) = self.persist(campaign).await? {
                        return Ok(Some(halt));
                    }
                }
            }

            if campaign.progress < campaign.total {
                let window_end = window_start.saturating_add(window_ms);
                if let Some(halt) = self.wait_until(&campaign.id, window_end).await? {
                    return Ok(Some(halt));
                }
            }
        }

        Ok(None)
    }

    /// Envía al destinatario en `progress`. Un fallo cuenta como rechazo y nunca
    /// detiene la campaña.
    async fn send_next(&self, campaign: &mut Campaign, prepared: &Prepared) {
        let index = campaign.progress as usize;
        let Some(recipient) = prepared.recipients.get(index) else {
            campaign.progress = campaign.total;
            return;
        };

        match recipient.email() {
            None => {
                campaign.rejected += 1;
                self.activity
                    .warning(
                        LogCategory::Email,
                        &format!("Recipient row {} has no email address", index + 1),
                        json!({ "campaignId": campaign.id, "row": index + 1 }),
                    )
                    .await;
            }
            Some(to) => {
                let body = template_service::render(&prepared.template, recipient);
                let email = OutgoingEmail::single(&campaign.from, to, &campaign.subject, body);

                match prepared.adapter.send(&email).await {
                    Ok(receipt) => {
                        log::debug!(
                            "(send_next) Enviado a {} (id proveedor: {:?})",
                            to,
                            receipt.provider_message_id
                        );
                    }
                    Err(e) => {
                        campaign.rejected += 1;
                        self.activity
                            .error(
                                LogCategory::Email,
                                &format!("Failed to send to {}", to),
                                json!({
                                    "campaignId": campaign.id,
                                    "provider": prepared.adapter.kind().as_str(),
                                    "error": format!("{:#}", e),
                                }),
                            )
                            .await;
                    }
                }
            }
        }

        campaign.progress += 1;
    }

    /// Relee el registro; `Some` si el motor debe retirarse.
    async fn check_halt(&self, id: &str) -> Result<Option<Halt>> {
        let halt = match self.campaigns.load(id).await? {
            None => Some(Halt::Deleted),
            Some(fresh) if fresh.status.halts_engine() => Some(Halt::Status(fresh.status)),
            Some(_) => None,
        };

        if let Some(h) = halt {
            log::info!("(check_halt) Campaña {} detenida externamente: {:?}", id, h);
        }
        Ok(halt)
    }

    /// Escribe el registro completo salvo que otro actor lo haya detenido.
    async fn persist(&self, campaign: &mut Campaign) -> Result<Option<Halt>> {
        if let Some(halt) = self.check_halt(&campaign.id).await? {
            return Ok(Some(halt));
        }
        self.campaigns.save(campaign, true).await?;
        Ok(None)
    }

    /// Duerme hasta `deadline_ms` en tramos de `poll_interval`, releyendo el
    /// registro antes de cada tramo.
    async fn wait_until(&self, id: &str, deadline_ms: i64) -> Result<Option<Halt>> {
        loop {
            if let Some(halt) = self.check_halt(id).await? {
                return Ok(Some(halt));
            }
            let now = self.clock.now_ms();
            if now >= deadline_ms {
                return Ok(None);
            }
            let left = Duration::from_millis(deadline_ms.saturating_sub(now) as u64);
            self.clock.sleep(left.min(self.poll_interval)).await;
        }
    }

    /// Marca la campaña como fallida, salvo que ya la hayan detenido desde afuera.
    async fn fail(&self, id: &str, message: String) -> Result<RunOutcome, RunError> {
        log::error!("(fail) Campaña {} falló: {}", id, message);

        let mut fresh = match self.campaigns.load(id).await.map_err(RunError::Store)? {
            Some(c) => c,
            None => return Ok(RunOutcome::Deleted),
        };
        if fresh.status.halts_engine() {
            return Ok(RunOutcome::Interrupted(fresh.status));
        }

        fresh.status = CampaignStatus::Failed;
        fresh.error = Some(message.clone());
        self.campaigns
            .save(&mut fresh, true)
            .await
            .map_err(RunError::Store)?;

        self.activity
            .error(
                LogCategory::Error,
                &format!("Campaign '{}' failed", fresh.name),
                json!({ "campaignId": id, "error": message }),
            )
            .await;

        Err(RunError::Failed(message))
    }
}

fn duration_ms(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}
