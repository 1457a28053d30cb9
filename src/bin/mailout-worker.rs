//! bin/mailout-worker.rs
//! `mailout-worker <campaign-id>`: ejecuta una campaña hasta terminarla.
//! Salida 0 al completar, al encontrarla ya terminada o al ser detenida; 1 si falla.

use std::process::ExitCode;
use std::sync::Arc;

use dotenv::dotenv;

use mailout::config::app_config::AppConfig;
use mailout::config::provider_config::{ConfigProvider, Settings};
use mailout::database::setup_database;
use mailout::logger::init_logger;
use mailout::services::activity_log_service::ActivityLogService;
use mailout::services::campaign_runner::{CampaignRunner, RunOutcome};
use mailout::services::campaign_service::CampaignService;

fn main() -> ExitCode {
    dotenv().ok();
    init_logger();

    let Some(campaign_id) = std::env::args().nth(1) else {
        eprintln!("Usage: mailout-worker <campaign-id>");
        return ExitCode::FAILURE;
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            log::error!("No se pudo crear el runtime de tokio: {:?}", e);
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(run_worker(&campaign_id))
}

async fn run_worker(campaign_id: &str) -> ExitCode {
    let config = AppConfig::from_env();

    let db_pool = match setup_database(&config).await {
        Ok(pool) => pool,
        Err(e) => {
            log::error!("(run_worker) Base de datos no disponible: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let settings: Arc<dyn ConfigProvider> = match Settings::load(&config.settings_path) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            log::error!("(run_worker) Settings inválidos: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut runner = CampaignRunner::new(
        CampaignService::new(db_pool.clone()),
        ActivityLogService::with_limit(db_pool.clone(), config.log_limit),
        settings,
    );

    let code = match runner.run(campaign_id).await {
        Ok(RunOutcome::Completed) => {
            log::info!("(run_worker) Campaña {} completada", campaign_id);
            ExitCode::SUCCESS
        }
        Ok(outcome) => {
            log::info!("(run_worker) Campaña {} sin completar: {:?}", campaign_id, outcome);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("(run_worker) {}", e);
            ExitCode::FAILURE
        }
    };

    db_pool.close().await;
    code
}
