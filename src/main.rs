use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use dotenv::dotenv;

use mailout::app;
use mailout::config::app_config::AppConfig;
use mailout::config::provider_config::{ConfigProvider, Settings};
use mailout::database::setup_database;
use mailout::logger::init_logger;
use mailout::models::log_model::LogCategory;
use mailout::services::activity_log_service::ActivityLogService;
use mailout::services::campaign_service::CampaignService;
use mailout::services::providers::default_adapter_factory;
use mailout::services::worker_launcher::WorkerLauncher;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok(); // Cargar .env al inicio
    init_logger();

    let config = AppConfig::from_env();

    // Conectarnos a la DB (corre migraciones)
    let db_pool = setup_database(&config)
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, format!("{:#}", e)))?;

    let settings = Settings::load(&config.settings_path)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, format!("{:#}", e)))?;
    let settings: Arc<dyn ConfigProvider> = Arc::new(settings);

    let campaign_service = CampaignService::new(db_pool.clone());
    let activity_service = ActivityLogService::with_limit(db_pool.clone(), config.log_limit);
    let launcher = WorkerLauncher::new(&config);
    let adapter_factory = default_adapter_factory();

    if !launcher.is_enabled() {
        log::warn!("No se encontró el binario del worker; las campañas no se ejecutarán");
    }

    activity_service
        .info(
            LogCategory::System,
            &format!(
                "Server starting with {} provider accounts",
                settings.provider_accounts().len()
            ),
        )
        .await;

    // Levantar servidor
    log::info!(
        "Levantando servidor en {}:{}",
        config.bind_host,
        config.bind_port
    );
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(campaign_service.clone()))
            .app_data(web::Data::new(activity_service.clone()))
            .app_data(web::Data::from(settings.clone()))
            .app_data(web::Data::new(adapter_factory.clone()))
            .app_data(web::Data::new(launcher.clone()))
            .configure(app::init_app)
    })
    .workers(1)
    .bind((config.bind_host.as_str(), config.bind_port))?
    .run()
    .await
}
