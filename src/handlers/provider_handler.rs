//! handlers/provider_handler.rs
use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::config::provider_config::ConfigProvider;
use crate::models::email_model::ConnectionTestResponse;
use crate::models::log_model::LogCategory;
use crate::models::provider_model::{ProviderSummary, TestProviderRequest};
use crate::services::activity_log_service::ActivityLogService;
use crate::services::providers::AdapterFactory;

/// GET /api/providers
pub async fn list_providers_endpoint(settings: web::Data<dyn ConfigProvider>) -> HttpResponse {
    let summaries: Vec<ProviderSummary> = settings
        .provider_accounts()
        .iter()
        .map(ProviderSummary::from)
        .collect();
    HttpResponse::Ok().json(summaries)
}

/// POST /api/providers/test
pub async fn test_provider_endpoint(
    settings: web::Data<dyn ConfigProvider>,
    adapters: web::Data<AdapterFactory>,
    activity: web::Data<ActivityLogService>,
    body: web::Json<TestProviderRequest>,
) -> HttpResponse {
    let req = body.into_inner();

    let Some(account) = settings.provider_account(req.kind, &req.name) else {
        return HttpResponse::NotFound().json(json!({
            "success": false,
            "error": format!("Provider {} '{}' is not configured", req.kind, req.name)
        }));
    };

    let result = match (adapters.get_ref())(&account) {
        Ok(adapter) => adapter.test_connection().await,
        Err(e) => Err(e),
    };

    let response = ConnectionTestResponse {
        success: result.is_ok(),
        kind: account.kind().to_string(),
        name: account.name().to_string(),
        error: result.as_ref().err().map(|e| format!("{:#}", e)),
    };

    match result {
        Ok(()) => {
            activity
                .success(
                    LogCategory::Settings,
                    &format!("Connection test passed for {} '{}'", response.kind, response.name),
                )
                .await;
            HttpResponse::Ok().json(response)
        }
        Err(e) => {
            activity
                .error(
                    LogCategory::Settings,
                    &format!("Connection test failed for {} '{}'", response.kind, response.name),
                    json!({ "error": format!("{:#}", e) }),
                )
                .await;
            HttpResponse::BadGateway().json(response)
        }
    }
}
