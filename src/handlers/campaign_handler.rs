//! handlers/campaign_handler.rs
use std::path::Path;

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde_json::json;

use crate::config::provider_config::ConfigProvider;
use crate::models::campaign_model::{
    parse_start_at, CampaignStatus, CreateCampaignRequest, CreateCampaignResponse, NewCampaign,
    StatusChange, DEFAULT_CAMPAIGN_NAME, DEFAULT_RATE_LIMIT_PER_MINUTE,
};
use crate::models::log_model::LogCategory;
use crate::services::activity_log_service::ActivityLogService;
use crate::services::campaign_service::CampaignService;
use crate::services::worker_launcher::WorkerLauncher;

fn bad_request(error: String) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({ "success": false, "error": error }))
}

fn not_found(id: &str) -> HttpResponse {
    HttpResponse::NotFound().json(json!({
        "success": false,
        "error": format!("Campaign {} not found", id)
    }))
}

fn internal_error(e: anyhow::Error) -> HttpResponse {
    log::error!("Campaign handler error: {:?}", e);
    HttpResponse::InternalServerError().json(json!({
        "success": false,
        "error": format!("{:#}", e)
    }))
}

/// Valida el request y lo convierte en una campaña lista para insertar.
fn validate_request(
    req: CreateCampaignRequest,
    settings: &dyn ConfigProvider,
    now_ms: i64,
) -> Result<NewCampaign, String> {
    if req.from.trim().is_empty() {
        return Err("Field 'from' is required".to_string());
    }
    if !settings.allows_from(&req.from) {
        return Err(format!("Sender '{}' is not in the configured from addresses", req.from.trim()));
    }
    if req.subject.trim().is_empty() {
        return Err("Field 'subject' is required".to_string());
    }
    for (field, path) in [("template_path", &req.template_path), ("list_path", &req.list_path)] {
        if !Path::new(path).is_file() {
            return Err(format!("File for '{}' not found: {}", field, path));
        }
    }

    let account = settings
        .provider_account(req.provider_kind, &req.provider_name)
        .ok_or_else(|| {
            format!(
                "Provider {} '{}' is not configured",
                req.provider_kind, req.provider_name
            )
        })?;

    let start_time = parse_start_at(req.start_at.as_deref(), now_ms).map_err(|e| e.to_string())?;

    let name = req
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| DEFAULT_CAMPAIGN_NAME.to_string());

    Ok(NewCampaign {
        name,
        provider_kind: req.provider_kind,
        provider_name: account.name().to_string(),
        template_path: req.template_path,
        list_path: req.list_path,
        from: req.from.trim().to_string(),
        subject: req.subject,
        start_time,
        rate_limit_per_minute: req
            .rate_limit_per_minute
            .filter(|r| *r > 0)
            .unwrap_or(DEFAULT_RATE_LIMIT_PER_MINUTE),
    })
}

/// POST /api/campaigns
pub async fn create_campaign_endpoint(
    campaigns: web::Data<CampaignService>,
    activity: web::Data<ActivityLogService>,
    settings: web::Data<dyn ConfigProvider>,
    launcher: web::Data<WorkerLauncher>,
    body: web::Json<CreateCampaignRequest>,
) -> HttpResponse {
    let new_campaign =
        match validate_request(body.into_inner(), settings.get_ref(), Utc::now().timestamp_millis())
        {
            Ok(c) => c,
            Err(msg) => return bad_request(msg),
        };

    let mut campaign = match campaigns.create_campaign(new_campaign).await {
        Ok(c) => c,
        Err(e) => return internal_error(e),
    };

    activity
        .info(
            LogCategory::Campaign,
            &format!("Campaign '{}' created ({})", campaign.name, campaign.id),
        )
        .await;

    let launched = match launcher.launch(&campaign.id) {
        Ok(_) => launcher.is_enabled(),
        Err(e) => {
            let message = format!("Failed to launch worker: {:#}", e);
            activity
                .error(
                    LogCategory::Error,
                    &message,
                    json!({ "campaignId": campaign.id }),
                )
                .await;

            campaign.status = CampaignStatus::Failed;
            campaign.error = Some(message.clone());
            if let Err(save_err) = campaigns.save(&mut campaign, true).await {
                log::error!(
                    "(create_campaign_endpoint) No se pudo marcar como fallida: {:?}",
                    save_err
                );
            }
            return HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": message
            }));
        }
    };

    let message = match (launched, campaign.status) {
        (false, _) => "Campaign queued; no worker available",
        (true, CampaignStatus::Scheduled) => "Campaign scheduled",
        (true, _) => "Campaign started",
    };
    HttpResponse::Ok().json(CreateCampaignResponse {
        id: campaign.id,
        status: campaign.status,
        start_time: campaign.start_time,
        message: message.to_string(),
    })
}

/// GET /api/campaigns
pub async fn list_campaigns_endpoint(campaigns: web::Data<CampaignService>) -> HttpResponse {
    HttpResponse::Ok().json(campaigns.list_campaigns().await)
}

/// GET /api/campaigns/{id}
pub async fn get_campaign_endpoint(
    campaigns: web::Data<CampaignService>,
    path: web::Path<String>,
) -> HttpResponse {
    let id = path.into_inner();
    match campaigns.load(&id).await {
        Ok(Some(c)) => HttpResponse::Ok().json(c),
        Ok(None) => not_found(&id),
        Err(e) => internal_error(e),
    }
}

async fn change_status(
    campaigns: &CampaignService,
    activity: &ActivityLogService,
    id: &str,
    status: CampaignStatus,
) -> HttpResponse {
    match campaigns.set_status(id, status).await {
        Ok(StatusChange::Updated(c)) => {
            activity
                .warning(
                    LogCategory::Campaign,
                    &format!("Campaign '{}' {}", c.name, status),
                    json!({ "campaignId": c.id, "progress": c.progress, "total": c.total }),
                )
                .await;
            HttpResponse::Ok().json(c)
        }
        Ok(StatusChange::NotFound) => not_found(id),
        Ok(StatusChange::Rejected(current)) => HttpResponse::Conflict().json(json!({
            "success": false,
            "error": format!("Campaign is already {}", current)
        })),
        Err(e) => internal_error(e),
    }
}

/// POST /api/campaigns/{id}/cancel
pub async fn cancel_campaign_endpoint(
    campaigns: web::Data<CampaignService>,
    activity: web::Data<ActivityLogService>,
    path: web::Path<String>,
) -> HttpResponse {
    change_status(&campaigns, &activity, &path.into_inner(), CampaignStatus::Cancelled).await
}

/// POST /api/campaigns/{id}/stop
pub async fn stop_campaign_endpoint(
    campaigns: web::Data<CampaignService>,
    activity: web::Data<ActivityLogService>,
    path: web::Path<String>,
) -> HttpResponse {
    change_status(&campaigns, &activity, &path.into_inner(), CampaignStatus::Stopped).await
}

/// DELETE /api/campaigns/{id}
pub async fn delete_campaign_endpoint(
    campaigns: web::Data<CampaignService>,
    path: web::Path<String>,
) -> HttpResponse {
    let id = path.into_inner();
    match campaigns.delete_campaign(&id).await {
        Ok(true) => HttpResponse::Ok().json(json!({ "success": true })),
        Ok(false) => not_found(&id),
        Err(e) => internal_error(e),
    }
}
