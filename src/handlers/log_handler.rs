//! handlers/log_handler.rs
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::services::activity_log_service::ActivityLogService;

const DEFAULT_LOG_PAGE: u32 = 100;

#[derive(Deserialize)]
pub struct LogQuery {
    limit: Option<u32>,
}

/// GET /api/logs?limit=N
pub async fn list_logs_endpoint(
    activity: web::Data<ActivityLogService>,
    query: web::Query<LogQuery>,
) -> HttpResponse {
    let limit = query.limit.unwrap_or(DEFAULT_LOG_PAGE);

    match activity.read_recent(limit).await {
        Ok(entries) => HttpResponse::Ok().json(entries),
        Err(e) => HttpResponse::InternalServerError().json(json!({
            "success": false,
            "error": format!("{:#}", e)
        })),
    }
}

/// DELETE /api/logs
pub async fn clear_logs_endpoint(activity: web::Data<ActivityLogService>) -> HttpResponse {
    match activity.clear().await {
        Ok(()) => HttpResponse::Ok().json(json!({ "success": true })),
        Err(e) => HttpResponse::InternalServerError().json(json!({
            "success": false,
            "error": format!("{:#}", e)
        })),
    }
}
