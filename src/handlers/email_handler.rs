//! handlers/email_handler.rs
//! Envío manual: un mensaje, una cuenta, sin campaña ni scheduler.
use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::config::provider_config::ConfigProvider;
use crate::models::email_model::{OutgoingEmail, SendEmailRequest};
use crate::models::log_model::LogCategory;
use crate::services::activity_log_service::ActivityLogService;
use crate::services::providers::AdapterFactory;

fn bad_request(error: String) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({ "success": false, "error": error }))
}

/// POST /api/email/send
pub async fn send_email_endpoint(
    settings: web::Data<dyn ConfigProvider>,
    adapters: web::Data<AdapterFactory>,
    activity: web::Data<ActivityLogService>,
    body: web::Json<SendEmailRequest>,
) -> HttpResponse {
    let req = body.into_inner();

    let to = req.recipients();
    if to.is_empty() {
        return bad_request("At least one recipient is required".to_string());
    }
    if req.from.trim().is_empty() {
        return bad_request("Field 'from' is required".to_string());
    }
    if !settings.allows_from(&req.from) {
        return bad_request(format!(
            "Sender '{}' is not in the configured from addresses",
            req.from.trim()
        ));
    }
    if req.subject.trim().is_empty() {
        return bad_request("Field 'subject' is required".to_string());
    }

    let Some(account) = settings.provider_account(req.kind, &req.name) else {
        return HttpResponse::NotFound().json(json!({
            "success": false,
            "error": format!("Provider {} '{}' is not configured", req.kind, req.name)
        }));
    };

    let email = OutgoingEmail {
        from: req.from.trim().to_string(),
        to,
        subject: req.subject,
        html_body: req.html,
    };

    let result = match (adapters.get_ref())(&account) {
        Ok(adapter) => adapter.send(&email).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(receipt) => {
            activity
                .success(
                    LogCategory::Email,
                    &format!(
                        "Manual email sent to {} via {} '{}'",
                        email.to.join(", "),
                        account.kind(),
                        account.name()
                    ),
                )
                .await;
            HttpResponse::Ok().json(json!({
                "success": true,
                "provider_message_id": receipt.provider_message_id
            }))
        }
        Err(e) => {
            let error = format!("{:#}", e);
            log::error!("(send_email_endpoint) Falló el envío manual: {}", error);
            activity
                .error(
                    LogCategory::Email,
                    &format!("Manual email to {} failed", email.to.join(", ")),
                    json!({
                        "provider": account.kind().as_str(),
                        "name": account.name(),
                        "error": error,
                    }),
                )
                .await;
            HttpResponse::BadGateway().json(json!({ "success": false, "error": error }))
        }
    }
}
