//! app.rs
use crate::handlers::{campaign_handler, email_handler, log_handler, provider_handler};
use actix_web::web;

pub fn init_app(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(
                web::scope("/campaigns")
                    .route(
                        "",
                        web::post().to(campaign_handler::create_campaign_endpoint),
                    )
                    .route(
                        "",
                        web::get().to(campaign_handler::list_campaigns_endpoint),
                    )
                    .route(
                        "/{id}",
                        web::get().to(campaign_handler::get_campaign_endpoint),
                    )
                    .route(
                        "/{id}",
                        web::delete().to(campaign_handler::delete_campaign_endpoint),
                    )
                    .route(
                        "/{id}/cancel",
                        web::post().to(campaign_handler::cancel_campaign_endpoint),
                    )
                    .route(
                        "/{id}/stop",
                        web::post().to(campaign_handler::stop_campaign_endpoint),
                    ),
            )
            .service(
                web::scope("/email")
                    .route("/send", web::post().to(email_handler::send_email_endpoint)),
            )
            .service(
                web::scope("/providers")
                    .route(
                        "",
                        web::get().to(provider_handler::list_providers_endpoint),
                    )
                    .route(
                        "/test",
                        web::post().to(provider_handler::test_provider_endpoint),
                    ),
            )
            .service(
                web::scope("/logs")
                    .route("", web::get().to(log_handler::list_logs_endpoint))
                    .route("", web::delete().to(log_handler::clear_logs_endpoint)),
            ),
    );
}
