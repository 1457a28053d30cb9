//! services/mod.rs
pub mod activity_log_service;
pub mod campaign_runner;
pub mod campaign_service;
pub mod clock;
pub mod providers;
pub mod rate_scheduler;
pub mod recipient_loader;
pub mod template_service;
pub mod worker_launcher;
