//! handlers/mod.rs
//! Handlers HTTP de la API de control (campañas, envío manual, proveedores, bitácora).
pub mod campaign_handler;
pub mod email_handler;
pub mod log_handler;
pub mod provider_handler;
