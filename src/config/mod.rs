//! config/mod.rs
//! Configuración del proceso (entorno) y de las cuentas de proveedor (settings.json).

pub mod app_config;
pub mod provider_config;
