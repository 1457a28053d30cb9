//! models/mod.rs
//! Módulo raíz para modelos/estructuras compartidas.

pub mod campaign_model;
pub mod email_model;
pub mod log_model;
pub mod provider_model;
pub mod recipient_model;
