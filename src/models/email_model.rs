//! models/email_model.rs

use serde::{Deserialize, Serialize};

use crate::models::provider_model::ProviderKind;

/// Un mensaje ya renderizado, listo para entregar a un proveedor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html_body: String,
}

impl OutgoingEmail {
    pub fn single(from: &str, to: &str, subject: &str, html_body: String) -> Self {
        OutgoingEmail {
            from: from.to_string(),
            to: vec![to.to_string()],
            subject: subject.to_string(),
            html_body,
        }
    }
}

/// Resultado de un envío aceptado por el proveedor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SendReceipt {
    pub provider_message_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionTestResponse {
    pub success: bool,
    pub kind: String,
    pub name: String,
    pub error: Option<String>,
}

/// Envío manual de un único mensaje (`POST /api/email/send`).
#[derive(Debug, Clone, Deserialize)]
pub struct SendEmailRequest {
    pub kind: ProviderKind,
    #[serde(default)]
    pub name: String,
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

impl SendEmailRequest {
    /// Destinatarios sin espacios ni entradas vacías.
    pub fn recipients(&self) -> Vec<String> {
        self.to
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }
}
