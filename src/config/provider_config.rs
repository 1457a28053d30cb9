//! config/provider_config.rs
//! Proveedor de configuración (cuentas de envío) inyectado al dispatcher y al scheduler.
//! Se lee una sola vez al arrancar; nada de estado global.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::provider_model::{
    MailchimpAccount, MailgunAccount, ProviderAccount, ProviderKind, SendGridAccount,
    SesAccount, SmtpAccount,
};

pub trait ConfigProvider: Send + Sync {
    /// Todas las cuentas configuradas, de todos los tipos.
    fn provider_accounts(&self) -> Vec<ProviderAccount>;

    /// Busca la cuenta `name` del tipo `kind`. Con `name` vacío y una única
    /// cuenta de ese tipo, devuelve esa.
    fn provider_account(&self, kind: ProviderKind, name: &str) -> Option<ProviderAccount> {
        let candidates: Vec<ProviderAccount> = self
            .provider_accounts()
            .into_iter()
            .filter(|a| a.kind() == kind)
            .collect();

        let wanted = name.trim();
        if wanted.is_empty() {
            return match candidates.len() {
                1 => candidates.into_iter().next(),
                _ => None,
            };
        }
        candidates.into_iter().find(|a| a.name() == wanted)
    }

    fn from_emails(&self) -> Vec<String> {
        Vec::new()
    }

    /// Remitente permitido: sin lista configurada cualquiera vale.
    fn allows_from(&self, from: &str) -> bool {
        let allowed = self.from_emails();
        let from = from.trim();
        allowed.is_empty() || allowed.iter().any(|a| a.trim().eq_ignore_ascii_case(from))
    }
}

/// Archivo de settings (mismo formato camelCase que guarda la UI).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub ses_providers: Vec<SesAccount>,
    pub mailgun_providers: Vec<MailgunAccount>,
    pub mailchimp_providers: Vec<MailchimpAccount>,
    pub send_grid_providers: Vec<SendGridAccount>,
    pub smtp_providers: Vec<SmtpAccount>,
    pub from_emails: Vec<String>,
}

impl Settings {
    /// Carga el JSON de settings. Si el archivo no existe devolvemos settings vacíos;
    /// si existe pero está corrupto es un error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::warn!(
                "(Settings::load) No existe {:?}, usando configuración vacía",
                path
            );
            return Ok(Settings::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {:?}", path))?;
        Self::from_json(&raw).with_context(|| format!("Invalid settings file {:?}", path))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Settings::default());
        }
        Ok(serde_json::from_str(raw)?)
    }
}

impl ConfigProvider for Settings {
    fn provider_accounts(&self) -> Vec<ProviderAccount> {
        let mut accounts = Vec::new();
        accounts.extend(self.ses_providers.iter().cloned().map(ProviderAccount::Ses));
        accounts.extend(
            self.mailgun_providers
                .iter()
                .cloned()
                .map(ProviderAccount::Mailgun),
        );
        accounts.extend(
            self.mailchimp_providers
                .iter()
                .cloned()
                .map(ProviderAccount::Mailchimp),
        );
        accounts.extend(
            self.send_grid_providers
                .iter()
                .cloned()
                .map(ProviderAccount::SendGrid),
        );
        accounts.extend(self.smtp_providers.iter().cloned().map(ProviderAccount::Smtp));
        accounts
    }

    fn from_emails(&self) -> Vec<String> {
        self.from_emails.clone()
    }
}
