//! models/provider_model.rs
//! Cuentas de proveedor (credenciales + límites) por tipo de backend.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Ses,
    Mailgun,
    Mailchimp,
    #[serde(alias = "sendGrid")]
    Sendgrid,
    Smtp,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 5] = [
        ProviderKind::Ses,
        ProviderKind::Mailgun,
        ProviderKind::Mailchimp,
        ProviderKind::Sendgrid,
        ProviderKind::Smtp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Ses => "ses",
            ProviderKind::Mailgun => "mailgun",
            ProviderKind::Mailchimp => "mailchimp",
            ProviderKind::Sendgrid => "sendgrid",
            ProviderKind::Smtp => "smtp",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| anyhow!("Unknown provider kind '{}'", s))
    }
}

/// Límite del proveedor: `count` mensajes cada `period_hours` horas.
/// Un 0 en cualquiera de los dos significa "sin límite de proveedor".
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProviderRateLimit {
    pub count: u32,
    pub period_hours: f64,
}

impl ProviderRateLimit {
    pub fn is_unbounded(&self) -> bool {
        self.count == 0 || self.period_hours <= 0.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SesAccount {
    pub name: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    #[serde(default)]
    pub rate_limit_count: u32,
    #[serde(default)]
    pub rate_limit_period: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailgunAccount {
    pub name: String,
    pub api_key: String,
    pub domain: String,
    /// Usuario para basic auth; Mailgun usa "api" casi siempre.
    #[serde(default)]
    pub username: Option<String>,
    /// p.e. https://api.eu.mailgun.net para cuentas en la UE
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub rate_limit_count: u32,
    #[serde(default)]
    pub rate_limit_period: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailchimpAccount {
    pub name: String,
    pub api_key: String,
    #[serde(default)]
    pub rate_limit_count: u32,
    #[serde(default)]
    pub rate_limit_period: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendGridAccount {
    pub name: String,
    pub api_key: String,
    #[serde(default)]
    pub rate_limit_count: u32,
    #[serde(default)]
    pub rate_limit_period: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmtpAccount {
    pub name: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub secure: bool,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub rate_limit_count: u32,
    #[serde(default)]
    pub rate_limit_period: f64,
}

/// Una cuenta ya resuelta, con su tipo.
#[derive(Debug, Clone)]
pub enum ProviderAccount {
    Ses(SesAccount),
    Mailgun(MailgunAccount),
    Mailchimp(MailchimpAccount),
    SendGrid(SendGridAccount),
    Smtp(SmtpAccount),
}

impl ProviderAccount {
    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderAccount::Ses(_) => ProviderKind::Ses,
            ProviderAccount::Mailgun(_) => ProviderKind::Mailgun,
            ProviderAccount::Mailchimp(_) => ProviderKind::Mailchimp,
            ProviderAccount::SendGrid(_) => ProviderKind::Sendgrid,
            ProviderAccount::Smtp(_) => ProviderKind::Smtp,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ProviderAccount::Ses(a) => &a.name,
            ProviderAccount::Mailgun(a) => &a.name,
            ProviderAccount::Mailchimp(a) => &a.name,
            ProviderAccount::SendGrid(a) => &a.name,
            ProviderAccount::Smtp(a) => &a.name,
        }
    }

    pub fn rate_limit(&self) -> ProviderRateLimit {
        let (count, period_hours) = match self {
            ProviderAccount::Ses(a) => (a.rate_limit_count, a.rate_limit_period),
            ProviderAccount::Mailgun(a) => (a.rate_limit_count, a.rate_limit_period),
            ProviderAccount::Mailchimp(a) => (a.rate_limit_count, a.rate_limit_period),
            ProviderAccount::SendGrid(a) => (a.rate_limit_count, a.rate_limit_period),
            ProviderAccount::Smtp(a) => (a.rate_limit_count, a.rate_limit_period),
        };
        ProviderRateLimit {
            count,
            period_hours,
        }
    }
}

/// Vista sin secretos para GET /api/providers
#[derive(Debug, Clone, Serialize)]
pub struct ProviderSummary {
    pub kind: ProviderKind,
    pub name: String,
    pub rate_limit: ProviderRateLimit,
}

impl From<&ProviderAccount> for ProviderSummary {
    fn from(account: &ProviderAccount) -> Self {
        ProviderSummary {
            kind: account.kind(),
            name: account.name().to_string(),
            rate_limit: account.rate_limit(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestProviderRequest {
    pub kind: ProviderKind,
    #[serde(default)]
    pub name: String,
}
