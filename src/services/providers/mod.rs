//! services/providers/mod.rs
//! Dispatcher de proveedores: una sola capacidad (send + test_connection) con cinco
//! implementaciones, elegida una vez al validar la campaña.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;

use crate::models::email_model::{OutgoingEmail, SendReceipt};
use crate::models::provider_model::{ProviderAccount, ProviderKind};

pub mod mailchimp;
pub mod mailgun;
pub mod sendgrid;
pub mod ses;
pub mod smtp;

pub use mailchimp::MailchimpAdapter;
pub use mailgun::MailgunAdapter;
pub use sendgrid::SendGridAdapter;
pub use ses::SesAdapter;
pub use smtp::SmtpAdapter;

/// Tiempo máximo de una llamada HTTP a un proveedor
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn send(&self, email: &OutgoingEmail) -> Result<SendReceipt>;

    async fn test_connection(&self) -> Result<()>;
}

/// Construye el adapter de una cuenta ya resuelta.
pub type AdapterFactory =
    Arc<dyn Fn(&ProviderAccount) -> Result<Arc<dyn ProviderAdapter>> + Send + Sync>;

pub fn default_adapter_factory() -> AdapterFactory {
    let http_client = build_http_client();
    Arc::new(move |account: &ProviderAccount| build_adapter(account, http_client.clone()))
}

pub fn build_adapter(
    account: &ProviderAccount,
    http_client: Client,
) -> Result<Arc<dyn ProviderAdapter>> {
    let adapter: Arc<dyn ProviderAdapter> = match account {
        ProviderAccount::Ses(a) => Arc::new(SesAdapter::new(a.clone(), http_client)),
        ProviderAccount::Mailgun(a) => Arc::new(MailgunAdapter::new(a.clone(), http_client)),
        ProviderAccount::Mailchimp(a) => {
            Arc::new(MailchimpAdapter::new(a.clone(), http_client))
        }
        ProviderAccount::SendGrid(a) => Arc::new(SendGridAdapter::new(a.clone(), http_client)),
        ProviderAccount::Smtp(a) => Arc::new(SmtpAdapter::new(a.clone())?),
    };
    Ok(adapter)
}

pub fn build_http_client() -> Client {
    Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_else(|e| {
            log::warn!("(build_http_client) Cliente con timeout falló ({e}), usando default");
            Client::new()
        })
}

/// Lee el cuerpo de una respuesta fallida sin propagar errores de lectura.
pub(crate) async fn error_body(resp: reqwest::Response) -> String {
    resp.text().await.unwrap_or_default()
}
