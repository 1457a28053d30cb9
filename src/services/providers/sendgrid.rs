//! services/providers/sendgrid.rs

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use super::{error_body, ProviderAdapter};
use crate::models::email_model::{OutgoingEmail, SendReceipt};
use crate::models::provider_model::{ProviderKind, SendGridAccount};

const SENDGRID_API: &str = "https://api.sendgrid.com/v3";

pub struct SendGridAdapter {
    account: SendGridAccount,
    http_client: Client,
}

impl SendGridAdapter {
    pub fn new(account: SendGridAccount, http_client: Client) -> Self {
        Self {
            account,
            http_client,
        }
    }
}

pub(crate) fn send_payload(email: &OutgoingEmail) -> serde_json::Value {
    json!({
        "personalizations": [{
            "to": email.to.iter().map(|e| json!({ "email": e })).collect::<Vec<_>>()
        }],
        "from": { "email": email.from },
        "subject": email.subject,
        "content": [{ "type": "text/html", "value": email.html_body }]
    })
}

#[async_trait]
impl ProviderAdapter for SendGridAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Sendgrid
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<SendReceipt> {
        let resp = self
            .http_client
            .post(format!("{SENDGRID_API}/mail/send"))
            .bearer_auth(&self.account.api_key)
            .json(&send_payload(email))
            .send()
            .await
            .context("SendGrid request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = error_body(resp).await;
            bail!("SendGrid API Error: {} - {}", status.as_u16(), body);
        }

        let message_id = resp
            .headers()
            .get("x-message-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(SendReceipt {
            provider_message_id: message_id,
        })
    }

    /// La API key debe ser válida y tener el scope `mail.send`.
    async fn test_connection(&self) -> Result<()> {
        let resp = self
            .http_client
            .get(format!("{SENDGRID_API}/scopes"))
            .bearer_auth(&self.account.api_key)
            .send()
            .await
            .context("SendGrid request failed")?;

        if !resp.status().is_success() {
            bail!(
                "Failed to validate SendGrid API Key: {}",
                resp.status().canonical_reason().unwrap_or("unknown status")
            );
        }

        let data: serde_json::Value = resp.json().await.context("Invalid SendGrid response")?;
        let scopes = data
            .get("scopes")
            .and_then(|s| s.as_array())
            .ok_or_else(|| anyhow!("Invalid response from SendGrid API"))?;

        if !scopes.iter().any(|s| s.as_str() == Some("mail.send")) {
            bail!("API Key is missing \"mail.send\" scope");
        }
        Ok(())
    }
}
