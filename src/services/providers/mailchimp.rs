//! services/providers/mailchimp.rs
//! Mailchimp Transactional (Mandrill).

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use super::{error_body, ProviderAdapter};
use crate::models::email_model::{OutgoingEmail, SendReceipt};
use crate::models::provider_model::{MailchimpAccount, ProviderKind};

const MANDRILL_API: &str = "https://mandrillapp.com/api/1.0";

pub struct MailchimpAdapter {
    account: MailchimpAccount,
    http_client: Client,
}

impl MailchimpAdapter {
    pub fn new(account: MailchimpAccount, http_client: Client) -> Self {
        Self {
            account,
            http_client,
        }
    }
}

/// La API responde un arreglo, un objeto por destinatario. `rejected`/`invalid`
/// cuentan como fallo aunque el HTTP sea 200.
pub(crate) fn check_send_response(response: &serde_json::Value) -> Result<SendReceipt> {
    let first = response.get(0);
    let status = first
        .and_then(|r| r.get("status"))
        .and_then(|s| s.as_str())
        .unwrap_or("");

    if status == "rejected" || status == "invalid" {
        let reason = first
            .and_then(|r| r.get("reject_reason"))
            .and_then(|s| s.as_str())
            .unwrap_or("unknown");
        bail!("Mailchimp rejected email: {}", reason);
    }

    Ok(SendReceipt {
        provider_message_id: first
            .and_then(|r| r.get("_id"))
            .and_then(|s| s.as_str())
            .map(str::to_string),
    })
}

#[async_trait]
impl ProviderAdapter for MailchimpAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Mailchimp
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<SendReceipt> {
        let payload = json!({
            "key": self.account.api_key,
            "message": {
                "html": email.html_body,
                "subject": email.subject,
                "from_email": email.from,
                "to": email.to.iter().map(|e| json!({ "email": e, "type": "to" })).collect::<Vec<_>>()
            }
        });

        let resp = self
            .http_client
            .post(format!("{MANDRILL_API}/messages/send"))
            .json(&payload)
            .send()
            .await
            .context("Mailchimp request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = error_body(resp).await;
            bail!("Mailchimp API Error: {} - {}", status.as_u16(), body);
        }

        let data: serde_json::Value = resp.json().await.context("Invalid Mailchimp response")?;
        check_send_response(&data)
    }

    async fn test_connection(&self) -> Result<()> {
        if self.account.api_key.trim().is_empty() {
            bail!("Missing Mailchimp API Key");
        }

        let resp = self
            .http_client
            .post(format!("{MANDRILL_API}/users/ping"))
            .json(&json!({ "key": self.account.api_key }))
            .send()
            .await
            .context("Mailchimp request failed")?;

        let status = resp.status();
        let body = error_body(resp).await;
        if !status.is_success() || !body.contains("PONG") {
            bail!("Mailchimp ping failed: {} - {}", status.as_u16(), body);
        }
        Ok(())
    }
}
