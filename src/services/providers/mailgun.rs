//! services/providers/mailgun.rs

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;

use super::{error_body, ProviderAdapter};
use crate::models::email_model::{OutgoingEmail, SendReceipt};
use crate::models::provider_model::{MailgunAccount, ProviderKind};

const DEFAULT_BASE_URL: &str = "https://api.mailgun.net";

pub struct MailgunAdapter {
    account: MailgunAccount,
    http_client: Client,
}

impl MailgunAdapter {
    pub fn new(account: MailgunAccount, http_client: Client) -> Self {
        Self {
            account,
            http_client,
        }
    }

    fn base_url(&self) -> &str {
        self.account
            .base_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    fn username(&self) -> &str {
        self.account
            .username
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or("api")
    }
}

#[async_trait]
impl ProviderAdapter for MailgunAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Mailgun
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<SendReceipt> {
        let url = format!("{}/v3/{}/messages", self.base_url(), self.account.domain);
        let to = email.to.join(",");
        let form = [
            ("from", email.from.as_str()),
            ("to", to.as_str()),
            ("subject", email.subject.as_str()),
            ("html", email.html_body.as_str()),
        ];

        let resp = self
            .http_client
            .post(&url)
            .basic_auth(self.username(), Some(&self.account.api_key))
            .form(&form)
            .send()
            .await
            .context("Mailgun request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = error_body(resp).await;
            bail!("Mailgun API Error: {} - {}", status.as_u16(), body);
        }

        let data: serde_json::Value = resp.json().await.unwrap_or_default();
        Ok(SendReceipt {
            provider_message_id: data.get("id").and_then(|v| v.as_str()).map(str::to_string),
        })
    }

    async fn test_connection(&self) -> Result<()> {
        if self.account.api_key.trim().is_empty() || self.account.domain.trim().is_empty() {
            bail!("Missing Mailgun credentials");
        }

        let url = format!("{}/v3/domains/{}", self.base_url(), self.account.domain);
        let resp = self
            .http_client
            .get(&url)
            .basic_auth(self.username(), Some(&self.account.api_key))
            .send()
            .await
            .context("Mailgun request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = error_body(resp).await;
            bail!("Mailgun domain check failed: {} - {}", status.as_u16(), body);
        }
        Ok(())
    }
}
