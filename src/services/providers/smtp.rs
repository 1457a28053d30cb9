//! services/providers/smtp.rs

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use super::ProviderAdapter;
use crate::models::email_model::{OutgoingEmail, SendReceipt};
use crate::models::provider_model::{ProviderKind, SmtpAccount};

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpTlsMode {
    /// STARTTLS obligatorio (587 / 25)
    StartTls,
    /// TLS implícito desde el primer byte (465 y `secure`)
    Wrapper,
    Plain,
}

/// 587 y 25 siempre negocian STARTTLS; el resto depende de `secure`.
pub fn tls_mode(port: u16, secure: bool) -> SmtpTlsMode {
    match (port, secure) {
        (587 | 25, _) => SmtpTlsMode::StartTls,
        (_, true) => SmtpTlsMode::Wrapper,
        _ => SmtpTlsMode::Plain,
    }
}

pub struct SmtpAdapter {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpAdapter {
    pub fn new(account: SmtpAccount) -> Result<Self> {
        let tls = match tls_mode(account.port, account.secure) {
            SmtpTlsMode::StartTls => Tls::Required(
                TlsParameters::new(account.host.clone()).context("Invalid TLS parameters")?,
            ),
            SmtpTlsMode::Wrapper => Tls::Wrapper(
                TlsParameters::new(account.host.clone()).context("Invalid TLS parameters")?,
            ),
            SmtpTlsMode::Plain => Tls::None,
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&account.host)
            .port(account.port)
            .tls(tls)
            .timeout(Some(SMTP_TIMEOUT));

        if !account.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                account.username.clone(),
                account.password.clone(),
            ));
        }

        Ok(Self {
            mailer: builder.build(),
        })
    }
}

#[async_trait]
impl ProviderAdapter for SmtpAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Smtp
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<SendReceipt> {
        let from: Mailbox = email.from.parse().context("Invalid from address")?;

        let mut builder = Message::builder().from(from).subject(&email.subject);
        for recip_str in &email.to {
            let to: Mailbox = recip_str.parse().context("Invalid recipient address")?;
            builder = builder.to(to);
        }

        let message = builder
            .header(ContentType::TEXT_HTML)
            .body(email.html_body.clone())
            .context("Failed to build SMTP message")?;

        tokio::time::timeout(SMTP_TIMEOUT, self.mailer.send(message))
            .await
            .context("SMTP send timed out")?
            .context("SMTP send failed")?;

        Ok(SendReceipt::default())
    }

    async fn test_connection(&self) -> Result<()> {
        let ok = tokio::time::timeout(SMTP_TIMEOUT, self.mailer.test_connection())
            .await
            .context("SMTP connection timed out")?
            .context("SMTP connection failed")?;
        if !ok {
            bail!("SMTP server did not accept the connection");
        }
        Ok(())
    }
}
