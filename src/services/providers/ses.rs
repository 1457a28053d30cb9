//! services/providers/ses.rs
//! Amazon SES por la Query API (form POST) firmada con AWS Signature V4.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::{Digest, Sha256};

use super::{error_body, ProviderAdapter};
use crate::models::email_model::{OutgoingEmail, SendReceipt};
use crate::models::provider_model::{ProviderKind, SesAccount};

type HmacSha256 = Hmac<Sha256>;

const SES_SERVICE: &str = "ses";
const SES_API_VERSION: &str = "2010-12-01";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";
const SIGNED_HEADERS: &str = "content-type;host;x-amz-date";

pub struct SesAdapter {
    account: SesAccount,
    http_client: Client,
}

/// Cabeceras resultantes de firmar un body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub host: String,
    pub amz_date: String,
    pub authorization: String,
}

impl SesAdapter {
    pub fn new(account: SesAccount, http_client: Client) -> Self {
        Self {
            account,
            http_client,
        }
    }

    pub fn host(&self) -> String {
        format!("email.{}.amazonaws.com", self.account.region)
    }

    /// Firma SigV4 de un POST a `/` sin query string.
    pub fn sign(&self, body: &str, now: DateTime<Utc>) -> Result<SignedRequest> {
        let host = self.host();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = now.format("%Y%m%d").to_string();
        let region = &self.account.region;

        let canonical_request = format!(
            "POST\n/\n\ncontent-type:{FORM_CONTENT_TYPE}\nhost:{host}\nx-amz-date:{amz_date}\n\n{SIGNED_HEADERS}\n{}",
            sha256_hex(body.as_bytes())
        );

        let scope = format!("{date_stamp}/{region}/{SES_SERVICE}/aws4_request");
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{amz_date}\n{scope}\n{}",
            sha256_hex(canonical_request.as_bytes())
        );

        let k_date = hmac_sha256(
            format!("AWS4{}", self.account.secret_access_key).as_bytes(),
            date_stamp.as_bytes(),
        )?;
        let k_region = hmac_sha256(&k_date, region.as_bytes())?;
        let k_service = hmac_sha256(&k_region, SES_SERVICE.as_bytes())?;
        let k_signing = hmac_sha256(&k_service, b"aws4_request")?;
        let signature = to_hex(&hmac_sha256(&k_signing, string_to_sign.as_bytes())?);

        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{scope}, SignedHeaders={SIGNED_HEADERS}, Signature={signature}",
            self.account.access_key_id
        );

        Ok(SignedRequest {
            host,
            amz_date,
            authorization,
        })
    }

    async fn call(&self, params: &[(String, String)]) -> Result<String> {
        let body = encode_form(params);
        let signed = self.sign(&body, Utc::now())?;

        let resp = self
            .http_client
            .post(format!("https://{}/", signed.host))
            .header("Content-Type", FORM_CONTENT_TYPE)
            .header("X-Amz-Date", &signed.amz_date)
            .header("Authorization", &signed.authorization)
            .body(body)
            .send()
            .await
            .context("SES request failed")?;

        let status = resp.status();
        let text = error_body(resp).await;
        if !status.is_success() {
            let message = extract_xml_tag(&text, "Message").unwrap_or(text.as_str());
            bail!("SES API Error: {} - {}", status.as_u16(), message);
        }
        Ok(text)
    }
}

pub fn send_email_params(email: &OutgoingEmail) -> Vec<(String, String)> {
    let mut params = vec![
        ("Action".to_string(), "SendEmail".to_string()),
        ("Version".to_string(), SES_API_VERSION.to_string()),
        ("Source".to_string(), email.from.clone()),
    ];
    for (i, to) in email.to.iter().enumerate() {
        params.push((
            format!("Destination.ToAddresses.member.{}", i + 1),
            to.clone(),
        ));
    }
    params.extend([
        ("Message.Subject.Data".to_string(), email.subject.clone()),
        ("Message.Subject.Charset".to_string(), "UTF-8".to_string()),
        ("Message.Body.Html.Data".to_string(), email.html_body.clone()),
        ("Message.Body.Html.Charset".to_string(), "UTF-8".to_string()),
    ]);
    params
}

pub fn encode_form(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn extract_xml_tag<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)? + start;
    Some(&xml[start..end])
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| anyhow!("Invalid HMAC key: {e}"))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn sha256_hex(data: &[u8]) -> String {
    to_hex(&Sha256::digest(data))
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[async_trait]
impl ProviderAdapter for SesAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ses
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<SendReceipt> {
        let xml = self.call(&send_email_params(email)).await?;
        Ok(SendReceipt {
            provider_message_id: extract_xml_tag(&xml, "MessageId").map(str::to_string),
        })
    }

    /// GetSendQuota valida credenciales y región sin enviar nada.
    async fn test_connection(&self) -> Result<()> {
        if self.account.access_key_id.trim().is_empty()
            || self.account.secret_access_key.trim().is_empty()
        {
            bail!("Missing SES credentials");
        }

        let params = vec![
            ("Action".to_string(), "GetSendQuota".to_string()),
            ("Version".to_string(), SES_API_VERSION.to_string()),
        ];
        self.call(&params).await?;
        Ok(())
    }
}
