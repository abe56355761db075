//! Africa's Talking bulk messaging client.

use super::{http_client, SmsSender};
use async_trait::async_trait;
use mkulima_common::util::mask_phone;
use mkulima_common::{Error, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const SERVICE: &str = "sms";

/// Recipient status codes that mean the message was accepted
/// (100 Processed, 101 Sent, 102 Queued).
const ACCEPTED_STATUS: std::ops::RangeInclusive<u16> = 100..=102;

pub struct AfricasTalkingClient {
    client: Client,
    username: String,
    api_key: String,
    sender_id: Option<String>,
    base_url: String,
}

impl AfricasTalkingClient {
    pub fn new(
        username: impl Into<String>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: http_client(timeout),
            username: username.into(),
            api_key: api_key.into(),
            sender_id: None,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Send from a registered sender id or short code.
    pub fn with_sender_id(mut self, sender_id: impl Into<String>) -> Self {
        self.sender_id = Some(sender_id.into());
        self
    }
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(rename = "SMSMessageData")]
    data: MessageData,
}

#[derive(Debug, Deserialize)]
struct MessageData {
    #[serde(rename = "Message", default)]
    message: String,
    #[serde(rename = "Recipients", default)]
    recipients: Vec<Recipient>,
}

#[derive(Debug, Deserialize)]
struct Recipient {
    #[serde(rename = "statusCode")]
    status_code: u16,
    #[serde(default)]
    status: String,
    #[serde(rename = "messageId", default)]
    message_id: String,
}

#[async_trait]
impl SmsSender for AfricasTalkingClient {
    async fn send(&self, to: &str, body: &str) -> Result<String> {
        let url = format!("{}/version1/messaging", self.base_url);

        let mut form = vec![
            ("username", self.username.as_str()),
            ("to", to),
            ("message", body),
        ];
        if let Some(ref from) = self.sender_id {
            form.push(("from", from.as_str()));
        }

        let response = self
            .client
            .post(&url)
            .header("apiKey", &self.api_key)
            .header("Accept", "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::from_http(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::from_status(SERVICE, status.as_u16(), &body));
        }

        let result: SendResponse = response
            .json()
            .await
            .map_err(|e| Error::from_http(SERVICE, e))?;

        let recipient = result.data.recipients.into_iter().next().ok_or_else(|| {
            Error::unavailable(SERVICE, format!("no recipients accepted: {}", result.data.message))
        })?;

        if !ACCEPTED_STATUS.contains(&recipient.status_code) {
            return Err(Error::UpstreamUnavailable {
                service: SERVICE,
                message: format!("recipient rejected: {}", recipient.status),
                status: Some(recipient.status_code),
            });
        }

        tracing::info!(
            to = %mask_phone(to),
            message_id = %recipient.message_id,
            "SMS accepted for delivery"
        );
        Ok(recipient.message_id)
    }
}
