//! Outbound messaging over the WhatsApp Cloud API.
//!
//! Every operation is a single POST to `/{version}/{phone_number_id}/messages`
//! with a bearer credential. Outcomes are reduced to `bool`: failures are
//! logged with the recipient, the HTTP status and the error payload, and never
//! propagated. There is no retry and no local state.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::ChannelError;
use crate::whatsapp::types::{ReadReceipt, TemplateMessage, TextMessage};

const CHANNEL: &str = "whatsapp";

/// WhatsApp's maximum text body length, in characters.
pub const MAX_TEXT_CHARS: usize = 4096;

pub const DEFAULT_API_BASE: &str = "https://graph.facebook.com";
pub const DEFAULT_API_VERSION: &str = "v21.0";

/// Outbound messaging operations used by the pipeline.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Send a free-form text message. Returns whether the provider accepted it.
    async fn send_text(&self, to: &str, body: &str) -> bool;

    /// Send a pre-approved template message.
    async fn send_template(
        &self,
        to: &str,
        template: &str,
        language: &str,
        components: &[Value],
    ) -> bool;

    /// Mark an inbound message as read.
    async fn mark_read(&self, message_id: &str) -> bool;
}

/// Cloud API connection settings.
#[derive(Debug, Clone)]
pub struct CloudApiConfig {
    pub access_token: SecretString,
    pub phone_number_id: String,
    pub api_base: String,
    pub api_version: String,
    pub timeout: Duration,
}

impl CloudApiConfig {
    pub fn new(access_token: SecretString, phone_number_id: impl Into<String>) -> Self {
        Self {
            access_token,
            phone_number_id: phone_number_id.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: Duration::from_secs(15),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }
}

/// [`MessagingGateway`] backed by the WhatsApp Cloud API.
#[derive(Debug, Clone)]
pub struct CloudApiGateway {
    client: reqwest::Client,
    access_token: SecretString,
    endpoint: String,
}

impl CloudApiGateway {
    pub fn new(config: CloudApiConfig) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ChannelError::Http(format!("failed to build HTTP client: {e}")))?;

        let endpoint = format!(
            "{}/{}/{}/messages",
            config.api_base.trim_end_matches('/'),
            config.api_version,
            config.phone_number_id
        );

        Ok(Self {
            client,
            access_token: config.access_token,
            endpoint,
        })
    }

    async fn post<T: Serialize + ?Sized>(&self, body: &T) -> Result<(), ChannelError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.access_token.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: CHANNEL.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(ChannelError::Rejected {
            name: CHANNEL.to_string(),
            status: status.as_u16(),
            body,
        })
    }
}

/// Log a failed send in one uniform shape.
fn log_failure(operation: &str, recipient: &str, err: &ChannelError) {
    match err {
        ChannelError::Rejected { status, body, .. } => {
            warn!(operation, recipient, status, error = %body, "WhatsApp API rejected request");
        }
        other => {
            warn!(operation, recipient, error = %other, "WhatsApp API request failed");
        }
    }
}

/// Truncate `body` to at most `MAX_TEXT_CHARS` characters.
pub fn truncate_text(body: &str) -> &str {
    match body.char_indices().nth(MAX_TEXT_CHARS) {
        Some((cut, _)) => &body[..cut],
        None => body,
    }
}

#[async_trait]
impl MessagingGateway for CloudApiGateway {
    async fn send_text(&self, to: &str, body: &str) -> bool {
        let text = truncate_text(body);
        if text.len() < body.len() {
            warn!(recipient = to, limit = MAX_TEXT_CHARS, "Truncating outbound text");
        }

        match self.post(&TextMessage::new(to, text)).await {
            Ok(()) => {
                info!(recipient = to, "WhatsApp text sent");
                true
            }
            Err(e) => {
                log_failure("send_text", to, &e);
                false
            }
        }
    }

    async fn send_template(
        &self,
        to: &str,
        template: &str,
        language: &str,
        components: &[Value],
    ) -> bool {
        match self
            .post(&TemplateMessage::new(to, template, language, components))
            .await
        {
            Ok(()) => {
                info!(recipient = to, template, "WhatsApp template sent");
                true
            }
            Err(e) => {
                log_failure("send_template", to, &e);
                false
            }
        }
    }

    async fn mark_read(&self, message_id: &str) -> bool {
        match self.post(&ReadReceipt::new(message_id)).await {
            Ok(()) => {
                debug!(message_id, "Marked message as read");
                true
            }
            Err(e) => {
                log_failure("mark_read", message_id, &e);
                false
            }
        }
    }
}
