//! WhatsApp Cloud API wire types.
//!
//! Inbound webhook structs tolerate missing fields: every field carries a
//! serde default so that unrelated notification shapes (status updates,
//! media messages) deserialize cleanly and are filtered later.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Expected `object` value on every webhook notification.
pub const BUSINESS_ACCOUNT_OBJECT: &str = "whatsapp_business_account";

// ── Inbound ─────────────────────────────────────────────────────────

/// Top-level webhook notification.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookNotification {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub value: Option<WebhookValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookValue {
    #[serde(default)]
    pub messages: Vec<WebhookMessage>,
    #[serde(default)]
    pub contacts: Vec<WebhookContact>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookMessage {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub id: String,
    /// Unix seconds, as a decimal string.
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, rename = "type")]
    pub msg_type: String,
    #[serde(default)]
    pub text: Option<WebhookText>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookText {
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookContact {
    #[serde(default)]
    pub wa_id: String,
    #[serde(default)]
    pub profile: Option<WebhookProfile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookProfile {
    #[serde(default)]
    pub name: String,
}

// ── Outbound ────────────────────────────────────────────────────────

/// Body of a `POST /{phone_number_id}/messages` text send.
#[derive(Debug, Clone, Serialize)]
pub struct TextMessage<'a> {
    pub messaging_product: &'static str,
    pub recipient_type: &'static str,
    pub to: &'a str,
    #[serde(rename = "type")]
    pub msg_type: &'static str,
    pub text: TextBody<'a>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextBody<'a> {
    pub preview_url: bool,
    pub body: &'a str,
}

impl<'a> TextMessage<'a> {
    pub fn new(to: &'a str, body: &'a str) -> Self {
        Self {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to,
            msg_type: "text",
            text: TextBody {
                preview_url: false,
                body,
            },
        }
    }
}

/// Body of a pre-approved template send.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateMessage<'a> {
    pub messaging_product: &'static str,
    pub to: &'a str,
    #[serde(rename = "type")]
    pub msg_type: &'static str,
    pub template: TemplateBody<'a>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateBody<'a> {
    pub name: &'a str,
    pub language: TemplateLanguage<'a>,
    #[serde(skip_serializing_if = "no_components")]
    pub components: &'a [Value],
}

fn no_components(components: &&[Value]) -> bool {
    components.is_empty()
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateLanguage<'a> {
    pub code: &'a str,
}

impl<'a> TemplateMessage<'a> {
    pub fn new(to: &'a str, name: &'a str, language: &'a str, components: &'a [Value]) -> Self {
        Self {
            messaging_product: "whatsapp",
            to,
            msg_type: "template",
            template: TemplateBody {
                name,
                language: TemplateLanguage { code: language },
                components,
            },
        }
    }
}

/// Read receipt for an inbound message.
#[derive(Debug, Clone, Serialize)]
pub struct ReadReceipt<'a> {
    pub messaging_product: &'static str,
    pub status: &'static str,
    pub message_id: &'a str,
}

impl<'a> ReadReceipt<'a> {
    pub fn new(message_id: &'a str) -> Self {
        Self {
            messaging_product: "whatsapp",
            status: "read",
            message_id,
        }
    }
}
