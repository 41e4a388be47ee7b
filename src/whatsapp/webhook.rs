//! Webhook endpoints: verification handshake, notification intake, health.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::pipeline::{Dispatcher, InboundMessage};
use crate::whatsapp::types::{
    BUSINESS_ACCOUNT_OBJECT, WebhookContact, WebhookNotification, WebhookValue,
};

/// Shared state for webhook routes.
#[derive(Clone)]
pub struct WebhookState {
    pub verify_token: Arc<SecretString>,
    pub dispatcher: Dispatcher,
}

/// Query parameters of the verification handshake.
#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// GET /webhook
///
/// Echoes `hub.challenge` when the mode is `subscribe` and the token
/// matches; 403 otherwise.
async fn verify(State(state): State<WebhookState>, Query(params): Query<VerifyParams>) -> Response {
    let token_ok = params
        .verify_token
        .as_deref()
        .is_some_and(|t| t == state.verify_token.expose_secret());

    if params.mode.as_deref() == Some("subscribe") && token_ok {
        info!("Webhook verified");
        (StatusCode::OK, params.challenge.unwrap_or_default()).into_response()
    } else {
        warn!(mode = ?params.mode, "Webhook verification rejected");
        StatusCode::FORBIDDEN.into_response()
    }
}

/// POST /webhook
///
/// 500 for a body that is not JSON, 404 for a foreign `object`, otherwise
/// every text message is dispatched and 200 is returned immediately.
async fn receive(State(state): State<WebhookState>, body: String) -> Response {
    let payload: Value = match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "Webhook body is not valid JSON");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "invalid JSON"})),
            )
                .into_response();
        }
    };

    if payload.get("object").and_then(Value::as_str) != Some(BUSINESS_ACCOUNT_OBJECT) {
        debug!(object = ?payload.get("object"), "Ignoring non-WhatsApp notification");
        return StatusCode::NOT_FOUND.into_response();
    }

    let notification: WebhookNotification = match serde_json::from_value(payload) {
        Ok(n) => n,
        Err(e) => {
            warn!(error = %e, "Webhook body has unexpected shape");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "unexpected payload shape"})),
            )
                .into_response();
        }
    };

    let messages = extract_text_messages(&notification);
    debug!(count = messages.len(), "Dispatching inbound messages");
    for message in messages {
        // Fire and forget: the handle is dropped.
        drop(state.dispatcher.dispatch(message));
    }

    StatusCode::OK.into_response()
}

/// GET /health
async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Walk `entry[].changes[].value.messages[]` and keep text messages.
pub fn extract_text_messages(notification: &WebhookNotification) -> Vec<InboundMessage> {
    let mut out = Vec::new();

    for entry in &notification.entry {
        for change in &entry.changes {
            let Some(value) = &change.value else {
                continue;
            };

            for msg in &value.messages {
                if msg.msg_type != "text" {
                    debug!(msg_type = %msg.msg_type, "Ignoring non-text message");
                    continue;
                }
                let Some(text) = msg.text.as_ref().filter(|t| !t.body.trim().is_empty()) else {
                    continue;
                };
                if msg.from.trim().is_empty() {
                    continue;
                }

                let contact_name = sender_profile(value, &msg.from)
                    .and_then(|c| c.profile.as_ref())
                    .map(|p| p.name.trim())
                    .filter(|n| !n.is_empty())
                    .map(String::from);

                let timestamp = msg
                    .timestamp
                    .parse::<i64>()
                    .ok()
                    .and_then(|secs| DateTime::from_timestamp(secs, 0))
                    .unwrap_or_else(Utc::now);

                out.push(InboundMessage {
                    from: msg.from.trim().to_string(),
                    text: text.body.clone(),
                    contact_name,
                    message_id: msg.id.clone(),
                    timestamp,
                });
            }
        }
    }

    out
}

/// The `contacts[]` entry describing `from`. An entry without a `wa_id` is
/// only trusted when it is the sole contact for a sole message.
fn sender_profile<'a>(value: &'a WebhookValue, from: &str) -> Option<&'a WebhookContact> {
    if let Some(contact) = value.contacts.iter().find(|c| c.wa_id == from) {
        return Some(contact);
    }
    match (value.contacts.as_slice(), value.messages.len()) {
        ([only], 1) if only.wa_id.is_empty() => Some(only),
        _ => None,
    }
}

/// Build the webhook routes with request tracing.
pub fn webhook_routes(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook", get(verify).post(receive))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
