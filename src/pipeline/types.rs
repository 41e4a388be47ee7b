//! Shared types for the message processing pipeline.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Inbound message ─────────────────────────────────────────────────

/// One inbound text message extracted from a webhook notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Sender phone number, as reported by the provider.
    pub from: String,
    /// Message body.
    pub text: String,
    /// Display name from the sender's WhatsApp profile, when provided.
    pub contact_name: Option<String>,
    /// Provider message id (`wamid.*`).
    pub message_id: String,
    /// When the provider says the message was sent.
    pub timestamp: DateTime<Utc>,
}

impl InboundMessage {
    pub fn new(from: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            text: text.into(),
            contact_name: None,
            message_id: String::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_contact_name(mut self, name: impl Into<String>) -> Self {
        self.contact_name = Some(name.into());
        self
    }

    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = id.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

// ── Stages and outcome ──────────────────────────────────────────────

/// Pipeline steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ContactResolution,
    SessionResolution,
    QualificationMerge,
    SessionPersistence,
    Delivery,
    IntentCheck,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::ContactResolution => "contact_resolution",
            Self::SessionResolution => "session_resolution",
            Self::QualificationMerge => "qualification_merge",
            Self::SessionPersistence => "session_persistence",
            Self::Delivery => "delivery",
            Self::IntentCheck => "intent_check",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Terminal state of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    /// All steps ran. `delivered` reports whether the reply send succeeded.
    Completed { delivered: bool, reply: String },
    /// A fatal stage failed; only the apology was attempted.
    Aborted {
        stage: Stage,
        apology_delivered: bool,
    },
}

impl ProcessOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}
