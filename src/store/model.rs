//! Persisted records: contacts and their daily conversation sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::qualification::{
    QualificationFlags, QualificationState, QualificationStatus, ServiceCategory,
};

/// A contact (patient lead), identified by phone number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contact {
    pub id: Uuid,
    pub phone: String,
    pub name: Option<String>,
    pub flags: QualificationFlags,
    pub preferred_service: Option<ServiceCategory>,
    pub qualification_score: u8,
    pub qualification_status: QualificationStatus,
    /// Free-text notes maintained from the dashboard.
    pub notes: Option<String>,
    pub last_contact_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    /// A brand-new contact: no flags, status pending.
    pub fn new(phone: impl Into<String>, name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            phone: phone.into(),
            name,
            flags: QualificationFlags::default(),
            preferred_service: None,
            qualification_score: 0,
            qualification_status: QualificationStatus::Pending,
            notes: None,
            last_contact_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn qualification(&self) -> QualificationState {
        QualificationState {
            flags: self.flags,
            preferred_service: self.preferred_service,
        }
    }

    pub fn has_name(&self) -> bool {
        self.name.as_deref().is_some_and(|n| !n.trim().is_empty())
    }

    /// Apply a partial update to this in-memory snapshot.
    pub fn apply(&mut self, update: &ContactUpdate) {
        if let Some(ref name) = update.name {
            self.name = Some(name.clone());
        }
        if let Some(v) = update.has_budget {
            self.flags.has_budget = v;
        }
        if let Some(v) = update.has_urgency {
            self.flags.has_urgency = v;
        }
        if let Some(v) = update.is_local {
            self.flags.is_local = v;
        }
        if let Some(v) = update.interested_in_appointment {
            self.flags.interested_in_appointment = v;
        }
        if let Some(service) = update.preferred_service {
            self.preferred_service = Some(service);
        }
        if let Some(score) = update.qualification_score {
            self.qualification_score = score;
        }
        if let Some(status) = update.qualification_status {
            self.qualification_status = status;
        }
        if let Some(at) = update.last_contact_at {
            self.last_contact_at = at;
        }
    }
}

/// Partial contact update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactUpdate {
    pub name: Option<String>,
    pub has_budget: Option<bool>,
    pub has_urgency: Option<bool>,
    pub is_local: Option<bool>,
    pub interested_in_appointment: Option<bool>,
    pub preferred_service: Option<ServiceCategory>,
    pub qualification_score: Option<u8>,
    pub qualification_status: Option<QualificationStatus>,
    pub last_contact_at: Option<DateTime<Utc>>,
}

impl ContactUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Who authored a session entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn in a conversation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl SessionMessage {
    pub fn user(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// One calendar day of conversation with a contact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationSession {
    pub id: Uuid,
    pub contact_id: Uuid,
    pub messages: Vec<SessionMessage>,
    pub total_messages: u32,
    pub user_messages: u32,
    pub assistant_messages: u32,
    pub started_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
}

impl ConversationSession {
    /// An empty session starting now.
    pub fn new(contact_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            contact_id,
            messages: Vec::new(),
            total_messages: 0,
            user_messages: 0,
            assistant_messages: 0,
            started_at: now,
            last_message_at: now,
        }
    }

    /// Append an entry and keep counters and `last_message_at` in step.
    pub fn push(&mut self, message: SessionMessage) {
        match message.role {
            Role::User => self.user_messages += 1,
            Role::Assistant => self.assistant_messages += 1,
        }
        self.total_messages += 1;
        self.last_message_at = message.timestamp.max(self.last_message_at);
        self.messages.push(message);
    }

    /// The most recent `limit` entries, oldest first.
    pub fn recent(&self, limit: usize) -> &[SessionMessage] {
        let start = self.messages.len().saturating_sub(limit);
        &self.messages[start..]
    }
}
