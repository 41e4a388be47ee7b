//! `Database` trait: the record-store operations the pipeline needs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::store::model::{Contact, ContactUpdate, ConversationSession, SessionMessage};

/// Full overwrite of a session's history bookkeeping.
#[derive(Debug, Clone)]
pub struct SessionUpdate<'a> {
    pub messages: &'a [SessionMessage],
    pub total_messages: u32,
    pub user_messages: u32,
    pub assistant_messages: u32,
    pub last_message_at: DateTime<Utc>,
}

impl<'a> SessionUpdate<'a> {
    pub fn from_session(session: &'a ConversationSession) -> Self {
        Self {
            messages: &session.messages,
            total_messages: session.total_messages,
            user_messages: session.user_messages,
            assistant_messages: session.assistant_messages,
            last_message_at: session.last_message_at,
        }
    }
}

/// Backend-agnostic record store.
///
/// Every operation may fail; callers decide whether a failure is fatal.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Contacts ────────────────────────────────────────────────────

    /// Look up a contact by its unique phone number.
    async fn get_contact_by_phone(&self, phone: &str) -> Result<Option<Contact>, DatabaseError>;

    /// Get a contact by ID.
    async fn get_contact(&self, id: Uuid) -> Result<Option<Contact>, DatabaseError>;

    /// Insert a new contact.
    async fn insert_contact(&self, contact: &Contact) -> Result<(), DatabaseError>;

    /// Apply a partial update. Empty updates are a no-op.
    async fn update_contact(&self, id: Uuid, update: &ContactUpdate) -> Result<(), DatabaseError>;

    // ── Sessions ────────────────────────────────────────────────────

    /// Most recent session for a contact with `started_at >= since`.
    async fn latest_session_since(
        &self,
        contact_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Option<ConversationSession>, DatabaseError>;

    /// Insert a new session.
    async fn insert_session(&self, session: &ConversationSession) -> Result<(), DatabaseError>;

    /// Overwrite a session's messages, counters and `last_message_at`.
    async fn update_session(
        &self,
        id: Uuid,
        update: &SessionUpdate<'_>,
    ) -> Result<(), DatabaseError>;
}
