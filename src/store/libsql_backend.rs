//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file, in-memory and remote (`libsql://`, `https://`)
//! databases. Timestamps are written as RFC 3339 UTC strings with a fixed
//! precision so that string comparison in SQL orders them chronologically.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::qualification::{QualificationFlags, QualificationStatus, ServiceCategory};
use crate::store::migrations;
use crate::store::model::{Contact, ContactUpdate, ConversationSession, SessionMessage};
use crate::store::traits::{Database, SessionUpdate};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Connect to a remote libSQL server and run migrations.
    pub async fn new_remote(url: &str, auth_token: &str) -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_remote(url.to_string(), auth_token.to_string())
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to connect to {url}: {e}")))?;

        let backend = Self::from_database(db).await?;
        info!(url = url, "Remote database connected");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Canonical timestamp encoding.
fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Convert `Option<String>` to libsql Value.
fn opt_text_owned(s: Option<String>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s),
        None => libsql::Value::Null,
    }
}

fn flag(value: bool) -> libsql::Value {
    libsql::Value::Integer(i64::from(value))
}

const CONTACT_COLUMNS: &str = "id, phone, name, has_budget, has_urgency, is_local, \
    interested_in_appointment, preferred_service, qualification_score, qualification_status, \
    notes, last_contact_at, created_at, updated_at";

const SESSION_COLUMNS: &str = "id, contact_id, messages, total_messages, user_messages, \
    assistant_messages, started_at, last_message_at";

/// Map a libsql Row to a Contact. Column order matches CONTACT_COLUMNS.
fn row_to_contact(row: &libsql::Row) -> Result<Contact, DatabaseError> {
    let err = |e: libsql::Error| DatabaseError::Query(format!("contact row parse: {e}"));

    let id_str: String = row.get(0).map_err(err)?;
    let service_str: Option<String> = row.get(7).ok();
    let status_str: String = row.get(9).map_err(err)?;
    let last_contact_str: String = row.get(11).map_err(err)?;
    let created_str: String = row.get(12).map_err(err)?;
    let updated_str: String = row.get(13).map_err(err)?;

    Ok(Contact {
        id: Uuid::parse_str(&id_str)
            .map_err(|e| DatabaseError::Serialization(format!("contact id: {e}")))?,
        phone: row.get(1).map_err(err)?,
        name: row.get(2).ok(),
        flags: QualificationFlags {
            has_budget: row.get::<i64>(3).map_err(err)? != 0,
            has_urgency: row.get::<i64>(4).map_err(err)? != 0,
            is_local: row.get::<i64>(5).map_err(err)? != 0,
            interested_in_appointment: row.get::<i64>(6).map_err(err)? != 0,
        },
        preferred_service: service_str.and_then(|s| s.parse::<ServiceCategory>().ok()),
        qualification_score: row.get::<i64>(8).map_err(err)?.clamp(0, 4) as u8,
        qualification_status: status_str
            .parse::<QualificationStatus>()
            .unwrap_or_default(),
        notes: row.get(10).ok(),
        last_contact_at: parse_datetime(&last_contact_str),
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

/// Map a libsql Row to a ConversationSession. Column order matches SESSION_COLUMNS.
fn row_to_session(row: &libsql::Row) -> Result<ConversationSession, DatabaseError> {
    let err = |e: libsql::Error| DatabaseError::Query(format!("session row parse: {e}"));

    let id_str: String = row.get(0).map_err(err)?;
    let contact_str: String = row.get(1).map_err(err)?;
    let messages_str: String = row.get(2).map_err(err)?;
    let started_str: String = row.get(6).map_err(err)?;
    let last_str: String = row.get(7).map_err(err)?;

    let messages: Vec<SessionMessage> = serde_json::from_str(&messages_str)
        .map_err(|e| DatabaseError::Serialization(format!("session messages: {e}")))?;

    Ok(ConversationSession {
        id: Uuid::parse_str(&id_str)
            .map_err(|e| DatabaseError::Serialization(format!("session id: {e}")))?,
        contact_id: Uuid::parse_str(&contact_str)
            .map_err(|e| DatabaseError::Serialization(format!("session contact id: {e}")))?,
        messages,
        total_messages: row.get::<i64>(3).map_err(err)?.max(0) as u32,
        user_messages: row.get::<i64>(4).map_err(err)?.max(0) as u32,
        assistant_messages: row.get::<i64>(5).map_err(err)?.max(0) as u32,
        started_at: parse_datetime(&started_str),
        last_message_at: parse_datetime(&last_str),
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Contacts ────────────────────────────────────────────────────

    async fn get_contact_by_phone(&self, phone: &str) -> Result<Option<Contact>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE phone = ?1"),
                params![phone],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_contact_by_phone: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_contact(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_contact_by_phone: {e}"))),
        }
    }

    async fn get_contact(&self, id: Uuid) -> Result<Option<Contact>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_contact: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_contact(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_contact: {e}"))),
        }
    }

    async fn insert_contact(&self, contact: &Contact) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO contacts ({CONTACT_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
                ),
                params![
                    contact.id.to_string(),
                    contact.phone.clone(),
                    opt_text_owned(contact.name.clone()),
                    flag(contact.flags.has_budget),
                    flag(contact.flags.has_urgency),
                    flag(contact.flags.is_local),
                    flag(contact.flags.interested_in_appointment),
                    opt_text_owned(contact.preferred_service.map(|s| s.as_str().to_string())),
                    i64::from(contact.qualification_score),
                    contact.qualification_status.as_str(),
                    opt_text_owned(contact.notes.clone()),
                    ts(contact.last_contact_at),
                    ts(contact.created_at),
                    ts(contact.updated_at),
                ],
            )
            .await
            .map_err(|e| {
                let msg = e.to_string();
                if msg.contains("UNIQUE") {
                    DatabaseError::Constraint(format!("insert_contact: {msg}"))
                } else {
                    DatabaseError::Query(format!("insert_contact: {msg}"))
                }
            })?;

        debug!(contact_id = %contact.id, phone = %contact.phone, "Contact inserted into DB");
        Ok(())
    }

    async fn update_contact(&self, id: Uuid, update: &ContactUpdate) -> Result<(), DatabaseError> {
        if update.is_empty() {
            return Ok(());
        }

        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<libsql::Value> = Vec::new();

        if let Some(ref name) = update.name {
            sets.push("name = ?");
            values.push(libsql::Value::Text(name.clone()));
        }
        if let Some(v) = update.has_budget {
            sets.push("has_budget = ?");
            values.push(flag(v));
        }
        if let Some(v) = update.has_urgency {
            sets.push("has_urgency = ?");
            values.push(flag(v));
        }
        if let Some(v) = update.is_local {
            sets.push("is_local = ?");
            values.push(flag(v));
        }
        if let Some(v) = update.interested_in_appointment {
            sets.push("interested_in_appointment = ?");
            values.push(flag(v));
        }
        if let Some(service) = update.preferred_service {
            sets.push("preferred_service = ?");
            values.push(libsql::Value::Text(service.as_str().to_string()));
        }
        if let Some(score) = update.qualification_score {
            sets.push("qualification_score = ?");
            values.push(libsql::Value::Integer(i64::from(score)));
        }
        if let Some(status) = update.qualification_status {
            sets.push("qualification_status = ?");
            values.push(libsql::Value::Text(status.as_str().to_string()));
        }
        if let Some(at) = update.last_contact_at {
            sets.push("last_contact_at = ?");
            values.push(libsql::Value::Text(ts(at)));
        }
        sets.push("updated_at = ?");
        values.push(libsql::Value::Text(ts(Utc::now())));
        values.push(libsql::Value::Text(id.to_string()));

        let sql = format!("UPDATE contacts SET {} WHERE id = ?", sets.join(", "));
        let changed = self
            .conn()
            .execute(&sql, libsql::params::Params::Positional(values))
            .await
            .map_err(|e| DatabaseError::Query(format!("update_contact: {e}")))?;

        if changed == 0 {
            return Err(DatabaseError::NotFound {
                entity: "contact".into(),
                id: id.to_string(),
            });
        }

        debug!(contact_id = %id, fields = sets.len() - 1, "Contact updated in DB");
        Ok(())
    }

    // ── Sessions ────────────────────────────────────────────────────

    async fn latest_session_since(
        &self,
        contact_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Option<ConversationSession>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {SESSION_COLUMNS} FROM conversation_sessions \
                     WHERE contact_id = ?1 AND started_at >= ?2 \
                     ORDER BY started_at DESC LIMIT 1"
                ),
                params![contact_id.to_string(), ts(since)],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("latest_session_since: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_session(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("latest_session_since: {e}"))),
        }
    }

    async fn insert_session(&self, session: &ConversationSession) -> Result<(), DatabaseError> {
        let messages = serde_json::to_string(&session.messages)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        self.conn()
            .execute(
                &format!(
                    "INSERT INTO conversation_sessions ({SESSION_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
                ),
                params![
                    session.id.to_string(),
                    session.contact_id.to_string(),
                    messages,
                    i64::from(session.total_messages),
                    i64::from(session.user_messages),
                    i64::from(session.assistant_messages),
                    ts(session.started_at),
                    ts(session.last_message_at),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_session: {e}")))?;

        debug!(session_id = %session.id, contact_id = %session.contact_id, "Session inserted into DB");
        Ok(())
    }

    async fn update_session(
        &self,
        id: Uuid,
        update: &SessionUpdate<'_>,
    ) -> Result<(), DatabaseError> {
        let messages = serde_json::to_string(update.messages)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        let changed = self
            .conn()
            .execute(
                "UPDATE conversation_sessions
                 SET messages = ?1, total_messages = ?2, user_messages = ?3,
                     assistant_messages = ?4, last_message_at = ?5
                 WHERE id = ?6",
                params![
                    messages,
                    i64::from(update.total_messages),
                    i64::from(update.user_messages),
                    i64::from(update.assistant_messages),
                    ts(update.last_message_at),
                    id.to_string(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_session: {e}")))?;

        if changed == 0 {
            return Err(DatabaseError::NotFound {
                entity: "session".into(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    // ── Contact tests ───────────────────────────────────────────────

    #[tokio::test]
    async fn insert_and_get_contact_by_phone() {
        let db = test_db().await;
        let contact = Contact::new("5511988887777", Some("Ana".into()));
        db.insert_contact(&contact).await.unwrap();

        let fetched = db.get_contact_by_phone("5511988887777").await.unwrap().unwrap();
        assert_eq!(fetched.id, contact.id);
        assert_eq!(fetched.name.as_deref(), Some("Ana"));
        assert_eq!(fetched.qualification_status, QualificationStatus::Pending);
        assert_eq!(fetched.flags, QualificationFlags::default());
        assert!(fetched.preferred_service.is_none());
    }

    #[tokio::test]
    async fn get_contact_not_found() {
        let db = test_db().await;
        assert!(db.get_contact_by_phone("000").await.unwrap().is_none());
        assert!(db.get_contact(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_phone_is_constraint_error() {
        let db = test_db().await;
        db.insert_contact(&Contact::new("123", None)).await.unwrap();
        let err = db.insert_contact(&Contact::new("123", None)).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Constraint(_)));
    }

    #[tokio::test]
    async fn partial_update_touches_only_given_fields() {
        let db = test_db().await;
        let contact = Contact::new("555", Some("Bia".into()));
        db.insert_contact(&contact).await.unwrap();

        let update = ContactUpdate {
            has_urgency: Some(true),
            preferred_service: Some(ServiceCategory::Filler),
            qualification_score: Some(1),
            qualification_status: Some(QualificationStatus::Pending),
            ..Default::default()
        };
        db.update_contact(contact.id, &update).await.unwrap();

        let fetched = db.get_contact(contact.id).await.unwrap().unwrap();
        assert!(fetched.flags.has_urgency);
        assert!(!fetched.flags.has_budget);
        assert_eq!(fetched.preferred_service, Some(ServiceCategory::Filler));
        assert_eq!(fetched.qualification_score, 1);
        assert_eq!(fetched.name.as_deref(), Some("Bia"));
    }

    #[tokio::test]
    async fn empty_update_is_noop() {
        let db = test_db().await;
        // Even for an unknown id: nothing is written, nothing can fail.
        db.update_contact(Uuid::new_v4(), &ContactUpdate::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn update_unknown_contact_is_not_found() {
        let db = test_db().await;
        let update = ContactUpdate {
            is_local: Some(true),
            ..Default::default()
        };
        let err = db.update_contact(Uuid::new_v4(), &update).await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    // ── Session tests ───────────────────────────────────────────────

    #[tokio::test]
    async fn insert_and_find_latest_session() {
        let db = test_db().await;
        let contact = Contact::new("777", None);
        db.insert_contact(&contact).await.unwrap();

        let mut older = ConversationSession::new(contact.id);
        older.started_at = Utc::now() - Duration::hours(2);
        let newer = ConversationSession::new(contact.id);
        db.insert_session(&older).await.unwrap();
        db.insert_session(&newer).await.unwrap();

        let since = Utc::now() - Duration::hours(3);
        let found = db.latest_session_since(contact.id, since).await.unwrap().unwrap();
        assert_eq!(found.id, newer.id);
    }

    #[tokio::test]
    async fn sessions_before_cutoff_are_ignored() {
        let db = test_db().await;
        let contact = Contact::new("778", None);
        db.insert_contact(&contact).await.unwrap();

        let mut yesterday = ConversationSession::new(contact.id);
        yesterday.started_at = Utc::now() - Duration::days(1);
        db.insert_session(&yesterday).await.unwrap();

        let cutoff = Utc::now() - Duration::hours(1);
        assert!(db.latest_session_since(contact.id, cutoff).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_session_overwrites_history() {
        let db = test_db().await;
        let contact = Contact::new("779", None);
        db.insert_contact(&contact).await.unwrap();
        let mut session = ConversationSession::new(contact.id);
        db.insert_session(&session).await.unwrap();

        session.push(SessionMessage::user("oi", Utc::now()));
        session.push(SessionMessage::assistant("olá"));
        db.update_session(session.id, &SessionUpdate::from_session(&session))
            .await
            .unwrap();

        let stored = db
            .latest_session_since(contact.id, DateTime::<Utc>::UNIX_EPOCH)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.id, session.id);
        assert_eq!(stored.messages.len(), 2);
        assert_eq!(stored.total_messages, 2);
        assert_eq!(stored.user_messages, 1);
        assert_eq!(stored.assistant_messages, 1);
        assert_eq!(stored.messages[1].content, "olá");
    }

    #[tokio::test]
    async fn local_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("concierge.db");
        {
            let db = LibSqlBackend::new_local(&path).await.unwrap();
            db.insert_contact(&Contact::new("42", None)).await.unwrap();
        }
        let db = LibSqlBackend::new_local(&path).await.unwrap();
        assert!(db.get_contact_by_phone("42").await.unwrap().is_some());
    }

    #[test]
    fn timestamps_sort_lexicographically() {
        let a = Utc::now();
        let b = a + Duration::milliseconds(1);
        assert!(ts(a) < ts(b));
        assert_eq!(parse_datetime(&ts(a)).timestamp_micros(), a.timestamp_micros());
    }
}
