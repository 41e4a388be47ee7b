//! Message processor: runs one inbound message through the full pipeline.
//!
//! Flow:
//! 1. Contact resolution (fatal on store error)
//! 2. Session resolution for the business-local day (fatal on store error)
//! 3. Qualification merge (non-fatal)
//! 4. Reply generation (never fails; falls back to fixed text)
//! 5. Session persistence (non-fatal)
//! 6. Delivery (logged, not retried)
//! 7. Intent check on the reply (non-fatal)
//!
//! If step 1 or 2 fails, exactly one apology is sent and nothing else runs.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::{debug, error, info, warn};

use crate::error::{DatabaseError, PipelineError};
use crate::pipeline::intent;
use crate::pipeline::types::{InboundMessage, ProcessOutcome, Stage};
use crate::qualification::{self, QualificationFlags};
use crate::replies::ReplyGenerator;
use crate::store::{
    Contact, ContactUpdate, ConversationSession, Database, SessionMessage, SessionUpdate,
};
use crate::whatsapp::MessagingGateway;

/// Pipeline settings fixed at startup.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Timezone whose calendar day bounds a conversation session.
    pub timezone: Tz,
    /// Send a read receipt for each inbound message before processing it.
    pub mark_read: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::America::Sao_Paulo,
            mark_read: false,
        }
    }
}

/// Runs inbound messages through contact, session, qualification, reply
/// and delivery.
pub struct MessageProcessor {
    store: Arc<dyn Database>,
    replies: ReplyGenerator,
    gateway: Arc<dyn MessagingGateway>,
    config: PipelineConfig,
}

impl MessageProcessor {
    pub fn new(
        store: Arc<dyn Database>,
        replies: ReplyGenerator,
        gateway: Arc<dyn MessagingGateway>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            replies,
            gateway,
            config,
        }
    }

    /// Process a single inbound message. Never returns an error; the
    /// outcome reports how far the run got.
    pub async fn process(&self, message: InboundMessage) -> ProcessOutcome {
        info!(
            phone = %message.from,
            message_id = %message.message_id,
            "Processing inbound message"
        );

        if self.config.mark_read && !message.message_id.is_empty() {
            let marked = self.gateway.mark_read(&message.message_id).await;
            debug!(message_id = %message.message_id, marked, "Read receipt");
        }

        let contact = match self.resolve_contact(&message).await {
            Ok(contact) => contact,
            Err(e) => return self.abort(&message, Stage::ContactResolution, e).await,
        };

        let mut session = match self.resolve_session(&contact).await {
            Ok(session) => session,
            Err(e) => return self.abort(&message, Stage::SessionResolution, e).await,
        };

        let contact = self.merge_qualification(&message, contact).await;

        session.push(SessionMessage::user(message.text.clone(), message.timestamp));
        let reply = self.replies.generate(&session.messages, &contact).await;
        session.push(SessionMessage::assistant(reply.clone()));

        if let Err(e) = self
            .store
            .update_session(session.id, &SessionUpdate::from_session(&session))
            .await
        {
            warn!(
                session_id = %session.id,
                stage = %Stage::SessionPersistence,
                error = %e,
                "Failed to persist session"
            );
        }

        let delivered = self.gateway.send_text(&message.from, &reply).await;
        if !delivered {
            warn!(phone = %message.from, stage = %Stage::Delivery, "Reply not delivered");
        }

        self.check_intent(&contact, &reply).await;

        info!(
            phone = %message.from,
            contact_id = %contact.id,
            session_id = %session.id,
            delivered,
            "Message processed"
        );
        ProcessOutcome::Completed { delivered, reply }
    }

    // ── Steps ───────────────────────────────────────────────────────

    async fn resolve_contact(&self, message: &InboundMessage) -> Result<Contact, PipelineError> {
        let profile_name = message
            .contact_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());

        let existing = self
            .store
            .get_contact_by_phone(&message.from)
            .await
            .map_err(PipelineError::ContactResolution)?;

        let Some(mut contact) = existing else {
            let contact = Contact::new(message.from.clone(), profile_name.map(String::from));
            return match self.store.insert_contact(&contact).await {
                Ok(()) => {
                    info!(phone = %contact.phone, contact_id = %contact.id, "New contact created");
                    Ok(contact)
                }
                // Another run inserted the same phone first.
                Err(DatabaseError::Constraint(_)) => self
                    .store
                    .get_contact_by_phone(&message.from)
                    .await
                    .map_err(PipelineError::ContactResolution)?
                    .ok_or_else(|| {
                        PipelineError::ContactResolution(DatabaseError::NotFound {
                            entity: "contact".into(),
                            id: message.from.clone(),
                        })
                    }),
                Err(e) => Err(PipelineError::ContactResolution(e)),
            };
        };

        if !contact.has_name()
            && let Some(name) = profile_name
        {
            let update = ContactUpdate {
                name: Some(name.to_string()),
                ..Default::default()
            };
            match self.store.update_contact(contact.id, &update).await {
                Ok(()) => contact.apply(&update),
                Err(e) => warn!(contact_id = %contact.id, error = %e, "Failed to fill contact name"),
            }
        }

        Ok(contact)
    }

    async fn resolve_session(
        &self,
        contact: &Contact,
    ) -> Result<ConversationSession, PipelineError> {
        let since = local_midnight(self.config.timezone, Utc::now());

        if let Some(session) = self
            .store
            .latest_session_since(contact.id, since)
            .await
            .map_err(PipelineError::SessionResolution)?
        {
            debug!(session_id = %session.id, "Reusing today's session");
            return Ok(session);
        }

        let session = ConversationSession::new(contact.id);
        self.store
            .insert_session(&session)
            .await
            .map_err(PipelineError::SessionResolution)?;
        debug!(session_id = %session.id, contact_id = %contact.id, "Started new session");
        Ok(session)
    }

    async fn merge_qualification(&self, message: &InboundMessage, mut contact: Contact) -> Contact {
        let evidence = qualification::infer(&message.text, &contact.qualification());
        let now = Utc::now();

        let update = if evidence.is_empty() {
            ContactUpdate {
                last_contact_at: Some(now),
                ..Default::default()
            }
        } else {
            let (score, status) = qualification::evaluate(&contact.flags.merged(&evidence));
            ContactUpdate {
                has_budget: evidence.has_budget,
                has_urgency: evidence.has_urgency,
                is_local: evidence.is_local,
                interested_in_appointment: evidence.interested_in_appointment,
                preferred_service: evidence.preferred_service,
                qualification_score: Some(score),
                qualification_status: Some(status),
                last_contact_at: Some(now),
                ..Default::default()
            }
        };

        if let Err(e) = self.store.update_contact(contact.id, &update).await {
            warn!(
                contact_id = %contact.id,
                stage = %Stage::QualificationMerge,
                error = %e,
                "Failed to persist qualification; continuing with current snapshot"
            );
            return contact;
        }

        if evidence.is_empty() {
            contact.apply(&update);
            return contact;
        }

        info!(
            contact_id = %contact.id,
            evidence = ?evidence,
            score = update.qualification_score,
            "Qualification updated"
        );

        match self.store.get_contact(contact.id).await {
            Ok(Some(fresh)) => fresh,
            Ok(None) | Err(_) => {
                debug!(contact_id = %contact.id, "Re-read after qualification update failed");
                contact.apply(&update);
                contact
            }
        }
    }

    async fn check_intent(&self, contact: &Contact, reply: &str) {
        if contact.flags.interested_in_appointment || !intent::confirms_appointment(reply) {
            return;
        }

        let flags = QualificationFlags {
            interested_in_appointment: true,
            ..contact.flags
        };
        let (score, status) = qualification::evaluate(&flags);
        let update = ContactUpdate {
            interested_in_appointment: Some(true),
            qualification_score: Some(score),
            qualification_status: Some(status),
            ..Default::default()
        };

        match self.store.update_contact(contact.id, &update).await {
            Ok(()) => info!(contact_id = %contact.id, score, "Appointment intent recorded from reply"),
            Err(e) => warn!(
                contact_id = %contact.id,
                stage = %Stage::IntentCheck,
                error = %e,
                "Failed to record appointment intent"
            ),
        }
    }

    async fn abort(
        &self,
        message: &InboundMessage,
        stage: Stage,
        cause: PipelineError,
    ) -> ProcessOutcome {
        error!(phone = %message.from, stage = %stage, error = %cause, "Pipeline aborted");
        let apology = self.replies.fallback_text();
        let apology_delivered = self.gateway.send_text(&message.from, &apology).await;
        ProcessOutcome::Aborted {
            stage,
            apology_delivered,
        }
    }
}

/// Start of the current calendar day in `tz`, as a UTC instant.
pub fn local_midnight(tz: Tz, now: DateTime<Utc>) -> DateTime<Utc> {
    let midnight = now.with_timezone(&tz).date_naive().and_time(NaiveTime::MIN);
    tz.from_local_datetime(&midnight)
        .earliest()
        // Midnight skipped by a DST jump: the day starts an hour later.
        .or_else(|| tz.from_local_datetime(&(midnight + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::Value;
    use uuid::Uuid;

    use crate::error::LlmError;
    use crate::llm::{CompletionRequest, CompletionResponse, LlmProvider};
    use crate::qualification::{QualificationStatus, ServiceCategory};
    use crate::store::{LibSqlBackend, Role};

    // ── Test doubles ────────────────────────────────────────────────

    pub(crate) struct MockLlm {
        pub reply: Option<String>,
    }

    #[async_trait]
    impl LlmProvider for MockLlm {
        fn model_name(&self) -> &str {
            "mock"
        }

        async fn complete(&self, _: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            match &self.reply {
                Some(text) => Ok(CompletionResponse {
                    content: text.clone(),
                    input_tokens: 0,
                    output_tokens: 0,
                    finish_reason: Some("stop".into()),
                }),
                None => Err(LlmError::RequestFailed {
                    provider: "mock".into(),
                    reason: "unavailable".into(),
                }),
            }
        }
    }

    #[derive(Default)]
    pub(crate) struct RecordingGateway {
        pub sent: Mutex<Vec<(String, String)>>,
        pub read: Mutex<Vec<String>>,
        pub fail: AtomicBool,
    }

    #[async_trait]
    impl MessagingGateway for RecordingGateway {
        async fn send_text(&self, to: &str, body: &str) -> bool {
            self.sent.lock().unwrap().push((to.into(), body.into()));
            !self.fail.load(Ordering::SeqCst)
        }

        async fn send_template(&self, _: &str, _: &str, _: &str, _: &[Value]) -> bool {
            true
        }

        async fn mark_read(&self, message_id: &str) -> bool {
            self.read.lock().unwrap().push(message_id.into());
            true
        }
    }

    /// Wraps the in-memory backend and fails selected operations.
    #[derive(Default)]
    struct Faults {
        contact_lookup: AtomicBool,
        session_lookup: AtomicBool,
        contact_update: AtomicBool,
        appointment_update: AtomicBool,
        session_update: AtomicBool,
    }

    struct FaultyStore {
        inner: LibSqlBackend,
        faults: Faults,
        writes: AtomicUsize,
    }

    impl FaultyStore {
        async fn new() -> Self {
            Self {
                inner: LibSqlBackend::new_memory().await.unwrap(),
                faults: Faults::default(),
                writes: AtomicUsize::new(0),
            }
        }

        fn check(flag: &AtomicBool, op: &str) -> Result<(), DatabaseError> {
            if flag.load(Ordering::SeqCst) {
                Err(DatabaseError::Query(format!("{op}: injected failure")))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl Database for FaultyStore {
        async fn run_migrations(&self) -> Result<(), DatabaseError> {
            self.inner.run_migrations().await
        }

        async fn get_contact_by_phone(&self, phone: &str) -> Result<Option<Contact>, DatabaseError> {
            Self::check(&self.faults.contact_lookup, "get_contact_by_phone")?;
            self.inner.get_contact_by_phone(phone).await
        }

        async fn get_contact(&self, id: Uuid) -> Result<Option<Contact>, DatabaseError> {
            self.inner.get_contact(id).await
        }

        async fn insert_contact(&self, contact: &Contact) -> Result<(), DatabaseError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.insert_contact(contact).await
        }

        async fn update_contact(&self, id: Uuid, update: &ContactUpdate) -> Result<(), DatabaseError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            Self::check(&self.faults.contact_update, "update_contact")?;
            if update.interested_in_appointment.is_some() {
                Self::check(&self.faults.appointment_update, "update_contact")?;
            }
            self.inner.update_contact(id, update).await
        }

        async fn latest_session_since(
            &self,
            contact_id: Uuid,
            since: DateTime<Utc>,
        ) -> Result<Option<ConversationSession>, DatabaseError> {
            Self::check(&self.faults.session_lookup, "latest_session_since")?;
            self.inner.latest_session_since(contact_id, since).await
        }

        async fn insert_session(&self, session: &ConversationSession) -> Result<(), DatabaseError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.insert_session(session).await
        }

        async fn update_session(
            &self,
            id: Uuid,
            update: &SessionUpdate<'_>,
        ) -> Result<(), DatabaseError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            Self::check(&self.faults.session_update, "update_session")?;
            self.inner.update_session(id, update).await
        }
    }

    struct Harness {
        store: Arc<FaultyStore>,
        gateway: Arc<RecordingGateway>,
        processor: MessageProcessor,
    }

    async fn harness(reply: Option<&str>, config: PipelineConfig) -> Harness {
        let store = Arc::new(FaultyStore::new().await);
        let gateway = Arc::new(RecordingGateway::default());
        let llm = Arc::new(MockLlm {
            reply: reply.map(String::from),
        });
        let processor = MessageProcessor::new(
            store.clone(),
            ReplyGenerator::new(llm, "+55 11 4000-0000"),
            gateway.clone(),
            config,
        );
        Harness {
            store,
            gateway,
            processor,
        }
    }

    const PHONE: &str = "5511999990000";

    /// Most recent session of the contact behind `phone`.
    pub(crate) async fn latest_session(store: &dyn Database, phone: &str) -> ConversationSession {
        let contact = store.get_contact_by_phone(phone).await.unwrap().unwrap();
        store
            .latest_session_since(contact.id, DateTime::<Utc>::UNIX_EPOCH)
            .await
            .unwrap()
            .unwrap()
    }

    // ── Happy path ──────────────────────────────────────────────────

    #[tokio::test]
    async fn first_message_creates_contact_session_and_two_entries() {
        let h = harness(Some("Olá! Como posso ajudar?"), PipelineConfig::default()).await;
        let outcome = h
            .processor
            .process(InboundMessage::new(PHONE, "oi").with_contact_name("Ana"))
            .await;

        assert_eq!(
            outcome,
            ProcessOutcome::Completed {
                delivered: true,
                reply: "Olá! Como posso ajudar?".into()
            }
        );

        let contact = h.store.get_contact_by_phone(PHONE).await.unwrap().unwrap();
        assert_eq!(contact.name.as_deref(), Some("Ana"));
        assert_eq!(contact.qualification_status, QualificationStatus::Pending);

        let session = latest_session(h.store.as_ref(), PHONE).await;
        assert_eq!(session.contact_id, contact.id);
        let entries = &session.messages;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].role, Role::User);
        assert_eq!(entries[0].content, "oi");
        assert_eq!(entries[1].role, Role::Assistant);
        assert_eq!(entries[1].content, "Olá! Como posso ajudar?");

        let sent = h.gateway.sent.lock().unwrap();
        assert_eq!(sent.as_slice(), &[(PHONE.to_string(), "Olá! Como posso ajudar?".to_string())]);
    }

    #[tokio::test]
    async fn same_day_messages_share_one_session() {
        let h = harness(Some("ok"), PipelineConfig::default()).await;
        h.processor.process(InboundMessage::new(PHONE, "oi")).await;
        h.processor.process(InboundMessage::new(PHONE, "tudo bem?")).await;

        let session = latest_session(h.store.as_ref(), PHONE).await;
        assert_eq!(session.messages.len(), 4);
        assert_eq!(session.user_messages, 2);
        assert_eq!(session.assistant_messages, 2);
    }

    #[tokio::test]
    async fn qualification_evidence_is_persisted_with_score() {
        let h = harness(Some("ok"), PipelineConfig::default()).await;
        h.processor
            .process(InboundMessage::new(PHONE, "Quanto custa o botox? Preciso para hoje"))
            .await;

        let contact = h.store.get_contact_by_phone(PHONE).await.unwrap().unwrap();
        assert!(contact.flags.has_budget);
        assert!(contact.flags.has_urgency);
        assert_eq!(contact.preferred_service, Some(ServiceCategory::Botox));
        assert_eq!(contact.qualification_score, 2);
        assert_eq!(contact.qualification_status, QualificationStatus::Pending);
    }

    #[tokio::test]
    async fn existing_name_is_never_overwritten() {
        let h = harness(Some("ok"), PipelineConfig::default()).await;
        h.processor
            .process(InboundMessage::new(PHONE, "oi").with_contact_name("Ana"))
            .await;
        h.processor
            .process(InboundMessage::new(PHONE, "oi").with_contact_name("Outra"))
            .await;

        let contact = h.store.get_contact_by_phone(PHONE).await.unwrap().unwrap();
        assert_eq!(contact.name.as_deref(), Some("Ana"));
    }

    #[tokio::test]
    async fn missing_name_is_filled_later() {
        let h = harness(Some("ok"), PipelineConfig::default()).await;
        h.processor.process(InboundMessage::new(PHONE, "oi")).await;
        h.processor
            .process(InboundMessage::new(PHONE, "oi").with_contact_name("Bia"))
            .await;

        let contact = h.store.get_contact_by_phone(PHONE).await.unwrap().unwrap();
        assert_eq!(contact.name.as_deref(), Some("Bia"));
    }

    #[tokio::test]
    async fn confirming_reply_sets_appointment_interest() {
        let h = harness(
            Some("Perfeito! Sua avaliação está agendada para quinta às 10h."),
            PipelineConfig::default(),
        )
        .await;
        h.processor.process(InboundMessage::new(PHONE, "pode ser quinta")).await;

        let contact = h.store.get_contact_by_phone(PHONE).await.unwrap().unwrap();
        assert!(contact.flags.interested_in_appointment);
        assert_eq!(contact.qualification_score, 1);
    }

    #[tokio::test]
    async fn read_receipt_sent_when_enabled() {
        let config = PipelineConfig {
            mark_read: true,
            ..Default::default()
        };
        let h = harness(Some("ok"), config).await;
        h.processor
            .process(InboundMessage::new(PHONE, "oi").with_message_id("wamid.1"))
            .await;
        assert_eq!(h.gateway.read.lock().unwrap().as_slice(), &["wamid.1".to_string()]);
    }

    #[tokio::test]
    async fn read_receipt_skipped_by_default() {
        let h = harness(Some("ok"), PipelineConfig::default()).await;
        h.processor
            .process(InboundMessage::new(PHONE, "oi").with_message_id("wamid.1"))
            .await;
        assert!(h.gateway.read.lock().unwrap().is_empty());
    }

    // ── Degraded paths ──────────────────────────────────────────────

    #[tokio::test]
    async fn ai_failure_delivers_fallback_and_persists_it() {
        let h = harness(None, PipelineConfig::default()).await;
        let outcome = h.processor.process(InboundMessage::new(PHONE, "oi")).await;

        let fallback = crate::replies::fallback_text("+55 11 4000-0000");
        assert_eq!(
            outcome,
            ProcessOutcome::Completed {
                delivered: true,
                reply: fallback.clone()
            }
        );
        let sent = h.gateway.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, fallback);

        let session = latest_session(h.store.as_ref(), PHONE).await;
        assert_eq!(session.messages[1].content, fallback);
    }

    #[tokio::test]
    async fn contact_lookup_failure_sends_one_apology_and_writes_nothing() {
        let h = harness(Some("ok"), PipelineConfig::default()).await;
        h.store.faults.contact_lookup.store(true, Ordering::SeqCst);

        let outcome = h.processor.process(InboundMessage::new(PHONE, "oi")).await;

        assert_eq!(
            outcome,
            ProcessOutcome::Aborted {
                stage: Stage::ContactResolution,
                apology_delivered: true
            }
        );
        let sent = h.gateway.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("+55 11 4000-0000"));
        assert_eq!(h.store.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn session_lookup_failure_aborts_after_contact() {
        let h = harness(Some("ok"), PipelineConfig::default()).await;
        h.store.faults.session_lookup.store(true, Ordering::SeqCst);

        let outcome = h.processor.process(InboundMessage::new(PHONE, "oi")).await;

        assert_eq!(
            outcome,
            ProcessOutcome::Aborted {
                stage: Stage::SessionResolution,
                apology_delivered: true
            }
        );
        assert_eq!(h.gateway.sent.lock().unwrap().len(), 1);
        // The contact insert happened; nothing after it did.
        assert_eq!(h.store.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn apology_delivery_failure_is_reported() {
        let h = harness(Some("ok"), PipelineConfig::default()).await;
        h.store.faults.contact_lookup.store(true, Ordering::SeqCst);
        h.gateway.fail.store(true, Ordering::SeqCst);

        let outcome = h.processor.process(InboundMessage::new(PHONE, "oi")).await;
        assert_eq!(
            outcome,
            ProcessOutcome::Aborted {
                stage: Stage::ContactResolution,
                apology_delivered: false
            }
        );
        assert_eq!(h.gateway.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn qualification_write_failure_still_replies() {
        let h = harness(Some("ok"), PipelineConfig::default()).await;
        h.store.faults.contact_update.store(true, Ordering::SeqCst);

        let outcome = h
            .processor
            .process(InboundMessage::new(PHONE, "qual o preço?"))
            .await;
        assert!(outcome.is_completed());
        assert_eq!(h.gateway.sent.lock().unwrap().len(), 1);

        let contact = h.store.get_contact_by_phone(PHONE).await.unwrap().unwrap();
        assert!(!contact.flags.has_budget);
    }

    #[tokio::test]
    async fn intent_write_failure_is_not_fatal() {
        let reply = "Perfeito! Sua avaliação está agendada para quinta às 10h.";
        let h = harness(Some(reply), PipelineConfig::default()).await;
        h.store.faults.appointment_update.store(true, Ordering::SeqCst);

        let outcome = h.processor.process(InboundMessage::new(PHONE, "pode ser quinta")).await;
        assert_eq!(
            outcome,
            ProcessOutcome::Completed {
                delivered: true,
                reply: reply.into()
            }
        );

        let sent = h.gateway.sent.lock().unwrap().clone();
        assert_eq!(sent, vec![(PHONE.to_string(), reply.to_string())]);

        let contact = h.store.get_contact_by_phone(PHONE).await.unwrap().unwrap();
        assert!(!contact.flags.interested_in_appointment);
        assert_eq!(contact.qualification_score, 0);
        assert_eq!(latest_session(h.store.as_ref(), PHONE).await.messages.len(), 2);
    }

    #[tokio::test]
    async fn session_write_failure_still_delivers() {
        let h = harness(Some("ok"), PipelineConfig::default()).await;
        h.store.faults.session_update.store(true, Ordering::SeqCst);

        let outcome = h.processor.process(InboundMessage::new(PHONE, "oi")).await;
        assert_eq!(
            outcome,
            ProcessOutcome::Completed {
                delivered: true,
                reply: "ok".into()
            }
        );
    }

    #[tokio::test]
    async fn delivery_failure_is_not_retried() {
        let h = harness(Some("ok"), PipelineConfig::default()).await;
        h.gateway.fail.store(true, Ordering::SeqCst);

        let outcome = h.processor.process(InboundMessage::new(PHONE, "oi")).await;
        assert_eq!(
            outcome,
            ProcessOutcome::Completed {
                delivered: false,
                reply: "ok".into()
            }
        );
        assert_eq!(h.gateway.sent.lock().unwrap().len(), 1);
    }

    // ── Session day boundary ────────────────────────────────────────

    #[test]
    fn local_midnight_uses_business_timezone() {
        // 02:30 UTC on Jan 10 is 23:30 on Jan 9 in São Paulo (UTC-3).
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 2, 30, 0).unwrap();
        let midnight = local_midnight(chrono_tz::America::Sao_Paulo, now);
        assert_eq!(midnight, Utc.with_ymd_and_hms(2025, 1, 9, 3, 0, 0).unwrap());
    }

    #[test]
    fn local_midnight_in_utc() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 15, 0, 0).unwrap();
        assert_eq!(
            local_midnight(chrono_tz::UTC, now),
            Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
        );
    }
}
