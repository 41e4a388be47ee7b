//! AI reply generation with a fixed fallback.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::replies::prompts;
use crate::store::{Contact, Role, SessionMessage};

/// Most recent session entries sent as conversation context.
pub const HISTORY_LIMIT: usize = 10;

pub const MAX_TOKENS: u32 = 500;
pub const TEMPERATURE: f32 = 0.7;
pub const FREQUENCY_PENALTY: f32 = 0.3;
pub const PRESENCE_PENALTY: f32 = 0.3;

/// Produces the assistant's reply for a conversation.
pub struct ReplyGenerator {
    llm: Arc<dyn LlmProvider>,
    business_phone: String,
}

impl ReplyGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>, business_phone: impl Into<String>) -> Self {
        Self {
            llm,
            business_phone: business_phone.into(),
        }
    }

    /// Text sent when the AI call fails in any way.
    pub fn fallback_text(&self) -> String {
        fallback_text(&self.business_phone)
    }

    /// Generate a reply from the session history and contact profile.
    ///
    /// Never fails: any provider error is logged and replaced by
    /// [`fallback_text`](Self::fallback_text). No retry.
    pub async fn generate(&self, history: &[SessionMessage], contact: &Contact) -> String {
        let start = history.len().saturating_sub(HISTORY_LIMIT);
        let recent = &history[start..];

        let mut messages = Vec::with_capacity(recent.len() + 1);
        messages.push(ChatMessage::system(prompts::system_prompt(
            contact,
            &self.business_phone,
        )));
        messages.extend(recent.iter().map(|m| match m.role {
            Role::User => ChatMessage::user(m.content.clone()),
            Role::Assistant => ChatMessage::assistant(m.content.clone()),
        }));

        let request = CompletionRequest::new(messages)
            .with_max_tokens(MAX_TOKENS)
            .with_temperature(TEMPERATURE)
            .with_frequency_penalty(FREQUENCY_PENALTY)
            .with_presence_penalty(PRESENCE_PENALTY);

        match self.llm.complete(request).await {
            Ok(response) => {
                debug!(
                    model = self.llm.model_name(),
                    input_tokens = response.input_tokens,
                    output_tokens = response.output_tokens,
                    "Reply generated"
                );
                response.content
            }
            Err(e) => {
                warn!(contact_id = %contact.id, error = %e, "Reply generation failed, using fallback");
                self.fallback_text()
            }
        }
    }
}

/// Fallback text, pointing the user at the business phone.
pub fn fallback_text(business_phone: &str) -> String {
    format!(
        "Desculpe, estou com uma instabilidade no momento. \
         Por favor, tente novamente em instantes ou ligue para {business_phone}."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;

    use crate::error::LlmError;
    use crate::llm::{ChatRole, CompletionResponse};

    const PHONE: &str = "+55 11 4000-0000";

    struct MockLlm {
        response: Option<String>,
        captured: Mutex<Vec<CompletionRequest>>,
    }

    impl MockLlm {
        fn ok(text: &str) -> Self {
            Self {
                response: Some(text.into()),
                captured: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                response: None,
                captured: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for MockLlm {
        fn model_name(&self) -> &str {
            "mock"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            self.captured.lock().unwrap().push(request);
            match &self.response {
                Some(text) => Ok(CompletionResponse {
                    content: text.clone(),
                    input_tokens: 0,
                    output_tokens: 0,
                    finish_reason: None,
                }),
                None => Err(LlmError::RequestFailed {
                    provider: "mock".into(),
                    reason: "down".into(),
                }),
            }
        }
    }

    fn history(n: usize) -> Vec<SessionMessage> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    SessionMessage::user(format!("u{i}"), Utc::now())
                } else {
                    SessionMessage::assistant(format!("a{i}"))
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn success_returns_text_verbatim() {
        let llm = Arc::new(MockLlm::ok("  Olá, Ana!  "));
        let generator = ReplyGenerator::new(llm, PHONE);
        let reply = generator
            .generate(&history(1), &Contact::new("1", Some("Ana".into())))
            .await;
        assert_eq!(reply, "  Olá, Ana!  ");
    }

    #[tokio::test]
    async fn failure_returns_fallback_with_phone() {
        let generator =
            ReplyGenerator::new(Arc::new(MockLlm::failing()), PHONE);
        let reply = generator.generate(&history(1), &Contact::new("1", None)).await;
        assert_eq!(reply, generator.fallback_text());
        assert!(reply.contains(PHONE));
    }

    #[tokio::test]
    async fn history_is_capped_and_system_prompt_first() {
        let llm = Arc::new(MockLlm::ok("ok"));
        let generator = ReplyGenerator::new(llm.clone(), PHONE);
        generator.generate(&history(15), &Contact::new("1", None)).await;

        let captured = llm.captured.lock().unwrap();
        assert_eq!(captured.len(), 1);
        let req = &captured[0];
        assert_eq!(req.messages.len(), HISTORY_LIMIT + 1);
        assert_eq!(req.messages[0].role, ChatRole::System);
        assert_eq!(req.messages[1].content, "a5");
        assert_eq!(req.messages[10].content, "u14");
        assert_eq!(req.max_tokens, Some(500));
        assert_eq!(req.temperature, Some(0.7));
        assert_eq!(req.frequency_penalty, Some(0.3));
        assert_eq!(req.presence_penalty, Some(0.3));
    }

    #[test]
    fn fallback_always_names_the_phone() {
        let text = fallback_text("(11) 3333-4444");
        assert!(text.ends_with("ligue para (11) 3333-4444."));
    }

    #[tokio::test]
    async fn system_prompt_carries_business_phone() {
        let llm = Arc::new(MockLlm::ok("ok"));
        let generator = ReplyGenerator::new(llm.clone(), PHONE);
        generator.generate(&history(1), &Contact::new("1", None)).await;

        let captured = llm.captured.lock().unwrap();
        assert!(captured[0].messages[0].content.contains(PHONE));
    }

    #[tokio::test]
    async fn roles_map_across() {
        let llm = Arc::new(MockLlm::ok("ok"));
        let generator = ReplyGenerator::new(llm.clone(), PHONE);
        generator.generate(&history(2), &Contact::new("1", None)).await;

        let captured = llm.captured.lock().unwrap();
        assert_eq!(captured[0].messages[1].role, ChatRole::User);
        assert_eq!(captured[0].messages[2].role, ChatRole::Assistant);
    }
}
