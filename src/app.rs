//! Service assembly: store, AI client, WhatsApp gateway and webhook router.

use std::sync::Arc;

use axum::Router;
use secrecy::ExposeSecret;
use tracing::info;

use crate::config::{AppConfig, DatabaseLocation};
use crate::error::Result;
use crate::llm::{LlmProvider, OpenAiConfig, OpenAiProvider};
use crate::pipeline::{Dispatcher, MessageProcessor, PipelineConfig};
use crate::replies::ReplyGenerator;
use crate::store::{Database, LibSqlBackend};
use crate::whatsapp::{
    CloudApiConfig, CloudApiGateway, MessagingGateway, WebhookState, webhook_routes,
};

/// Open the store and wire every service behind the webhook router.
pub async fn build_app(config: &AppConfig) -> Result<Router> {
    let store: Arc<dyn Database> = match &config.database {
        DatabaseLocation::Local(path) => Arc::new(LibSqlBackend::new_local(path).await?),
        DatabaseLocation::Remote { url, auth_token } => {
            Arc::new(LibSqlBackend::new_remote(url, auth_token.expose_secret()).await?)
        }
    };

    let llm: Arc<dyn LlmProvider> = Arc::new(OpenAiProvider::new(
        OpenAiConfig::new(config.openai_api_key.clone(), config.ai_model.clone())
            .with_base_url(config.ai_base_url.clone()),
    )?);

    let gateway: Arc<dyn MessagingGateway> = Arc::new(CloudApiGateway::new(
        CloudApiConfig::new(
            config.whatsapp_access_token.clone(),
            config.whatsapp_phone_number_id.clone(),
        )
        .with_api_base(config.whatsapp_api_base.clone())
        .with_api_version(config.whatsapp_api_version.clone()),
    )?);

    let processor = MessageProcessor::new(
        store,
        ReplyGenerator::new(llm, config.business_phone.clone()),
        gateway,
        PipelineConfig {
            timezone: config.timezone,
            mark_read: config.mark_read,
        },
    );
    let dispatcher = Dispatcher::new(Arc::new(processor), config.serialize_per_contact);

    info!(
        model = %config.ai_model,
        serialize_per_contact = config.serialize_per_contact,
        mark_read = config.mark_read,
        "Services ready"
    );

    Ok(webhook_routes(WebhookState {
        verify_token: Arc::new(config.verify_token.clone()),
        dispatcher,
    }))
}
