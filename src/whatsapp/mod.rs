//! WhatsApp Cloud API: inbound webhook and outbound messaging.

pub mod gateway;
pub mod types;
pub mod webhook;

pub use gateway::{CloudApiConfig, CloudApiGateway, MessagingGateway};
pub use webhook::{WebhookState, webhook_routes};
