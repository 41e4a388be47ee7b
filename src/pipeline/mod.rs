//! Inbound message pipeline.
//!
//! Webhook notifications become `InboundMessage`s, which the `Dispatcher`
//! hands to the `MessageProcessor` on background tasks:
//! contact → session → qualification → reply → persistence → delivery → intent.

pub mod dispatch;
pub mod intent;
pub mod processor;
pub mod types;

pub use dispatch::Dispatcher;
pub use processor::{MessageProcessor, PipelineConfig};
pub use types::{InboundMessage, ProcessOutcome, Stage};
