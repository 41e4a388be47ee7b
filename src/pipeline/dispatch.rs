//! Fire-and-forget dispatch of inbound messages onto the runtime.
//!
//! Each message becomes its own task. By default tasks for the same contact
//! run concurrently; with per-contact serialization enabled, a keyed async
//! mutex makes runs for one phone number execute one at a time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info_span};

use crate::pipeline::processor::MessageProcessor;
use crate::pipeline::types::{InboundMessage, ProcessOutcome};

type ContactLocks = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// Submits messages to the pipeline without waiting for them.
#[derive(Clone)]
pub struct Dispatcher {
    processor: Arc<MessageProcessor>,
    locks: Option<Arc<ContactLocks>>,
}

impl Dispatcher {
    pub fn new(processor: Arc<MessageProcessor>, serialize_per_contact: bool) -> Self {
        Self {
            processor,
            locks: serialize_per_contact.then(|| Arc::new(Mutex::new(HashMap::new()))),
        }
    }

    /// Spawn processing of one message. The handle may be dropped.
    pub fn dispatch(&self, message: InboundMessage) -> JoinHandle<ProcessOutcome> {
        let processor = Arc::clone(&self.processor);
        let locks = self.locks.clone();
        let span = info_span!("pipeline", phone = %message.from, message_id = %message.message_id);

        tokio::spawn(
            async move {
                match locks {
                    Some(locks) => {
                        let phone = message.from.clone();
                        let lock = acquire_slot(&locks, &phone);
                        let outcome = {
                            let _guard = lock.lock().await;
                            processor.process(message).await
                        };
                        release_slot(&locks, &phone, lock);
                        outcome
                    }
                    None => processor.process(message).await,
                }
            }
            .instrument(span),
        )
    }
}

fn acquire_slot(locks: &ContactLocks, phone: &str) -> Arc<tokio::sync::Mutex<()>> {
    let mut map = locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    Arc::clone(map.entry(phone.to_string()).or_default())
}

/// Drop the map entry once no other run holds or awaits it.
fn release_slot(locks: &ContactLocks, phone: &str, lock: Arc<tokio::sync::Mutex<()>>) {
    let mut map = locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    // One reference in the map, one held here.
    if Arc::strong_count(&lock) == 2 {
        map.remove(phone);
        debug!(phone, "Released contact lock");
    }
}
