//! Clinic Concierge: WhatsApp lead qualification and AI replies.

pub mod app;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod qualification;
pub mod replies;
pub mod store;
pub mod whatsapp;
