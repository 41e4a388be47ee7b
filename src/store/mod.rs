//! Persistence layer: libSQL-backed storage for contacts and sessions.

pub mod libsql_backend;
pub mod migrations;
pub mod model;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use model::{Contact, ContactUpdate, ConversationSession, Role, SessionMessage};
pub use traits::{Database, SessionUpdate};
