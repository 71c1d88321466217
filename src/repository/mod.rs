//! Data access layer (Repository pattern)
//!
//! Storage is in-memory only; nothing survives a restart.

pub mod message;
pub mod template;

pub use message::{InMemoryMessageRepository, MessageRepository, SearchQuery, StatusChange};
pub use template::{InMemoryTemplateRepository, TemplateRepository};
