//! Business logic layer

pub mod merge;
pub mod message;
pub mod template;
pub mod time;

pub use merge::MergeEngine;
pub use message::MessageService;
pub use template::TemplateService;
