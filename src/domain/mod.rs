//! Domain models for the Mandrill emulator

pub mod message;
pub mod record;
pub mod request;
pub mod template;

pub use message::*;
pub use record::*;
pub use request::*;
pub use template::*;
