//! Mandrill Dev - local Mandrill API emulator
//!
//! Accepts Mandrill-compatible JSON requests, keeps messages and templates in
//! memory and delivers mail to a configured SMTP server, either immediately or
//! at a scheduled time.

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod mail;
pub mod middleware;
pub mod repository;
pub mod scheduler;
pub mod server;
pub mod service;
pub mod telemetry;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, Result};
