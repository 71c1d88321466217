//! HTTP middleware
//!
//! - JSON normalization of framework error responses
//! - Body logging when debug mode is on

pub mod body_logging;
pub mod error_response;

pub use body_logging::log_bodies;
pub use error_response::normalize_error_response;
