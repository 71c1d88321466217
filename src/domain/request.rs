//! Request bodies for the Mandrill endpoints
//!
//! Every request carries the API `key`; it defaults to empty so a missing key
//! is rejected by the key check rather than by the JSON decoder.

use super::message::Message;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendRequest {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub message: Message,
    #[serde(rename = "async", default)]
    pub is_async: bool,
    #[serde(default)]
    pub ip_pool: String,
    #[serde(default)]
    pub send_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateContent {
    pub name: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendTemplateRequest {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub template_name: String,
    #[serde(default)]
    pub template_content: Vec<TemplateContent>,
    #[serde(default)]
    pub message: Message,
    #[serde(rename = "async", default)]
    pub is_async: bool,
    #[serde(default)]
    pub ip_pool: String,
    #[serde(default)]
    pub send_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendRawRequest {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub raw_message: String,
    #[serde(default)]
    pub from_email: String,
    #[serde(default)]
    pub from_name: String,
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(default)]
    pub return_path_domain: String,
    #[serde(rename = "async", default)]
    pub is_async: bool,
    #[serde(default)]
    pub ip_pool: String,
    #[serde(default)]
    pub send_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParseRequest {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub raw_message: String,
}

/// Body of `messages/info`, `messages/content` and `messages/cancel-scheduled`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdRequest {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub date_from: String,
    #[serde(default)]
    pub date_to: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub senders: Vec<String>,
    #[serde(default)]
    pub limit: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeyRequest {
    #[serde(default)]
    pub key: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListScheduledRequest {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub to: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RescheduleRequest {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub send_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateAddRequest {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub from_email: String,
    #[serde(default)]
    pub from_name: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub publish: bool,
    #[serde(default)]
    pub labels: Vec<String>,
}

/// Body of `templates/info`, `publish`, `delete` and `time-series`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateNameRequest {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub name: String,
}

/// Partial update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateUpdateRequest {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub name: String,
    pub from_email: Option<String>,
    pub from_name: Option<String>,
    pub subject: Option<String>,
    pub code: Option<String>,
    pub text: Option<String>,
    pub publish: Option<bool>,
    pub labels: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateListRequest {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateRenderRequest {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub template_name: String,
    #[serde(default)]
    pub template_content: Vec<TemplateContent>,
}
