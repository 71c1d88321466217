//! Stored message records and send results

use super::message::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Message lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Queued,
    Scheduled,
    Sent,
    Rejected,
    Canceled,
    Invalid,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Scheduled => "scheduled",
            Self::Sent => "sent",
            Self::Rejected => "rejected",
            Self::Canceled => "canceled",
            Self::Invalid => "invalid",
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-recipient entry of a send response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendResult {
    pub email: String,
    pub status: MessageStatus,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<String>,
}

/// A message known to the emulator, whatever its status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub status: MessageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<String>,
    pub message: Message,
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub tags: Vec<String>,
    /// Bytes handed to the SMTP server (or composed for it)
    #[serde(skip)]
    pub raw: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_name: Option<String>,
}

impl MessageRecord {
    /// New `queued` record for a structured message
    pub fn queued(id: impl Into<String>, message: Message, recipients: Vec<String>) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            scheduled_at: None,
            sent_at: None,
            status: MessageStatus::Queued,
            reject_reason: None,
            from: message.from_email.clone(),
            subject: message.subject.clone(),
            tags: message.tags.clone(),
            to: recipients,
            message,
            raw: Vec::new(),
            template_name: None,
        }
    }

    /// One result per recipient, all sharing this record's status and id
    pub fn results(&self) -> Vec<SendResult> {
        self.to
            .iter()
            .map(|email| SendResult {
                email: email.clone(),
                status: self.status,
                id: self.id.clone(),
                reject_reason: self.reject_reason.clone(),
            })
            .collect()
    }

    pub fn is_addressed_to(&self, address: &str) -> bool {
        let target = address.trim();
        self.to
            .iter()
            .any(|a| a.trim().eq_ignore_ascii_case(target))
    }
}

/// Raw content lookup response
#[derive(Debug, Clone, Serialize)]
pub struct MessageContent {
    pub raw: String,
    pub subject: String,
    pub from: String,
    pub to: Vec<String>,
}

impl From<&MessageRecord> for MessageContent {
    fn from(record: &MessageRecord) -> Self {
        Self {
            raw: String::from_utf8_lossy(&record.raw).into_owned(),
            subject: record.subject.clone(),
            from: record.from.clone(),
            to: record.to.clone(),
        }
    }
}

/// Hourly bucket of sent messages
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesPoint {
    pub time: String,
    pub sent: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CancelResult {
    pub status: MessageStatus,
    pub id: String,
}

/// Response of `messages/parse`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedRawMessage {
    pub subject: String,
    pub from: String,
    pub to: String,
    /// Message body after the header block
    pub raw: String,
    pub headers: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedTemplate {
    pub html: String,
}
