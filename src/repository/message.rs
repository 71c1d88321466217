//! Message repository

use crate::domain::{MessageRecord, MessageStatus};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

/// Terminal or scheduling transition applied to a stored record.
/// `Rescheduled` never overwrites a settled outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusChange {
    Sent { at: DateTime<Utc>, raw: Vec<u8> },
    Rejected { reason: String, raw: Vec<u8> },
    Canceled,
    Rescheduled(DateTime<Utc>),
}

/// Search filters; empty fields do not filter
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    /// Case-insensitive substring of subject, sender or any recipient
    pub query: String,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    /// Matches records carrying any of these tags
    pub tags: Vec<String>,
    pub senders: Vec<String>,
    /// 0 means unlimited
    pub limit: usize,
}

impl SearchQuery {
    fn matches(&self, record: &MessageRecord, tags: &HashSet<String>, senders: &HashSet<String>) -> bool {
        if self.date_from.is_some_and(|from| record.created_at < from) {
            return false;
        }
        if self.date_to.is_some_and(|to| record.created_at > to) {
            return false;
        }

        let needle = self.query.to_lowercase();
        if !needle.is_empty() {
            let hit = record.subject.to_lowercase().contains(&needle)
                || record.from.to_lowercase().contains(&needle)
                || record.to.iter().any(|a| a.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }

        if !tags.is_empty() && !record.tags.iter().any(|t| tags.contains(&t.to_lowercase())) {
            return false;
        }

        if !senders.is_empty() && !senders.contains(&record.from.to_lowercase()) {
            return false;
        }

        true
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn save(&self, record: MessageRecord) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<MessageRecord>>;
    async fn update_status(&self, id: &str, change: StatusChange) -> Result<MessageRecord>;
    /// Newest first
    async fn search(&self, query: &SearchQuery) -> Result<Vec<MessageRecord>>;
    async fn all(&self) -> Result<Vec<MessageRecord>>;
}

/// Process-local store; contents are lost on restart
#[derive(Default)]
pub struct InMemoryMessageRepository {
    records: RwLock<HashMap<String, MessageRecord>>,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn save(&self, record: MessageRecord) -> Result<()> {
        self.records.write().await.insert(record.id.clone(), record);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<MessageRecord>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn update_status(&self, id: &str, change: StatusChange) -> Result<MessageRecord> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("message {} not found", id)))?;

        match change {
            StatusChange::Sent { at, raw } => {
                record.status = MessageStatus::Sent;
                record.sent_at = Some(at);
                record.reject_reason = None;
                record.raw = raw;
            }
            StatusChange::Rejected { reason, raw } => {
                record.status = MessageStatus::Rejected;
                record.reject_reason = Some(reason);
                record.raw = raw;
            }
            StatusChange::Canceled => record.status = MessageStatus::Canceled,
            StatusChange::Rescheduled(at) => match record.status {
                MessageStatus::Queued | MessageStatus::Scheduled => {
                    record.status = MessageStatus::Scheduled;
                    record.scheduled_at = Some(at);
                }
                // Delivery already committed an outcome
                _ => {
                    tracing::debug!(id = %id, status = %record.status, "Ignoring reschedule of settled message");
                }
            },
        }

        Ok(record.clone())
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<MessageRecord>> {
        let tags: HashSet<String> = query.tags.iter().map(|t| t.to_lowercase()).collect();
        let senders: HashSet<String> = query.senders.iter().map(|s| s.to_lowercase()).collect();

        let mut out: Vec<MessageRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| query.matches(r, &tags, &senders))
            .cloned()
            .collect();

        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if query.limit > 0 {
            out.truncate(query.limit);
        }
        Ok(out)
    }

    async fn all(&self) -> Result<Vec<MessageRecord>> {
        Ok(self.records.read().await.values().cloned().collect())
    }
}
