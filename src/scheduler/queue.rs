//! Holding set of not-yet-due deliveries
//!
//! Entries live in a map keyed by id, indexed by `(due_at, id)` so the
//! earliest due entries are found without a full scan. Every operation takes
//! the same lock, which makes removal the single commit point: an entry is
//! claimed, canceled or rescheduled by exactly one caller.

use crate::domain::Message;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::{futures::Notified, Mutex, Notify};

/// What to deliver when an entry comes due
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Structured message, composed at delivery time
    Message(Box<Message>),
    /// Pre-formed message delivered byte for byte
    Raw {
        from: String,
        to: Vec<String>,
        raw: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledEntry {
    pub id: String,
    pub due_at: DateTime<Utc>,
    pub payload: Payload,
}

impl ScheduledEntry {
    pub fn message(id: impl Into<String>, due_at: DateTime<Utc>, message: Message) -> Self {
        Self {
            id: id.into(),
            due_at,
            payload: Payload::Message(Box::new(message)),
        }
    }

    pub fn raw(
        id: impl Into<String>,
        due_at: DateTime<Utc>,
        from: impl Into<String>,
        to: Vec<String>,
        raw: Vec<u8>,
    ) -> Self {
        Self {
            id: id.into(),
            due_at,
            payload: Payload::Raw {
                from: from.into(),
                to,
                raw,
            },
        }
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, ScheduledEntry>,
    by_due: BTreeSet<(DateTime<Utc>, String)>,
}

impl Inner {
    fn remove(&mut self, id: &str) -> Option<ScheduledEntry> {
        let entry = self.entries.remove(id)?;
        self.by_due.remove(&(entry.due_at, entry.id.clone()));
        Some(entry)
    }
}

#[derive(Default)]
pub struct ScheduleQueue {
    inner: Mutex<Inner>,
    wake: Notify,
}

impl ScheduleQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry and wake the scheduler
    pub async fn insert(&self, entry: ScheduledEntry) {
        {
            let mut inner = self.inner.lock().await;
            inner.remove(&entry.id);
            inner.by_due.insert((entry.due_at, entry.id.clone()));
            inner.entries.insert(entry.id.clone(), entry);
        }
        self.wake.notify_one();
    }

    /// Atomic remove-if-present
    pub async fn remove(&self, id: &str) -> Option<ScheduledEntry> {
        self.inner.lock().await.remove(id)
    }

    /// Remove and return every entry due at or before `now`, earliest first
    pub async fn claim_due(&self, now: DateTime<Utc>) -> Vec<ScheduledEntry> {
        let mut inner = self.inner.lock().await;
        let due: Vec<(DateTime<Utc>, String)> = inner
            .by_due
            .iter()
            .take_while(|(at, _)| *at <= now)
            .cloned()
            .collect();

        due.into_iter()
            .filter_map(|(_, id)| inner.remove(&id))
            .collect()
    }

    /// Move an entry to a new due time; `None` when it is no longer held
    pub async fn reschedule(&self, id: &str, due_at: DateTime<Utc>) -> Option<ScheduledEntry> {
        let updated = {
            let mut inner = self.inner.lock().await;
            let mut entry = inner.remove(id)?;
            entry.due_at = due_at;
            inner.by_due.insert((due_at, entry.id.clone()));
            inner.entries.insert(entry.id.clone(), entry.clone());
            entry
        };
        self.wake.notify_one();
        Some(updated)
    }

    pub async fn get(&self, id: &str) -> Option<ScheduledEntry> {
        self.inner.lock().await.entries.get(id).cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.inner.lock().await.entries.contains_key(id)
    }

    /// All held entries, earliest first
    pub async fn list(&self) -> Vec<ScheduledEntry> {
        let inner = self.inner.lock().await;
        inner
            .by_due
            .iter()
            .filter_map(|(_, id)| inner.entries.get(id).cloned())
            .collect()
    }

    pub async fn next_due(&self) -> Option<DateTime<Utc>> {
        self.inner
            .lock()
            .await
            .by_due
            .first()
            .map(|(at, _)| *at)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Resolves after the next insert or reschedule
    pub fn changed(&self) -> Notified<'_> {
        self.wake.notified()
    }
}
