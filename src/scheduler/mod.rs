//! Deferred delivery
//!
//! The driving loop sleeps until the earliest due entry, the poll interval or
//! a queue change, whichever comes first, then claims every due entry and
//! spawns a delivery task for it. At most `max_concurrent_sends` of those
//! tasks talk to the mail server at once; the rest wait for a slot without
//! holding up the loop. Failed deliveries are terminal and never re-queued.

pub mod queue;

pub use queue::{Payload, ScheduleQueue, ScheduledEntry};

use crate::config::SchedulerConfig;
use crate::mail::Mailer;
use crate::repository::{MessageRepository, StatusChange};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tokio::sync::{watch, Mutex, Semaphore};
use tokio::task::JoinHandle;

enum Lifecycle {
    Stopped,
    Running {
        cancel: oneshot::Sender<()>,
        handle: JoinHandle<()>,
    },
}

pub struct DeliveryScheduler {
    queue: Arc<ScheduleQueue>,
    mailer: Mailer,
    messages: Arc<dyn MessageRepository>,
    tick_interval: Duration,
    max_concurrent: usize,
    permits: Arc<Semaphore>,
    /// Claimed entries whose delivery has not finished
    in_flight: Arc<watch::Sender<usize>>,
    state: Mutex<Lifecycle>,
}

impl DeliveryScheduler {
    pub fn new(
        queue: Arc<ScheduleQueue>,
        mailer: Mailer,
        messages: Arc<dyn MessageRepository>,
        config: &SchedulerConfig,
    ) -> Self {
        let max_concurrent = config.max_concurrent_sends.max(1);
        Self {
            queue,
            mailer,
            messages,
            tick_interval: Duration::from_millis(config.tick_interval_ms.max(1)),
            max_concurrent,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            in_flight: Arc::new(watch::channel(0).0),
            state: Mutex::new(Lifecycle::Stopped),
        }
    }

    /// Start the driving loop. Returns `false` if it was already running.
    pub async fn start(self: &Arc<Self>) -> bool {
        let mut state = self.state.lock().await;
        if matches!(*state, Lifecycle::Running { .. }) {
            return false;
        }

        let (cancel, cancel_rx) = oneshot::channel();
        let handle = tokio::spawn(Arc::clone(self).run(cancel_rx));
        *state = Lifecycle::Running { cancel, handle };

        tracing::info!(
            tick_ms = self.tick_interval.as_millis() as u64,
            max_concurrent = self.max_concurrent,
            "Delivery scheduler started"
        );
        true
    }

    /// Stop the driving loop. In-flight deliveries keep running and are
    /// not waited for. Returns `false` if it was not running.
    pub async fn stop(&self) -> bool {
        let mut state = self.state.lock().await;
        match std::mem::replace(&mut *state, Lifecycle::Stopped) {
            Lifecycle::Stopped => false,
            Lifecycle::Running { cancel, handle } => {
                let _ = cancel.send(());
                if let Err(e) = handle.await {
                    tracing::warn!(error = %e, "Scheduler loop ended abnormally");
                }
                tracing::info!("Delivery scheduler stopped");
                true
            }
        }
    }

    pub async fn is_running(&self) -> bool {
        matches!(*self.state.lock().await, Lifecycle::Running { .. })
    }

    async fn run(self: Arc<Self>, mut cancel: oneshot::Receiver<()>) {
        loop {
            let wait = self.time_until_next(Utc::now()).await;

            tokio::select! {
                _ = &mut cancel => break,
                _ = tokio::time::sleep(wait) => {}
                _ = self.queue.changed() => {}
            }

            // A stop request may race with a wake-up
            if !matches!(cancel.try_recv(), Err(TryRecvError::Empty)) {
                break;
            }
            self.tick(Utc::now()).await;
        }
    }

    async fn time_until_next(&self, now: DateTime<Utc>) -> Duration {
        match self.queue.next_due().await {
            Some(due) if due <= now => Duration::ZERO,
            Some(due) => (due - now)
                .to_std()
                .map(|d| d.min(self.tick_interval))
                .unwrap_or(self.tick_interval),
            None => self.tick_interval,
        }
    }

    /// Claim everything due at `now` and spawn its delivery. Never waits
    /// for a delivery slot. Returns the number claimed.
    pub async fn tick(&self, now: DateTime<Utc>) -> usize {
        let due = self.queue.claim_due(now).await;
        let claimed = due.len();

        for entry in due {
            tracing::debug!(id = %entry.id, due_at = %entry.due_at, "Claimed scheduled message");
            self.in_flight.send_modify(|n| *n += 1);
            let permits = self.permits.clone();
            let in_flight = self.in_flight.clone();
            let mailer = self.mailer.clone();
            let messages = self.messages.clone();

            tokio::spawn(async move {
                // The semaphore is never closed, so a permit is always granted
                let permit = permits.acquire_owned().await.ok();
                deliver(&mailer, messages.as_ref(), entry).await;
                drop(permit);
                in_flight.send_modify(|n| *n = n.saturating_sub(1));
            });
        }

        claimed
    }

    /// Claimed deliveries that have not finished yet
    pub fn in_flight(&self) -> usize {
        *self.in_flight.borrow()
    }

    /// Wait until no delivery is in flight
    pub async fn drain(&self) {
        let mut pending = self.in_flight.subscribe();
        let _ = pending.wait_for(|n| *n == 0).await;
    }
}

async fn deliver(mailer: &Mailer, messages: &dyn MessageRepository, entry: ScheduledEntry) {
    let (raw, result) = match entry.payload {
        Payload::Message(message) => {
            let delivery = mailer.compose_and_send(&message, &entry.id).await;
            (delivery.raw, delivery.result)
        }
        Payload::Raw { from, to, raw } => {
            let result = mailer.send_raw(&from, &to, &raw).await;
            (raw, result)
        }
    };

    let change = match result {
        Ok(()) => {
            tracing::info!(id = %entry.id, "Scheduled message sent");
            StatusChange::Sent { at: Utc::now(), raw }
        }
        Err(e) => {
            tracing::warn!(id = %entry.id, error = %e, "Scheduled send failed");
            StatusChange::Rejected {
                reason: e.to_string(),
                raw,
            }
        }
    };

    if let Err(e) = messages.update_status(&entry.id, change).await {
        tracing::warn!(id = %entry.id, error = %e, "Failed to record scheduled delivery outcome");
    }
}
