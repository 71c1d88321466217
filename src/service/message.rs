//! Message sending and lookup

use super::merge::MergeEngine;
use super::time::{hourly_series, parse_time};
use crate::domain::{
    CancelResult, IdRequest, ListScheduledRequest, Message, MessageContent, MessageRecord,
    MessageStatus, ParsedRawMessage, Recipient, RescheduleRequest, SearchRequest, SendRawRequest,
    SendRequest, SendResult, SendTemplateRequest, TimeSeriesPoint, DEFAULT_SENDER,
};
use crate::error::{AppError, Result};
use crate::mail::{parse_headers, Mailer};
use crate::repository::{MessageRepository, SearchQuery, StatusChange, TemplateRepository};
use crate::scheduler::{ScheduleQueue, ScheduledEntry};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::Arc;

const DEFAULT_SEARCH_LIMIT: usize = 20;
const SEARCH_SERIES_DAYS: i64 = 7;

/// 24 lowercase hex characters
pub fn generate_message_id() -> String {
    let bytes: [u8; 12] = rand::thread_rng().gen();
    hex::encode(bytes)
}

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("no message exists with the id '{}'", id))
}

/// Optional `send_at`; unparseable values are ignored
fn optional_send_at(raw: &str) -> Option<DateTime<Utc>> {
    let parsed = parse_time(raw);
    if parsed.is_none() && !raw.trim().is_empty() {
        tracing::debug!(send_at = %raw, "Ignoring unparseable send_at, sending immediately");
    }
    parsed
}

pub struct MessageService {
    messages: Arc<dyn MessageRepository>,
    templates: Arc<dyn TemplateRepository>,
    queue: Arc<ScheduleQueue>,
    mailer: Mailer,
    debug: bool,
}

impl MessageService {
    pub fn new(
        messages: Arc<dyn MessageRepository>,
        templates: Arc<dyn TemplateRepository>,
        queue: Arc<ScheduleQueue>,
        mailer: Mailer,
        debug: bool,
    ) -> Self {
        Self {
            messages,
            templates,
            queue,
            mailer,
            debug,
        }
    }

    /// `messages/send`
    pub async fn send(&self, request: SendRequest) -> Result<Vec<SendResult>> {
        let recipients = request.message.recipient_addresses();
        if recipients.is_empty() {
            return Err(AppError::BadRequest("no recipients".to_string()));
        }

        let record = MessageRecord::queued(generate_message_id(), request.message, recipients);
        self.dispatch(record, optional_send_at(&request.send_at))
            .await
    }

    /// `messages/send-template`
    pub async fn send_template(&self, request: SendTemplateRequest) -> Result<Vec<SendResult>> {
        let template_name = request.template_name.trim().to_string();
        let mut message = request.message.clone();

        if !template_name.is_empty() {
            if let Some(template) = self.templates.get(&template_name).await? {
                if message.html_body().is_none() && message.text_body().is_none() {
                    message.html = template.effective_code().to_string();
                    message.text = template.effective_text().to_string();
                }
                if message.subject.trim().is_empty() {
                    message.subject = template.subject.clone();
                }
                if message.from_email.trim().is_empty() {
                    message.from_email = template.from_email.clone();
                }
                if message.from_name.trim().is_empty() {
                    message.from_name = template.from_name.clone();
                }
            }
        }

        let mut engine = MergeEngine::new();
        engine.set_all(
            request
                .template_content
                .iter()
                .map(|c| (c.name.as_str(), c.content.clone())),
        );
        engine.set_all(
            message
                .global_merge_vars
                .iter()
                .map(|v| (v.name.clone(), v.content_text())),
        );
        message.html = engine.render(&message.html);
        message.text = engine.render(&message.text);
        message.subject = engine.render(&message.subject);

        if self.debug {
            append_debug_dump(&mut message, &request);
        }

        let recipients = message.recipient_addresses();
        if recipients.is_empty() {
            return Err(AppError::BadRequest("no recipients".to_string()));
        }

        let mut record = MessageRecord::queued(generate_message_id(), message, recipients);
        if !template_name.is_empty() {
            record.tags.push(format!("template:{}", template_name));
            record.template_name = Some(template_name);
        }

        self.dispatch(record, optional_send_at(&request.send_at))
            .await
    }

    /// `messages/send-raw`
    pub async fn send_raw(&self, request: SendRawRequest) -> Result<Vec<SendResult>> {
        let from = match request.from_email.trim() {
            "" => DEFAULT_SENDER.to_string(),
            f => f.to_string(),
        };
        let parsed = parse_headers(&request.raw_message).ok();

        let mut to: Vec<String> = request
            .to
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect();
        if to.is_empty() {
            to = parsed.as_ref().map(|p| p.to_addresses()).unwrap_or_default();
        }
        if to.is_empty() {
            return Err(AppError::BadRequest("no recipients".to_string()));
        }

        let message = Message {
            from_email: from.clone(),
            from_name: request.from_name.clone(),
            to: to.iter().map(|a| Recipient::to(a.as_str()).with_kind("to")).collect(),
            ..Message::default()
        };
        let mut record = MessageRecord::queued(generate_message_id(), message, to.clone());
        record.subject = parsed
            .as_ref()
            .map(|p| p.get("Subject").to_string())
            .unwrap_or_default();
        record.raw = request.raw_message.into_bytes();

        if let Some(at) = optional_send_at(&request.send_at).filter(|at| *at > Utc::now()) {
            record.status = MessageStatus::Scheduled;
            record.scheduled_at = Some(at);
            let entry = ScheduledEntry::raw(record.id.clone(), at, from, to, record.raw.clone());
            let results = record.results();
            self.messages.save(record).await?;
            self.queue.insert(entry).await;
            return Ok(results);
        }

        match self.mailer.send_raw(&from, &to, &record.raw).await {
            Ok(()) => {
                record.status = MessageStatus::Sent;
                record.sent_at = Some(Utc::now());
            }
            Err(e) => {
                tracing::warn!(id = %record.id, error = %e, "Raw send failed");
                record.status = MessageStatus::Rejected;
                record.reject_reason = Some(e.to_string());
            }
        }

        let results = record.results();
        self.messages.save(record).await?;
        Ok(results)
    }

    /// Schedule a structured message or deliver it now
    async fn dispatch(
        &self,
        mut record: MessageRecord,
        send_at: Option<DateTime<Utc>>,
    ) -> Result<Vec<SendResult>> {
        if let Some(at) = send_at.filter(|at| *at > Utc::now()) {
            record.status = MessageStatus::Scheduled;
            record.scheduled_at = Some(at);
            let entry = ScheduledEntry::message(record.id.clone(), at, record.message.clone());
            let results = record.results();
            tracing::info!(id = %record.id, send_at = %at, "Message scheduled");
            // The record must exist before the scheduler can claim the entry
            self.messages.save(record).await?;
            self.queue.insert(entry).await;
            return Ok(results);
        }

        let delivery = self.mailer.compose_and_send(&record.message, &record.id).await;
        record.raw = delivery.raw;
        match delivery.result {
            Ok(()) => {
                record.status = MessageStatus::Sent;
                record.sent_at = Some(Utc::now());
                tracing::info!(id = %record.id, recipients = record.to.len(), "Message sent");
            }
            Err(e) => {
                record.status = MessageStatus::Rejected;
                record.reject_reason = Some(e.to_string());
            }
        }

        let results = record.results();
        self.messages.save(record).await?;
        Ok(results)
    }

    /// `messages/info`
    pub async fn info(&self, request: IdRequest) -> Result<MessageRecord> {
        let id = request.id.trim();
        if id.is_empty() {
            return Err(AppError::BadRequest("missing id".to_string()));
        }
        self.messages.get(id).await?.ok_or_else(|| not_found(id))
    }

    /// `messages/content`
    pub async fn content(&self, request: IdRequest) -> Result<MessageContent> {
        let id = request.id.trim();
        let record = self.messages.get(id).await?.ok_or_else(|| not_found(id))?;
        Ok(MessageContent::from(&record))
    }

    /// `messages/search`
    pub async fn search(&self, request: SearchRequest) -> Result<Vec<MessageRecord>> {
        let query = SearchQuery {
            query: request.query,
            date_from: parse_time(&request.date_from),
            date_to: parse_time(&request.date_to),
            tags: request.tags,
            senders: request.senders,
            limit: usize::try_from(request.limit)
                .ok()
                .filter(|l| *l > 0)
                .unwrap_or(DEFAULT_SEARCH_LIMIT),
        };
        self.messages.search(&query).await
    }

    /// `messages/search-time-series`: sent messages per hour, last 7 days
    pub async fn search_time_series(&self) -> Result<Vec<TimeSeriesPoint>> {
        let sent = self
            .messages
            .all()
            .await?
            .into_iter()
            .filter(|r| r.status == MessageStatus::Sent)
            .filter_map(|r| r.sent_at);
        Ok(hourly_series(sent, Utc::now(), SEARCH_SERIES_DAYS))
    }

    /// `messages/list-scheduled`, earliest first
    pub async fn list_scheduled(&self, request: ListScheduledRequest) -> Result<Vec<MessageRecord>> {
        let to = request.to.trim();
        let mut out = Vec::new();
        for entry in self.queue.list().await {
            if let Some(record) = self.messages.get(&entry.id).await? {
                if to.is_empty() || record.is_addressed_to(to) {
                    out.push(record);
                }
            }
        }
        Ok(out)
    }

    /// `messages/cancel-scheduled`
    pub async fn cancel_scheduled(&self, request: IdRequest) -> Result<CancelResult> {
        let id = request.id.trim();
        if self.queue.remove(id).await.is_none() {
            return Err(not_found(id));
        }
        let record = self.messages.update_status(id, StatusChange::Canceled).await?;
        tracing::info!(id = %id, "Scheduled message canceled");
        Ok(CancelResult {
            status: record.status,
            id: record.id,
        })
    }

    /// `messages/reschedule`
    pub async fn reschedule(&self, request: RescheduleRequest) -> Result<MessageRecord> {
        let at = parse_time(&request.send_at)
            .ok_or_else(|| AppError::BadRequest("invalid send_at".to_string()))?;
        let id = request.id.trim();
        if self.queue.reschedule(id, at).await.is_none() {
            return Err(not_found(id));
        }
        self.messages
            .update_status(id, StatusChange::Rescheduled(at))
            .await
    }

    /// `messages/parse`
    pub fn parse(&self, raw_message: &str) -> Result<ParsedRawMessage> {
        let parsed =
            parse_headers(raw_message).map_err(|_| AppError::BadRequest("invalid mime".to_string()))?;
        Ok(ParsedRawMessage {
            subject: parsed.get("Subject").to_string(),
            from: parsed.get("From").to_string(),
            to: parsed.get("To").to_string(),
            raw: parsed.body.clone(),
            headers: parsed.headers,
        })
    }
}

/// Append the send-template request (without the key) to both bodies
fn append_debug_dump(message: &mut Message, request: &SendTemplateRequest) {
    let dump = serde_json::json!({
        "template_name": request.template_name,
        "template_content": request.template_content,
        "message": request.message,
        "async": request.is_async,
        "ip_pool": request.ip_pool,
        "send_at": request.send_at,
        "_note": "Debug info: original send-template request (key omitted)",
    });
    let Ok(pretty) = serde_json::to_string_pretty(&dump) else {
        return;
    };

    if message.text.trim().is_empty() {
        message.text = pretty.clone();
    } else {
        message.text.push_str("\n\n---- debug: send-template request ----\n");
        message.text.push_str(&pretty);
    }

    let escaped = escape_html(&pretty);
    if message.html.trim().is_empty() {
        message.html = format!("<pre style=\"white-space:pre-wrap\">{}</pre>", escaped);
    } else {
        message.html.push_str(&format!(
            "<hr><h4>Debug: send-template request</h4><pre style=\"white-space:pre-wrap\">{}</pre>",
            escaped
        ));
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
