//! Template management

use super::merge::MergeEngine;
use super::time::hourly_series;
use crate::domain::{
    MessageStatus, RenderedTemplate, Template, TemplateAddRequest, TemplateRenderRequest,
    TemplateUpdateRequest, TimeSeriesPoint,
};
use crate::error::{AppError, Result};
use crate::repository::{MessageRepository, TemplateRepository};
use chrono::Utc;
use std::sync::Arc;

const TEMPLATE_SERIES_DAYS: i64 = 30;

fn not_found(name: &str) -> AppError {
    AppError::NotFound(format!("no template exists with the name '{}'", name))
}

pub struct TemplateService {
    templates: Arc<dyn TemplateRepository>,
    messages: Arc<dyn MessageRepository>,
}

impl TemplateService {
    pub fn new(templates: Arc<dyn TemplateRepository>, messages: Arc<dyn MessageRepository>) -> Self {
        Self {
            templates,
            messages,
        }
    }

    /// Create or overwrite a template
    pub async fn add(&self, request: TemplateAddRequest) -> Result<Template> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest("missing name".to_string()));
        }

        let now = Utc::now();
        let mut template = Template::empty(name, now);
        template.from_email = request.from_email;
        template.from_name = request.from_name;
        template.subject = request.subject;
        template.code = request.code;
        template.text = request.text;
        template.labels = request.labels;
        if request.publish {
            template.publish(now);
        }

        self.templates.save(template.clone()).await?;
        tracing::info!(name = %template.name, published = request.publish, "Template saved");
        Ok(template)
    }

    /// Stored template, or an empty one carrying the requested name
    pub async fn info(&self, name: &str) -> Result<Template> {
        let name = name.trim();
        Ok(self
            .templates
            .get(name)
            .await?
            .unwrap_or_else(|| Template::empty(name, Utc::now())))
    }

    pub async fn update(&self, request: TemplateUpdateRequest) -> Result<Template> {
        let name = request.name.trim();
        let mut template = self
            .templates
            .get(name)
            .await?
            .ok_or_else(|| not_found(name))?;

        let mut changed = false;
        let mut apply = |field: &mut String, value: Option<String>| {
            if let Some(value) = value {
                *field = value;
                changed = true;
            }
        };
        apply(&mut template.from_email, request.from_email);
        apply(&mut template.from_name, request.from_name);
        apply(&mut template.subject, request.subject);
        apply(&mut template.code, request.code);
        apply(&mut template.text, request.text);
        if let Some(labels) = request.labels {
            template.labels = labels;
            changed = true;
        }

        let now = Utc::now();
        if request.publish == Some(true) {
            template.publish(now);
        } else if changed {
            template.updated_at = now;
        }

        self.templates.save(template.clone()).await?;
        Ok(template)
    }

    pub async fn publish(&self, name: &str) -> Result<Template> {
        let name = name.trim();
        let mut template = self
            .templates
            .get(name)
            .await?
            .ok_or_else(|| not_found(name))?;
        template.publish(Utc::now());
        self.templates.save(template.clone()).await?;
        tracing::info!(name = %template.name, "Template published");
        Ok(template)
    }

    pub async fn delete(&self, name: &str) -> Result<Template> {
        let name = name.trim();
        self.templates
            .delete(name)
            .await?
            .ok_or_else(|| not_found(name))
    }

    /// All templates sorted by name, optionally restricted to one label
    pub async fn list(&self, label: &str) -> Result<Vec<Template>> {
        self.templates.list(label.trim()).await
    }

    /// Hourly count of sent messages that used this template, last 30 days
    pub async fn time_series(&self, name: &str) -> Result<Vec<TimeSeriesPoint>> {
        let name = name.trim();
        let sent = self
            .messages
            .all()
            .await?
            .into_iter()
            .filter(|r| r.status == MessageStatus::Sent)
            .filter(|r| {
                r.template_name
                    .as_deref()
                    .is_some_and(|t| t.eq_ignore_ascii_case(name))
            })
            .filter_map(|r| r.sent_at);
        Ok(hourly_series(sent, Utc::now(), TEMPLATE_SERIES_DAYS))
    }

    /// Merge `template_content` into the published code, or the draft
    pub async fn render(&self, request: TemplateRenderRequest) -> Result<RenderedTemplate> {
        let name = request.template_name.trim();
        let template = self
            .templates
            .get(name)
            .await?
            .ok_or_else(|| not_found(name))?;

        let mut engine = MergeEngine::new();
        engine.set_all(
            request
                .template_content
                .iter()
                .map(|c| (c.name.as_str(), c.content.clone())),
        );

        Ok(RenderedTemplate {
            html: engine.render(template.effective_code()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Message, MessageRecord, TemplateContent};
    use crate::repository::{InMemoryMessageRepository, InMemoryTemplateRepository};

    fn service() -> (TemplateService, Arc<InMemoryMessageRepository>) {
        let messages = Arc::new(InMemoryMessageRepository::new());
        let service = TemplateService::new(Arc::new(InMemoryTemplateRepository::new()), messages.clone());
        (service, messages)
    }

    fn add_request(name: &str, publish: bool) -> TemplateAddRequest {
        TemplateAddRequest {
            name: name.to_string(),
            subject: "Hello".to_string(),
            code: "<p>*|greeting|*</p>".to_string(),
            labels: vec!["onboarding".to_string()],
            publish,
            ..TemplateAddRequest::default()
        }
    }

    #[tokio::test]
    async fn test_add_requires_name() {
        let (service, _) = service();
        let err = service.add(add_request("  ", false)).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref m) if m == "missing name"));
    }

    #[tokio::test]
    async fn test_add_with_publish_copies_draft() {
        let (service, _) = service();

        let draft = service.add(add_request("draft", false)).await.unwrap();
        assert!(draft.publish_code.is_empty());
        assert!(draft.published_at.is_none());

        let published = service.add(add_request("live", true)).await.unwrap();
        assert_eq!(published.publish_code, "<p>*|greeting|*</p>");
        assert!(published.published_at.is_some());
    }

    #[tokio::test]
    async fn test_info_unknown_is_synthetic() {
        let (service, _) = service();
        let template = service.info("ghost").await.unwrap();
        assert_eq!(template.name, "ghost");
        assert!(template.code.is_empty());
    }

    #[tokio::test]
    async fn test_update_is_partial() {
        let (service, _) = service();
        let created = service.add(add_request("welcome", false)).await.unwrap();

        let updated = service
            .update(TemplateUpdateRequest {
                name: "WELCOME".to_string(),
                subject: Some("Hi there".to_string()),
                ..TemplateUpdateRequest::default()
            })
            .await
            .unwrap();

        assert_eq!(updated.subject, "Hi there");
        assert_eq!(updated.code, created.code);
        assert_eq!(updated.labels, created.labels);
        assert!(updated.updated_at >= created.updated_at);

        let missing = service
            .update(TemplateUpdateRequest {
                name: "nope".to_string(),
                ..TemplateUpdateRequest::default()
            })
            .await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_publish_and_delete() {
        let (service, _) = service();
        service.add(add_request("welcome", false)).await.unwrap();

        let published = service.publish("welcome").await.unwrap();
        assert_eq!(published.publish_code, published.code);

        assert!(matches!(service.publish("nope").await, Err(AppError::NotFound(_))));

        service.delete("welcome").await.unwrap();
        assert!(matches!(service.delete("welcome").await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_by_label() {
        let (service, _) = service();
        service.add(add_request("b", false)).await.unwrap();
        service.add(add_request("a", false)).await.unwrap();
        service
            .add(TemplateAddRequest {
                name: "c".to_string(),
                ..TemplateAddRequest::default()
            })
            .await
            .unwrap();

        let names: Vec<String> = service
            .list("onboarding")
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(service.list("").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_render_prefers_published_code() {
        let (service, _) = service();
        service.add(add_request("welcome", true)).await.unwrap();
        service
            .update(TemplateUpdateRequest {
                name: "welcome".to_string(),
                code: Some("<p>draft</p>".to_string()),
                ..TemplateUpdateRequest::default()
            })
            .await
            .unwrap();

        let rendered = service
            .render(TemplateRenderRequest {
                template_name: "welcome".to_string(),
                template_content: vec![TemplateContent {
                    name: "GREETING".to_string(),
                    content: "Howdy".to_string(),
                }],
                ..TemplateRenderRequest::default()
            })
            .await
            .unwrap();
        assert_eq!(rendered.html, "<p>Howdy</p>");
    }

    #[tokio::test]
    async fn test_time_series_counts_template_sends() {
        let (service, messages) = service();

        let mut used = MessageRecord::queued("m1", Message::default(), vec!["b@x.com".to_string()]);
        used.status = MessageStatus::Sent;
        used.sent_at = Some(Utc::now());
        used.template_name = Some("Welcome".to_string());
        messages.save(used).await.unwrap();

        let mut other = MessageRecord::queued("m2", Message::default(), vec!["b@x.com".to_string()]);
        other.status = MessageStatus::Sent;
        other.sent_at = Some(Utc::now());
        messages.save(other).await.unwrap();

        let series = service.time_series("welcome").await.unwrap();
        assert_eq!(series.len(), 30 * 24 + 1);
        assert_eq!(series.iter().map(|p| p.sent).sum::<u64>(), 1);
    }
}
