//! Template repository

use crate::domain::Template;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    /// Insert or replace, keyed by case-insensitive name
    async fn save(&self, template: Template) -> Result<()>;
    async fn get(&self, name: &str) -> Result<Option<Template>>;
    /// Returns the removed template, if any
    async fn delete(&self, name: &str) -> Result<Option<Template>>;
    /// Sorted by name; an empty label lists everything
    async fn list(&self, label: &str) -> Result<Vec<Template>>;
}

#[derive(Default)]
pub struct InMemoryTemplateRepository {
    templates: RwLock<HashMap<String, Template>>,
}

impl InMemoryTemplateRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn key(name: &str) -> String {
    name.trim().to_lowercase()
}

#[async_trait]
impl TemplateRepository for InMemoryTemplateRepository {
    async fn save(&self, template: Template) -> Result<()> {
        self.templates
            .write()
            .await
            .insert(key(&template.name), template);
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<Template>> {
        Ok(self.templates.read().await.get(&key(name)).cloned())
    }

    async fn delete(&self, name: &str) -> Result<Option<Template>> {
        Ok(self.templates.write().await.remove(&key(name)))
    }

    async fn list(&self, label: &str) -> Result<Vec<Template>> {
        let label = label.trim();
        let mut out: Vec<Template> = self
            .templates
            .read()
            .await
            .values()
            .filter(|t| label.is_empty() || t.has_label(label))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }
}
