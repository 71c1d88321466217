//! Stored templates

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub from_email: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub from_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subject: String,
    /// Draft HTML
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub code: String,
    /// Draft text
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub publish_code: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub publish_text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl Template {
    /// Empty template with both timestamps set to `now`
    pub fn empty(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            from_email: String::new(),
            from_name: String::new(),
            subject: String::new(),
            code: String::new(),
            text: String::new(),
            publish_code: String::new(),
            publish_text: String::new(),
            labels: Vec::new(),
            created_at: now,
            updated_at: now,
            published_at: None,
        }
    }

    /// Copy the draft into the published slots
    pub fn publish(&mut self, now: DateTime<Utc>) {
        self.publish_code = self.code.clone();
        self.publish_text = self.text.clone();
        self.published_at = Some(now);
        self.updated_at = now;
    }

    /// Published HTML when set, otherwise the draft
    pub fn effective_code(&self) -> &str {
        if self.publish_code.trim().is_empty() {
            &self.code
        } else {
            &self.publish_code
        }
    }

    /// Published text when set, otherwise the draft
    pub fn effective_text(&self) -> &str {
        if self.publish_text.trim().is_empty() {
            &self.text
        } else {
            &self.publish_text
        }
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l.eq_ignore_ascii_case(label))
    }
}
