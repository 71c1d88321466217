//! Mandrill message shape
//!
//! Fields mirror the JSON accepted by `messages/send`. Tracking, analytics
//! and signing options are accepted and stored but have no effect on delivery.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Placeholder envelope sender used when a message has no `from_email`
pub const DEFAULT_SENDER: &str = "no-reply@example.local";

/// Recipient role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientKind {
    To,
    Cc,
    Bcc,
}

impl RecipientKind {
    /// Parse the wire `type`; blank means `to`, unknown values yield `None`
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "to" => Some(Self::To),
            "cc" => Some(Self::Cc),
            "bcc" => Some(Self::Bcc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
}

impl Recipient {
    pub fn to(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn recipient_kind(&self) -> Option<RecipientKind> {
        RecipientKind::parse(&self.kind)
    }
}

/// Attachment or inline image. `content` is base64.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type", default)]
    pub mime_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeVar {
    pub name: String,
    #[serde(default)]
    pub content: serde_json::Value,
}

impl MergeVar {
    /// Merge content rendered as text; strings are used verbatim
    pub fn content_text(&self) -> String {
        match &self.content {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipientMergeVars {
    pub rcpt: String,
    #[serde(default)]
    pub vars: Vec<MergeVar>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipientMetadata {
    pub rcpt: String,
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

fn is_false(v: &bool) -> bool {
    !*v
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub html: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub subject: String,
    pub from_email: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub from_name: String,
    pub to: Vec<Recipient>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "is_false")]
    pub important: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub track_opens: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub track_clicks: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub auto_text: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub auto_html: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub inline_css: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub url_strip_qs: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub preserve_recipients: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub view_content_link: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub bcc_address: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tracking_domain: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub signing_domain: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub return_path_domain: String,
    #[serde(skip_serializing_if = "is_false")]
    pub merge: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub merge_language: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub global_merge_vars: Vec<MergeVar>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub merge_vars: Vec<RecipientMergeVars>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub subaccount: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub google_analytics_domains: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub google_analytics_campaign: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recipient_metadata: Vec<RecipientMetadata>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<Attachment>,
}

impl Message {
    /// HTML body, if it has any non-whitespace content
    pub fn html_body(&self) -> Option<&str> {
        non_blank(&self.html)
    }

    /// Plain-text body, if it has any non-whitespace content
    pub fn text_body(&self) -> Option<&str> {
        non_blank(&self.text)
    }

    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty() || !self.images.is_empty()
    }

    /// Trimmed, non-blank recipient addresses plus `bcc_address`, in input order
    pub fn recipient_addresses(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .to
            .iter()
            .map(|r| r.email.trim())
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .collect();
        let bcc = self.bcc_address.trim();
        if !bcc.is_empty() {
            out.push(bcc.to_string());
        }
        out
    }
}

fn non_blank(s: &str) -> Option<&str> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
