//! Address formatting and recipient classification

use crate::domain::{Message, RecipientKind, DEFAULT_SENDER};
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Render an RFC 5322 mailbox.
///
/// Without a display name the bare `<addr>` form is used. Names made of atext
/// and spaces are written as-is, other ASCII names are quoted, and non-ASCII
/// names become an RFC 2047 encoded word. The address itself is not validated.
pub fn format_address(email: &str, name: Option<&str>) -> String {
    let email = email.trim();
    let name = match name.map(str::trim) {
        Some(n) if !n.is_empty() => n,
        _ => return format!("<{}>", email),
    };

    if !name.is_ascii() {
        return format!("=?utf-8?b?{}?= <{}>", STANDARD.encode(name), email);
    }

    if name.chars().all(|c| is_atext(c) || c == ' ') {
        format!("{} <{}>", name, email)
    } else {
        format!("{} <{}>", quote(name), email)
    }
}

fn is_atext(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-/=?^_`{|}~".contains(c)
}

/// Quoted-string with `\` and `"` escaped
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Recipients split into header and envelope sets
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recipients {
    /// Formatted `To` mailboxes
    pub to_header: Vec<String>,
    /// Formatted `Cc` mailboxes
    pub cc_header: Vec<String>,
    /// Every address handed to RCPT TO, bcc and unknown types included
    pub envelope: Vec<String>,
}

impl Recipients {
    pub fn partition(message: &Message) -> Self {
        let mut out = Self::default();

        for rcpt in &message.to {
            let email = rcpt.email.trim();
            if email.is_empty() {
                continue;
            }
            let name = Some(rcpt.name.as_str());
            match rcpt.recipient_kind() {
                Some(RecipientKind::To) => out.to_header.push(format_address(email, name)),
                Some(RecipientKind::Cc) => out.cc_header.push(format_address(email, name)),
                Some(RecipientKind::Bcc) => {}
                None => {
                    tracing::debug!(email = %email, kind = %rcpt.kind, "Recipient with unknown type delivered without a header");
                }
            }
            out.envelope.push(email.to_string());
        }

        let bcc = message.bcc_address.trim();
        if !bcc.is_empty() {
            out.envelope.push(bcc.to_string());
        }

        out
    }
}

/// Envelope sender, falling back to the placeholder address
pub fn envelope_sender(message: &Message) -> String {
    let from = message.from_email.trim();
    if from.is_empty() {
        DEFAULT_SENDER.to_string()
    } else {
        from.to_string()
    }
}

pub fn sender_display_name(message: &Message, default: &str) -> String {
    let name = message.from_name.trim();
    if name.is_empty() {
        default.to_string()
    } else {
        name.to_string()
    }
}
