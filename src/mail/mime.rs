//! RFC 822 / MIME composition

use super::address::{envelope_sender, format_address, quote, sender_display_name, Recipients};
use crate::domain::{Attachment, Message};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};

const CRLF: &str = "\r\n";
const BASE64_LINE_LEN: usize = 76;
const BOUNDARY_TOKEN_LEN: usize = 32;

/// Builds the raw bytes of a message
#[derive(Debug, Clone)]
pub struct MimeComposer {
    default_from_name: String,
}

impl MimeComposer {
    pub fn new(default_from_name: impl Into<String>) -> Self {
        Self {
            default_from_name: default_from_name.into(),
        }
    }

    /// Compose the full message. `id` becomes the local part of the Message-ID.
    pub fn compose(&self, message: &Message, id: &str, now: DateTime<Utc>) -> Vec<u8> {
        let recipients = Recipients::partition(message);
        let from = format_address(
            &envelope_sender(message),
            Some(&sender_display_name(message, &self.default_from_name)),
        );

        let mut buf = String::with_capacity(1024);
        header(&mut buf, "Date", &now.format("%a, %d %b %Y %H:%M:%S %z").to_string());
        header(&mut buf, "From", &from);
        if !recipients.to_header.is_empty() {
            header(&mut buf, "To", &recipients.to_header.join(", "));
        }
        if !recipients.cc_header.is_empty() {
            header(&mut buf, "Cc", &recipients.cc_header.join(", "));
        }
        if !message.subject.is_empty() {
            header(&mut buf, "Subject", &message.subject);
        }
        header(&mut buf, "Message-ID", &format!("<{}@mandrill-dev.local>", id));
        header(&mut buf, "MIME-Version", "1.0");

        // BTreeMap iterates in name order
        for (name, value) in &message.headers {
            if name.eq_ignore_ascii_case("bcc") || value.is_empty() {
                continue;
            }
            if !is_valid_header_name(name) {
                tracing::warn!(header = %sanitize(name), "Dropping header with invalid name");
                continue;
            }
            header(&mut buf, name, value);
        }

        let html = message.html_body();
        let text = message.text_body();

        if message.has_attachments() {
            let mixed = boundary("mixed");
            header(&mut buf, "Content-Type", &format!("multipart/mixed; boundary={}", quote(&mixed)));
            buf.push_str(CRLF);

            open_part(&mut buf, &mixed);
            match (html, text) {
                (Some(html), Some(text)) => write_alternative(&mut buf, text, html),
                (Some(html), None) => write_text_part(&mut buf, "text/html", html),
                (None, _) => write_text_part(&mut buf, "text/plain", &message.text),
            }

            for attachment in &message.attachments {
                write_attachment(&mut buf, &mixed, attachment, false);
            }
            for image in &message.images {
                write_attachment(&mut buf, &mixed, image, true);
            }
            close_boundary(&mut buf, &mixed);
        } else {
            match (html, text) {
                (Some(html), Some(text)) => write_alternative(&mut buf, text, html),
                (Some(html), None) => write_text_part(&mut buf, "text/html", html),
                (None, _) => write_text_part(&mut buf, "text/plain", &message.text),
            }
        }

        buf.into_bytes()
    }
}

fn header(buf: &mut String, name: &str, value: &str) {
    buf.push_str(name);
    buf.push_str(": ");
    buf.push_str(&sanitize(value));
    buf.push_str(CRLF);
}

/// Replace CR and LF with spaces so a value cannot start a new header line
pub fn sanitize(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

fn is_valid_header_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_graphic() && b != b':')
}

/// Random boundary token, e.g. `mixed_Zq3...`
fn boundary(prefix: &str) -> String {
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(BOUNDARY_TOKEN_LEN)
        .map(char::from)
        .collect();
    format!("{}_{}", prefix, token)
}

fn open_part(buf: &mut String, boundary: &str) {
    buf.push_str("--");
    buf.push_str(boundary);
    buf.push_str(CRLF);
}

fn close_boundary(buf: &mut String, boundary: &str) {
    buf.push_str("--");
    buf.push_str(boundary);
    buf.push_str("--");
    buf.push_str(CRLF);
}

/// `multipart/alternative` with the text part first and HTML last
fn write_alternative(buf: &mut String, text: &str, html: &str) {
    let alt = boundary("alt");
    header(buf, "Content-Type", &format!("multipart/alternative; boundary={}", quote(&alt)));
    buf.push_str(CRLF);
    open_part(buf, &alt);
    write_text_part(buf, "text/plain", text);
    open_part(buf, &alt);
    write_text_part(buf, "text/html", html);
    close_boundary(buf, &alt);
}

fn write_text_part(buf: &mut String, mime_type: &str, body: &str) {
    header(buf, "Content-Type", &format!("{}; charset=utf-8", mime_type));
    buf.push_str(CRLF);
    buf.push_str(body);
    if !body.ends_with(CRLF) {
        buf.push_str(CRLF);
    }
}

fn write_attachment(buf: &mut String, boundary: &str, attachment: &Attachment, inline: bool) {
    let name = match attachment.name.trim() {
        "" => "attachment",
        n => n,
    };
    let mime_type = match attachment.mime_type.trim() {
        "" => "application/octet-stream",
        t => t,
    };
    let disposition = if inline { "inline" } else { "attachment" };

    open_part(buf, boundary);
    header(buf, "Content-Type", &format!("{}; name={}", mime_type, quote(name)));
    header(
        buf,
        "Content-Disposition",
        &format!("{}; filename={}", disposition, quote(name)),
    );
    if inline {
        header(buf, "Content-ID", &format!("<{}>", name));
    }
    header(buf, "Content-Transfer-Encoding", "base64");
    buf.push_str(CRLF);

    match STANDARD.decode(attachment.content.trim()) {
        Ok(bytes) => write_base64_wrapped(buf, &STANDARD.encode(bytes)),
        Err(e) => {
            tracing::warn!(attachment = %name, error = %e, "Attachment content is not valid base64, writing it unchanged");
            buf.push_str(&attachment.content);
        }
    }
    if !buf.ends_with(CRLF) {
        buf.push_str(CRLF);
    }
}

fn write_base64_wrapped(buf: &mut String, encoded: &str) {
    // base64 output is ASCII, so byte chunks are char boundaries
    for line in encoded.as_bytes().chunks(BASE64_LINE_LEN) {
        buf.push_str(&String::from_utf8_lossy(line));
        buf.push_str(CRLF);
    }
}
