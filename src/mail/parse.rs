//! Header and recipient extraction for pre-formed messages

use mail_parser::{Address, MessageParser};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("no RFC 822 header found")]
    NoHeaders,
}

/// Header block and body of a raw message
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedMessage {
    /// Canonical header name to values, in order of appearance
    pub headers: BTreeMap<String, Vec<String>>,
    pub body: String,
    #[serde(skip)]
    recipients: Vec<String>,
}

impl ParsedMessage {
    /// First value of a header, case-insensitive; empty when absent
    pub fn get(&self, name: &str) -> &str {
        self.headers
            .get(&canonical_header_key(name))
            .and_then(|values| values.first())
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Addresses from every mailbox in the `To` header, groups flattened
    pub fn to_addresses(&self) -> Vec<String> {
        self.recipients.clone()
    }
}

/// Split a raw message into headers and body.
///
/// Header values keep their raw (undecoded) text with folding removed. A
/// message without a blank separator line is all headers.
pub fn parse_headers(raw: &str) -> Result<ParsedMessage, ParseError> {
    let message = MessageParser::default()
        .parse(raw.as_bytes())
        .ok_or(ParseError::NoHeaders)?;
    let bytes = message.raw_message();

    let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for header in message.headers() {
        let value = bytes
            .get(header.offset_start as usize..header.offset_end as usize)
            .map(|v| unfold(&String::from_utf8_lossy(v)))
            .unwrap_or_default();
        headers
            .entry(canonical_header_key(header.name()))
            .or_default()
            .push(value);
    }
    if headers.is_empty() {
        return Err(ParseError::NoHeaders);
    }

    let body = bytes
        .get(message.root_part().offset_body as usize..)
        .map(|b| String::from_utf8_lossy(b).into_owned())
        .unwrap_or_default();

    Ok(ParsedMessage {
        headers,
        body,
        recipients: message.to().map(mailbox_addresses).unwrap_or_default(),
    })
}

fn mailbox_addresses(address: &Address<'_>) -> Vec<String> {
    let mailboxes: Vec<_> = match address {
        Address::List(list) => list.iter().collect(),
        Address::Group(groups) => groups.iter().flat_map(|g| g.addresses.iter()).collect(),
    };
    mailboxes
        .into_iter()
        .filter_map(|mailbox| mailbox.address.as_deref())
        .map(str::trim)
        .filter(|a| a.contains('@'))
        .map(str::to_string)
        .collect()
}

/// Folded continuation lines joined with a single space
fn unfold(value: &str) -> String {
    value
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// `content-type` becomes `Content-Type`
pub fn canonical_header_key(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        if upper {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c.to_ascii_lowercase());
        }
        upper = c == '-';
    }
    out
}
