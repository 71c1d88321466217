//! Message composition and delivery
//!
//! - `address`: mailbox formatting and recipient classification
//! - `mime`: raw RFC 822 / MIME composition
//! - `parse`: header parsing for pre-formed messages
//! - `transport`: SMTP delivery

pub mod address;
pub mod mime;
pub mod parse;
pub mod transport;

pub use address::{envelope_sender, format_address, sender_display_name, Recipients};
pub use mime::MimeComposer;
pub use parse::{parse_headers, ParseError, ParsedMessage};
pub use transport::{Envelope, MailTransport, SmtpTransport, TransportError};

use crate::domain::Message;
use chrono::Utc;
use std::sync::Arc;

/// Outcome of one compose-and-send attempt
#[derive(Debug)]
pub struct Delivery {
    /// Composed bytes, kept even when the transport failed
    pub raw: Vec<u8>,
    pub result: Result<(), TransportError>,
}

/// Composition plus transport, shared by the API and the scheduler
#[derive(Clone)]
pub struct Mailer {
    composer: MimeComposer,
    transport: Arc<dyn MailTransport>,
}

impl Mailer {
    pub fn new(composer: MimeComposer, transport: Arc<dyn MailTransport>) -> Self {
        Self {
            composer,
            transport,
        }
    }

    pub async fn compose_and_send(&self, message: &Message, id: &str) -> Delivery {
        let raw = self.composer.compose(message, id, Utc::now());
        let recipients = Recipients::partition(message);
        let envelope = Envelope::new(envelope_sender(message), recipients.envelope);

        let result = self.transport.send(&envelope, &raw).await;
        if let Err(e) = &result {
            tracing::warn!(id = %id, error = %e, "Delivery failed");
        }

        Delivery { raw, result }
    }

    pub async fn send_raw(
        &self,
        from: &str,
        to: &[String],
        raw: &[u8],
    ) -> Result<(), TransportError> {
        let envelope = Envelope::new(from, to.to_vec());
        self.transport.send(&envelope, raw).await
    }
}
