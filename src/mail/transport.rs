//! SMTP delivery using lettre's async connection

use crate::config::{SmtpConfig, SmtpSecurity};
use async_trait::async_trait;
use lettre::{
    address::{Address, Envelope as SmtpEnvelope},
    transport::smtp::{
        authentication::{Credentials, Mechanism},
        client::{AsyncSmtpConnection, TlsParameters},
        extension::ClientId,
    },
};
use std::time::Duration;
use thiserror::Error;

/// Transport error types
///
/// The display text is what ends up as a message's `reject_reason`.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("tls handshake failed: {0}")]
    Tls(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("{0}")]
    Protocol(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// SMTP envelope: who the server is told the mail is from and for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub from: String,
    pub recipients: Vec<String>,
}

impl Envelope {
    pub fn new(from: impl Into<String>, recipients: Vec<String>) -> Self {
        Self {
            from: from.into(),
            recipients,
        }
    }

    fn to_smtp(&self) -> Result<SmtpEnvelope, TransportError> {
        let from = parse_address(&self.from)?;
        let to = self
            .recipients
            .iter()
            .map(|r| parse_address(r))
            .collect::<Result<Vec<_>, _>>()?;
        SmtpEnvelope::new(Some(from), to).map_err(|e| TransportError::InvalidAddress(e.to_string()))
    }
}

fn parse_address(raw: &str) -> Result<Address, TransportError> {
    raw.trim()
        .parse::<Address>()
        .map_err(|e| TransportError::InvalidAddress(format!("{}: {}", raw.trim(), e)))
}

/// One delivery transaction against a mail server
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Deliver `raw` to every envelope recipient. Any rejected recipient
    /// fails the whole transaction.
    async fn send(&self, envelope: &Envelope, raw: &[u8]) -> Result<(), TransportError>;
}

/// Real SMTP transport
pub struct SmtpTransport {
    config: SmtpConfig,
    hello_name: ClientId,
}

impl SmtpTransport {
    pub fn new(config: SmtpConfig) -> Self {
        Self {
            config,
            hello_name: ClientId::default(),
        }
    }

    fn tls_parameters(&self) -> Result<TlsParameters, TransportError> {
        TlsParameters::builder(self.config.host.clone())
            .dangerous_accept_invalid_certs(self.config.insecure_tls)
            .build()
            .map_err(|e| TransportError::Tls(e.to_string()))
    }

    async fn connect(&self) -> Result<AsyncSmtpConnection, TransportError> {
        let implicit_tls = match self.config.security {
            SmtpSecurity::Tls => Some(self.tls_parameters()?),
            SmtpSecurity::None | SmtpSecurity::StartTls => None,
        };

        AsyncSmtpConnection::connect_tokio1(
            (self.config.host.as_str(), self.config.port),
            Some(Duration::from_secs(self.config.timeout_secs)),
            &self.hello_name,
            implicit_tls,
            None,
        )
        .await
        .map_err(|e| TransportError::Connection(e.to_string()))
    }

    /// Everything after connect; the caller closes the connection on error
    async fn transact(
        &self,
        conn: &mut AsyncSmtpConnection,
        envelope: &SmtpEnvelope,
        raw: &[u8],
    ) -> Result<(), TransportError> {
        if self.config.security == SmtpSecurity::StartTls {
            if conn.can_starttls() {
                conn.starttls(self.tls_parameters()?, &self.hello_name)
                    .await
                    .map_err(|e| TransportError::Tls(e.to_string()))?;
            } else {
                tracing::debug!(host = %self.config.host, "Server does not offer STARTTLS, continuing unencrypted");
            }
        }

        if let Some((username, password)) = self.config.credentials() {
            let info = conn.server_info();
            if info.supports_auth_mechanism(Mechanism::Plain)
                || info.supports_auth_mechanism(Mechanism::Login)
            {
                conn.auth(
                    &[Mechanism::Plain, Mechanism::Login],
                    &Credentials::new(username, password),
                )
                .await
                .map_err(|e| TransportError::Authentication(e.to_string()))?;
            } else {
                tracing::debug!(host = %self.config.host, "Server does not advertise AUTH, sending unauthenticated");
            }
        }

        conn.send(envelope, raw)
            .await
            .map_err(|e| TransportError::Protocol(e.to_string()))?;

        conn.quit()
            .await
            .map_err(|e| TransportError::Protocol(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl MailTransport for SmtpTransport {
    async fn send(&self, envelope: &Envelope, raw: &[u8]) -> Result<(), TransportError> {
        let smtp_envelope = envelope.to_smtp()?;
        let mut conn = self.connect().await?;

        match self.transact(&mut conn, &smtp_envelope, raw).await {
            Ok(()) => {
                tracing::debug!(
                    recipients = envelope.recipients.len(),
                    bytes = raw.len(),
                    "SMTP transaction completed"
                );
                Ok(())
            }
            Err(e) => {
                conn.abort().await;
                Err(e)
            }
        }
    }
}
