//! Common test utilities
//!
//! - `FakeSmtpServer`: in-process SMTP endpoint (plaintext, STARTTLS or
//!   implicit TLS) that records transactions
//! - `RecordingTransport`: transport stub that keeps every message handed to it
//! - router and request helpers driving the production router

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use base64::Engine;
use mandrill_dev::config::{Config, SchedulerConfig, SmtpConfig};
use mandrill_dev::mail::{Envelope, MailTransport, TransportError};
use mandrill_dev::server::{build_router, AppState};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tower::ServiceExt;

// ============================================================================
// Fake SMTP server
// ============================================================================

/// One completed SMTP transaction
#[derive(Debug, Clone, Default)]
pub struct ReceivedMail {
    pub from: String,
    pub recipients: Vec<String>,
    pub data: String,
    /// The session was encrypted when DATA completed
    pub tls: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FakeSmtpOptions {
    /// RCPT TO for this address is answered with 550
    pub reject_recipient: Option<String>,
    /// Advertise AUTH and require these credentials
    pub credentials: Option<(String, String)>,
    /// Advertise STARTTLS on plaintext sessions
    pub starttls: bool,
    /// Handshake TLS before the greeting
    pub implicit_tls: bool,
}

trait Io: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> Io for T {}

#[derive(Clone)]
struct Session {
    options: FakeSmtpOptions,
    acceptor: Option<TlsAcceptor>,
    sink: Arc<Mutex<Vec<ReceivedMail>>>,
    auth_sink: Arc<Mutex<Vec<String>>>,
}

enum Next {
    Close,
    Upgrade(Box<dyn Io>),
}

/// Self-signed certificate for `localhost`; clients must skip verification
fn tls_acceptor() -> TlsAcceptor {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let cert_der = CertificateDer::from(cert.serialize_der().unwrap());
    let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(cert.serialize_private_key_der()));

    let config = rustls::ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .unwrap()
    .with_no_client_auth()
    .with_single_cert(vec![cert_der], key_der)
    .unwrap();

    TlsAcceptor::from(Arc::new(config))
}

pub struct FakeSmtpServer {
    pub addr: SocketAddr,
    received: Arc<Mutex<Vec<ReceivedMail>>>,
    authenticated: Arc<Mutex<Vec<String>>>,
    closed: Arc<Mutex<usize>>,
}

impl FakeSmtpServer {
    pub async fn start() -> Self {
        Self::start_with(FakeSmtpOptions::default()).await
    }

    pub async fn start_with(options: FakeSmtpOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let received = Arc::new(Mutex::new(Vec::new()));
        let authenticated = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(Mutex::new(0));

        let acceptor = (options.starttls || options.implicit_tls).then(tls_acceptor);
        let session = Session {
            options,
            acceptor,
            sink: received.clone(),
            auth_sink: authenticated.clone(),
        };
        let closed_count = closed.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let session = session.clone();
                let closed_count = closed_count.clone();
                tokio::spawn(async move {
                    let _ = serve_connection(stream, session).await;
                    *closed_count.lock().unwrap() += 1;
                });
            }
        });

        Self {
            addr,
            received,
            authenticated,
            closed,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn received(&self) -> Vec<ReceivedMail> {
        self.received.lock().unwrap().clone()
    }

    /// Usernames that completed AUTH
    pub fn authenticated(&self) -> Vec<String> {
        self.authenticated.lock().unwrap().clone()
    }

    /// Sessions that have ended, by QUIT or disconnect
    pub fn closed_sessions(&self) -> usize {
        *self.closed.lock().unwrap()
    }

    pub fn smtp_config(&self) -> SmtpConfig {
        SmtpConfig {
            host: "127.0.0.1".to_string(),
            port: self.port(),
            timeout_secs: 5,
            ..SmtpConfig::default()
        }
    }

    /// Poll until `count` transactions have completed or the timeout passes
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<ReceivedMail> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let received = self.received();
            if received.len() >= count || tokio::time::Instant::now() >= deadline {
                return received;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Poll until `count` sessions have ended or the timeout passes
    pub async fn wait_closed(&self, count: usize, timeout: Duration) -> usize {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let closed = self.closed_sessions();
            if closed >= count || tokio::time::Instant::now() >= deadline {
                return closed;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

fn angle_address(arg: &str) -> String {
    match (arg.find('<'), arg.find('>')) {
        (Some(start), Some(end)) if end > start => arg[start + 1..end].to_string(),
        _ => arg.trim().to_string(),
    }
}

async fn serve_connection(stream: TcpStream, session: Session) -> std::io::Result<()> {
    let mut secure = session.options.implicit_tls;
    let mut io: Box<dyn Io> = match (&session.acceptor, secure) {
        (Some(acceptor), true) => Box::new(acceptor.accept(stream).await?),
        _ => Box::new(stream),
    };
    let mut greet = true;

    loop {
        match handle_session(io, &session, greet, secure).await? {
            Next::Close => return Ok(()),
            Next::Upgrade(plain) => {
                let Some(acceptor) = &session.acceptor else {
                    return Ok(());
                };
                io = Box::new(acceptor.accept(plain).await?);
                greet = false;
                secure = true;
            }
        }
    }
}

async fn handle_session(
    io: Box<dyn Io>,
    session: &Session,
    greet: bool,
    secure: bool,
) -> std::io::Result<Next> {
    let options = &session.options;
    let mut stream = BufReader::new(io);
    let mut current = ReceivedMail::default();

    if greet {
        stream.write_all(b"220 fake.local ESMTP ready\r\n").await?;
    }

    let mut line = String::new();
    loop {
        line.clear();
        if stream.read_line(&mut line).await? == 0 {
            return Ok(Next::Close);
        }
        let command = line.trim_end_matches(['\r', '\n']).to_string();
        let upper = command.to_ascii_uppercase();

        if upper.starts_with("EHLO") {
            let mut reply = String::from("250-fake.local\r\n");
            if options.starttls && !secure {
                reply.push_str("250-STARTTLS\r\n");
            }
            if options.credentials.is_some() {
                reply.push_str("250-AUTH PLAIN LOGIN\r\n");
            }
            reply.push_str("250 8BITMIME\r\n");
            stream.write_all(reply.as_bytes()).await?;
        } else if upper.starts_with("HELO") {
            stream.write_all(b"250 fake.local\r\n").await?;
        } else if upper == "STARTTLS" {
            if options.starttls && !secure {
                stream.write_all(b"220 2.0.0 Ready to start TLS\r\n").await?;
                stream.flush().await?;
                return Ok(Next::Upgrade(stream.into_inner()));
            }
            stream.write_all(b"502 5.5.1 STARTTLS not available\r\n").await?;
        } else if upper.starts_with("AUTH PLAIN") {
            let encoded = command["AUTH PLAIN".len()..].trim();
            let decoded = base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .unwrap_or_default();
            let parts: Vec<String> = decoded
                .split(|b| *b == 0)
                .map(|p| String::from_utf8_lossy(p).into_owned())
                .collect();
            let accepted = match (&options.credentials, parts.as_slice()) {
                (Some((user, pass)), [_, u, p]) => u == user && p == pass,
                _ => false,
            };
            if accepted {
                session.auth_sink.lock().unwrap().push(parts[1].clone());
                stream.write_all(b"235 2.7.0 Authentication successful\r\n").await?;
            } else {
                stream.write_all(b"535 5.7.8 Authentication credentials invalid\r\n").await?;
            }
        } else if upper.starts_with("MAIL FROM:") {
            current = ReceivedMail {
                from: angle_address(&command[10..]),
                ..ReceivedMail::default()
            };
            stream.write_all(b"250 2.1.0 OK\r\n").await?;
        } else if upper.starts_with("RCPT TO:") {
            let rcpt = angle_address(&command[8..]);
            let rejected = options
                .reject_recipient
                .as_deref()
                .is_some_and(|r| r.eq_ignore_ascii_case(&rcpt));
            if rejected {
                stream.write_all(b"550 5.1.1 No such user here\r\n").await?;
            } else {
                current.recipients.push(rcpt);
                stream.write_all(b"250 2.1.5 OK\r\n").await?;
            }
        } else if upper == "DATA" {
            stream.write_all(b"354 End data with <CR><LF>.<CR><LF>\r\n").await?;
            let mut data = String::new();
            loop {
                line.clear();
                if stream.read_line(&mut line).await? == 0 {
                    return Ok(Next::Close);
                }
                let content = line.trim_end_matches(['\r', '\n']);
                if content == "." {
                    break;
                }
                let unstuffed = if content.starts_with("..") {
                    &content[1..]
                } else {
                    content
                };
                data.push_str(unstuffed);
                data.push_str("\r\n");
            }
            current.data = data;
            current.tls = secure;
            session.sink.lock().unwrap().push(std::mem::take(&mut current));
            stream.write_all(b"250 2.0.0 OK queued\r\n").await?;
        } else if upper == "RSET" || upper == "NOOP" {
            stream.write_all(b"250 2.0.0 OK\r\n").await?;
        } else if upper == "QUIT" {
            stream.write_all(b"221 2.0.0 Bye\r\n").await?;
            stream.flush().await?;
            return Ok(Next::Close);
        } else {
            stream.write_all(b"502 5.5.2 Command not recognized\r\n").await?;
        }
        stream.flush().await?;
    }
}

// ============================================================================
// Recording transport
// ============================================================================

/// Transport stub that accepts everything and keeps what it was given
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(Envelope, Vec<u8>)>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(Envelope, Vec<u8>)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn send(&self, envelope: &Envelope, raw: &[u8]) -> Result<(), TransportError> {
        self.sent
            .lock()
            .unwrap()
            .push((envelope.clone(), raw.to_vec()));
        Ok(())
    }
}

// ============================================================================
// Router helpers
// ============================================================================

pub fn test_config() -> Config {
    Config {
        scheduler: SchedulerConfig {
            tick_interval_ms: 20,
            max_concurrent_sends: 4,
        },
        ..Config::default()
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub transport: Arc<RecordingTransport>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let transport = Arc::new(RecordingTransport::new());
        let state = AppState::new(config, transport.clone());
        Self {
            router: build_router(state.clone()),
            state,
            transport,
        }
    }
}

/// POST a JSON body to the production router
pub async fn post_json<T: Serialize>(
    app: &Router,
    path: &str,
    body: &T,
) -> (StatusCode, serde_json::Value) {
    post_raw(app, path, serde_json::to_string(body).unwrap()).await
}

/// POST an arbitrary body; responses that are not JSON come back as `Null`
pub async fn post_raw(
    app: &Router,
    path: &str,
    body: impl Into<Body>,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(path)
        .header("Content-Type", "application/json")
        .body(body.into())
        .unwrap();

    send(app, request).await
}

pub async fn get(app: &Router, path: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method(Method::GET)
        .uri(path)
        .body(Body::empty())
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap_or_default();
    (status, String::from_utf8_lossy(&body).into_owned())
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap_or_default();

    let value = serde_json::from_slice(&body_bytes).unwrap_or(serde_json::Value::Null);
    (status, value)
}
