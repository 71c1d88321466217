//! End-to-end delivery: production router, real SMTP transport, fake SMTP server

use crate::common::{post_json, test_config, FakeSmtpOptions, FakeSmtpServer};
use axum::http::StatusCode;
use axum::Router;
use chrono::{Duration as ChronoDuration, Utc};
use mandrill_dev::config::Config;
use mandrill_dev::mail::SmtpTransport;
use mandrill_dev::server::{build_router, AppState};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

mod common;

fn app_for(server: &FakeSmtpServer) -> (Router, AppState) {
    let config = Config {
        smtp: server.smtp_config(),
        ..test_config()
    };
    let transport = Arc::new(SmtpTransport::new(config.smtp.clone()));
    let state = AppState::new(config, transport);
    (build_router(state.clone()), state)
}

fn message(send_at: Option<String>) -> serde_json::Value {
    let mut body = json!({
        "message": {
            "from_email": "a@x.com",
            "to": [
                {"email": "b@x.com", "name": "Bob"},
                {"email": "c@x.com", "type": "cc"},
                {"email": "d@x.com", "type": "bcc"}
            ],
            "html": "<p>hi</p>",
            "text": "hi",
            "subject": "S"
        }
    });
    if let Some(at) = send_at {
        body["send_at"] = json!(at);
    }
    body
}

#[tokio::test]
async fn test_immediate_send_reaches_smtp_server() {
    let server = FakeSmtpServer::start().await;
    let (router, _) = app_for(&server);

    let (status, body) = post_json(&router, "/messages/send.json", &message(None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 3);
    assert!(body.as_array().unwrap().iter().all(|r| r["status"] == "sent"));

    let received = server.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].from, "a@x.com");
    assert_eq!(received[0].recipients, vec!["b@x.com", "c@x.com", "d@x.com"]);
    assert!(received[0].data.contains("To: Bob <b@x.com>"));
    assert!(received[0].data.contains("Cc: <c@x.com>"));
    assert!(!received[0].data.contains("d@x.com"));
}

#[tokio::test]
async fn test_rejected_recipient_marks_every_result_rejected() {
    let server = FakeSmtpServer::start_with(FakeSmtpOptions {
        reject_recipient: Some("c@x.com".to_string()),
        ..FakeSmtpOptions::default()
    })
    .await;
    let (router, _) = app_for(&server);

    let (status, body) = post_json(&router, "/messages/send.json", &message(None)).await;
    assert_eq!(status, StatusCode::OK);
    for result in body.as_array().unwrap() {
        assert_eq!(result["status"], "rejected");
        assert!(result["reject_reason"].as_str().unwrap().contains("550"));
    }
    assert!(server.received().is_empty());

    let (_, content) = post_json(&router, "/messages/content.json", &json!({"id": body[0]["_id"]})).await;
    assert!(content["raw"].as_str().unwrap().contains("Subject: S"));
}

#[tokio::test]
async fn test_scheduled_send_delivered_when_due() {
    let server = FakeSmtpServer::start().await;
    let (router, state) = app_for(&server);
    state.scheduler.start().await;

    let at = (Utc::now() + ChronoDuration::milliseconds(500)).to_rfc3339();
    let (_, body) = post_json(&router, "/messages/send.json", &message(Some(at))).await;
    assert_eq!(body[0]["status"], "scheduled");
    assert!(server.received().is_empty());

    let received = server.wait_for(1, Duration::from_secs(5)).await;
    assert_eq!(received.len(), 1);
    assert!(received[0].data.contains("Subject: S"));

    state.scheduler.stop().await;
    state.scheduler.drain().await;

    let (_, info) = post_json(&router, "/messages/info.json", &json!({"id": body[0]["_id"]})).await;
    assert_eq!(info["status"], "sent");
    assert!(info["sent_at"].is_string());

    let (_, scheduled) = post_json(&router, "/messages/list-scheduled.json", &json!({})).await;
    assert!(scheduled.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_canceled_send_never_delivered() {
    let server = FakeSmtpServer::start().await;
    let (router, state) = app_for(&server);
    state.scheduler.start().await;

    let at = (Utc::now() + ChronoDuration::milliseconds(300)).to_rfc3339();
    let (_, body) = post_json(&router, "/messages/send.json", &message(Some(at))).await;
    let (status, _) = post_json(&router, "/messages/cancel-scheduled.json", &json!({"id": body[0]["_id"]})).await;
    assert_eq!(status, StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(600)).await;
    state.scheduler.stop().await;

    assert!(server.received().is_empty());
    let (_, info) = post_json(&router, "/messages/info.json", &json!({"id": body[0]["_id"]})).await;
    assert_eq!(info["status"], "canceled");
}

#[tokio::test]
async fn test_scheduled_raw_send_keeps_bytes() {
    let server = FakeSmtpServer::start().await;
    let (router, state) = app_for(&server);
    state.scheduler.start().await;

    let raw = "From: a@x.com\r\nTo: b@x.com\r\nSubject: Later raw\r\n\r\nbody line\r\n";
    let at = (Utc::now() + ChronoDuration::milliseconds(200)).to_rfc3339();
    let (_, body) = post_json(
        &router,
        "/messages/send-raw.json",
        &json!({"raw_message": raw, "from_email": "a@x.com", "send_at": at}),
    )
    .await;
    assert_eq!(body[0]["status"], "scheduled");

    let received = server.wait_for(1, Duration::from_secs(5)).await;
    state.scheduler.stop().await;

    assert_eq!(received.len(), 1);
    assert_eq!(received[0].recipients, vec!["b@x.com"]);
    assert!(received[0].data.starts_with("From: a@x.com\r\nTo: b@x.com\r\nSubject: Later raw\r\n"));
}

#[tokio::test]
async fn test_malformed_address_is_rejected_with_reason() {
    let server = FakeSmtpServer::start().await;
    let (router, _) = app_for(&server);

    let body = json!({
        "message": {
            "from_email": "a@x.com",
            "to": [{"email": "b@x.com"}, {"email": "not an address"}],
            "text": "hi",
            "subject": "S"
        }
    });
    let (status, results) = post_json(&router, "/messages/send.json", &body).await;

    assert_eq!(status, StatusCode::OK);
    let results = results.as_array().unwrap();
    assert_eq!(results.len(), 2);
    for result in results {
        assert_eq!(result["status"], "rejected");
        assert!(result["reject_reason"]
            .as_str()
            .unwrap()
            .starts_with("invalid address: not an address"));
    }
    assert!(server.received().is_empty());
    assert_eq!(server.closed_sessions(), 0);
}
