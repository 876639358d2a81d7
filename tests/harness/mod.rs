// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test harness for driving the relay router end to end.
//!
//! Requests go through the real router with a mocked peer address and a
//! recording mailer, and the rate limit record lives in a temp directory.

#![allow(dead_code)]

pub mod generators;
pub mod metrics;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::connect_info::MockConnectInfo,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use csp_report_relay::{
    config::Config,
    handlers::{router, AppState},
    mailer::{MailError, Mailer},
    report::NotificationMessage,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::ServiceExt;

pub const ALLOWED_ORIGIN: &str = "https://example.com";
pub const CSP_CONTENT_TYPE: &str = "application/csp-report";
pub const PEER: ([u8; 4], u16) = ([203, 0, 113, 7], 51_234);

/// Mailer that records every message instead of sending it.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<NotificationMessage>>,
    attempts: AtomicUsize,
    fail: AtomicBool,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        let mailer = Self::default();
        mailer.fail.store(true, Ordering::SeqCst);
        mailer
    }

    pub fn sent(&self) -> Vec<NotificationMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &NotificationMessage) -> Result<(), MailError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(MailError::Rejected {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// A relay instance with its own record file and mailer.
pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub mailer: Arc<RecordingMailer>,
    pub record_path: PathBuf,
    _dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(|_| {}, RecordingMailer::default())
    }

    pub fn with_config(configure: impl FnOnce(&mut Config)) -> Self {
        Self::build(configure, RecordingMailer::default())
    }

    pub fn with_mailer(mailer: RecordingMailer) -> Self {
        Self::build(|_| {}, mailer)
    }

    fn build(configure: impl FnOnce(&mut Config), mailer: RecordingMailer) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let record_path = dir.path().join("csp_rate_limit.json");

        let mut config = Config::default();
        config.allowed_origin = ALLOWED_ORIGIN.to_string();
        config.email.api_key = "SG.test".to_string();
        config.rate_limit.storage_path = Some(record_path.clone());
        configure(&mut config);
        config.validate().unwrap();

        let mailer = Arc::new(mailer);
        let state = Arc::new(AppState::new(config, mailer.clone()).unwrap());
        let router = router(state.clone()).layer(MockConnectInfo(SocketAddr::from(PEER)));

        Self {
            router,
            state,
            mailer,
            record_path,
            _dir: dir,
        }
    }

    pub async fn call(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn status(&self, request: Request<Body>) -> StatusCode {
        self.call(request).await.status()
    }

    /// Timestamps currently stored in the record file.
    pub fn record(&self) -> Vec<i64> {
        match std::fs::read_to_string(&self.record_path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap(),
            Err(_) => Vec::new(),
        }
    }

    pub fn seed_record(&self, timestamps: &[i64]) {
        std::fs::write(&self.record_path, serde_json::to_vec(timestamps).unwrap()).unwrap();
    }
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// POST to the report endpoint with the given headers.
pub fn report_request(
    origin: Option<&str>,
    content_type: Option<&str>,
    body: impl Into<Body>,
) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/csp-report");
    if let Some(origin) = origin {
        builder = builder.header("Origin", origin);
    }
    if let Some(content_type) = content_type {
        builder = builder.header("Content-Type", content_type);
    }
    builder.body(body.into()).unwrap()
}

/// A request that passes the header checks.
pub fn valid_request(body: impl Into<Body>) -> Request<Body> {
    report_request(Some(ALLOWED_ORIGIN), Some(CSP_CONTENT_TYPE), body)
}

pub fn sample_report() -> String {
    serde_json::json!({
        "csp-report": {
            "document-uri": "https://example.com/page",
            "referrer": "",
            "violated-directive": "script-src-elem",
            "effective-directive": "script-src-elem",
            "original-policy": "default-src 'self'; report-uri /csp-report",
            "disposition": "enforce",
            "blocked-uri": "https://cdn.evil.test/x.js",
            "line-number": 12,
            "column-number": 4,
            "status-code": 200
        }
    })
    .to_string()
}
