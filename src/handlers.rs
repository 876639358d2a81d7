// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the CSP report relay.
//!
//! The report endpoint is a linear pipeline. Every stage either passes the
//! request on or ends it with a single status code:
//!
//! origin (403) → content type (415) → rate limit (429) → size (413) →
//! JSON shape (400) → format → dispatch (204 / 500)
//!
//! Error responses never carry a body.

use crate::config::{Config, HEALTH_PATHS};
use crate::limiter::{RateLimitResult, RateLimiter};
use crate::mailer::{MailError, Mailer};
use crate::metrics::{Metrics, Outcome};
use crate::report::{format_report, NotificationMessage, ReportEnvelope, ServerDetails, MAX_REPORT_BYTES};
use crate::validator::{ReportValidator, ValidationError, ValidationResult};
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, ConnectInfo, DefaultBodyLimit, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Local;
use serde::Serialize;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub validator: ReportValidator,
    pub limiter: RateLimiter,
    pub mailer: Arc<dyn Mailer>,
    pub metrics: Metrics,
}

impl AppState {
    /// Wire the pipeline components for `config`.
    pub fn new(config: Config, mailer: Arc<dyn Mailer>) -> Result<Self, prometheus::Error> {
        Ok(Self {
            validator: ReportValidator::new(config.allowed_origin.clone()),
            limiter: RateLimiter::new(config.rate_limit.clone()),
            metrics: Metrics::new()?,
            mailer,
            config,
        })
    }
}

/// Terminal rejections of the report pipeline.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("Rate limit exceeded, retry in {}s", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    #[error("Payload too large")]
    PayloadTooLarge,

    #[error("Invalid JSON: {0}")]
    Malformed(String),

    #[error("Mail dispatch failed: {0}")]
    Dispatch(#[from] MailError),
}

impl IngestError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Invalid(ValidationError::InvalidOrigin(_)) => StatusCode::FORBIDDEN,
            Self::Invalid(ValidationError::InvalidContentType(_)) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Malformed(_) => StatusCode::BAD_REQUEST,
            Self::Dispatch(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn outcome(&self) -> Outcome {
        match self {
            Self::Invalid(ValidationError::InvalidOrigin(_)) => Outcome::ForbiddenOrigin,
            Self::Invalid(ValidationError::InvalidContentType(_)) => {
                Outcome::UnsupportedContentType
            }
            Self::RateLimited { .. } => Outcome::RateLimited,
            Self::PayloadTooLarge => Outcome::PayloadTooLarge,
            Self::Malformed(_) => Outcome::Malformed,
            Self::Dispatch(_) => Outcome::DispatchFailed,
        }
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        match self {
            Self::RateLimited { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_after.as_secs().to_string())],
            )
                .into_response(),
            other => other.status().into_response(),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "csp-report-relay",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Prometheus scrape endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.render() {
        Ok(text) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], text).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Receive one browser CSP violation report and forward it by email.
///
/// The body is buffered by the extractor under a [`DefaultBodyLimit`] of
/// [`MAX_REPORT_BYTES`], but its outcome is only looked at once the header
/// checks and the rate limit have passed.
pub async fn report(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    match ingest(&state, addr.ip(), &headers, body).await {
        Ok(()) => {
            state.metrics.record(Outcome::Accepted);
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => {
            state.metrics.record(err.outcome());
            err.into_response()
        }
    }
}

async fn ingest(
    state: &AppState,
    ip: IpAddr,
    headers: &HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<(), IngestError> {
    let origin = header_str(headers, header::ORIGIN);
    if let ValidationResult::Invalid(err) = state.validator.validate_origin(origin) {
        warn!(%ip, origin = origin.unwrap_or("none"), "Invalid origin");
        return Err(err.into());
    }

    let content_type = header_str(headers, header::CONTENT_TYPE);
    if let ValidationResult::Invalid(err) = state.validator.validate_content_type(content_type) {
        warn!(%ip, content_type = content_type.unwrap_or("none"), "Invalid content type");
        return Err(err.into());
    }

    let received_at = Local::now();
    match state.limiter.try_admit_at(received_at.timestamp()).await {
        RateLimitResult::Allowed { remaining } => {
            debug!(%ip, remaining, "Report admitted");
        }
        RateLimitResult::Limited { retry_after } => {
            warn!(%ip, retry_after_secs = retry_after.as_secs(), "Rate limit exceeded");
            return Err(IngestError::RateLimited { retry_after });
        }
    }

    let body = match body {
        Ok(bytes) if bytes.len() <= MAX_REPORT_BYTES => bytes,
        Ok(bytes) => {
            warn!(%ip, size = bytes.len(), "Payload too large");
            return Err(IngestError::PayloadTooLarge);
        }
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            warn!(%ip, "Payload too large");
            return Err(IngestError::PayloadTooLarge);
        }
        Err(rejection) => {
            warn!(%ip, error = %rejection.body_text(), "Unreadable report body");
            return Err(IngestError::Malformed(rejection.body_text()));
        }
    };

    let envelope = ReportEnvelope::from_slice(&body).map_err(|e| {
        warn!(%ip, error = %e, "Invalid JSON");
        IngestError::Malformed(e.to_string())
    })?;

    let validated_origin = state.validator.allowed_origin();
    let message = NotificationMessage {
        from: state.config.email.from.clone(),
        to: state.config.email.to.clone(),
        subject: state.config.email.subject.clone(),
        body: format_report(
            &envelope,
            &ServerDetails {
                received_at,
                client_ip: ip,
                origin: validated_origin,
            },
        ),
    };

    state.mailer.send(&message).await.map_err(|e| {
        error!(%ip, error = %e, "Mail dispatch failed");
        IngestError::Dispatch(e)
    })?;

    info!(%ip, fields = envelope.csp_report.len(), "CSP report forwarded");
    Ok(())
}

fn header_str(headers: &HeaderMap, name: HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    let mut app = Router::new().route(
        &state.config.report_path,
        post(report).layer(DefaultBodyLimit::max(MAX_REPORT_BYTES)),
    );

    for path in HEALTH_PATHS {
        app = app.route(path, get(health));
    }

    if state.config.metrics.enabled {
        app = app.route(&state.config.metrics.path, get(metrics));
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}
