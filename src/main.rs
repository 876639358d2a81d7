// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! CSP Report Relay Service
//!
//! Accepts `report-uri` deliveries from browsers at a single endpoint and
//! emails each accepted violation to the security team.
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! - `BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
//! - `REPORT_PATH`: Report endpoint path (default: /csp-report)
//! - `ALLOWED_ORIGIN`: Accepted `Origin` header (default: https://example.com)
//! - `EMAIL_FROM`, `EMAIL_TO`, `EMAIL_SUBJECT`: Notification envelope
//! - `SENDGRID_API_KEY`: SendGrid credential (required)
//! - `RATE_LIMIT_FILE`: Rate limit record (default: /tmp/csp_rate_limit.json,
//!   empty for in-memory)
//! - `MAX_REQUESTS`: Reports admitted per window (default: 10)
//! - `TIME_WINDOW_SECS`: Window length in seconds (default: 60)
//! - `METRICS_ENABLED`, `METRICS_PATH`: Prometheus endpoint (default: on, /metrics)

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use csp_report_relay::{
    config::Config,
    handlers::{router, AppState},
    mailer::SendGridMailer,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config = Config::from_env()?;
    info!(
        bind_addr = %config.bind_addr,
        report_path = %config.report_path,
        allowed_origin = %config.allowed_origin,
        max_requests = config.rate_limit.max_requests,
        window_secs = config.rate_limit.window_secs,
        storage = ?config.rate_limit.storage_path,
        "Starting CSP report relay"
    );

    let mailer = Arc::new(SendGridMailer::new(&config.email));
    let state = Arc::new(AppState::new(config.clone(), mailer)?);
    let app = router(state);

    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
