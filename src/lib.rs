// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! CSP Report Relay
//!
//! Receives browser Content Security Policy violation reports and forwards
//! them to a security mailbox:
//!
//! - Exact `Origin` allow-listing
//! - `application/csp-report` content type enforcement
//! - Deployment-wide sliding window rate limit, persisted to disk
//! - 50,000 byte body limit
//! - Fail-closed JSON shape check and HTML-escaped plain-text formatting
//! - Delivery through the SendGrid mail API

pub mod config;
pub mod handlers;
pub mod limiter;
pub mod mailer;
pub mod metrics;
pub mod report;
pub mod validator;

pub use config::Config;
pub use handlers::{router, AppState};
pub use limiter::{RateLimitResult, RateLimiter};
pub use mailer::{MailError, Mailer, SendGridMailer};
pub use validator::{ReportValidator, ValidationResult};
