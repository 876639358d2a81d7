// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus counters for report outcomes.

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

/// Terminal outcome of one report request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Accepted,
    ForbiddenOrigin,
    UnsupportedContentType,
    RateLimited,
    PayloadTooLarge,
    Malformed,
    DispatchFailed,
}

impl Outcome {
    pub const ALL: [Outcome; 7] = [
        Outcome::Accepted,
        Outcome::ForbiddenOrigin,
        Outcome::UnsupportedContentType,
        Outcome::RateLimited,
        Outcome::PayloadTooLarge,
        Outcome::Malformed,
        Outcome::DispatchFailed,
    ];

    /// Label value used in the exported series.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::ForbiddenOrigin => "forbidden_origin",
            Self::UnsupportedContentType => "unsupported_content_type",
            Self::RateLimited => "rate_limited",
            Self::PayloadTooLarge => "payload_too_large",
            Self::Malformed => "malformed",
            Self::DispatchFailed => "dispatch_failed",
        }
    }
}

/// Service-local metrics registry.
pub struct Metrics {
    registry: Registry,
    reports: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let reports = IntCounterVec::new(
            Opts::new("csp_reports_total", "CSP report requests by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(reports.clone()))?;

        // Export every series from the start, even at zero
        for outcome in Outcome::ALL {
            reports.with_label_values(&[outcome.as_str()]);
        }

        Ok(Self { registry, reports })
    }

    pub fn record(&self, outcome: Outcome) {
        self.reports.with_label_values(&[outcome.as_str()]).inc();
    }

    pub fn count(&self, outcome: Outcome) -> u64 {
        self.reports.with_label_values(&[outcome.as_str()]).get()
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}
