// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! CSP report decoding and notification formatting.

use chrono::{DateTime, TimeZone};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt::Write;
use std::net::IpAddr;

/// Largest accepted report body, in bytes.
pub const MAX_REPORT_BYTES: usize = 50_000;

/// Envelope browsers wrap a violation in for `report-uri` deliveries.
///
/// Decoding fails unless the body is a JSON object with a `csp-report`
/// member whose value is itself an object. Field order is kept as sent.
#[derive(Debug, Deserialize)]
pub struct ReportEnvelope {
    #[serde(rename = "csp-report")]
    pub csp_report: Map<String, Value>,
}

impl ReportEnvelope {
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        // Derived structs also decode from arrays; only an object is an envelope
        match serde_json::from_slice::<Value>(body)? {
            object @ Value::Object(_) => serde_json::from_value(object),
            _ => Err(serde::de::Error::custom("report must be a JSON object")),
        }
    }

    /// String-valued violation fields, in the order received.
    pub fn string_fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.csp_report
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.as_str(), s)))
    }
}

/// Server-side context appended to every notification.
#[derive(Debug, Clone)]
pub struct ServerDetails<'a, Tz: TimeZone> {
    pub received_at: DateTime<Tz>,
    pub client_ip: IpAddr,
    pub origin: &'a str,
}

/// A plain-text notification ready for the mailer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Render the notification body for a decoded report.
pub fn format_report<Tz>(envelope: &ReportEnvelope, details: &ServerDetails<'_, Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut out = String::from("CSP Violation Report\n");
    out.push_str("===================\n\n");

    for (key, value) in envelope.string_fields() {
        let key = capitalize_first(&html_escape::encode_quoted_attribute(key));
        let value = html_escape::encode_quoted_attribute(value);
        // Writing into a String cannot fail
        let _ = writeln!(out, "{}: {}", key, value);
    }

    out.push_str("\nServer Details:\n");
    let _ = writeln!(out, "Time: {}", details.received_at.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "IP: {}", details.client_ip);
    let _ = writeln!(out, "Origin: {}", details.origin);

    out
}

/// Upper-case the first character when it is an ASCII letter.
fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => {
            let mut out = String::with_capacity(s.len());
            out.push(first.to_ascii_uppercase());
            out.push_str(chars.as_str());
            out
        }
        None => String::new(),
    }
}
