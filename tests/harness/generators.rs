// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Request payload and header generators for abuse simulation.

/// Origins an attacker might try in place of the allowed one.
pub fn spoofed_origins() -> Vec<Option<&'static str>> {
    vec![
        None,
        Some(""),
        Some("null"),
        Some("http://example.com"),
        Some("https://example.com/"),
        Some("https://example.com:443"),
        Some("https://EXAMPLE.COM"),
        Some("https://www.example.com"),
        Some("https://example.com.attacker.net"),
        Some("https://attacker.net"),
        Some(" https://example.com"),
        Some("https://example.com\t"),
    ]
}

/// Content types that must not reach the rate limiter.
pub fn bypass_content_types() -> Vec<Option<&'static str>> {
    vec![
        None,
        Some(""),
        Some("application/json"),
        Some("application/reports+json"),
        Some("text/plain"),
        Some("application/csp-report; charset=utf-8"),
        Some("APPLICATION/CSP-REPORT"),
        Some("application/csp-reports"),
        Some("multipart/form-data"),
    ]
}

/// Bodies that are not a valid report envelope.
pub fn malformed_bodies() -> Vec<&'static str> {
    vec![
        "",
        "null",
        "42",
        "\"csp-report\"",
        "[]",
        "[{\"csp-report\": {}}]",
        "{}",
        "{\"csp-report\": null}",
        "{\"csp-report\": \"blocked\"}",
        "{\"csp-report\": [\"a\", \"b\"]}",
        "{\"csp-report\": 7}",
        "{\"csp-report\": {\"document-uri\": \"https://a.com\"}",
        "{'csp-report': {}}",
        "<csp-report/>",
    ]
}

/// Report bodies carrying markup that must be escaped before mailing.
pub fn injection_reports() -> Vec<String> {
    let payloads = [
        "<script>alert(1)</script>",
        "\"><img src=x onerror=alert(1)>",
        "<iframe src=\"javascript:alert(1)\"></iframe>",
        "</pre><a href=\"https://phish.test\">click</a>",
    ];

    payloads
        .iter()
        .flat_map(|p| {
            let mut hostile_key = serde_json::Map::new();
            hostile_key.insert(p.to_string(), "inline".into());
            [
                serde_json::json!({ "csp-report": { "blocked-uri": p } }).to_string(),
                serde_json::json!({ "csp-report": hostile_key }).to_string(),
            ]
        })
        .collect()
}

/// A syntactically valid report padded to exactly `size` bytes.
pub fn padded_report(size: usize) -> String {
    let prefix = "{\"csp-report\": {\"script-sample\": \"";
    let suffix = "\"}}";
    let fill = size.saturating_sub(prefix.len() + suffix.len());
    format!("{}{}{}", prefix, "a".repeat(fill), suffix)
}
