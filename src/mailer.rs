// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Notification delivery.
//!
//! The relay only needs "send this message, tell me if it worked", so the
//! provider sits behind [`Mailer`]. [`SendGridMailer`] talks to the SendGrid
//! v3 mail API.

use crate::config::EmailConfig;
use crate::report::NotificationMessage;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Delivery failures.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("Mail provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Mail provider rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Email delivery capability.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver one message. No retries are attempted.
    async fn send(&self, message: &NotificationMessage) -> Result<(), MailError>;
}

/// SendGrid v3 `mail/send` client.
pub struct SendGridMailer {
    endpoint: String,
    api_key: String,
    client: Client,
}

impl SendGridMailer {
    /// Create a client from the email settings.
    pub fn new(config: &EmailConfig) -> Self {
        Self {
            endpoint: format!("{}/v3/mail/send", config.api_base.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            client: Client::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[derive(Debug, Serialize)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: [Address<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    value: &'a str,
}

/// Request body for `POST /v3/mail/send`.
#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    personalizations: [Personalization<'a>; 1],
    from: Address<'a>,
    subject: &'a str,
    content: [Content<'a>; 1],
}

impl<'a> From<&'a NotificationMessage> for SendRequest<'a> {
    fn from(message: &'a NotificationMessage) -> Self {
        Self {
            personalizations: [Personalization {
                to: [Address { email: &message.to }],
            }],
            from: Address {
                email: &message.from,
            },
            subject: &message.subject,
            content: [Content {
                kind: "text/plain",
                value: &message.body,
            }],
        }
    }
}

#[async_trait]
impl Mailer for SendGridMailer {
    async fn send(&self, message: &NotificationMessage) -> Result<(), MailError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&SendRequest::from(message))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(status = status.as_u16(), to = %message.to, "Notification accepted by SendGrid");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}
