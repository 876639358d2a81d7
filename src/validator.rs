// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! CSP report request validator.
//!
//! Implements the header checks that run before any state is touched:
//! - `Origin` must equal the configured allowed origin
//! - `Content-Type` must be `application/csp-report`

use thiserror::Error;
use tracing::debug;

/// The only content type browsers use for `report-uri` deliveries.
pub const CSP_REPORT_CONTENT_TYPE: &str = "application/csp-report";

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid origin: {}", .0.as_deref().unwrap_or("none"))]
    InvalidOrigin(Option<String>),

    #[error("Invalid content type: {}", .0.as_deref().unwrap_or("none"))]
    InvalidContentType(Option<String>),
}

/// Result of validation.
#[derive(Debug, Clone)]
pub enum ValidationResult {
    /// Request is valid
    Valid,
    /// Request is invalid
    Invalid(ValidationError),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }
}

/// CSP report request validator.
pub struct ReportValidator {
    allowed_origin: String,
}

impl ReportValidator {
    /// Create a validator accepting exactly `allowed_origin`.
    pub fn new(allowed_origin: impl Into<String>) -> Self {
        Self {
            allowed_origin: allowed_origin.into(),
        }
    }

    pub fn allowed_origin(&self) -> &str {
        &self.allowed_origin
    }

    /// Validate the `Origin` header. The comparison is exact.
    pub fn validate_origin(&self, origin: Option<&str>) -> ValidationResult {
        match origin {
            Some(o) if o == self.allowed_origin => ValidationResult::Valid,
            _ => {
                debug!(origin = ?origin, expected = %self.allowed_origin, "Origin rejected");
                ValidationResult::Invalid(ValidationError::InvalidOrigin(
                    origin.map(str::to_string),
                ))
            }
        }
    }

    /// Validate the `Content-Type` header. Parameters such as `charset` are
    /// not tolerated; browsers send the bare media type.
    pub fn validate_content_type(&self, content_type: Option<&str>) -> ValidationResult {
        match content_type {
            Some(ct) if ct == CSP_REPORT_CONTENT_TYPE => ValidationResult::Valid,
            _ => {
                debug!(content_type = ?content_type, "Content-Type rejected");
                ValidationResult::Invalid(ValidationError::InvalidContentType(
                    content_type.map(str::to_string),
                ))
            }
        }
    }
}
