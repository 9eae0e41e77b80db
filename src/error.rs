//! HyreLog error types with error codes
//!
//! Error code ranges:
//! - HYRELOG-000-009: Transport errors (network, API status, rate limit)
//! - HYRELOG-010-019: Response/shape errors
//! - HYRELOG-020-029: Client lifecycle and input validation
//! - HYRELOG-030-039: Batch submission
//! - HYRELOG-040-049: Configuration

use std::time::Duration;

use thiserror::Error;

use crate::types::{Event, EventInput};

pub type Result<T> = std::result::Result<T, HyreLogError>;

/// Maximum number of response-body characters kept in error messages.
pub const EXCERPT_LEN: usize = 200;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// All error variants are part of the public API.
#[derive(Error, Debug)]
pub enum HyreLogError {
    // ─────────────────────────────────────────────────────────────
    // Transport (HYRELOG-000 to HYRELOG-009)
    // ─────────────────────────────────────────────────────────────
    #[error("[HYRELOG-001] Network error calling {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("[HYRELOG-002] API error {status_code}: {body}")]
    Api { status_code: u16, body: String },

    #[error("[HYRELOG-003] Rate limited (retry after {}): {body}", format_retry_after(.retry_after))]
    RateLimited {
        retry_after: Option<Duration>,
        body: String,
    },

    // ─────────────────────────────────────────────────────────────
    // Response shape (HYRELOG-010 to HYRELOG-019)
    // ─────────────────────────────────────────────────────────────
    #[error("[HYRELOG-010] Malformed response: {reason} (body: {excerpt})")]
    MalformedResponse { reason: String, excerpt: String },

    // ─────────────────────────────────────────────────────────────
    // Lifecycle / validation (HYRELOG-020 to HYRELOG-029)
    // ─────────────────────────────────────────────────────────────
    #[error("[HYRELOG-020] Client is closed")]
    ClientClosed,

    #[error("[HYRELOG-021] Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // Batch submission (HYRELOG-030 to HYRELOG-039)
    // ─────────────────────────────────────────────────────────────
    #[error(
        "[HYRELOG-030] Batch submission failed after {} accepted events ({} not sent): {source}",
        .submitted.len(),
        .unsent.len()
    )]
    BatchFailed {
        submitted: Vec<Event>,
        /// Accepted by the service, but the response could not be read back.
        unconfirmed: Vec<EventInput>,
        unsent: Vec<EventInput>,
        source: Box<HyreLogError>,
    },

    #[error("[HYRELOG-031] Background batch task failed: {reason}")]
    BackgroundTask { reason: String },

    // ─────────────────────────────────────────────────────────────
    // Configuration (HYRELOG-040 to HYRELOG-049)
    // ─────────────────────────────────────────────────────────────
    #[error("[HYRELOG-040] Configuration error: {reason}")]
    Config { reason: String },
}

fn format_retry_after(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!("{:.1}s", d.as_secs_f64()),
        None => "unspecified".to_string(),
    }
}

impl HyreLogError {
    /// Build a `MalformedResponse` keeping only a short excerpt of the body.
    pub fn malformed(reason: impl Into<String>, body: &str) -> Self {
        HyreLogError::MalformedResponse {
            reason: reason.into(),
            excerpt: excerpt(body),
        }
    }

    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        HyreLogError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        HyreLogError::Config {
            reason: reason.into(),
        }
    }

    /// HTTP status code carried by this error, looking through batch wrappers.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            HyreLogError::Api { status_code, .. } => Some(*status_code),
            HyreLogError::RateLimited { .. } => Some(429),
            HyreLogError::BatchFailed { source, .. } => source.status_code(),
            _ => None,
        }
    }

    /// The innermost error (unwraps `BatchFailed`).
    pub fn root_cause(&self) -> &HyreLogError {
        match self {
            HyreLogError::BatchFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Events the service accepted before a batch failure.
    pub fn submitted_events(&self) -> &[Event] {
        match self {
            HyreLogError::BatchFailed { submitted, .. } => submitted,
            _ => &[],
        }
    }

    /// Events that were never accepted by the service.
    pub fn unsent_events(&self) -> &[EventInput] {
        match self {
            HyreLogError::BatchFailed { unsent, .. } => unsent,
            _ => &[],
        }
    }

    /// Events the service accepted in a chunk whose response was malformed.
    ///
    /// Resubmitting these would store them twice.
    pub fn unconfirmed_events(&self) -> &[EventInput] {
        match self {
            HyreLogError::BatchFailed { unconfirmed, .. } => unconfirmed,
            _ => &[],
        }
    }
}

/// Truncate a response body to [`EXCERPT_LEN`] characters.
pub fn excerpt(body: &str) -> String {
    if body.chars().count() <= EXCERPT_LEN {
        return body.to_string();
    }
    let mut out: String = body.chars().take(EXCERPT_LEN).collect();
    out.push('…');
    out
}

impl FixSuggestion for HyreLogError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            HyreLogError::Network { .. } => {
                Some("Check connectivity to the HyreLog API and the configured base URL")
            }
            HyreLogError::Api { status_code, .. } => match status_code {
                401 | 403 => Some("Check that HYRELOG_API_KEY is a valid key for this scope"),
                404 => Some("Check the base URL; workspace keys cannot call company routes"),
                400 | 422 => Some("Check the event fields against the API schema"),
                _ => None,
            },
            HyreLogError::RateLimited { .. } => {
                Some("Reduce request rate or raise retry.max_retries")
            }
            HyreLogError::MalformedResponse { .. } => {
                Some("Check that base_url points at the HyreLog API, not a proxy or web page")
            }
            HyreLogError::ClientClosed => Some("Create a new client; close() is final"),
            HyreLogError::Validation { .. } => Some("Provide a non-empty action and category"),
            HyreLogError::BatchFailed { .. } => {
                Some("Resubmit the unsent events once the underlying error is resolved")
            }
            HyreLogError::BackgroundTask { .. } => None,
            HyreLogError::Config { .. } => {
                Some("Set HYRELOG_API_KEY or edit ~/.config/hyrelog/config.toml")
            }
        }
    }
}
