//! # Error Handling
//!
//! This module defines the centralized error type for `bb-brancher`. It uses
//! the `thiserror` library to build an `Error` enum covering every failure
//! mode of a provisioning run, together with the usual `Result<T>` alias.
//!
//! The variants fall into two groups:
//!
//! - **Run-level**: `Config` aborts the whole run before any branch is
//!   touched (missing keys, invalid branch names, missing credentials).
//! - **Branch-level**: `RefNotFound`, `Gateway`, `Network` and `LocalCommit`
//!   are fatal for the branch being processed. The orchestrator records them
//!   as a failed outcome and moves on to the next branch.
//!
//! `Gateway` carries the HTTP method, URL, status code and raw response body
//! so callers can log or alert on authentication failures, rate limiting and
//! malformed responses alike. A 404 is never turned into a `Gateway` error by
//! the lookups; it is reported as "not found" to the caller instead.

use thiserror::Error;

/// Main error type for bb-brancher operations
#[derive(Error, Debug)]
pub enum Error {
    /// The configuration is invalid or incomplete.
    ///
    /// Includes an optional hint about how to fix it.
    #[error("Configuration error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    Config {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// Neither a branch nor a tag matches the requested source ref.
    #[error("Reference not found: '{reference}' is neither a branch nor a tag")]
    RefNotFound { reference: String },

    /// The hosted API answered with a non-2xx, non-404 status, or with a body
    /// that could not be understood.
    #[error("API error: {method} {url} returned {status}: {body}")]
    Gateway {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    /// The request never produced a response (timeout, DNS, TLS, refused).
    #[error("Network operation error: {url} - {message}")]
    Network { url: String, message: String },

    /// A step of the local clone/commit/push fallback failed.
    #[error("Local commit error during {step}: {message}")]
    LocalCommit { step: String, message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON parsing error, wrapped from `serde_json::Error`.
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// Shorthand for a `Config` error without a hint.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            hint: None,
        }
    }

    /// Whether this error must abort the whole run instead of a single branch.
    pub fn is_fatal_for_run(&self) -> bool {
        matches!(self, Error::Config { .. })
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
