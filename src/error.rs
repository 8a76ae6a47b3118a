//! Error types for the CRM MCP Server.
//!
//! This module defines custom error types using `thiserror` for precise error handling.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static WHITESPACE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("Failed to compile whitespace regex"));

/// Maximum length of a validation message surfaced to the caller.
pub const MAX_VALIDATION_MESSAGE_LEN: usize = 300;

/// Errors that can occur when interacting with the CRM API.
#[derive(Error, Debug)]
pub enum CrmApiError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// API returned an error status code
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Failed to parse JSON response
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Network timeout
    #[error("Request timeout")]
    Timeout,

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Authentication failed
    #[error("Authentication failed")]
    Unauthorized,

    /// Authenticated but not allowed to access the resource
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// The API rejected the request payload or query
    #[error("Validation error: {0}")]
    Validation(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Generic API error with context
    #[error("API error: {0}")]
    Other(String),
}

impl CrmApiError {
    /// Message suitable for showing to the end user of a tool.
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthorized => {
                "Authentication with the CRM API failed. Check that CRM_API_KEY is valid."
                    .to_string()
            }
            Self::Forbidden(_) => {
                "Access denied: the API key does not have permission for this resource."
                    .to_string()
            }
            Self::NotFound(what) => format!("Not found: {}", what),
            Self::Validation(message) => format!("The CRM API rejected the request: {}", message),
            Self::RateLimitExceeded => {
                "The CRM API rate limit was exceeded. Try again shortly.".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Reduce a raw validation error body to a short, single-line message.
///
/// JSON bodies carrying a `message` or `error` string are unwrapped first.
pub fn sanitize_validation_message(raw: &str) -> String {
    let extracted = serde_json::from_str::<serde_json::Value>(raw)
        .ok()
        .and_then(|value| {
            ["message", "error"].iter().find_map(|key| {
                value
                    .get(*key)
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
            })
        })
        .unwrap_or_else(|| raw.to_string());

    let collapsed = WHITESPACE_REGEX.replace_all(extracted.trim(), " ");

    if collapsed.chars().count() > MAX_VALIDATION_MESSAGE_LEN {
        let truncated: String = collapsed.chars().take(MAX_VALIDATION_MESSAGE_LEN).collect();
        format!("{}...", truncated)
    } else {
        collapsed.into_owned()
    }
}

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Required environment variable is missing
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    /// Environment variable has invalid value
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },

    /// Failed to load .env file
    #[error("Failed to load .env file: {0}")]
    DotenvError(String),

    /// Generic configuration error
    #[error("Configuration error: {0}")]
    Other(String),
}

/// Convenience type alias for Results with CrmApiError
pub type CrmApiResult<T> = Result<T, CrmApiError>;

/// Convenience type alias for Results with ConfigError
pub type ConfigResult<T> = Result<T, ConfigError>;
