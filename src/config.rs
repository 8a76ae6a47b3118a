//! Configuration management for the CRM MCP Server.
//!
//! This module handles loading and validating configuration from environment variables.
//! It avoids polluting stdout (which MCP uses for communication) by loading the .env
//! file through `dotenvy`, which never prints.

use crate::error::{ConfigError, ConfigResult};
use std::env;

/// Configuration for the CRM MCP Server.
#[derive(Debug, Clone)]
pub struct Config {
    /// CRM API base URL
    pub crm_api_url: String,

    /// CRM API key for authentication
    pub crm_api_key: String,

    /// Workspace to select when several are accessible (default: first one)
    pub preferred_workspace: Option<String>,

    /// HTTP request timeout in seconds (default: 10)
    pub request_timeout: u64,

    /// Maximum records fetched per activity stream during correlation (default: 200)
    pub correlation_stream_limit: usize,

    /// Days covered by an activity window when no start is given (default: 7)
    pub activity_window_days: i64,

    /// Log level (default: "error")
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `CRM_API_BASE_URL`: Base URL for the CRM API
    /// - `CRM_API_KEY`: API key for authentication
    ///
    /// Optional environment variables:
    /// - `CRM_WORKSPACE`: Preferred workspace name
    /// - `REQUEST_TIMEOUT`: HTTP timeout in seconds (default: 10)
    /// - `CORRELATION_STREAM_LIMIT`: Records per activity stream (default: 200)
    /// - `ACTIVITY_WINDOW_DAYS`: Default activity window length (default: 7)
    /// - `LOG_LEVEL`: Logging level (default: "error")
    pub fn from_env() -> ConfigResult<Self> {
        let _ = dotenvy::dotenv();

        let crm_api_url = env::var("CRM_API_BASE_URL")
            .map_err(|_| ConfigError::MissingVar("CRM_API_BASE_URL".to_string()))?;

        let crm_api_key = env::var("CRM_API_KEY")
            .map_err(|_| ConfigError::MissingVar("CRM_API_KEY".to_string()))?;

        if !crm_api_url.starts_with("http://") && !crm_api_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                var: "CRM_API_BASE_URL".to_string(),
                reason: "Must start with http:// or https://".to_string(),
            });
        }

        if crm_api_key.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                var: "CRM_API_KEY".to_string(),
                reason: "Cannot be empty".to_string(),
            });
        }

        let preferred_workspace = env::var("CRM_WORKSPACE")
            .ok()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        let request_timeout = Self::parse_env_u64("REQUEST_TIMEOUT", 10)?;
        let correlation_stream_limit = Self::parse_env_usize("CORRELATION_STREAM_LIMIT", 200)?;
        let activity_window_days = Self::parse_env_u64("ACTIVITY_WINDOW_DAYS", 7)?;

        if correlation_stream_limit == 0 {
            return Err(ConfigError::InvalidValue {
                var: "CORRELATION_STREAM_LIMIT".to_string(),
                reason: "Must be greater than zero".to_string(),
            });
        }

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "error".to_string());

        Ok(Config {
            crm_api_url,
            crm_api_key,
            preferred_workspace,
            request_timeout,
            correlation_stream_limit,
            activity_window_days: activity_window_days as i64,
            log_level,
        })
    }

    /// Parse an environment variable as u64 with a default value.
    fn parse_env_u64(var_name: &str, default: u64) -> ConfigResult<u64> {
        match env::var(var_name) {
            Ok(val) => val.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                var: var_name.to_string(),
                reason: format!("Must be a positive number, got: {}", val),
            }),
            Err(_) => Ok(default),
        }
    }

    /// Parse an environment variable as usize with a default value.
    fn parse_env_usize(var_name: &str, default: usize) -> ConfigResult<usize> {
        match env::var(var_name) {
            Ok(val) => val.parse::<usize>().map_err(|_| ConfigError::InvalidValue {
                var: var_name.to_string(),
                reason: format!("Must be a positive number, got: {}", val),
            }),
            Err(_) => Ok(default),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            crm_api_url: String::new(),
            crm_api_key: String::new(),
            preferred_workspace: None,
            request_timeout: 10,
            correlation_stream_limit: 200,
            activity_window_days: 7,
            log_level: "error".to_string(),
        }
    }
}
