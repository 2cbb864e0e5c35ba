//! Forge instance endpoints

use fd_types::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Base URL of a forge instance, e.g. `https://codeberg.org`.
///
/// Stored without a trailing slash. Browser-facing pages hang directly off
/// the base (`{base}/login/oauth/authorize`), while REST calls go through
/// the versioned API root (`{base}/api/v1`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Endpoint(String);

impl Endpoint {
    /// Validate and normalize a forge base URL
    pub fn new(url: impl Into<String>) -> AppResult<Self> {
        let url = url.into();
        let trimmed = url.trim().trim_end_matches('/');

        if trimmed.is_empty() {
            return Err(AppError::InvalidEndpoint("empty URL".to_string()));
        }
        if !trimmed.starts_with("https://") && !trimmed.starts_with("http://") {
            return Err(AppError::InvalidEndpoint(format!(
                "not an http(s) URL: {}",
                trimmed
            )));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// The normalized base URL without a trailing slash
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Join a browser-facing path onto the base URL
    pub fn web_url(&self, path: &str) -> String {
        format!("{}/{}", self.0, path.trim_start_matches('/'))
    }

    /// Join a REST path onto the versioned API root
    pub fn api_url(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.0, path.trim_start_matches('/'))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
