//! HTTP client for the Meshery server API.
//!
//! Wraps `reqwest::Client` with the server base URL and the optional auth
//! token. Endpoint URLs are built lazily so a malformed base URL surfaces as
//! a request-construction error before any network I/O.

use regex::Regex;
use reqwest::Method;
use url::Url;

use crate::token::AuthToken;

/// Maximum number of characters of an error body kept in [`ClientError::HttpStatus`].
const MAX_ERROR_BODY_CHARS: usize = 256;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by the Meshery API client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The endpoint URL could not be built from the configured base URL.
    #[error("invalid request URL {url:?}: {source}")]
    InvalidUrl {
        /// The URL that failed to parse.
        url: String,
        /// Parse failure.
        source: url::ParseError,
    },
    /// HTTP transport failure.
    #[error("request to Meshery server failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The server responded with an error status.
    #[error("Meshery server returned non-success status {status}: {body}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Sanitized response body.
        body: String,
    },
    /// Response did not match the expected schema.
    #[error("unexpected response from Meshery server: {0}")]
    Parse(String),
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Client bound to one Meshery server.
#[derive(Debug, Clone)]
pub struct MesheryClient {
    base_url: String,
    token: Option<AuthToken>,
    http: reqwest::Client,
}

impl MesheryClient {
    /// Create a client for `base_url`.
    ///
    /// The URL is not validated here; see [`MesheryClient::endpoint`].
    pub fn new(base_url: impl Into<String>, token: Option<AuthToken>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            token,
            http: reqwest::Client::new(),
        }
    }

    /// Base URL this client talks to, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the absolute URL of an API path such as `/api/system/sync`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] if the result is not a valid
    /// absolute URL.
    pub fn endpoint(&self, path_and_query: &str) -> Result<Url, ClientError> {
        let raw = format!("{}{path_and_query}", self.base_url);
        Url::parse(&raw).map_err(|source| ClientError::InvalidUrl { url: raw, source })
    }

    /// Start a request against an API path with auth cookies attached.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] if the endpoint URL is malformed.
    pub fn request(
        &self,
        method: Method,
        path_and_query: &str,
    ) -> Result<reqwest::RequestBuilder, ClientError> {
        let url = self.endpoint(path_and_query)?;
        let mut builder = self.http.request(method, url);
        if let Some(token) = &self.token {
            builder = builder.header(reqwest::header::COOKIE, token.cookie_header());
        }
        Ok(builder)
    }

    /// `GET` a JSON document and deserialize it.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on URL, transport, status, or parse failure.
    pub async fn get_json<T>(&self, path_and_query: &str) -> Result<T, ClientError>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self.request(Method::GET, path_and_query)?.send().await?;
        let body = check_http_response(response).await?;
        serde_json::from_str(&body).map_err(|e| ClientError::Parse(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

/// Check HTTP response status and return body text or a structured error.
///
/// # Errors
///
/// Returns `ClientError::Request` on transport failure, `ClientError::HttpStatus` on non-2xx.
pub async fn check_http_response(response: reqwest::Response) -> Result<String, ClientError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ClientError::HttpStatus {
            status: status.as_u16(),
            body: sanitize_http_error_body(&body),
        });
    }
    Ok(body)
}

/// Collapse whitespace, redact token-like values and truncate an error body.
pub fn sanitize_http_error_body(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut sanitized = collapsed;
    for pattern in [
        r"token=[^;\s]+",
        r#""token"\s*:\s*"[^"]*""#,
        r"Bearer\s+[A-Za-z0-9._\-]+",
        r"eyJ[A-Za-z0-9_\-]{10,}\.[A-Za-z0-9_\-]+\.[A-Za-z0-9_\-]+",
    ] {
        if let Ok(regex) = Regex::new(pattern) {
            sanitized = regex.replace_all(&sanitized, "[REDACTED]").into_owned();
        }
    }

    if sanitized.chars().count() > MAX_ERROR_BODY_CHARS {
        let shortened = sanitized
            .chars()
            .take(MAX_ERROR_BODY_CHARS)
            .collect::<String>();
        return format!("{shortened}...[truncated]");
    }

    sanitized
}
