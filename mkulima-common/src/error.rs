//! Error types for the MkulimaMkononi gateway.

use thiserror::Error;

/// Result type alias using the gateway error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for providers, flow handlers and startup.
#[derive(Error, Debug)]
pub enum Error {
    /// Unknown city, place or menu path (user-correctable)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network error, timeout or 5xx from an external provider
    #[error("{service} unavailable: {message}")]
    UpstreamUnavailable {
        service: &'static str,
        message: String,
        status: Option<u16>,
    },

    /// Provider answered with an unexpected shape
    #[error("Malformed {service} response: {message}")]
    MalformedUpstreamResponse {
        service: &'static str,
        message: String,
    },

    /// Credential absent at startup
    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    /// Input path matches no menu node and no pending flow
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build an `UpstreamUnavailable` error.
    pub fn unavailable(service: &'static str, message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            service,
            message: message.into(),
            status: None,
        }
    }

    /// Build a `MalformedUpstreamResponse` error.
    pub fn malformed(service: &'static str, message: impl Into<String>) -> Self {
        Self::MalformedUpstreamResponse {
            service,
            message: message.into(),
        }
    }

    /// Classify a reqwest failure for the given service.
    ///
    /// Decode failures are data-contract violations; everything else
    /// (connect, timeout, body read) is treated as the service being down.
    pub fn from_http(service: &'static str, err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::malformed(service, err.to_string());
        }
        Self::UpstreamUnavailable {
            service,
            message: if err.is_timeout() {
                "request timed out".to_string()
            } else {
                err.to_string()
            },
            status: err.status().map(|s| s.as_u16()),
        }
    }

    /// Build an error for a non-success HTTP status.
    pub fn from_status(service: &'static str, status: u16, body: &str) -> Self {
        if status == 404 {
            return Self::NotFound(format!("{service} returned 404"));
        }
        Self::UpstreamUnavailable {
            service,
            message: format!("HTTP {status}: {}", crate::util::truncate_with_ellipsis(body, 200)),
            status: Some(status),
        }
    }

    /// Stable kind name for structured logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::UpstreamUnavailable { .. } => "upstream_unavailable",
            Self::MalformedUpstreamResponse { .. } => "malformed_upstream_response",
            Self::MissingConfiguration(_) => "missing_configuration",
            Self::InvalidSelection(_) => "invalid_selection",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
        }
    }

    /// Check if the user can fix this by changing their input.
    pub const fn is_user_correctable(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::InvalidSelection(_))
    }

    /// Check if retrying later may succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable { .. })
    }
}
