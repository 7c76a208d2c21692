use std::path::PathBuf;
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Configuration errors, fatal at startup
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("Usage: proxyhook wss://proxyhook.example.com/listen http://target1.example.com/webhook [http://target2.example.com/webhook ...]")]
    #[diagnostic(
        code(proxyhook::config::usage),
        help("Pass the relay URL followed by at least one webhook target URL, or set them in a --config file.")
    )]
    Usage,

    #[error("Invalid URL '{url}': {reason}")]
    #[diagnostic(code(proxyhook::config::invalid_url))]
    InvalidUrl { url: String, reason: String },

    #[error("Expected URI with ws: or wss: : {0}")]
    #[diagnostic(code(proxyhook::config::tunnel_scheme))]
    TunnelScheme(String),

    #[error("Expected webhook URL with http: or https: : {0}")]
    #[diagnostic(code(proxyhook::config::target_scheme))]
    TargetScheme(String),

    #[error("Unable to resolve URI {url}: {reason}")]
    #[diagnostic(
        code(proxyhook::config::unresolvable),
        help("Check the hostname and your DNS configuration.")
    )]
    Unresolvable { url: String, reason: String },

    #[error("Failed to load config file {path:?}: {reason}")]
    #[diagnostic(code(proxyhook::config::file))]
    ConfigFile { path: PathBuf, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    #[diagnostic(code(proxyhook::config::http_client))]
    HttpClient(#[from] reqwest::Error),
}

impl ConfigError {
    pub fn invalid_url(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

/// Recoverable transport failures; the supervisor reconnects after these
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection to {0} timed out")]
    ConnectTimeout(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("No traffic for {0:?}, treating connection as dead")]
    Idle(Duration),

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Session failures that must terminate the process
#[derive(Debug, Error, Diagnostic)]
pub enum FatalError {
    #[error("login failed")]
    #[diagnostic(
        code(proxyhook::session::login_failed),
        help("The relay rejected the password. Check the password environment variable (PROXYHOOK_PASSWORD by default).")
    )]
    LoginFailed,

    #[error("unexpected message type: {0}")]
    #[diagnostic(
        code(proxyhook::session::unknown_message),
        help("The relay server may be newer than this client.")
    )]
    UnknownMessageType(String),
}
