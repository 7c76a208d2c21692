//! Tunnel endpoint and webhook target descriptors
//!
//! Both are parsed once at startup and shared read-only afterwards.

use std::fmt;

use reqwest::Url;

use crate::error::ConfigError;

/// Scheme of the tunnel URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelScheme {
    Ws,
    Wss,
}

impl TunnelScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            TunnelScheme::Ws => "ws",
            TunnelScheme::Wss => "wss",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            TunnelScheme::Ws => 80,
            TunnelScheme::Wss => 443,
        }
    }
}

/// Where the relay server listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelEndpoint {
    scheme: TunnelScheme,
    host: String,
    port: u16,
    relative_uri: String,
}

impl TunnelEndpoint {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(raw).map_err(|e| ConfigError::invalid_url(raw, e))?;

        let scheme = match url.scheme() {
            "ws" => TunnelScheme::Ws,
            "wss" => TunnelScheme::Wss,
            _ => return Err(ConfigError::TunnelScheme(raw.to_string())),
        };

        let host = url
            .host_str()
            .ok_or_else(|| ConfigError::invalid_url(raw, "missing host"))?
            .to_string();
        let port = url.port().unwrap_or_else(|| scheme.default_port());

        let relative_uri = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };

        Ok(Self {
            scheme,
            host,
            port,
            relative_uri,
        })
    }

    pub fn scheme(&self) -> TunnelScheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Path plus query, as sent in the upgrade request
    pub fn relative_uri(&self) -> &str {
        &self.relative_uri
    }

    pub fn use_tls(&self) -> bool {
        self.scheme == TunnelScheme::Wss
    }

    /// Fully resolved URL used to open the connection
    pub fn connect_url(&self) -> String {
        format!(
            "{}://{}:{}{}",
            self.scheme.as_str(),
            self.host,
            self.port,
            self.relative_uri
        )
    }
}

impl fmt::Display for TunnelEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.connect_url())
    }
}

/// An absolute http(s) URL that receives replayed webhooks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookTarget {
    url: Url,
}

impl WebhookTarget {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(raw).map_err(|e| ConfigError::invalid_url(raw, e))?;

        let scheme = url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(ConfigError::TargetScheme(raw.to_string()));
        }
        if url.host_str().is_none() {
            return Err(ConfigError::invalid_url(raw, "missing host"));
        }

        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn port(&self) -> u16 {
        self.url.port_or_known_default().unwrap_or(80)
    }
}

impl fmt::Display for WebhookTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports_by_scheme() {
        let ws = TunnelEndpoint::parse("ws://relay.example.com/listen").unwrap();
        assert_eq!(ws.port(), 80);
        assert!(!ws.use_tls());

        let wss = TunnelEndpoint::parse("wss://relay.example.com/listen").unwrap();
        assert_eq!(wss.port(), 443);
        assert!(wss.use_tls());
    }

    #[test]
    fn test_explicit_port_and_query() {
        let endpoint = TunnelEndpoint::parse("wss://relay.example.com:8443/listen?room=ci").unwrap();
        assert_eq!(endpoint.host(), "relay.example.com");
        assert_eq!(endpoint.port(), 8443);
        assert_eq!(endpoint.relative_uri(), "/listen?room=ci");
        assert_eq!(
            endpoint.connect_url(),
            "wss://relay.example.com:8443/listen?room=ci"
        );
    }

    #[test]
    fn test_rejects_other_schemes() {
        assert!(matches!(
            TunnelEndpoint::parse("http://relay.example.com/listen"),
            Err(ConfigError::TunnelScheme(_))
        ));
        assert!(matches!(
            TunnelEndpoint::parse("not a url"),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_webhook_targets() {
        let target = WebhookTarget::parse("https://ci.example.com/hook").unwrap();
        assert_eq!(target.host(), "ci.example.com");
        assert_eq!(target.port(), 443);

        assert!(matches!(
            WebhookTarget::parse("ftp://ci.example.com/hook"),
            Err(ConfigError::TargetScheme(_))
        ));
        assert!(WebhookTarget::parse("/relative/hook").is_err());
    }
}
