//! Client configuration
//!
//! Resolved in this order (first found wins):
//! 1. Command-line arguments
//! 2. Config file given with `--config`
//!
//! The password is never stored in configuration. It is read from an
//! environment variable each time a session is created.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;

use crate::endpoint::{TunnelEndpoint, WebhookTarget};
use crate::error::ConfigError;

/// Default environment variable holding the shared secret
pub const DEFAULT_PASSWORD_ENV: &str = "PROXYHOOK_PASSWORD";

/// proxyhook - receive webhooks through a relay and replay them locally
#[derive(Parser, Debug, Default)]
#[command(name = "proxyhook")]
#[command(about = "Receive webhooks through a relay tunnel and POST them to local targets")]
pub struct Cli {
    /// Relay tunnel URL (ws:// or wss://)
    pub server: Option<String>,

    /// Webhook target URLs (http:// or https://)
    pub targets: Vec<String>,

    /// Optional TOML config file providing `server` and `targets`
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Environment variable to read the relay password from
    #[arg(long, default_value = DEFAULT_PASSWORD_ENV)]
    pub password_env: String,
}

/// Config file contents
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Relay tunnel URL
    pub server: Option<String>,

    /// Webhook target URLs
    pub targets: Vec<String>,
}

impl FileConfig {
    /// Load a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ConfigFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ConfigFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

/// Fully validated client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: TunnelEndpoint,
    pub targets: Vec<WebhookTarget>,
    pub password_env: String,
}

impl ClientConfig {
    /// Resolve configuration from CLI args, falling back to the config file
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => {
                let file = FileConfig::load(path)?;
                tracing::info!("Loaded config from {}", path.display());
                file
            }
            None => FileConfig::default(),
        };

        let server = cli.server.clone().or(file.server).ok_or(ConfigError::Usage)?;

        let targets = if cli.targets.is_empty() {
            file.targets
        } else {
            cli.targets.clone()
        };
        if targets.is_empty() {
            return Err(ConfigError::Usage);
        }

        let endpoint = TunnelEndpoint::parse(&server)?;
        let targets = targets
            .iter()
            .map(|raw| WebhookTarget::parse(raw))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            endpoint,
            targets,
            password_env: cli.password_env.clone(),
        })
    }
}

/// Read the shared secret; an unset variable means an empty password
pub fn read_password(var: &str) -> String {
    std::env::var(var).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("proxyhook").chain(args.iter().copied()))
    }

    #[test]
    fn test_resolve_from_args() {
        let config = ClientConfig::resolve(&cli(&[
            "wss://relay.example.com/listen",
            "http://127.0.0.1:8080/a",
            "http://127.0.0.1:8080/b",
        ]))
        .unwrap();

        assert_eq!(config.endpoint.host(), "relay.example.com");
        assert_eq!(config.targets.len(), 2);
        assert_eq!(config.password_env, DEFAULT_PASSWORD_ENV);
    }

    #[test]
    fn test_fewer_than_two_arguments_is_usage_error() {
        assert!(matches!(
            ClientConfig::resolve(&cli(&[])),
            Err(ConfigError::Usage)
        ));
        assert!(matches!(
            ClientConfig::resolve(&cli(&["wss://relay.example.com/listen"])),
            Err(ConfigError::Usage)
        ));
    }

    #[test]
    fn test_bad_scheme_is_rejected() {
        let result = ClientConfig::resolve(&cli(&[
            "https://relay.example.com/listen",
            "http://127.0.0.1:8080/a",
        ]));
        assert!(matches!(result, Err(ConfigError::TunnelScheme(_))));
    }

    #[test]
    fn test_file_fallback_and_cli_priority() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
server = "ws://relay.internal:9000/listen"
targets = ["http://127.0.0.1:1/from-file"]
"#
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let from_file = ClientConfig::resolve(&cli(&["--config", &path])).unwrap();
        assert_eq!(from_file.endpoint.port(), 9000);
        assert_eq!(from_file.targets[0].url().path(), "/from-file");

        let overridden = ClientConfig::resolve(&cli(&[
            "--config",
            &path,
            "wss://relay.example.com/listen",
            "http://127.0.0.1:2/from-cli",
        ]))
        .unwrap();
        assert_eq!(overridden.endpoint.host(), "relay.example.com");
        assert_eq!(overridden.targets.len(), 1);
        assert_eq!(overridden.targets[0].url().path(), "/from-cli");
    }

    #[test]
    fn test_missing_password_is_empty() {
        assert_eq!(read_password("PROXYHOOK_TEST_DEFINITELY_UNSET_9f3a"), "");

        std::env::set_var("PROXYHOOK_TEST_PASSWORD_SET", "s3cret");
        assert_eq!(read_password("PROXYHOOK_TEST_PASSWORD_SET"), "s3cret");
        std::env::remove_var("PROXYHOOK_TEST_PASSWORD_SET");
    }
}
