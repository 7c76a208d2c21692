//! proxyhook client library
//!
//! Keeps a websocket tunnel open to a relay server and replays every webhook
//! the relay forwards as a POST to each configured local target.

pub mod config;
pub mod endpoint;
pub mod error;
pub mod forwarder;
pub mod keepalive;
pub mod policy;
pub mod resolve;
pub mod router;
pub mod session;
pub mod supervisor;

pub use config::{Cli, ClientConfig, DEFAULT_PASSWORD_ENV};
pub use endpoint::{TunnelEndpoint, TunnelScheme, WebhookTarget};
pub use error::{ConfigError, FatalError, TransportError};
pub use forwarder::WebhookForwarder;
pub use policy::HeaderPolicy;
pub use session::{SessionOptions, SessionState, TerminalReason, Termination, TunnelSession};
pub use supervisor::{ConnectionSupervisor, ReconnectPolicy};
