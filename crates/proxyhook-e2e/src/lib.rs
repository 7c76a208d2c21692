//! End-to-end test utilities for the proxyhook client
//!
//! Provides an in-process relay that speaks the tunnel protocol, a recording
//! HTTP service to stand in for webhook targets, and a handle that runs the
//! real client against both.

pub mod harness;
pub mod mock_relay;
pub mod mock_service;

pub use harness::ClientHandle;
pub use mock_relay::{MockRelay, RelayConnection};
pub use mock_service::{MockHttpService, RecordedRequest};

/// Initialize tracing and crypto provider for tests
pub fn init_test() {
    let _ = rustls::crypto::ring::default_provider().install_default();

    let _ = tracing_subscriber::fmt()
        .with_env_filter("proxyhook=debug,proxyhook_e2e=debug")
        .with_test_writer()
        .try_init();
}
