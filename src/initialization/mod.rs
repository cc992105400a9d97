//! Process-level initialization.
//!
//! This module provides functions to initialize the shared resources a
//! program using this crate sets up once:
//! - Logger
//! - TLS crypto provider
//!
//! All initialization functions return proper error types for error handling.

mod logger;

use rustls::crypto::{ring::default_provider, CryptoProvider};

// Re-export public API
pub use logger::init_logger_with;

/// Initializes the crypto provider for TLS operations.
///
/// Configures the global crypto provider for `rustls`. Sessions fall back to
/// `ring` when no provider is installed, so calling this is optional, but it
/// pins every TLS user in the process to the same provider.
pub fn init_crypto_provider() {
    // The return value is ignored because reinstalling the provider is harmless
    let _ = CryptoProvider::install_default(default_provider());
}
