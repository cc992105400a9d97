//! Application configuration and constants.
//!
//! This module provides:
//! - Configuration constants (timeouts, retry defaults, etc.)
//! - The transport session configuration surface
//! - CLI option types and parsing

mod constants;
mod types;

// Re-export all constants
pub use constants::*;
pub use types::{CachePolicy, CookiePolicy, LogFormat, LogLevel, Opt, SessionConfig};
