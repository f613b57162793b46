//! Configuration module for contact-backdrop
//!
//! Settings are read from an optional TOML file. Every key has a default
//! and out-of-range values are clamped instead of rejected, except for the
//! webhook endpoint which must be an http(s) URL.

pub mod settings;

pub use settings::{AppConfig, ConfigError, WebhookConfig};
