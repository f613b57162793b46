use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::domain::core::{MAX_SURFACE_EDGE, Viewport};

/// Local n8n-style webhook used when no endpoint is configured
pub const DEFAULT_ENDPOINT: &str = "http://localhost:5678/webhook/contact-form";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Webhook endpoint {endpoint} is not usable: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
}

/// Where and how contact submissions are delivered
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WebhookConfig {
    pub endpoint: Url,
    pub timeout_secs: u64,
}

impl WebhookConfig {
    pub const MIN_TIMEOUT_SECS: u64 = 1;
    pub const MAX_TIMEOUT_SECS: u64 = 120;
    pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn sanitize(&mut self) -> Result<(), ConfigError> {
        self.timeout_secs = self
            .timeout_secs
            .clamp(Self::MIN_TIMEOUT_SECS, Self::MAX_TIMEOUT_SECS);

        match self.endpoint.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ConfigError::InvalidEndpoint {
                    endpoint: self.endpoint.to_string(),
                    reason: format!("unsupported scheme '{other}'"),
                });
            }
        }
        if self.endpoint.host_str().is_none() {
            return Err(ConfigError::InvalidEndpoint {
                endpoint: self.endpoint.to_string(),
                reason: "missing host".into(),
            });
        }
        Ok(())
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: Self::DEFAULT_TIMEOUT_SECS,
        }
    }
}

fn default_endpoint() -> Url {
    // The constant is a valid absolute URL; parse cannot fail.
    Url::parse(DEFAULT_ENDPOINT).unwrap_or_else(|_| unreachable!("invalid DEFAULT_ENDPOINT"))
}

/// Background rendering settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SceneConfig {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub antialias: bool,
}

impl SceneConfig {
    pub const MIN_FRAME_RATE: u32 = 1;
    pub const MAX_FRAME_RATE: u32 = 240;

    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.width, self.height)
    }

    /// Time between two animation frames
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate.max(Self::MIN_FRAME_RATE) as f64)
    }

    fn sanitize(&mut self) {
        self.width = self.width.clamp(1, MAX_SURFACE_EDGE);
        self.height = self.height.clamp(1, MAX_SURFACE_EDGE);
        self.frame_rate = self
            .frame_rate
            .clamp(Self::MIN_FRAME_RATE, Self::MAX_FRAME_RATE);
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            frame_rate: 60,
            antialias: true,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub webhook: WebhookConfig,
    pub scene: SceneConfig,
}

impl AppConfig {
    /// Parses TOML text, filling missing keys with defaults
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let mut config: AppConfig = toml::from_str(text)?;
        config.sanitize()?;
        Ok(config)
    }

    /// Reads a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Loaded configuration from {}", path.display());
        Self::from_toml_str(&text)
    }

    /// Reads `path` when given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    fn sanitize(&mut self) -> Result<(), ConfigError> {
        self.scene.sanitize();
        self.webhook.sanitize()
    }
}
