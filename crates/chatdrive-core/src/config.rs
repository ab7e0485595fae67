//! Configuration module for chatdrive.
//!
//! Provides typed configuration structs that map to the YAML configuration
//! file, with loading, validation, defaults, and a builder pattern for
//! programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level configuration for chatdrive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    pub encryption: EncryptionConfig,
    pub persistence: PersistenceConfig,
    pub relay: RelayConfig,
}

/// Chunk store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Remote container (channel) that holds chunk objects.
    pub container: String,
    /// Ceiling on the raw bytes of one chunk. Must leave 16 bytes of
    /// headroom below the backend's hard attachment limit when encryption
    /// is enabled.
    pub max_raw_chunk_size: usize,
    /// Optional hard ceiling on one file's plaintext size, in bytes.
    pub capacity_ceiling: Option<u64>,
    /// Seconds between deletion queue ticks (one remote delete per tick).
    pub deletion_tick_secs: u64,
}

/// Chunk encryption settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncryptionConfig {
    /// Seal chunk payloads with AES-256-GCM.
    pub enabled: bool,
    /// Passphrase the store key is derived from. Required when enabled.
    pub passphrase: Option<String>,
}

/// Metadata persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Quiet period after the last mutation before a save, in milliseconds.
    pub debounce_ms: u64,
    /// Local fallback path for the metadata document when the remote save
    /// fails.
    pub local_snapshot: PathBuf,
}

/// Relay (remote backend HTTP adapter) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Base URL of the backend REST API.
    pub base_url: String,
    /// Bot/bearer token. `None` until provisioned.
    pub token: Option<String>,
    /// Sustained request rate the client throttles itself to.
    pub requests_per_second: f64,
    /// Burst allowance on top of the sustained rate.
    pub burst: u32,
}

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/chatdrive/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("chatdrive")
            .join("config.yaml")
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            container: "drive".to_string(),
            // 8 MB chunks; the reference backend caps attachments at 8 MiB,
            // which leaves headroom for the 16-byte seal overhead.
            max_raw_chunk_size: 8_000_000,
            capacity_ceiling: None,
            deletion_tick_secs: 1,
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("chatdrive");
        Self {
            debounce_ms: 1500,
            local_snapshot: data_dir.join("metadata.json"),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://relay.chatdrive.dev/api".to_string(),
            token: None,
            requests_per_second: 4.0,
            burst: 8,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"store.max_raw_chunk_size"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- store ---
        if self.store.container.is_empty() {
            errors.push(ValidationError {
                field: "store.container".into(),
                message: "must not be empty".into(),
            });
        }
        if self.store.max_raw_chunk_size == 0 {
            errors.push(ValidationError {
                field: "store.max_raw_chunk_size".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.store.deletion_tick_secs == 0 {
            errors.push(ValidationError {
                field: "store.deletion_tick_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if let Some(ceiling) = self.store.capacity_ceiling {
            if ceiling == 0 {
                errors.push(ValidationError {
                    field: "store.capacity_ceiling".into(),
                    message: "must be greater than 0 when set".into(),
                });
            }
        }

        // --- encryption ---
        if self.encryption.enabled
            && self
                .encryption
                .passphrase
                .as_deref()
                .unwrap_or("")
                .is_empty()
        {
            errors.push(ValidationError {
                field: "encryption.passphrase".into(),
                message: "required when encryption is enabled".into(),
            });
        }

        // --- persistence ---
        if self.persistence.debounce_ms == 0 {
            errors.push(ValidationError {
                field: "persistence.debounce_ms".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- relay ---
        if self.relay.base_url.is_empty() {
            errors.push(ValidationError {
                field: "relay.base_url".into(),
                message: "must not be empty".into(),
            });
        }
        if self.relay.requests_per_second <= 0.0 {
            errors.push(ValidationError {
                field: "relay.requests_per_second".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.relay.burst == 0 {
            errors.push(ValidationError {
                field: "relay.burst".into(),
                message: "must be greater than 0".into(),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- store ---

    pub fn store_container(mut self, container: impl Into<String>) -> Self {
        self.config.store.container = container.into();
        self
    }

    pub fn store_max_raw_chunk_size(mut self, bytes: usize) -> Self {
        self.config.store.max_raw_chunk_size = bytes;
        self
    }

    pub fn store_capacity_ceiling(mut self, bytes: u64) -> Self {
        self.config.store.capacity_ceiling = Some(bytes);
        self
    }

    pub fn store_deletion_tick_secs(mut self, seconds: u64) -> Self {
        self.config.store.deletion_tick_secs = seconds;
        self
    }

    // --- encryption ---

    pub fn encryption_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.config.encryption.enabled = true;
        self.config.encryption.passphrase = Some(passphrase.into());
        self
    }

    // --- persistence ---

    pub fn persistence_debounce_ms(mut self, millis: u64) -> Self {
        self.config.persistence.debounce_ms = millis;
        self
    }

    pub fn persistence_local_snapshot(mut self, path: PathBuf) -> Self {
        self.config.persistence.local_snapshot = path;
        self
    }

    // --- relay ---

    pub fn relay_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.relay.base_url = url.into();
        self
    }

    pub fn relay_token(mut self, token: impl Into<String>) -> Self {
        self.config.relay.token = Some(token.into());
        self
    }

    pub fn relay_requests_per_second(mut self, rate: f64) -> Self {
        self.config.relay.requests_per_second = rate;
        self
    }

    pub fn relay_burst(mut self, burst: u32) -> Self {
        self.config.relay.burst = burst;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
