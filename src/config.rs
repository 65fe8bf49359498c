//! # Configuration Management
//!
//! Centralized configuration for the interception core.
//!
//! This module provides structured configuration for the server, the wire
//! protocol, the rewriting handlers, and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment-specific overrides via `from_env()`

use crate::core::codec::DEFAULT_MAX_FRAME_LEN;
use crate::error::{ProtocolError, Result};
use crate::utils::compression::CompressionKind;
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Sections in a standard world column (Y -64..320)
pub const DEFAULT_SECTION_COUNT: i32 = 24;

/// World floor section index
pub const DEFAULT_MIN_SECTION: i32 = -4;

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct NetworkConfig {
    /// Server-specific configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Wire protocol configuration
    #[serde(default)]
    pub protocol: ProtocolConfig,

    /// Rewriting handler configuration
    #[serde(default)]
    pub interception: InterceptionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NetworkConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("PACKETBAG_SERVER_ADDRESS") {
            config.server.address = addr;
        }

        if let Ok(sessions) = std::env::var("PACKETBAG_MAX_SESSIONS") {
            if let Ok(val) = sessions.parse::<usize>() {
                config.server.max_sessions = val;
            }
        }

        if let Ok(timeout) = std::env::var("PACKETBAG_IDLE_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.server.idle_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(interval) = std::env::var("PACKETBAG_KEEPALIVE_INTERVAL_MS") {
            if let Ok(val) = interval.parse::<u64>() {
                config.server.keepalive_interval = Duration::from_millis(val);
            }
        }

        if let Ok(radius) = std::env::var("PACKETBAG_BORDER_RADIUS") {
            if let Ok(val) = radius.parse::<i32>() {
                config.interception.border.radius = val;
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        errors.extend(self.server.validate());
        errors.extend(self.protocol.validate());
        errors.extend(self.interception.validate());
        errors.extend(self.logging.validate());

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Server-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Server listen address (e.g., "127.0.0.1:25565")
    pub address: String,

    /// Maximum number of concurrent sessions
    pub max_sessions: usize,

    /// Maximum number of queued outbound packets per session
    pub backpressure_limit: usize,

    /// Timeout for the initial handshake/login exchange
    #[serde(with = "duration_serde")]
    pub connection_timeout: Duration,

    /// Interval for sending keep-alive probes
    #[serde(with = "duration_serde")]
    pub keepalive_interval: Duration,

    /// How long a session may stay silent before it is dropped
    #[serde(with = "duration_serde")]
    pub idle_timeout: Duration,

    /// Timeout for graceful server shutdown
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,

    /// Interval for re-darkening every loaded chunk
    #[serde(with = "duration_serde")]
    pub relight_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: String::from("127.0.0.1:25565"),
            max_sessions: 1000,
            backpressure_limit: 256,
            connection_timeout: timeout::DEFAULT_TIMEOUT,
            keepalive_interval: timeout::KEEPALIVE_INTERVAL,
            idle_timeout: timeout::IDLE_TIMEOUT,
            shutdown_timeout: timeout::SHUTDOWN_TIMEOUT,
            relight_interval: Duration::from_secs(10),
        }
    }
}

impl ServerConfig {
    /// Validate server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Server address cannot be empty".to_string());
        } else if self.address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid server address format: '{}' (expected format: '0.0.0.0:25565')",
                self.address
            ));
        }

        if self.max_sessions == 0 {
            errors.push("Max sessions must be greater than 0".to_string());
        } else if self.max_sessions > 100_000 {
            errors.push(format!(
                "Max sessions very high: {} (ensure system resources can support this)",
                self.max_sessions
            ));
        }

        if self.backpressure_limit == 0 {
            errors.push("Backpressure limit must be greater than 0".to_string());
        } else if self.backpressure_limit > 1_000_000 {
            errors.push(format!(
                "Backpressure limit too large: {} (max recommended: 1,000,000)",
                self.backpressure_limit
            ));
        }

        if self.connection_timeout.as_millis() < 100 {
            errors.push("Connection timeout too short (minimum: 100ms)".to_string());
        } else if self.connection_timeout.as_secs() > 300 {
            errors.push("Connection timeout too long (maximum: 300s)".to_string());
        }

        if self.keepalive_interval.as_millis() < 100 {
            errors.push("Keep-alive interval too short (minimum: 100ms)".to_string());
        } else if self.keepalive_interval.as_secs() > 3600 {
            errors.push("Keep-alive interval too long (maximum: 1 hour)".to_string());
        }

        if self.idle_timeout < self.keepalive_interval {
            errors.push("Idle timeout must be at least the keep-alive interval".to_string());
        }

        if self.shutdown_timeout.as_secs() < 1 {
            errors.push("Shutdown timeout too short (minimum: 1s)".to_string());
        } else if self.shutdown_timeout.as_secs() > 60 {
            errors.push("Shutdown timeout too long (maximum: 60s)".to_string());
        }

        if self.relight_interval.as_millis() < 100 {
            errors.push("Relight interval too short (minimum: 100ms)".to_string());
        }

        errors
    }
}

/// Wire protocol configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProtocolConfig {
    /// Maximum allowed frame length in bytes
    pub max_frame_len: usize,

    /// Whether frame bodies are compressed past the threshold
    pub compression_enabled: bool,

    /// Compression algorithm for oversized bodies
    pub compression_kind: CompressionKind,

    /// Minimum body size (bytes) before compression is applied
    pub compression_threshold_bytes: usize,

    /// Server cap on client-requested view distance, in chunks
    pub max_view_distance: u8,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            compression_enabled: false,
            compression_kind: CompressionKind::Lz4,
            compression_threshold_bytes: 256,
            max_view_distance: 16,
        }
    }
}

impl ProtocolConfig {
    /// Validate protocol configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_frame_len < 1024 {
            errors.push("Max frame length too small (minimum: 1 KB)".to_string());
        } else if self.max_frame_len > 100 * 1024 * 1024 {
            errors.push(format!(
                "Max frame length too large: {} bytes (maximum recommended: 100 MB)",
                self.max_frame_len
            ));
        }

        if self.compression_enabled && self.compression_threshold_bytes > self.max_frame_len {
            errors.push("Compression threshold cannot be larger than max frame length".to_string());
        }

        if self.max_view_distance == 0 {
            errors.push("Max view distance must be greater than 0".to_string());
        } else if self.max_view_distance > 32 {
            errors.push(format!(
                "Max view distance too large: {} (maximum: 32)",
                self.max_view_distance
            ));
        }

        errors
    }
}

/// Rewriting handler configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InterceptionConfig {
    /// Zero sky-light sections in chunk and light packets
    pub erase_sky_light: bool,

    /// Follow block changes with darkness updates
    pub dark_light_follow: bool,

    /// World floor section index
    pub min_section: i32,

    /// Number of sections in a world column
    pub section_count: i32,

    /// Border ring settings
    #[serde(default)]
    pub border: BorderConfig,
}

impl Default for InterceptionConfig {
    fn default() -> Self {
        Self {
            erase_sky_light: true,
            dark_light_follow: true,
            min_section: DEFAULT_MIN_SECTION,
            section_count: DEFAULT_SECTION_COUNT,
            border: BorderConfig::default(),
        }
    }
}

impl InterceptionConfig {
    /// World floor in block coordinates
    pub fn min_y(&self) -> i32 {
        self.min_section << 4
    }

    /// One past the world ceiling in block coordinates
    pub fn max_y(&self) -> i32 {
        (self.min_section + self.section_count) << 4
    }

    /// Validate interception configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.section_count <= 0 {
            errors.push("Section count must be greater than 0".to_string());
        } else if self.section_count > 64 {
            errors.push(format!(
                "Section count too large: {} (maximum: 64)",
                self.section_count
            ));
        }

        errors.extend(self.border.validate(self.min_y(), self.max_y()));

        errors
    }
}

/// Border ring configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BorderConfig {
    /// Whether the border handler is registered at all
    pub enabled: bool,

    /// Ring radius in blocks around the anchor point
    pub radius: i32,

    /// Block state id shown for border columns
    pub block_state: i32,

    /// Bottom of the ring in block coordinates
    pub y_min: i32,

    /// Top of the ring in block coordinates (inclusive)
    pub y_max: i32,
}

impl Default for BorderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            radius: 64,
            // Red stained glass in the reference mapping
            block_state: 4095,
            y_min: 0,
            y_max: 128,
        }
    }
}

impl BorderConfig {
    /// Validate border configuration against the world's Y bounds
    pub fn validate(&self, world_min_y: i32, world_max_y: i32) -> Vec<String> {
        let mut errors = Vec::new();

        if !self.enabled {
            return errors;
        }

        if self.radius <= 0 {
            errors.push("Border radius must be greater than 0".to_string());
        } else if self.radius > 1024 {
            errors.push(format!(
                "Border radius too large: {} (maximum: 1024)",
                self.radius
            ));
        }

        if self.block_state < 0 {
            errors.push("Border block state cannot be negative".to_string());
        }

        if self.y_min > self.y_max {
            errors.push("Border y_min cannot exceed y_max".to_string());
        }

        if self.y_min < world_min_y || self.y_max >= world_max_y {
            errors.push(format!(
                "Border Y range [{}, {}] outside world bounds [{}, {})",
                self.y_min, self.y_max, world_min_y, world_max_y
            ));
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("packetbag"),
            log_level: Level::INFO,
            log_to_console: true,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
