use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub messaging: MessagingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub grpc_port: u16,
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            grpc_port: 50051,
            http_port: 8765,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Flat directory holding one file per stored object
    pub upload_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: "uploads".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    /// Per-connection outbound channel capacity
    pub outbound_buffer: usize,
    /// Upper bound on a single delivery attempt during fan-out
    pub send_timeout_seconds: u64,
    /// Maximum accepted WebSocket frame size
    pub max_frame_bytes: usize,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            outbound_buffer: 256,
            send_timeout_seconds: 5,
            max_frame_bytes: 64 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        // Load config file if provided
        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // Override with environment variables; `__` separates nesting levels
        // (CLIPSTREAM_SERVER__GRPC_PORT -> server.grpc_port)
        builder = builder.add_source(
            Environment::default()
                .prefix("CLIPSTREAM")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from environment variables only (for Docker/K8s)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// Get gRPC address
    #[must_use]
    pub fn grpc_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.grpc_port)
    }

    /// Get HTTP address
    #[must_use]
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.http_port)
    }

    /// Check the loaded configuration for values that cannot work, collecting
    /// every problem instead of stopping at the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server.grpc_port == 0 {
            errors.push("server.grpc_port must be non-zero".to_string());
        }
        if self.server.http_port == 0 {
            errors.push("server.http_port must be non-zero".to_string());
        }
        if self.server.grpc_port == self.server.http_port {
            errors.push("server.grpc_port and server.http_port must differ".to_string());
        }
        if self.storage.upload_dir.is_empty() {
            errors.push("storage.upload_dir must not be empty".to_string());
        }
        if self.messaging.outbound_buffer == 0 {
            errors.push("messaging.outbound_buffer must be non-zero".to_string());
        }
        if self.messaging.send_timeout_seconds == 0 {
            errors.push("messaging.send_timeout_seconds must be non-zero".to_string());
        }
        if self.messaging.max_frame_bytes == 0 {
            errors.push("messaging.max_frame_bytes must be non-zero".to_string());
        }
        match self.logging.format.as_str() {
            "json" | "pretty" => {}
            other => {
                errors.push(format!(
                    "logging.format must be \"json\" or \"pretty\", got \"{other}\""
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
