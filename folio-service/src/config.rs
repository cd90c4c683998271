//! Service configuration.
//!
//! Settings are read once at startup from an optional `config` file in the
//! working directory and `FOLIO__*` environment variables. Every field has a
//! default so an empty environment yields a runnable service.

mod loader;

pub use loader::load_config;

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Complete service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_server")]
    pub server: ServerConfig,

    #[serde(default = "default_storage")]
    pub storage: StorageConfig,

    #[serde(default = "default_auth")]
    pub auth: AuthConfig,

    #[serde(default = "default_limits")]
    pub limits: LimitsConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the SQLite database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory holding uploaded and generated PDF binaries, served under `/uploads`
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
}

/// Bearer token configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for signing tokens. When unset a random secret is
    /// generated at startup and tokens do not survive a restart.
    #[serde(default)]
    pub jwt_secret: Option<String>,

    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: u64,
}

impl AuthConfig {
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_hours * 60 * 60)
    }
}

/// Upload limits
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,

    #[serde(default = "default_max_files_per_upload")]
    pub max_files_per_upload: usize,
}

impl LimitsConfig {
    /// Request body limit for the upload route: every allowed file at full
    /// size plus headroom for multipart framing.
    pub fn max_upload_body_bytes(&self) -> usize {
        let files = self.max_file_size_bytes as usize * self.max_files_per_upload;
        files + 64 * 1024
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            storage: default_storage(),
            auth: default_auth(),
            limits: default_limits(),
        }
    }
}

// ==================== Default Value Functions ====================

fn default_server() -> ServerConfig {
    ServerConfig {
        host: default_host(),
        port: default_port(),
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_storage() -> StorageConfig {
    StorageConfig {
        data_dir: default_data_dir(),
        upload_dir: default_upload_dir(),
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./uploads")
}

fn default_auth() -> AuthConfig {
    AuthConfig {
        jwt_secret: None,
        token_ttl_hours: default_token_ttl_hours(),
    }
}

fn default_token_ttl_hours() -> u64 {
    24 * 7
}

fn default_limits() -> LimitsConfig {
    LimitsConfig {
        max_file_size_bytes: default_max_file_size(),
        max_files_per_upload: default_max_files_per_upload(),
    }
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

fn default_max_files_per_upload() -> usize {
    10
}
