//! Configuration management for the twodiff server

use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::diff::DiffConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub diff: DiffConfig,
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Upload-side knobs: where result files land and how long a request may
/// wait on its partner or on the engine.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub output_dir: PathBuf,
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            diff: DiffConfig::default(),
            upload: UploadConfig {
                output_dir: PathBuf::from("static/output"),
                timeout: Duration::from_secs(600),
            },
        }
    }
}

impl Config {
    /// Load from `TWODIFF_*` environment variables, falling back to the
    /// defaults per field.
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Config {
            server: ServerConfig {
                host: env::var("TWODIFF_HOST").unwrap_or(defaults.server.host),
                port: parsed("TWODIFF_PORT", defaults.server.port),
            },
            diff: DiffConfig {
                buffer_size: parsed("TWODIFF_BUFF_SIZE", defaults.diff.buffer_size),
                lookup_distance: parsed("TWODIFF_LOOKUP_DISTANCE", defaults.diff.lookup_distance),
                similarity_threshold: parsed(
                    "TWODIFF_SIMILAR_THRESHOLD",
                    defaults.diff.similarity_threshold,
                ),
                output_separator: env::var("TWODIFF_OUTPUT_SEPARATOR")
                    .unwrap_or(defaults.diff.output_separator),
            },
            upload: UploadConfig {
                output_dir: env::var("TWODIFF_OUTPUT_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.upload.output_dir),
                timeout: Duration::from_secs(parsed("TWODIFF_UPLOAD_TIMEOUT", 600)),
            },
        }
    }
}

/// Parse an env var, falling back to `default` when unset or malformed.
fn parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
