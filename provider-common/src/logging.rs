//! Logging configuration
//!
//! Provider binaries talk the plugin protocol on stdout, so every log line
//! goes to stderr, optionally mirrored as JSON into the file Terraform names
//! in `TF_LOG_PROVIDER_PATH`.

use std::io;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const TF_LOG: &str = "TF_LOG";
pub const TF_LOG_PROVIDER_PATH: &str = "TF_LOG_PROVIDER_PATH";

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: Option<PathBuf>,
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Settings from `TF_LOG` and `TF_LOG_PROVIDER_PATH`. `RUST_LOG`, when
    /// set, still wins over the level at [`init`](Self::init) time.
    pub fn from_env() -> Self {
        let tf_log = std::env::var(TF_LOG).ok();
        let (level, json_format) = match tf_log.as_deref() {
            Some(value) => parse_tf_log(value),
            None => ("info".to_string(), false),
        };

        Self {
            level,
            file_path: std::env::var_os(TF_LOG_PROVIDER_PATH)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            json_format,
        }
    }

    pub fn with_level(mut self, level: &str) -> Self {
        self.level = level.to_string();
        self
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json_format = json;
        self
    }

    /// Install the global subscriber. Keep the returned guard alive for as
    /// long as the file sink should keep flushing.
    pub fn init(&self) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error + Send + Sync>> {
        let env_filter =
            EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&self.level))?;

        let console_layer = if self.json_format {
            fmt::layer()
                .json()
                .with_target(true)
                .with_writer(io::stderr)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_ansi(false)
                .with_writer(io::stderr)
                .boxed()
        };

        let (file_layer, guard) = match &self.file_path {
            Some(path) => {
                let (directory, file_name) = split_log_path(path);
                let (writer, guard) = non_blocking(rolling::never(directory, file_name));
                let layer = fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_ansi(false)
                    .with_writer(writer);
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .try_init()?;

        tracing::debug!(level = %self.level, "Logging initialized");

        Ok(guard)
    }
}

/// Map a `TF_LOG` value onto a filter level. `JSON` means trace output in
/// JSON form; unknown values fall back to info.
fn parse_tf_log(value: &str) -> (String, bool) {
    match value.trim().to_ascii_lowercase().as_str() {
        "json" => ("trace".to_string(), true),
        level @ ("trace" | "debug" | "info" | "warn" | "error") => (level.to_string(), false),
        _ => ("info".to_string(), false),
    }
}

fn split_log_path(path: &Path) -> (PathBuf, String) {
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "terraform-provider.log".to_string());
    (directory, file_name)
}
