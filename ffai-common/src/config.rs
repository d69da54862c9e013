//! Bootstrap configuration and root folder resolution
//!
//! Two-tier configuration:
//! 1. **TOML bootstrap**: bind address, port, root folder, logging, provider
//!    keys, mail relay, PDF engine, pipeline tuning. Read once at startup.
//! 2. **Database runtime**: active provider, models, API keys, trigger secret
//!    (see the service crate's `config` module).
//!
//! A missing TOML file is not an error: a warning is logged and built-in
//! defaults are used.
//!
//! # Priority Order
//!
//! Config file: CLI `--config` → `FFAI_CONFIG` → `~/.config/ffai/config.toml`
//! Root folder: CLI `--root-folder` → `FFAI_ROOT_FOLDER` → TOML → OS default

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the config file location
pub const CONFIG_ENV_VAR: &str = "FFAI_CONFIG";

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV_VAR: &str = "FFAI_ROOT_FOLDER";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Data folder holding the database and generated PDFs
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Default: 5790
    #[serde(default = "default_port")]
    pub port: u16,

    /// Externally visible base URL used for PDF links and loopback triggers
    ///
    /// Defaults to `http://{bind_address}:{port}`
    #[serde(default)]
    pub public_url: Option<String>,

    #[serde(default = "default_site_name")]
    pub site_name: String,

    /// Fallback recipient when no other email recipient resolves
    #[serde(default = "default_admin_email")]
    pub admin_email: String,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub providers: ProviderKeysConfig,

    #[serde(default)]
    pub mail: MailConfig,

    #[serde(default)]
    pub pdf: PdfConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` overrides
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Provider API keys (lowest-priority source; database and ENV win)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderKeysConfig {
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub gemini_api_key: Option<String>,
    #[serde(default)]
    pub claude_api_key: Option<String>,
}

/// Mail transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// HTTP mail relay endpoint; mail is only logged when unset
    #[serde(default)]
    pub relay_url: Option<String>,

    #[serde(default = "default_from_address")]
    pub from_address: String,
}

/// PDF rendering engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PdfConfig {
    /// HTML-to-PDF render service endpoint; PDF generation fails when unset
    #[serde(default)]
    pub engine_url: Option<String>,
}

/// How a stored snapshot is handed to the deferred processing side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// In-process channel drained by a worker pool
    Channel,
    /// Self-addressed HTTP POST to the deferred-trigger endpoint
    Loopback,
}

/// Pipeline tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_dispatch_mode")]
    pub dispatch_mode: DispatchMode,

    /// Trigger workers draining the channel
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Snapshot lifetime in the hand-off store
    #[serde(default = "default_snapshot_ttl_secs")]
    pub snapshot_ttl_secs: u64,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Loopback request timeout; the caller never waits for the response
    #[serde(default = "default_loopback_timeout_ms")]
    pub loopback_timeout_ms: u64,

    /// Delay the deferred side waits before processing (seconds)
    #[serde(default = "default_trigger_delay_secs")]
    pub trigger_delay_secs: u64,

    /// Background job workers; 0 disables the job queue
    #[serde(default = "default_job_workers")]
    pub job_workers: usize,

    #[serde(default = "default_job_queue_capacity")]
    pub job_queue_capacity: usize,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5790
}

fn default_site_name() -> String {
    "FFAI".to_string()
}

fn default_admin_email() -> String {
    "admin@localhost.localdomain".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_from_address() -> String {
    "noreply@localhost.localdomain".to_string()
}

fn default_dispatch_mode() -> DispatchMode {
    DispatchMode::Channel
}

fn default_worker_count() -> usize {
    2
}

fn default_channel_capacity() -> usize {
    256
}

fn default_snapshot_ttl_secs() -> u64 {
    300
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_loopback_timeout_ms() -> u64 {
    50
}

fn default_trigger_delay_secs() -> u64 {
    1
}

fn default_job_workers() -> usize {
    1
}

fn default_job_queue_capacity() -> usize {
    1024
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            bind_address: default_bind_address(),
            port: default_port(),
            public_url: None,
            site_name: default_site_name(),
            admin_email: default_admin_email(),
            logging: LoggingConfig::default(),
            providers: ProviderKeysConfig::default(),
            mail: MailConfig::default(),
            pdf: PdfConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            relay_url: None,
            from_address: default_from_address(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dispatch_mode: default_dispatch_mode(),
            worker_count: default_worker_count(),
            channel_capacity: default_channel_capacity(),
            snapshot_ttl_secs: default_snapshot_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            loopback_timeout_ms: default_loopback_timeout_ms(),
            trigger_delay_secs: default_trigger_delay_secs(),
            job_workers: default_job_workers(),
            job_queue_capacity: default_job_queue_capacity(),
        }
    }
}

impl TomlConfig {
    /// Base URL without trailing slash
    pub fn public_base_url(&self) -> String {
        match &self.public_url {
            Some(url) if !url.trim().is_empty() => url.trim_end_matches('/').to_string(),
            _ => format!("http://{}:{}", self.bind_address, self.port),
        }
    }
}

/// Parse TOML text into a config
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Load config from `path`, falling back to defaults when the file is absent
pub fn load_toml_config(path: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = path else {
        warn!("No configuration file found, using built-in defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        warn!("Configuration file {} not found, using built-in defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config = parse_toml_config(&content)?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Resolve the config file location
///
/// Returns None when no candidate exists.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir()
        .map(|d| d.join("ffai").join("config.toml"))
        .filter(|p| p.exists())
}

/// Resolve the root folder
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("ffai"))
        .unwrap_or_else(|| PathBuf::from("./ffai_data"))
}

/// Files and folders under the root folder
#[derive(Debug, Clone)]
pub struct RootLayout {
    pub root: PathBuf,
    pub database_path: PathBuf,
    pub pdf_dir: PathBuf,
}

impl RootLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            database_path: root.join("ffai.db"),
            pdf_dir: root.join("pdfs"),
            root,
        }
    }

    /// Create the root and PDF folders if missing
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(&self.pdf_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = parse_toml_config("").unwrap();
        assert_eq!(config.port, 5790);
        assert_eq!(config.pipeline.snapshot_ttl_secs, 300);
        assert_eq!(config.pipeline.dispatch_mode, DispatchMode::Channel);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_nested_sections_parse() {
        let config = parse_toml_config(
            r#"
            port = 8080
            site_name = "Acme"
            admin_email = "ops@acme.test"

            [providers]
            openai_api_key = "sk-test"

            [pipeline]
            dispatch_mode = "loopback"
            worker_count = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.site_name, "Acme");
        assert_eq!(config.providers.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.pipeline.dispatch_mode, DispatchMode::Loopback);
        assert_eq!(config.pipeline.worker_count, 4);
        assert_eq!(config.pipeline.channel_capacity, 256);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        assert!(matches!(parse_toml_config("port = \"x\""), Err(Error::Config(_))));
    }

    #[test]
    fn test_public_base_url() {
        let mut config = TomlConfig::default();
        assert_eq!(config.public_base_url(), "http://127.0.0.1:5790");

        config.public_url = Some("https://forms.example.com/".to_string());
        assert_eq!(config.public_base_url(), "https://forms.example.com");
    }

    #[test]
    fn test_root_layout_paths() {
        let layout = RootLayout::new("/data/ffai");
        assert_eq!(layout.database_path, PathBuf::from("/data/ffai/ffai.db"));
        assert_eq!(layout.pdf_dir, PathBuf::from("/data/ffai/pdfs"));
    }
}
