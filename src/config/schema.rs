use crate::error::{NexisError, Result};
use crate::http::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variables read on top of the config file
pub const ENV_DEBUG_MODE: &str = "DEBUG_MODE";
pub const ENV_HF_REPOS: &str = "HF_REPOS_TO_DOWNLOAD";
pub const ENV_HF_TOKEN: &str = "HUGGINGFACE_TOKEN";
pub const ENV_CIVITAI_TOKEN: &str = "CIVITAI_TOKEN";
pub const ENV_CIVITAI_CHECKPOINTS: &str = "CIVITAI_CHECKPOINTS_TO_DOWNLOAD";
pub const ENV_CIVITAI_LORAS: &str = "CIVITAI_LORAS_TO_DOWNLOAD";
pub const ENV_CIVITAI_VAES: &str = "CIVITAI_VAES_TO_DOWNLOAD";

/// Main configuration structure
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct Config {
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub staging: StagingConfig,
    #[serde(default)]
    pub huggingface: HuggingFaceConfig,
    #[serde(default)]
    pub civitai: CivitaiConfig,
    #[serde(default)]
    pub downloader: DownloaderConfig,
    #[serde(default)]
    pub checksum: ChecksumConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct StagingConfig {
    #[serde(default = "default_staging_root")]
    pub root: PathBuf,
}

#[derive(Deserialize, Serialize, Clone)]
pub struct HuggingFaceConfig {
    /// Comma-separated repository ids
    #[serde(default)]
    pub repos: String,
    pub token: Option<String>,
    #[serde(default = "default_hf_program")]
    pub program: String,
}

#[derive(Deserialize, Serialize, Clone)]
pub struct CivitaiConfig {
    pub token: Option<String>,
    #[serde(default)]
    pub checkpoints: String,
    #[serde(default)]
    pub loras: String,
    #[serde(default)]
    pub vaes: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_download_base")]
    pub download_base: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct DownloaderConfig {
    #[serde(default = "default_downloader_program")]
    pub program: String,
    #[serde(default = "default_connections")]
    pub connections: u32,
    #[serde(default = "default_connections")]
    pub segments: u32,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ChecksumConfig {
    #[serde(default = "default_checksum_program")]
    pub program: String,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct HttpConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_factor_ms")]
    pub backoff_factor_ms: u64,
    #[serde(default = "default_backoff_max_secs")]
    pub backoff_max_secs: u64,
}

// Default value functions
fn default_staging_root() -> PathBuf {
    PathBuf::from("/workspace/downloads_tmp")
}
fn default_hf_program() -> String {
    "huggingface-cli".to_string()
}
fn default_api_base() -> String {
    "https://civitai.com/api/v1".to_string()
}
fn default_download_base() -> String {
    "https://civitai.com/api/download".to_string()
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_downloader_program() -> String {
    "aria2c".to_string()
}
fn default_connections() -> u32 {
    8
}
fn default_checksum_program() -> String {
    "sha256sum".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_backoff_factor_ms() -> u64 {
    1000
}
fn default_backoff_max_secs() -> u64 {
    120
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            root: default_staging_root(),
        }
    }
}

impl Default for HuggingFaceConfig {
    fn default() -> Self {
        Self {
            repos: String::new(),
            token: None,
            program: default_hf_program(),
        }
    }
}

impl Default for CivitaiConfig {
    fn default() -> Self {
        Self {
            token: None,
            checkpoints: String::new(),
            loras: String::new(),
            vaes: String::new(),
            api_base: default_api_base(),
            download_base: default_download_base(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            program: default_downloader_program(),
            connections: default_connections(),
            segments: default_connections(),
        }
    }
}

impl Default for ChecksumConfig {
    fn default() -> Self {
        Self {
            program: default_checksum_program(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_factor_ms: default_backoff_factor_ms(),
            backoff_max_secs: default_backoff_max_secs(),
        }
    }
}

impl std::fmt::Debug for HuggingFaceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HuggingFaceConfig")
            .field("repos", &self.repos)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("program", &self.program)
            .finish()
    }
}

impl std::fmt::Debug for CivitaiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CivitaiConfig")
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("checkpoints", &self.checkpoints)
            .field("loras", &self.loras)
            .field("vaes", &self.vaes)
            .field("api_base", &self.api_base)
            .field("download_base", &self.download_base)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Config {
    /// Load config from an explicit file, the default location, or embedded
    /// defaults, then overlay the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            NexisError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;

        toml::from_str(&content)
            .map_err(|e| NexisError::Config(format!("Failed to parse {}: {e}", path.display())))
    }

    /// Overlay environment variables. Unset variables leave the current value
    /// alone; set-but-blank tokens clear the configured token.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_DEBUG_MODE) {
            self.debug = parse_bool(&value);
        }
        if let Some(value) = lookup(ENV_HF_REPOS) {
            self.huggingface.repos = value;
        }
        if let Some(value) = lookup(ENV_HF_TOKEN) {
            self.huggingface.token = non_blank(value);
        }
        if let Some(value) = lookup(ENV_CIVITAI_TOKEN) {
            self.civitai.token = non_blank(value);
        }
        if let Some(value) = lookup(ENV_CIVITAI_CHECKPOINTS) {
            self.civitai.checkpoints = value;
        }
        if let Some(value) = lookup(ENV_CIVITAI_LORAS) {
            self.civitai.loras = value;
        }
        if let Some(value) = lookup(ENV_CIVITAI_VAES) {
            self.civitai.vaes = value;
        }
    }

    /// Retry policy for metadata requests
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            total: self.http.max_retries,
            backoff_factor: Duration::from_millis(self.http.backoff_factor_ms),
            backoff_max: Duration::from_secs(self.http.backoff_max_secs),
            ..RetryPolicy::default()
        }
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.civitai.request_timeout_secs)
    }
}

/// `$XDG_CONFIG_HOME/nexis/config.toml`, if a config dir can be determined
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("nexis").join("config.toml"))
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
