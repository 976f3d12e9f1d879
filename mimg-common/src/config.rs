//! Configuration loading and config file resolution
//!
//! Configuration is read from a TOML file resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`MIMG_CONFIG`)
//! 3. `~/.config/mimg/config.toml`
//! 4. `/etc/mimg/config.toml` (Linux only)
//! 5. Compiled defaults (no file)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV_VAR: &str = "MIMG_CONFIG";

/// Service configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Listen host
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// SQLite database path; defaults to the platform data directory
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Operator-issued bypass bearer tokens (use sparingly)
    #[serde(default)]
    pub override_keys: Vec<String>,

    /// Third-party provider credentials
    #[serde(default)]
    pub providers: Providers,
}

/// Per-provider client-credential configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Providers {
    pub spotify: Option<ProviderCredentials>,
    pub soundcloud: Option<ProviderCredentials>,
}

/// Client id/secret pair for a provider's token endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderCredentials {
    pub client_id: String,
    pub client_secret: String,
    /// Token endpoint override (tests, mock servers); defaults per provider
    #[serde(default)]
    pub token_url: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5730
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_path: None,
            override_keys: Vec::new(),
            providers: Providers::default(),
        }
    }
}

impl Config {
    /// Load configuration, resolving the file path in priority order.
    ///
    /// A missing file is not an error (defaults apply); an unreadable or
    /// malformed file is.
    pub fn load(cli_arg: Option<&Path>) -> Result<Self> {
        match resolve_config_path(cli_arg) {
            Some(path) => Self::load_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific TOML file
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("cannot parse {}: {}", path.display(), e)))
    }

    /// Effective database path, falling back to the platform data directory
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(default_database_path)
    }
}

/// Resolve the config file path; `None` means "use compiled defaults"
fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(path));
    }

    // Priority 3: User config directory
    if let Some(path) = dirs::config_dir().map(|d| d.join("mimg").join("config.toml")) {
        if path.exists() {
            return Some(path);
        }
    }

    // Priority 4: System config (Linux)
    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/mimg/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS-dependent default database location
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("mimg"))
        .unwrap_or_else(|| PathBuf::from("./mimg_data"))
        .join("mimg.db")
}
