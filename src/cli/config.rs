//! Configuration file handling for the acl-rules CLI
//!
//! Settings are read from ~/.tsuru/acl.toml, and the tsuru client's own
//! ~/.tsuru/target and ~/.tsuru/token files are used as a last resort so an
//! existing tsuru login works without extra setup.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Default request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default create/delete retry window in seconds
pub const DEFAULT_RETRY_WINDOW_SECS: u64 = 20 * 60;

/// CLI configuration stored in ~/.tsuru/acl.toml
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    /// tsuru API address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// tsuru token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Request timeout in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Create retry window in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_timeout: Option<u64>,

    /// Delete retry window in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_timeout: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_cert_verification: Option<bool>,
}

/// Directory holding the tsuru client files (~/.tsuru)
pub fn tsuru_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .context("Unable to determine home directory")?;

    Ok(PathBuf::from(home).join(".tsuru"))
}

impl CliConfig {
    /// Get the default configuration file path (~/.tsuru/acl.toml)
    pub fn config_path() -> Result<PathBuf> {
        Ok(tsuru_dir()?.join("acl.toml"))
    }

    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_path()?)
    }

    /// Load configuration from a specific path. A missing file is an empty configuration.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

/// Read a single-value file written by the tsuru client, if present and non-empty
fn read_value_file(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }

    let value = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?
        .trim()
        .to_string();

    Ok((!value.is_empty()).then_some(value))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Resolve the tsuru host
///
/// Checks sources in the following priority order:
/// 1. --host flag or TSURU_TARGET
/// 2. ~/.tsuru/acl.toml
/// 3. ~/.tsuru/target
pub fn resolve_host(
    host_flag: Option<String>,
    config: &CliConfig,
    tsuru_dir: Option<&Path>,
) -> Result<String> {
    if let Some(host) = non_empty(host_flag) {
        debug!("Using host from --host flag or TSURU_TARGET: {}", host);
        return Ok(host);
    }

    if let Some(host) = non_empty(config.host.clone()) {
        debug!("Using host from config file: {}", host);
        return Ok(host);
    }

    if let Some(dir) = tsuru_dir {
        if let Some(host) = read_value_file(&dir.join("target"))? {
            debug!("Using host from tsuru target file: {}", host);
            return Ok(host);
        }
    }

    anyhow::bail!(
        "No tsuru host found. Please provide one via:\n\
         - --host flag\n\
         - TSURU_TARGET environment variable\n\
         - ~/.tsuru/acl.toml\n\
         - tsuru target-set"
    )
}

/// Resolve the authentication token
///
/// Checks sources in the following priority order:
/// 1. --token flag
/// 2. --token-file flag
/// 3. TSURU_TOKEN environment variable
/// 4. ~/.tsuru/acl.toml
/// 5. ~/.tsuru/token
pub fn resolve_token(
    token_flag: Option<String>,
    token_file_flag: Option<PathBuf>,
    token_env: Option<String>,
    config: &CliConfig,
    tsuru_dir: Option<&Path>,
) -> Result<String> {
    if let Some(token) = non_empty(token_flag) {
        debug!("Using token from --token flag");
        return Ok(token);
    }

    if let Some(token_file) = token_file_flag {
        debug!("Reading token from file: {}", token_file.display());
        let token = std::fs::read_to_string(&token_file)
            .with_context(|| format!("Failed to read token file: {}", token_file.display()))?
            .trim()
            .to_string();

        if token.is_empty() {
            anyhow::bail!("Token file is empty: {}", token_file.display());
        }

        return Ok(token);
    }

    if let Some(token) = non_empty(token_env) {
        debug!("Using token from TSURU_TOKEN environment variable");
        return Ok(token);
    }

    if let Some(token) = non_empty(config.token.clone()) {
        debug!("Using token from config file");
        return Ok(token);
    }

    if let Some(dir) = tsuru_dir {
        if let Some(token) = read_value_file(&dir.join("token"))? {
            debug!("Using token from tsuru token file");
            return Ok(token);
        }
    }

    anyhow::bail!(
        "No authentication token found. Please provide a token via:\n\
         - --token flag\n\
         - --token-file flag\n\
         - TSURU_TOKEN environment variable\n\
         - ~/.tsuru/acl.toml\n\
         - tsuru login"
    )
}

/// Resolve the request timeout in seconds: flag, config file, then 30 seconds
pub fn resolve_timeout(timeout_flag: Option<u64>, config: &CliConfig) -> u64 {
    timeout_flag.or(config.timeout).unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS)
}

/// Resolve a retry window: flag, config file value, then 20 minutes
pub fn resolve_retry_window(flag: Option<u64>, configured: Option<u64>) -> Duration {
    Duration::from_secs(flag.or(configured).unwrap_or(DEFAULT_RETRY_WINDOW_SECS))
}

/// Resolve certificate verification: the flag (or its environment variable) wins
/// when set, then the config file.
pub fn resolve_skip_cert_verification(flag: bool, config: &CliConfig) -> bool {
    flag || config.skip_cert_verification.unwrap_or(false)
}
