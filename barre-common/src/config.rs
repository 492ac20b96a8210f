//! Configuration loading and resolution
//!
//! Each setting resolves in priority order:
//! 1. Environment variable (highest priority)
//! 2. TOML config file (`BARRE_CONFIG` or `./barre.toml`)
//! 3. Compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Service configuration for the barre-api binary
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Path to the SQLite database file
    pub database_path: PathBuf,
    /// Socket address the HTTP server binds to
    pub bind_addr: String,
    /// Hours before an issued session token expires
    pub session_ttl_hours: i64,
    /// Anthropic API key; None disables AI generation (fallbacks are used)
    pub anthropic_api_key: Option<String>,
    /// Timeout in seconds for a single AI request
    pub ai_timeout_secs: u64,
}

/// TOML file shape (all keys optional)
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    database_path: Option<String>,
    bind_addr: Option<String>,
    session_ttl_hours: Option<i64>,
    anthropic_api_key: Option<String>,
    ai_timeout_secs: Option<u64>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("barre.db"),
            bind_addr: "127.0.0.1:4810".to_string(),
            session_ttl_hours: 24 * 7,
            anthropic_api_key: None,
            ai_timeout_secs: 10,
        }
    }
}

impl ServiceConfig {
    /// Load configuration with env > TOML > default resolution
    pub fn load() -> Result<Self> {
        let file = load_config_file()?;
        let defaults = Self::default();

        let database_path = std::env::var("BARRE_DATABASE_PATH")
            .ok()
            .or(file.database_path)
            .map(PathBuf::from)
            .unwrap_or(defaults.database_path);

        let bind_addr = std::env::var("BARRE_BIND_ADDR")
            .ok()
            .or(file.bind_addr)
            .unwrap_or(defaults.bind_addr);

        let session_ttl_hours = match std::env::var("BARRE_SESSION_TTL_HOURS") {
            Ok(v) => v
                .parse::<i64>()
                .map_err(|e| Error::Config(format!("BARRE_SESSION_TTL_HOURS: {}", e)))?,
            Err(_) => file.session_ttl_hours.unwrap_or(defaults.session_ttl_hours),
        };

        let anthropic_api_key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .or(file.anthropic_api_key)
            .filter(|k| !k.is_empty());

        let ai_timeout_secs = match std::env::var("BARRE_AI_TIMEOUT_SECS") {
            Ok(v) => v
                .parse::<u64>()
                .map_err(|e| Error::Config(format!("BARRE_AI_TIMEOUT_SECS: {}", e)))?,
            Err(_) => file.ai_timeout_secs.unwrap_or(defaults.ai_timeout_secs),
        };

        if session_ttl_hours <= 0 {
            return Err(Error::Config(
                "session_ttl_hours must be positive".to_string(),
            ));
        }

        Ok(Self {
            database_path,
            bind_addr,
            session_ttl_hours,
            anthropic_api_key,
            ai_timeout_secs,
        })
    }
}

/// Locate and parse the TOML config file, if one exists
fn load_config_file() -> Result<ConfigFile> {
    let path = match std::env::var("BARRE_CONFIG") {
        Ok(p) => PathBuf::from(p),
        Err(_) => PathBuf::from("barre.toml"),
    };

    if !path.exists() {
        return Ok(ConfigFile::default());
    }

    let content = std::fs::read_to_string(&path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}
