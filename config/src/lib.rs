//! Obscura Configuration
//!
//! Shared configuration crate for the Obscura node and tools.
//!
//! Handles loading configuration from:
//! 1. OB_CONFIG env var (explicit path)
//! 2. ./config.toml (current directory)
//! 3. ~/.obscura/config.toml (user home)
//!
//! Environment variables take precedence over TOML config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::{env, fs};

/// Global config instance for convenience access
pub static GLOBAL_CONFIG: OnceLock<ObscuraConfig> = OnceLock::new();

const CONFIG_FILE_NAME: &str = "config.toml";
const CONFIG_DIR_NAME: &str = ".obscura";

// ============================================================================
// Default Constants
// ============================================================================

const DEFAULT_DB_PATH: &str = "./obscura-db";

const DEFAULT_RING_SIZE: usize = 8;
const DEFAULT_MAX_OTA_ATTEMPTS: usize = 512;

const DEFAULT_MAX_TX_SIZE: usize = 512 * 1024;
const DEFAULT_MAX_INFO_SIZE: usize = 512;
const DEFAULT_MAX_LOCK_TIME_DRIFT_SECS: u64 = 3600;

const DEFAULT_BATCH_SIZE: usize = 64;

// ============================================================================
// Config Structs
// ============================================================================

/// Root configuration structure (matches TOML layout)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObscuraConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub privacy: PrivacyConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub verifier: VerifierConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_DB_PATH.into(),
        }
    }
}

fn default_db_path() -> String {
    DEFAULT_DB_PATH.into()
}

/// Transaction construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivacyConfig {
    /// v2 ring size; v1 rings are fixed at 8
    #[serde(default = "default_ring_size")]
    pub ring_size: usize,
    /// One-time address draws per output before giving up
    #[serde(default = "default_max_ota_attempts")]
    pub max_ota_attempts: usize,
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        Self {
            ring_size: DEFAULT_RING_SIZE,
            max_ota_attempts: DEFAULT_MAX_OTA_ATTEMPTS,
        }
    }
}

fn default_ring_size() -> usize {
    DEFAULT_RING_SIZE
}
fn default_max_ota_attempts() -> usize {
    DEFAULT_MAX_OTA_ATTEMPTS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_max_tx_size")]
    pub max_tx_size: usize,
    #[serde(default = "default_max_info_size")]
    pub max_info_size: usize,
    #[serde(default = "default_max_lock_time_drift")]
    pub max_lock_time_drift_secs: u64,
    /// Replaying old blocks with the legacy ring carve-out
    #[serde(default)]
    pub legacy_mode: bool,
    #[serde(default)]
    pub legacy_cutoff: u64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_tx_size: DEFAULT_MAX_TX_SIZE,
            max_info_size: DEFAULT_MAX_INFO_SIZE,
            max_lock_time_drift_secs: DEFAULT_MAX_LOCK_TIME_DRIFT_SECS,
            legacy_mode: false,
            legacy_cutoff: 0,
        }
    }
}

fn default_max_tx_size() -> usize {
    DEFAULT_MAX_TX_SIZE
}
fn default_max_info_size() -> usize {
    DEFAULT_MAX_INFO_SIZE
}
fn default_max_lock_time_drift() -> u64 {
    DEFAULT_MAX_LOCK_TIME_DRIFT_SECS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Worker threads; 0 lets the pool pick one per core
    #[serde(default)]
    pub threads: usize,
    /// Transactions per batched range-proof check
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

// ============================================================================
// Override Helpers
// ============================================================================

fn override_string(lookup: &impl Fn(&str) -> Option<String>, key: &str, field: &mut String) {
    if let Some(v) = lookup(key) {
        *field = v;
    }
}

/// Set field if the variable is present and parseable
fn override_parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    field: &mut T,
) {
    if let Some(parsed) = lookup(key).and_then(|v| v.parse().ok()) {
        *field = parsed;
    }
}

/// "1" or "true" (any case) is true, anything else false
fn override_bool(lookup: &impl Fn(&str) -> Option<String>, key: &str, field: &mut bool) {
    if let Some(v) = lookup(key) {
        *field = v == "1" || v.eq_ignore_ascii_case("true");
    }
}

// ============================================================================
// Implementation
// ============================================================================

impl ObscuraConfig {
    /// Load configuration from config file with env var overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => {
                log::info!("Loading config from: {}", path.display());
                Self::parse_file(&path)?
            }
            None => {
                log::info!("No config file found, using defaults and environment variables");
                Self::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::parse_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn parse_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn find_config_file() -> Option<PathBuf> {
        if let Ok(path) = env::var("OB_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
            log::warn!("OB_CONFIG points at {}, which does not exist", path.display());
        }

        let local_path = PathBuf::from(CONFIG_FILE_NAME);
        if local_path.exists() {
            return Some(local_path);
        }

        Self::default_config_path().filter(|p| p.exists())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// Apply `OB_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Database
        override_string(&lookup, "OB_DB_PATH", &mut self.database.path);

        // Privacy
        override_parse(&lookup, "OB_RING_SIZE", &mut self.privacy.ring_size);
        override_parse(&lookup, "OB_MAX_OTA_ATTEMPTS", &mut self.privacy.max_ota_attempts);

        // Validation
        override_parse(&lookup, "OB_MAX_TX_SIZE", &mut self.validation.max_tx_size);
        override_parse(&lookup, "OB_MAX_INFO_SIZE", &mut self.validation.max_info_size);
        override_parse(
            &lookup,
            "OB_MAX_LOCK_TIME_DRIFT",
            &mut self.validation.max_lock_time_drift_secs,
        );
        override_bool(&lookup, "OB_LEGACY_MODE", &mut self.validation.legacy_mode);
        override_parse(&lookup, "OB_LEGACY_CUTOFF", &mut self.validation.legacy_cutoff);

        // Verifier
        override_parse(&lookup, "OB_VERIFIER_THREADS", &mut self.verifier.threads);
        override_parse(&lookup, "OB_BATCH_SIZE", &mut self.verifier.batch_size);
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Generate a sample config file
    pub fn generate_sample() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }

    /// Get the global config instance, initializing it if necessary.
    ///
    /// Falls back to defaults if loading fails.
    pub fn global() -> &'static ObscuraConfig {
        GLOBAL_CONFIG.get_or_init(|| {
            Self::load().unwrap_or_else(|e| {
                log::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            })
        })
    }

    /// Returns `None` if config hasn't been initialized yet.
    pub fn try_global() -> Option<&'static ObscuraConfig> {
        GLOBAL_CONFIG.get()
    }

    /// Returns `Err(config)` if already initialized.
    pub fn set_global(config: ObscuraConfig) -> Result<(), ObscuraConfig> {
        GLOBAL_CONFIG.set(config)
    }
}

/// Shorthand for `ObscuraConfig::global()`.
#[inline]
pub fn global_config() -> &'static ObscuraConfig {
    ObscuraConfig::global()
}
