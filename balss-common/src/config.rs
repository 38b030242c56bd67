//! Bootstrap configuration loading and root folder resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "BALSS_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "products.db";

/// Bootstrap configuration loaded from TOML
///
/// Every section is optional; missing values fall back to built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Folder holding the product database
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Classifier settings (`[classifier]` table)
    #[serde(default)]
    pub classifier: ClassifierSettings,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Raw `[classifier]` section
///
/// Values stay optional here; `balss-classifier` applies its defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifierSettings {
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub model: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub cache_capacity: Option<usize>,
    pub cache_clear_interval_secs: Option<u64>,
    pub ai_confidence: Option<f64>,
}

/// Load TOML configuration
///
/// With an explicit path the file must exist and parse. Without one the
/// platform config locations are tried and a missing file yields defaults.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match config_file_path() {
            Some(path) => path,
            None => {
                debug!("No config file found, using defaults");
                return Ok(TomlConfig::default());
            }
        },
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Root folder resolution priority:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&str>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// Database file path inside a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE)
}

/// First existing platform config file, if any
fn config_file_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("balss").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/balss/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("balss"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/balss"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("balss"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\balss"))
    } else {
        dirs::data_dir()
            .map(|d| d.join("balss"))
            .unwrap_or_else(|| PathBuf::from("./balss_data"))
    }
}
