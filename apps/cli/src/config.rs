//! # Application Configuration
//!
//! Store, currency and terminal settings for the till.
//!
//! ## Layering
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Configuration Sources                             │
//! │                                                                         │
//! │  1. Built-in defaults ─────────────────────────────── lowest priority   │
//! │  2. tillstone.toml (or the file given with --config)                    │
//! │  3. TILLSTONE_* environment variables ─────────────── highest priority  │
//! │                                                                         │
//! │  TILLSTONE_STORE_NAME="Corner Shop"                                     │
//! │  TILLSTONE_DB_PATH=/var/lib/tillstone/till.db                           │
//! │  TILLSTONE_STORE_ADDRESS="1 High St,Springfield"   (comma separated)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tillstone_core::validation::{validate_language_code, validate_tax_rate_bps};
use tillstone_core::{TaxMode, DEFAULT_LANGUAGE};

/// File read from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "tillstone.toml";

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "TILLSTONE";

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Store name (printed on receipts)
    pub store_name: String,

    /// Store address lines (printed on receipts)
    pub store_address: Vec<String>,

    /// Currency code (ISO 4217)
    pub currency_code: String,

    /// Currency symbol (for display)
    pub currency_symbol: String,

    /// Number of minor-unit digits, e.g. 2 for cents
    pub currency_decimals: u8,

    /// Tax rate in basis points given to new products
    pub default_tax_rate_bps: u32,

    /// Whether shelf prices include tax
    pub tax_mode: TaxMode,

    /// Label language used when none is requested
    pub default_language: String,

    /// Code of the location this till sells from
    pub default_location: String,

    /// Database file. The platform data directory is used when unset.
    #[serde(default)]
    pub db_path: Option<PathBuf>,

    /// Terminal id; its last two characters appear in receipt numbers
    pub device_id: String,

    /// Maximum database connections
    pub pool_size: u32,

    /// Whether new products may go below zero stock
    pub allow_negative_stock: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            store_name: "Tillstone Store".to_string(),
            store_address: Vec::new(),
            currency_code: "USD".to_string(),
            currency_symbol: "$".to_string(),
            currency_decimals: 2,
            default_tax_rate_bps: 0,
            tax_mode: TaxMode::Exclusive,
            default_language: DEFAULT_LANGUAGE.to_string(),
            default_location: "MAIN".to_string(),
            db_path: None,
            device_id: "pos-01".to_string(),
            pool_size: 5,
            allow_negative_stock: false,
        }
    }
}

impl AppConfig {
    /// Loads defaults, then the config file, then `TILLSTONE_*` variables.
    ///
    /// An explicitly given file must exist; the default `tillstone.toml`
    /// is optional.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = AppConfig::default();

        let (path, required) = match file {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        let settings = Config::builder()
            .set_default("store_name", defaults.store_name)?
            .set_default("store_address", defaults.store_address)?
            .set_default("currency_code", defaults.currency_code)?
            .set_default("currency_symbol", defaults.currency_symbol)?
            .set_default("currency_decimals", i64::from(defaults.currency_decimals))?
            .set_default("default_tax_rate_bps", i64::from(defaults.default_tax_rate_bps))?
            .set_default("tax_mode", tax_mode_str(defaults.tax_mode))?
            .set_default("default_language", defaults.default_language)?
            .set_default("default_location", defaults.default_location)?
            .set_default("device_id", defaults.device_id)?
            .set_default("pool_size", i64::from(defaults.pool_size))?
            .set_default("allow_negative_stock", defaults.allow_negative_stock)?
            .add_source(File::from(path).format(FileFormat::Toml).required(required))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .list_separator(",")
                    .with_list_parse_key("store_address"),
            )
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the till cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.currency_decimals > 4 {
            return Err(ConfigError::invalid("currency_decimals", "must be between 0 and 4"));
        }
        validate_tax_rate_bps(self.default_tax_rate_bps)
            .map_err(|e| ConfigError::invalid("default_tax_rate_bps", e.to_string()))?;
        validate_language_code(&self.default_language)
            .map_err(|e| ConfigError::invalid("default_language", e.to_string()))?;
        if self.device_id.trim().is_empty() {
            return Err(ConfigError::invalid("device_id", "is required"));
        }
        if self.default_location.trim().is_empty() {
            return Err(ConfigError::invalid("default_location", "is required"));
        }
        if self.pool_size == 0 {
            return Err(ConfigError::invalid("pool_size", "must be at least 1"));
        }
        Ok(())
    }

    /// Formats an amount in minor units for display.
    ///
    /// ```rust
    /// use tillstone_cli::config::AppConfig;
    ///
    /// let config = AppConfig::default();
    /// assert_eq!(config.format_currency(1234), "$12.34");
    /// assert_eq!(config.format_currency(-5), "-$0.05");
    /// ```
    pub fn format_currency(&self, cents: i64) -> String {
        let sign = if cents < 0 { "-" } else { "" };
        let abs = cents.unsigned_abs();

        if self.currency_decimals == 0 {
            return format!("{}{}{}", sign, self.currency_symbol, abs);
        }

        let scale = 10u64.pow(u32::from(self.currency_decimals));
        format!(
            "{}{}{}.{:0width$}",
            sign,
            self.currency_symbol,
            abs / scale,
            abs % scale,
            width = usize::from(self.currency_decimals)
        )
    }

    /// Database file to open.
    ///
    /// ## Platform-Specific Paths
    /// - **macOS**: `~/Library/Application Support/com.tillstone.pos/tillstone.db`
    /// - **Windows**: `%APPDATA%\tillstone\pos\data\tillstone.db`
    /// - **Linux**: `~/.local/share/pos/tillstone.db`
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.db_path {
            return Ok(path.clone());
        }

        let dirs = ProjectDirs::from("com", "tillstone", "pos").ok_or(ConfigError::NoDataDir)?;
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;

        Ok(data_dir.join("tillstone.db"))
    }
}

fn tax_mode_str(mode: TaxMode) -> &'static str {
    match mode {
        TaxMode::Exclusive => "exclusive",
        TaxMode::Inclusive => "inclusive",
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Could not determine the application data directory")]
    NoDataDir,

    #[error("Could not create the data directory: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn test_format_currency_respects_decimals() {
        let mut config = AppConfig::default();
        assert_eq!(config.format_currency(0), "$0.00");
        assert_eq!(config.format_currency(100_050), "$1000.50");

        config.currency_symbol = "¥".to_string();
        config.currency_decimals = 0;
        assert_eq!(config.format_currency(1500), "¥1500");

        config.currency_symbol = "BD ".to_string();
        config.currency_decimals = 3;
        assert_eq!(config.format_currency(1250), "BD 1.250");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.currency_decimals = 6;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.device_id = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.default_language = "english".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/tillstone.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    fn test_configured_db_path_wins() {
        let config = AppConfig {
            db_path: Some(PathBuf::from("/tmp/till.db")),
            ..AppConfig::default()
        };
        assert_eq!(config.database_path().unwrap(), PathBuf::from("/tmp/till.db"));
    }
}
