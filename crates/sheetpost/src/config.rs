//! Layered configuration loading.

use crate::ObservabilityConfig;
use config::{Config, ConfigBuilder, Environment, File, FileFormat, builder::DefaultState};
use serde::{Deserialize, Serialize};
use sheetpost_bot::{BotConfig, SecurityConfig};
use sheetpost_error::{ConfigError, SheetpostResult};
use sheetpost_rate_limit::{PacingConfig, RetryConfig, WindowLimits};
use sheetpost_server::ScheduleConfig;
use std::path::Path;
use tracing::{debug, instrument};

/// Bundled default configuration.
const DEFAULT_CONFIG: &str = include_str!("../../../sheetpost.toml");

/// Prefix of environment overrides, e.g. `SHEETPOST__SCHEDULE__TARGET_HOUR`.
const ENV_PREFIX: &str = "SHEETPOST";

/// Separator between nested keys in environment overrides.
const ENV_SEPARATOR: &str = "__";

/// Limits for both external APIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Publishing API windows
    #[serde(default = "WindowLimits::publishing")]
    pub publish: WindowLimits,
    /// Spreadsheet API windows
    #[serde(default = "WindowLimits::sheets")]
    pub sheets: WindowLimits,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            publish: WindowLimits::publishing(),
            sheets: WindowLimits::sheets(),
        }
    }
}

/// Complete Sheetpost configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SheetpostConfig {
    /// Daily schedule
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Multi-window API limits
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Minimum call spacing
    #[serde(default)]
    pub pacing: PacingConfig,
    /// Retry of external calls
    #[serde(default)]
    pub retry: RetryConfig,
    /// Suspicious activity handling
    #[serde(default)]
    pub security: SecurityConfig,
    /// Publishing pipeline
    #[serde(default)]
    pub bot: BotConfig,
    /// Logging and tracing
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl SheetpostConfig {
    /// Load configuration with precedence: environment > current dir > home dir > bundled defaults.
    ///
    /// Sources in order (later sources override earlier):
    /// 1. Bundled defaults (`sheetpost.toml` shipped with the crate)
    /// 2. `~/.config/sheetpost/sheetpost.toml`
    /// 3. `./sheetpost.toml`
    /// 4. `SHEETPOST__<SECTION>__<KEY>` environment variables
    ///
    /// Missing files are skipped.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use sheetpost::SheetpostConfig;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = SheetpostConfig::load()?;
    /// println!("Publishing daily at {:02}:{:02}", config.schedule.target_hour, config.schedule.target_minute);
    /// # Ok(())
    /// # }
    /// ```
    #[instrument]
    pub fn load() -> SheetpostResult<Self> {
        debug!("Loading configuration with precedence: env > current dir > home dir > bundled defaults");

        let mut builder = defaults();
        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/sheetpost/sheetpost.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }
        builder = builder.add_source(File::with_name("sheetpost").required(false));

        finish(with_environment(builder))
    }

    /// Load bundled defaults overridden by one explicit file, then the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or cannot be parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> SheetpostResult<Self> {
        debug!("Loading configuration from file");
        let builder = defaults().add_source(File::from(path.as_ref()));
        finish(with_environment(builder)).map_err(|e| {
            ConfigError::new(format!(
                "Failed to read configuration from {}: {}",
                path.as_ref().display(),
                e
            ))
            .into()
        })
    }

    /// Bundled defaults overridden by TOML text. The environment is not consulted.
    pub fn from_toml_str(text: &str) -> SheetpostResult<Self> {
        finish(defaults().add_source(File::from_str(text, FileFormat::Toml)))
    }

    /// Check every section.
    pub fn validate(&self) -> SheetpostResult<()> {
        self.schedule.validate()?;
        self.limits.publish.validate()?;
        self.limits.sheets.validate()?;
        self.pacing.validate()?;
        self.retry.validate()?;
        self.bot.validate()?;
        Ok(())
    }
}

fn defaults() -> ConfigBuilder<DefaultState> {
    Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
}

fn with_environment(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .list_separator(",")
            .with_list_parse_key("retry.retryable")
            .try_parsing(true),
    )
}

fn finish(builder: ConfigBuilder<DefaultState>) -> SheetpostResult<SheetpostConfig> {
    let config = builder
        .build()
        .map_err(|e| ConfigError::new(format!("Failed to build configuration: {}", e)))?
        .try_deserialize()
        .map_err(|e| ConfigError::new(format!("Failed to parse configuration: {}", e)))?;
    Ok(config)
}
