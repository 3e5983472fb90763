//! The monitor configuration document.

use std::ffi::OsString;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use motor_telemetry_frame::{ByteOrder, DEFAULT_UNIT_COUNT, FIELD_COUNT, FieldSelection, FrameCodec};
use motor_telemetry_log::LoggingPolicy;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ConfigError;

pub const CURRENT_SCHEMA_VERSION: &str = "motor-monitor.config/1";

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "MOTOR_MONITOR_CONFIG";

pub const DEFAULT_LOG_DIR: &str = "/tmp/motor_monitor_log";

const DEFAULT_PORT: u16 = 4015;

/// Monitor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Configuration schema version
    pub schema_version: String,
    /// UDP address the telemetry sender targets
    pub listen_addr: SocketAddr,
    /// Motor records per datagram
    pub unit_count: usize,
    /// Upper bound on the number of fields plotted per motor
    pub fields_per_unit: usize,
    /// Fields plotted per motor, in order
    pub selected_fields: FieldSelection,
    /// Which batches are written to the log
    pub logging_policy: LoggingPolicy,
    /// Directory receiving log files
    pub log_dir: PathBuf,
    /// Rate at which hosts are told to redraw
    pub refresh_rate_hz: u32,
    /// Byte order of the floats on the wire
    pub byte_order: ByteOrder,
    /// Quiet period after which a missing sender is reported
    pub receive_timeout_ms: u64,
    /// Time allowed for background tasks to stop
    pub shutdown_timeout_ms: u64,
    /// Samples retained per series by the in-memory store
    pub series_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION.to_string(),
            listen_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            unit_count: DEFAULT_UNIT_COUNT,
            fields_per_unit: 12,
            selected_fields: FieldSelection::plot_default(),
            logging_policy: LoggingPolicy::ErrorTriggered,
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            refresh_rate_hz: 50,
            byte_order: ByteOrder::Little,
            receive_timeout_ms: 2_000,
            shutdown_timeout_ms: 1_000,
            series_capacity: 10_000,
        }
    }
}

impl MonitorConfig {
    /// Load configuration from the default location.
    ///
    /// # Errors
    ///
    /// See [`MonitorConfig::default_config_path`] and [`MonitorConfig::load_from_path`].
    pub async fn load() -> Result<Self, ConfigError> {
        let path = Self::default_config_path()?;
        Self::load_from_path(&path).await
    }

    /// Load configuration from `path`, writing the default there if it is missing.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or parsed, or the default cannot be written.
    pub async fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            info!(path = %path.display(), "Config file not found, creating default");
            let config = Self::default();
            config.save_to_path(path).await?;
            return Ok(config);
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let config: MonitorConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Save configuration to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Fails if serialization or any filesystem step fails.
    pub async fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ConfigError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let content = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        tokio::fs::write(path, content)
            .await
            .map_err(|source| ConfigError::Write {
                path: path.to_path_buf(),
                source,
            })?;

        debug!(path = %path.display(), "Saved config");
        Ok(())
    }

    /// `$MOTOR_MONITOR_CONFIG`, else `config.json` under the user config directory.
    ///
    /// # Errors
    ///
    /// Fails if neither the override nor the home directory variable is set.
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let home_var = if cfg!(windows) { "LOCALAPPDATA" } else { "HOME" };
        config_path_from(std::env::var_os(CONFIG_PATH_ENV), std::env::var_os(home_var), home_var)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schema_version != CURRENT_SCHEMA_VERSION {
            return Err(ConfigError::UnsupportedSchema(self.schema_version.clone()));
        }

        if self.unit_count == 0 {
            return Err(ConfigError::NoUnits);
        }

        if self.fields_per_unit == 0 || self.fields_per_unit > FIELD_COUNT {
            return Err(ConfigError::InvalidFieldsPerUnit {
                actual: self.fields_per_unit,
                max: FIELD_COUNT,
            });
        }

        if self.selected_fields.is_empty() {
            return Err(ConfigError::EmptySelection);
        }

        if !(1..=1000).contains(&self.refresh_rate_hz) {
            return Err(ConfigError::InvalidRefreshRate(self.refresh_rate_hz));
        }

        if self.receive_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout("receive_timeout_ms"));
        }

        if self.shutdown_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout("shutdown_timeout_ms"));
        }

        if self.series_capacity == 0 {
            return Err(ConfigError::ZeroSeriesCapacity);
        }

        if self.selected_fields.len() > self.fields_per_unit {
            warn!(
                selected = self.selected_fields.len(),
                fields_per_unit = self.fields_per_unit,
                "More fields selected than fields_per_unit allows; extra fields are not plotted"
            );
        }

        Ok(())
    }

    /// Create the log directory if it does not exist.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be created. Logging cannot work without it.
    pub fn ensure_log_dir(&self) -> Result<&Path, ConfigError> {
        std::fs::create_dir_all(&self.log_dir).map_err(|source| ConfigError::CreateLogDir {
            path: self.log_dir.clone(),
            source,
        })?;
        Ok(&self.log_dir)
    }

    /// Codec matching the configured layout.
    pub fn codec(&self) -> FrameCodec {
        FrameCodec::new(self.unit_count).with_byte_order(self.byte_order)
    }

    /// Fields actually plotted: the selection capped at `fields_per_unit`.
    pub fn effective_selection(&self) -> FieldSelection {
        self.selected_fields.truncated(self.fields_per_unit)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(1) / self.refresh_rate_hz.max(1)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

fn config_path_from(
    override_path: Option<OsString>,
    home: Option<OsString>,
    home_var: &'static str,
) -> Result<PathBuf, ConfigError> {
    if let Some(path) = override_path.filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }

    let base = home
        .filter(|h| !h.is_empty())
        .ok_or(ConfigError::NoConfigLocation(home_var))?;
    let base = PathBuf::from(base);
    let base = if cfg!(windows) { base } else { base.join(".config") };

    Ok(base.join("motor-monitor").join("config.json"))
}
