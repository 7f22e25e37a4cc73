//! Configuration types for gridlet

use crate::error::{GridletError, GridletResult};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main manager configuration, immutable after startup
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ManagerConfig {
    /// API server configuration
    pub api: ApiConfig,
    /// Allocation scheduler configuration
    pub scheduler: SchedulerConfig,
    /// Telemetry ingestion configuration
    pub telemetry: TelemetryConfig,
    /// Carbon accounting coefficients
    pub environmental: EnvironmentalConfig,
    /// Storage adapter configuration
    pub storage: StorageConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl ManagerConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> GridletResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GridletError::Config(format!("Failed to read config file: {}", e)))?;
        toml::from_str(&content)
            .map_err(|e| GridletError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Validate cross-field constraints before any component is built
    pub fn validate(&self) -> GridletResult<()> {
        if self.scheduler.tick_interval_secs == 0 {
            return Err(GridletError::Config(
                "scheduler.tick_interval_secs must be positive".to_string(),
            ));
        }
        if self.scheduler.min_duration_hours == 0
            || self.scheduler.max_duration_hours < self.scheduler.min_duration_hours
        {
            return Err(GridletError::Config(format!(
                "invalid duration bounds [{}h, {}h]",
                self.scheduler.min_duration_hours, self.scheduler.max_duration_hours
            )));
        }
        if self.telemetry.sample_interval_secs == 0 {
            return Err(GridletError::Config(
                "telemetry.sample_interval_secs must be positive".to_string(),
            ));
        }
        if self.telemetry.buffer_capacity == 0 {
            return Err(GridletError::Config(
                "telemetry.buffer_capacity must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.environmental.capture_efficiency) {
            return Err(GridletError::Config(format!(
                "environmental.capture_efficiency {} outside [0, 1]",
                self.environmental.capture_efficiency
            )));
        }
        if self.environmental.grid_carbon_intensity < 0.0 {
            return Err(GridletError::Config(
                "environmental.grid_carbon_intensity must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind the REST API server
    pub address: String,
    /// Port for the REST API server
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 9090,
        }
    }
}

/// Allocation scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Interval between activation/completion ticks, in seconds
    pub tick_interval_secs: u64,
    /// Minimum reservation duration, in hours (inclusive)
    pub min_duration_hours: u32,
    /// Maximum reservation duration, in hours (inclusive)
    pub max_duration_hours: u32,
}

impl SchedulerConfig {
    /// Duration bounds as chrono durations
    pub fn duration_bounds(&self) -> (Duration, Duration) {
        (
            Duration::hours(self.min_duration_hours as i64),
            Duration::hours(self.max_duration_hours as i64),
        )
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 30,
            min_duration_hours: 1,
            max_duration_hours: 168,
        }
    }
}

/// Telemetry ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Sample collection interval in seconds
    pub sample_interval_secs: u64,
    /// Maximum buffered raw samples per GPU before the oldest is dropped
    pub buffer_capacity: usize,
    /// Interval between aggregate flushes, in seconds
    pub flush_interval_secs: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            sample_interval_secs: 60,
            buffer_capacity: 1024,
            flush_interval_secs: 300,
        }
    }
}

/// Carbon accounting coefficients; policy comes from configuration,
/// never from code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentalConfig {
    /// Grid carbon intensity in grams CO2e per kWh
    pub grid_carbon_intensity: f64,
    /// Capture-efficiency coefficient applied to raw capture readings, in [0, 1]
    pub capture_efficiency: f64,
}

impl Default for EnvironmentalConfig {
    fn default() -> Self {
        Self {
            grid_carbon_intensity: 400.0,
            capture_efficiency: 0.25,
        }
    }
}

/// Storage adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Per-operation timeout in milliseconds
    pub op_timeout_ms: u64,
    /// Backoff before the single commit retry, in milliseconds
    pub retry_backoff_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            op_timeout_ms: 5000,
            retry_backoff_ms: 200,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or text)
    pub format: String,
    /// Log file path (if any)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ManagerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.api.port, 9090);
        assert_eq!(config.telemetry.sample_interval_secs, 60);
        assert_eq!(config.scheduler.max_duration_hours, 168);
    }

    #[test]
    fn test_validate_rejects_bad_capture_efficiency() {
        let mut config = ManagerConfig::default();
        config.environmental.capture_efficiency = 1.5;
        assert!(matches!(
            config.validate(),
            Err(GridletError::Config(_))
        ));
    }

    #[test]
    fn test_validate_rejects_inverted_duration_bounds() {
        let mut config = ManagerConfig::default();
        config.scheduler.min_duration_hours = 10;
        config.scheduler.max_duration_hours = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_parse() {
        let toml_str = r#"
[api]
address = "127.0.0.1"
port = 8080

[scheduler]
tick_interval_secs = 15
min_duration_hours = 1
max_duration_hours = 72

[telemetry]
sample_interval_secs = 30
buffer_capacity = 512
flush_interval_secs = 120

[environmental]
grid_carbon_intensity = 250.0
capture_efficiency = 0.4

[storage]
op_timeout_ms = 2000
retry_backoff_ms = 100

[logging]
level = "debug"
format = "text"
"#;
        let config: ManagerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api.port, 8080);
        assert_eq!(config.scheduler.max_duration_hours, 72);
        assert!((config.environmental.capture_efficiency - 0.4).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }
}
