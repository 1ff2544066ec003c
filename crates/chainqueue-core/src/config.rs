//! Engine configuration.
//!
//! 優先順位（低 → 高）:
//! 1. `Default`
//! 2. TOML ファイル（`EngineConfig::load`）
//! 3. `CHAINQUEUE_*` 環境変数（`with_env_overrides`）

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::retry::RetryPolicy;
use crate::registry::RetentionPolicy;

pub const ENV_PREFIX: &str = "CHAINQUEUE_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value '{value}' for {key}")]
    InvalidEnv { key: String, value: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of concurrent workers.
    pub pool_size: usize,

    /// Overrides the per-kind retry ceiling for every submission.
    pub default_max_retries: Option<u32>,

    /// Window used by `recent` and by the success-rate metric.
    pub recent_window_hours: u32,

    pub retry: RetryConfig,

    pub retention: RetentionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pool_size: 3,
            default_max_retries: None,
            recent_window_hours: 24,
            retry: RetryConfig::default(),
            retention: RetentionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub base_delay_secs: u64,
    pub multiplier: f64,
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            base_delay_secs: policy.base_delay.as_secs(),
            multiplier: policy.multiplier,
            max_delay_secs: policy.max_delay.as_secs(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_secs(self.base_delay_secs),
            multiplier: self.multiplier,
            max_delay: Duration::from_secs(self.max_delay_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub max_age_hours: Option<u64>,
    pub max_terminal_records: Option<usize>,
    pub sweep_interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_age_hours: None,
            max_terminal_records: None,
            sweep_interval_secs: 300,
        }
    }
}

impl RetentionConfig {
    pub fn policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            max_age: self.max_age_hours.map(|hours| {
                i64::try_from(hours)
                    .ok()
                    .and_then(chrono::Duration::try_hours)
                    .unwrap_or(chrono::Duration::MAX)
            }),
            max_terminal_records: self.max_terminal_records,
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    })
}

impl EngineConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides(std::env::vars())
    }

    /// Apply `CHAINQUEUE_*` overrides from `vars`; unrelated keys are ignored.
    pub fn with_env_overrides(
        mut self,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self, ConfigError> {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name {
                "POOL_SIZE" => self.pool_size = parse_env(&key, &value)?,
                "DEFAULT_MAX_RETRIES" => self.default_max_retries = Some(parse_env(&key, &value)?),
                "RECENT_WINDOW_HOURS" => self.recent_window_hours = parse_env(&key, &value)?,
                "RETRY_BASE_DELAY_SECS" => self.retry.base_delay_secs = parse_env(&key, &value)?,
                "RETRY_MULTIPLIER" => self.retry.multiplier = parse_env(&key, &value)?,
                "RETRY_MAX_DELAY_SECS" => self.retry.max_delay_secs = parse_env(&key, &value)?,
                "RETENTION_MAX_AGE_HOURS" => {
                    self.retention.max_age_hours = Some(parse_env(&key, &value)?)
                }
                "RETENTION_MAX_TERMINAL_RECORDS" => {
                    self.retention.max_terminal_records = Some(parse_env(&key, &value)?)
                }
                "RETENTION_SWEEP_INTERVAL_SECS" => {
                    self.retention.sweep_interval_secs = parse_env(&key, &value)?
                }
                _ => tracing::debug!(%key, "ignoring unknown config variable"),
            }
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_size == 0 {
            return Err(ConfigError::Invalid("pool_size must be at least 1".into()));
        }
        if !self.retry.multiplier.is_finite() || self.retry.multiplier < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "retry.multiplier must be >= 1.0, got {}",
                self.retry.multiplier
            )));
        }
        if self.retry.max_delay_secs < self.retry.base_delay_secs {
            return Err(ConfigError::Invalid(
                "retry.max_delay_secs must not be smaller than retry.base_delay_secs".into(),
            ));
        }
        if self.retention.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "retention.sweep_interval_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.pool_size, 3);
        assert_eq!(config.recent_window_hours, 24);
        assert_eq!(config.retry.policy(), RetryPolicy::default());
        assert!(config.retention.policy().is_unbounded());
        config.validate().unwrap();
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            pool_size = 5

            [retry]
            base_delay_secs = 10

            [retention]
            max_terminal_records = 1000
            "#,
        )
        .unwrap();
        assert_eq!(config.pool_size, 5);
        assert_eq!(config.retry.base_delay_secs, 10);
        assert_eq!(config.retry.multiplier, 2.0);
        assert_eq!(config.retention.max_terminal_records, Some(1000));
        assert_eq!(config.retention.sweep_interval_secs, 300);
    }

    #[test]
    fn env_overrides_win() {
        let config = EngineConfig::default()
            .with_env_overrides(vars(&[
                ("CHAINQUEUE_POOL_SIZE", "8"),
                ("CHAINQUEUE_DEFAULT_MAX_RETRIES", "1"),
                ("CHAINQUEUE_RETENTION_MAX_AGE_HOURS", "48"),
                ("HOME", "/root"),
            ]))
            .unwrap();
        assert_eq!(config.pool_size, 8);
        assert_eq!(config.default_max_retries, Some(1));
        assert_eq!(
            config.retention.policy().max_age,
            Some(chrono::Duration::hours(48))
        );
    }

    #[test]
    fn bad_env_value_is_reported_with_key() {
        let err = EngineConfig::default()
            .with_env_overrides(vars(&[("CHAINQUEUE_POOL_SIZE", "many")]))
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid value 'many' for CHAINQUEUE_POOL_SIZE");
    }

    #[test]
    fn zero_workers_is_rejected() {
        let err = EngineConfig::from_toml_str("pool_size = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn shrinking_multiplier_is_rejected() {
        let config = EngineConfig {
            retry: RetryConfig {
                multiplier: 0.5,
                ..RetryConfig::default()
            },
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = EngineConfig::load(Path::new("/nonexistent/chainqueue.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/chainqueue.toml"));
    }
}
