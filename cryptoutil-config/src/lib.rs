//! Configuration management for the cryptoutil barrier services
// Copyright 2025 Francisco F. Pinochet
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Environment variable prefix for every setting (`CRYPTOUTIL_UNSEAL_MODE`, ...)
pub const ENV_PREFIX: &str = "CRYPTOUTIL";

pub const DEFAULT_UNSEAL_MODE: &str = "sysinfo";
pub const DEFAULT_FINGERPRINT_TIMEOUT_MS: u64 = 10_000;
/// Practical ceiling on C(M, chooseN) for one service instance
pub const DEFAULT_MAX_COMBINATIONS: usize = 4096;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Configuration errors
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// JSON lines (production)
    #[default]
    Json,
    /// Human-readable (development)
    Console,
}

impl FromStr for LogFormat {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "console" | "pretty" => Ok(LogFormat::Console),
            other => Err(SettingsError::Invalid {
                name: "log_format",
                reason: format!("unknown log format '{}', expected json or console", other),
            }),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Unseal key service configuration.
///
/// Built once at startup and handed to the provisioning selector by reference.
#[derive(Debug, Clone)]
pub struct UnsealSettings {
    /// `sysinfo`, `N` or `M-of-N`
    pub mode: String,
    /// Unseal key files (`N`) or shared secret files (`M-of-N`), in order
    pub files: Vec<PathBuf>,
    /// Opt-in single random key for local development
    pub dev_mode: bool,
    pub fingerprint_timeout_ms: u64,
    pub max_combinations: usize,
}

impl UnsealSettings {
    pub fn new(mode: impl Into<String>, files: Vec<PathBuf>) -> Self {
        Self {
            mode: mode.into(),
            files,
            ..Self::default()
        }
    }

    /// Development settings: one ephemeral key, never derived from shares
    pub fn ephemeral_dev() -> Self {
        Self {
            dev_mode: true,
            ..Self::default()
        }
    }

    pub fn fingerprint_timeout(&self) -> Duration {
        Duration::from_millis(self.fingerprint_timeout_ms)
    }
}

impl Default for UnsealSettings {
    fn default() -> Self {
        Self {
            mode: DEFAULT_UNSEAL_MODE.to_string(),
            files: Vec::new(),
            dev_mode: false,
            fingerprint_timeout_ms: DEFAULT_FINGERPRINT_TIMEOUT_MS,
            max_combinations: DEFAULT_MAX_COMBINATIONS,
        }
    }
}

/// Flat view of the environment, one field per `CRYPTOUTIL_*` variable
#[derive(Debug, Deserialize)]
struct RawSettings {
    unseal_mode: String,
    unseal_files: Vec<String>,
    unseal_dev_mode: bool,
    unseal_fingerprint_timeout_ms: u64,
    unseal_max_combinations: usize,
    log_level: String,
    log_format: String,
}

/// Application configuration
#[derive(Debug, Clone, Default)]
pub struct AppSettings {
    pub unseal: UnsealSettings,
    pub logging: LoggingSettings,
}

impl AppSettings {
    /// Load configuration from environment variables (and `.env` if present)
    pub fn from_env() -> Result<Self, SettingsError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        Self::from_environment(config::Environment::with_prefix(ENV_PREFIX))
    }

    /// Load configuration from an explicit environment source
    pub fn from_environment(source: config::Environment) -> Result<Self, SettingsError> {
        let raw: RawSettings = config::Config::builder()
            .set_default("unseal_mode", DEFAULT_UNSEAL_MODE)?
            .set_default("unseal_files", Vec::<String>::new())?
            .set_default("unseal_dev_mode", false)?
            .set_default("unseal_fingerprint_timeout_ms", DEFAULT_FINGERPRINT_TIMEOUT_MS)?
            .set_default("unseal_max_combinations", DEFAULT_MAX_COMBINATIONS as u64)?
            .set_default("log_level", DEFAULT_LOG_LEVEL)?
            .set_default("log_format", "json")?
            .add_source(
                source
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("unseal_files"),
            )
            .build()?
            .try_deserialize()?;

        if raw.unseal_fingerprint_timeout_ms == 0 {
            return Err(SettingsError::Invalid {
                name: "unseal_fingerprint_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if raw.unseal_max_combinations == 0 {
            return Err(SettingsError::Invalid {
                name: "unseal_max_combinations",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            unseal: UnsealSettings {
                mode: raw.unseal_mode,
                files: raw
                    .unseal_files
                    .into_iter()
                    .map(|f| f.trim().to_string())
                    .filter(|f| !f.is_empty())
                    .map(PathBuf::from)
                    .collect(),
                dev_mode: raw.unseal_dev_mode,
                fingerprint_timeout_ms: raw.unseal_fingerprint_timeout_ms,
                max_combinations: raw.unseal_max_combinations,
            },
            logging: LoggingSettings {
                level: raw.log_level,
                format: raw.log_format.parse()?,
            },
        })
    }

    /// Get log level, defaulting to "info"
    pub fn log_level(&self) -> &str {
        if self.logging.level.is_empty() {
            DEFAULT_LOG_LEVEL
        } else {
            &self.logging.level
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::with_prefix(ENV_PREFIX).source(Some(map))
    }

    #[test]
    fn test_defaults() {
        let settings = AppSettings::from_environment(env(&[])).unwrap();
        assert_eq!(settings.unseal.mode, "sysinfo");
        assert!(settings.unseal.files.is_empty());
        assert!(!settings.unseal.dev_mode);
        assert_eq!(settings.unseal.fingerprint_timeout(), Duration::from_secs(10));
        assert_eq!(settings.unseal.max_combinations, DEFAULT_MAX_COMBINATIONS);
        assert_eq!(settings.log_level(), "info");
        assert_eq!(settings.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_threshold_mode_from_env() {
        let settings = AppSettings::from_environment(env(&[
            ("CRYPTOUTIL_UNSEAL_MODE", "2-of-3"),
            (
                "CRYPTOUTIL_UNSEAL_FILES",
                "/run/secrets/unseal_1of3,/run/secrets/unseal_2of3,/run/secrets/unseal_3of3",
            ),
            ("CRYPTOUTIL_LOG_FORMAT", "console"),
            ("CRYPTOUTIL_LOG_LEVEL", "debug"),
        ]))
        .unwrap();

        assert_eq!(settings.unseal.mode, "2-of-3");
        assert_eq!(settings.unseal.files.len(), 3);
        assert_eq!(
            settings.unseal.files[1],
            PathBuf::from("/run/secrets/unseal_2of3")
        );
        assert_eq!(settings.logging.format, LogFormat::Console);
        assert_eq!(settings.log_level(), "debug");
    }

    #[test]
    fn test_numeric_mode_stays_a_string() {
        let settings =
            AppSettings::from_environment(env(&[("CRYPTOUTIL_UNSEAL_MODE", "3")])).unwrap();
        assert_eq!(settings.unseal.mode, "3");
    }

    #[test]
    fn test_dev_mode_and_limits() {
        let settings = AppSettings::from_environment(env(&[
            ("CRYPTOUTIL_UNSEAL_DEV_MODE", "true"),
            ("CRYPTOUTIL_UNSEAL_FINGERPRINT_TIMEOUT_MS", "2500"),
            ("CRYPTOUTIL_UNSEAL_MAX_COMBINATIONS", "20"),
        ]))
        .unwrap();
        assert!(settings.unseal.dev_mode);
        assert_eq!(settings.unseal.fingerprint_timeout(), Duration::from_millis(2500));
        assert_eq!(settings.unseal.max_combinations, 20);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = AppSettings::from_environment(env(&[(
            "CRYPTOUTIL_UNSEAL_FINGERPRINT_TIMEOUT_MS",
            "0",
        )]))
        .unwrap_err();
        assert!(matches!(
            err,
            SettingsError::Invalid { name: "unseal_fingerprint_timeout_ms", .. }
        ));
    }

    #[test]
    fn test_unknown_log_format_rejected() {
        let err = AppSettings::from_environment(env(&[("CRYPTOUTIL_LOG_FORMAT", "xml")]))
            .unwrap_err();
        assert!(err.to_string().contains("unknown log format"));
    }

    #[test]
    fn test_settings_constructors() {
        let settings = UnsealSettings::new("2-of-3", vec![PathBuf::from("a")]);
        assert_eq!(settings.mode, "2-of-3");
        assert!(!settings.dev_mode);

        let dev = UnsealSettings::ephemeral_dev();
        assert!(dev.dev_mode);
        assert_eq!(dev.mode, DEFAULT_UNSEAL_MODE);
    }
}
