//! Structured logging setup for cryptoutil services
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


use cryptoutil_config::{LogFormat, LoggingSettings};
use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging initialization errors
#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {reason}")]
    Filter { filter: String, reason: String },

    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Build the level filter: `RUST_LOG` wins, then the configured level
pub fn build_filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(default_level).map_err(|e| LoggingError::Filter {
            filter: default_level.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Initialize logging for a service
///
/// - `LogFormat::Json`: JSON formatted logs with file/line, no span lists
/// - `LogFormat::Console`: human-readable output for local development
///
/// Returns an error instead of panicking when a global subscriber is already set.
pub fn init_logging(service_name: &str, settings: &LoggingSettings) -> Result<(), LoggingError> {
    let env_filter = build_filter(&settings.level)?;

    let result = match settings.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_current_span(false)
                    .with_span_list(false),
            )
            .try_init(),
        LogFormat::Console => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init(),
    };
    result.map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    tracing::info!(
        service = service_name,
        format = ?settings.format,
        level = %settings.level,
        "Logging initialized"
    );
    Ok(())
}
