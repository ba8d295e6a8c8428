//! Error types for the unseal key service
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


use std::path::PathBuf;
use thiserror::Error;

/// Unseal key service errors.
///
/// Messages carry indexes, paths and counts for diagnosis, never key or share bytes.
#[derive(Error, Debug)]
pub enum UnsealError {
    // share validation
    #[error("shared secrets can't be nil")]
    SharesNil,

    #[error("shared secrets can't be empty")]
    SharesEmpty,

    #[error("shared secrets count {count} can't be greater than 256")]
    SharesTooMany { count: usize },

    #[error("shared secret {0} can't be nil")]
    ShareNilAt(usize),

    #[error("shared secret {index} length can't be less than 32 (got {len})")]
    ShareTooShortAt { index: usize, len: usize },

    #[error("shared secret {index} length can't be greater than 64 (got {len})")]
    ShareTooLongAt { index: usize, len: usize },

    #[error("chooseN can't be zero")]
    ChooseNZero,

    #[error("chooseN can't be negative (got {0})")]
    ChooseNNegative(i64),

    #[error("chooseN {choose_n} can't be greater than shared secrets count {count}")]
    ChooseNExceedsCount { choose_n: i64, count: usize },

    // combinations and derivation
    #[error("failed to compute {choose_n}-of-{m} combinations")]
    CombinationComputeFailed { m: usize, choose_n: usize },

    #[error("{choose_n}-of-{m} yields {count} combinations, limit is {limit}")]
    CombinationLimitExceeded {
        m: usize,
        choose_n: usize,
        count: String,
        limit: usize,
    },

    #[error("failed to derive unseal key for combination {index}: {reason}")]
    KeyDerivationFailed { index: usize, reason: String },

    // envelopes
    #[error("failed to encrypt root key: {0}")]
    WrapFailed(String),

    #[error("failed to encrypt data: {0}")]
    EncryptFailed(String),

    #[error("failed to decrypt root key")]
    UnwrapFailed,

    #[error("failed to decrypt data")]
    DecryptFailed,

    // provisioning
    #[error("invalid unseal mode '{0}', expected sysinfo, N or M-of-N")]
    InvalidUnsealMode(String),

    #[error("invalid unseal mode M value '{0}'")]
    InvalidMValue(String),

    #[error("invalid unseal mode N value '{0}'")]
    InvalidNValue(String),

    #[error("invalid unseal mode {m}-of-{n}: M must be positive and not greater than N")]
    InvalidMNValues { m: i64, n: i64 },

    #[error("expected {expected} unseal files, got {got}")]
    FileCountMismatch { expected: usize, got: usize },

    #[error("failed to read unseal file {path}: {source}")]
    FileReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse unseal key file {path}: {reason}")]
    KeyParseFailed { path: PathBuf, reason: String },

    // fingerprint
    #[error("failed to collect system info: {0}")]
    SysInfoCollectionFailed(String),

    #[error("no system info fields available for unseal")]
    EmptySysInfo,

    #[error("failed to generate random unseal key: {0}")]
    RandomGenerationFailed(String),

    #[error("unseal key service is shut down")]
    ServiceShutDown,
}

/// Result type for unseal operations
pub type UnsealResult<T> = Result<T, UnsealError>;
