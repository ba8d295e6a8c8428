//! Unseal mode selection and share loading
//!
//! Mode grammar: `sysinfo` | `N` | `M-of-N`. The ephemeral development mode is
//! never parsed from the mode string; it is only selected by the explicit
//! `dev_mode` setting.
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


use crate::derivation::derive_key_set;
use crate::error::{UnsealError, UnsealResult};
use crate::fingerprint::{self, fingerprint_choose_n};
use crate::jwk::Jwk;
use crate::key_types::{DerivedKey, DerivedKeySet};
use crate::validator::{MAX_SHARE_LEN, MIN_SHARE_LEN};
use cryptoutil_config::UnsealSettings;
use rand::{rngs::OsRng, RngCore};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::debug;
use zeroize::Zeroizing;

const FINGERPRINT_MODE: &str = "sysinfo";
const THRESHOLD_SEPARATOR: &str = "-of-";
/// Upper bound on a JWK unseal key file
pub const MAX_KEY_FILE_LEN: usize = 64 * 1024;

/// How the derived key set is provisioned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsealMode {
    /// `n` pre-existing JWK unseal keys, each its own recipient
    Simple { n: usize },
    /// Any `m` of `n` shared-secret files
    Threshold { m: usize, n: usize },
    /// Shares collected from the host
    Fingerprint,
    /// One random key, local development only
    EphemeralDev,
}

impl UnsealMode {
    /// Pick the mode for `settings`; `dev_mode` wins over the mode string
    pub fn select(settings: &UnsealSettings) -> UnsealResult<Self> {
        if settings.dev_mode {
            return Ok(UnsealMode::EphemeralDev);
        }
        settings.mode.parse()
    }

    /// Short name for logs and reports
    pub fn kind(&self) -> &'static str {
        match self {
            UnsealMode::Simple { .. } => "simple",
            UnsealMode::Threshold { .. } => "threshold",
            UnsealMode::Fingerprint => "fingerprint",
            UnsealMode::EphemeralDev => "ephemeral-dev",
        }
    }

    /// Number of files the mode reads, if it reads files at all
    pub fn expected_files(&self) -> Option<usize> {
        match self {
            UnsealMode::Simple { n } | UnsealMode::Threshold { n, .. } => Some(*n),
            UnsealMode::Fingerprint | UnsealMode::EphemeralDev => None,
        }
    }
}

impl FromStr for UnsealMode {
    type Err = UnsealError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == FINGERPRINT_MODE {
            return Ok(UnsealMode::Fingerprint);
        }

        if let Some((m_str, n_str)) = s.split_once(THRESHOLD_SEPARATOR) {
            let m = parse_count(m_str).ok_or_else(|| UnsealError::InvalidMValue(m_str.to_string()))?;
            let n = parse_count(n_str).ok_or_else(|| UnsealError::InvalidNValue(n_str.to_string()))?;
            if m <= 0 || m > n {
                return Err(UnsealError::InvalidMNValues { m, n });
            }
            let m = usize::try_from(m).map_err(|_| UnsealError::InvalidMValue(m_str.to_string()))?;
            let n = usize::try_from(n).map_err(|_| UnsealError::InvalidNValue(n_str.to_string()))?;
            return Ok(UnsealMode::Threshold { m, n });
        }

        match parse_count(s) {
            Some(n) if n > 0 => usize::try_from(n)
                .map(|n| UnsealMode::Simple { n })
                .map_err(|_| UnsealError::InvalidNValue(s.to_string())),
            Some(_) | None => Err(UnsealError::InvalidUnsealMode(s.to_string())),
        }
    }
}

/// Plain decimal digits only: no sign, no leading zeros
fn parse_count(s: &str) -> Option<i64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if s.len() > 1 && s.starts_with('0') {
        return None;
    }
    s.parse().ok()
}

impl fmt::Display for UnsealMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnsealMode::Simple { n } => write!(f, "{}", n),
            UnsealMode::Threshold { m, n } => write!(f, "{}{}{}", m, THRESHOLD_SEPARATOR, n),
            UnsealMode::Fingerprint => f.write_str(FINGERPRINT_MODE),
            UnsealMode::EphemeralDev => f.write_str("ephemeral-dev"),
        }
    }
}

/// Select the mode and build its derived key set
pub async fn provision(settings: &UnsealSettings) -> UnsealResult<(UnsealMode, DerivedKeySet)> {
    let mode = UnsealMode::select(settings)?;
    if let Some(expected) = mode.expected_files() {
        if settings.files.len() != expected {
            return Err(UnsealError::FileCountMismatch {
                expected,
                got: settings.files.len(),
            });
        }
    }

    let keys = match mode {
        UnsealMode::Simple { .. } => simple_key_set(&settings.files).await?,
        UnsealMode::Threshold { m, .. } => {
            let shares = read_shares(&settings.files).await?;
            derive_key_set(&shares, m, settings.max_combinations)?
        }
        UnsealMode::Fingerprint => {
            let shares = fingerprint::collect(settings.fingerprint_timeout()).await?;
            if shares.is_empty() {
                return Err(UnsealError::EmptySysInfo);
            }
            let choose_n = fingerprint_choose_n(shares.len());
            derive_key_set(&shares, choose_n, settings.max_combinations)?
        }
        UnsealMode::EphemeralDev => {
            let share = ephemeral_share()?;
            derive_key_set(std::slice::from_ref(&share), 1, settings.max_combinations)?
        }
    };

    Ok((mode, keys))
}

/// Read at most `limit` bytes of `path`
async fn read_bounded(path: &Path, limit: usize) -> UnsealResult<Zeroizing<Vec<u8>>> {
    let read_failed = |source| UnsealError::FileReadFailed {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).await.map_err(read_failed)?;
    let mut contents = Zeroizing::new(Vec::new());
    file.take(limit as u64)
        .read_to_end(&mut contents)
        .await
        .map_err(read_failed)?;
    Ok(contents)
}

/// Read raw shared-secret files in order.
///
/// Reads stop one byte past the share length limit, so an oversized file (or a
/// device that never ends) is rejected by validation instead of being loaded.
pub async fn read_shares(paths: &[PathBuf]) -> UnsealResult<Vec<Zeroizing<Vec<u8>>>> {
    let mut shares = Vec::with_capacity(paths.len());
    for path in paths {
        let share = read_bounded(path, MAX_SHARE_LEN + 1).await?;
        debug!(path = %path.display(), "Read unseal shared secret");
        shares.push(share);
    }
    Ok(shares)
}

/// Read one JWK unseal key file
pub async fn read_jwk(path: &Path) -> UnsealResult<Jwk> {
    let contents = read_bounded(path, MAX_KEY_FILE_LEN + 1).await?;
    if contents.len() > MAX_KEY_FILE_LEN {
        return Err(UnsealError::KeyParseFailed {
            path: path.to_path_buf(),
            reason: format!("key file is larger than {} bytes", MAX_KEY_FILE_LEN),
        });
    }
    serde_json::from_slice(&contents).map_err(|e| UnsealError::KeyParseFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Each JWK file becomes one derived key used as-is
async fn simple_key_set(paths: &[PathBuf]) -> UnsealResult<DerivedKeySet> {
    let mut keys = Vec::with_capacity(paths.len());
    for path in paths {
        let jwk = read_jwk(path).await?;
        let material = jwk.aes256_key().map_err(|reason| UnsealError::KeyParseFailed {
            path: path.clone(),
            reason,
        })?;
        keys.push(DerivedKey::new(jwk.key_id(), *material));
    }
    DerivedKeySet::new(keys).ok_or(UnsealError::FileCountMismatch {
        expected: paths.len(),
        got: 0,
    })
}

/// Random share of random length in the valid range
fn ephemeral_share() -> UnsealResult<Zeroizing<Vec<u8>>> {
    let mut len_byte = [0u8; 1];
    OsRng
        .try_fill_bytes(&mut len_byte)
        .map_err(|e| UnsealError::RandomGenerationFailed(e.to_string()))?;
    let len = MIN_SHARE_LEN + usize::from(len_byte[0]) % (MAX_SHARE_LEN - MIN_SHARE_LEN + 1);

    let mut share = Zeroizing::new(vec![0u8; len]);
    OsRng
        .try_fill_bytes(&mut share[..])
        .map_err(|e| UnsealError::RandomGenerationFailed(e.to_string()))?;
    Ok(share)
}
