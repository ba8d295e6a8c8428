//! JSON Web Key records (RFC 7517)
//!
//! Unseal key files in simple mode hold one JWK each, and `wrap_key`/`unwrap_key`
//! carry a JWK through an envelope. Key algorithms form a closed set, so every
//! `match` over [`KeyParams`] is exhaustive.
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


use crate::error::{UnsealError, UnsealResult};
use crate::key_types::DERIVED_KEY_LEN;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Key-type specific parameters, tagged by `kty`
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(tag = "kty")]
pub enum KeyParams {
    #[serde(rename = "oct")]
    Oct { k: String },

    #[serde(rename = "RSA")]
    Rsa {
        n: String,
        e: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        d: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        p: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        q: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dp: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dq: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        qi: Option<String>,
    },

    #[serde(rename = "EC")]
    Ec {
        crv: String,
        x: String,
        y: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        d: Option<String>,
    },

    #[serde(rename = "OKP")]
    Okp {
        crv: String,
        x: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        d: Option<String>,
    },
}

/// A JSON Web Key
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Jwk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    #[serde(flatten)]
    pub params: KeyParams,
}

impl Jwk {
    /// Generate a random AES-256 key-wrapping JWK
    pub fn generate_oct256(kid: Option<String>) -> UnsealResult<Self> {
        let mut raw = Zeroizing::new([0u8; DERIVED_KEY_LEN]);
        OsRng
            .try_fill_bytes(&mut raw[..])
            .map_err(|e| UnsealError::RandomGenerationFailed(e.to_string()))?;

        Ok(Self {
            kid,
            alg: Some("A256GCMKW".to_string()),
            key_use: Some("enc".to_string()),
            params: KeyParams::Oct {
                k: URL_SAFE_NO_PAD.encode(&raw[..]),
            },
        })
    }

    /// The `kty` member
    pub fn kty(&self) -> &'static str {
        match &self.params {
            KeyParams::Oct { .. } => "oct",
            KeyParams::Rsa { .. } => "RSA",
            KeyParams::Ec { .. } => "EC",
            KeyParams::Okp { .. } => "OKP",
        }
    }

    /// Whether the record carries private (or symmetric) key material
    pub fn is_private(&self) -> bool {
        match &self.params {
            KeyParams::Oct { .. } => true,
            KeyParams::Rsa { d, .. } | KeyParams::Ec { d, .. } | KeyParams::Okp { d, .. } => {
                d.is_some()
            }
        }
    }

    /// Raw bytes of a 256-bit symmetric key
    pub fn aes256_key(&self) -> Result<Zeroizing<[u8; DERIVED_KEY_LEN]>, String> {
        let k = match &self.params {
            KeyParams::Oct { k } => k,
            KeyParams::Rsa { .. } | KeyParams::Ec { .. } | KeyParams::Okp { .. } => {
                return Err(format!("expected kty oct, got {}", self.kty()));
            }
        };
        let decoded = Zeroizing::new(
            URL_SAFE_NO_PAD
                .decode(k.trim_end_matches('='))
                .map_err(|e| format!("invalid base64url k: {}", e))?,
        );
        if decoded.len() != DERIVED_KEY_LEN {
            return Err(format!(
                "expected {} byte key, got {} bytes",
                DERIVED_KEY_LEN,
                decoded.len()
            ));
        }
        let mut key = Zeroizing::new([0u8; DERIVED_KEY_LEN]);
        key.copy_from_slice(&decoded);
        Ok(key)
    }

    /// RFC 7638 SHA-256 thumbprint, base64url encoded
    pub fn thumbprint(&self) -> String {
        let mut members: BTreeMap<&str, &str> = BTreeMap::new();
        members.insert("kty", self.kty());
        match &self.params {
            KeyParams::Oct { k } => {
                members.insert("k", k);
            }
            KeyParams::Rsa { n, e, .. } => {
                members.insert("n", n);
                members.insert("e", e);
            }
            KeyParams::Ec { crv, x, y, .. } => {
                members.insert("crv", crv);
                members.insert("x", x);
                members.insert("y", y);
            }
            KeyParams::Okp { crv, x, .. } => {
                members.insert("crv", crv);
                members.insert("x", x);
            }
        }
        // BTreeMap keeps members in lexicographic order with no whitespace
        let canonical = Zeroizing::new(serde_json::to_string(&members).unwrap_or_default());
        URL_SAFE_NO_PAD.encode(Sha256::digest(canonical.as_bytes()))
    }

    /// Key id, falling back to the thumbprint
    pub fn key_id(&self) -> String {
        self.kid.clone().unwrap_or_else(|| self.thumbprint())
    }
}

impl fmt::Debug for Jwk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Jwk")
            .field("kid", &self.kid)
            .field("kty", &self.kty())
            .field("alg", &self.alg)
            .field("private", &self.is_private())
            .finish()
    }
}
