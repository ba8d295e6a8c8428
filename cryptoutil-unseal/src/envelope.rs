//! Multi-recipient envelopes over a derived key set
//!
//! The payload is sealed once with a random content-encryption key (CEK) using
//! AES-256-GCM. The CEK is then sealed separately under every derived key, so any
//! single key that existed at encryption time can open the envelope.
//!
//! Wire form (JSON):
//!
//! ```text
//! {"v":1,"cty":"bytes","recipients":[{"kid":..,"nonce":..,"encrypted_key":..}],"nonce":..,"ciphertext":..}
//! ```
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
use crate::jwk::Jwk;
use crate::key_types::{DerivedKey, DerivedKeySet, DERIVED_KEY_LEN};
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

pub const ENVELOPE_VERSION: u8 = 1;
const NONCE_LEN: usize = 12;

/// What an envelope carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// A serialized JWK
    Jwk,
    /// Opaque bytes
    Bytes,
}

impl ContentType {
    fn as_str(&self) -> &'static str {
        match self {
            ContentType::Jwk => "jwk",
            ContentType::Bytes => "bytes",
        }
    }
}

/// CEK sealed under one derived key
#[derive(Debug, Serialize, Deserialize)]
struct Recipient {
    kid: String,
    nonce: String,
    encrypted_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    v: u8,
    cty: ContentType,
    recipients: Vec<Recipient>,
    nonce: String,
    ciphertext: String,
}

/// Associated data binding the payload to the envelope version and content type
fn payload_aad(version: u8, cty: ContentType) -> Vec<u8> {
    format!("cryptoutil-envelope:v{}:{}", version, cty.as_str()).into_bytes()
}

fn cipher_for(material: &[u8]) -> Result<Aes256Gcm, String> {
    Aes256Gcm::new_from_slice(material).map_err(|e| format!("Cipher init error: {}", e))
}

/// Seal `plaintext` for every key in the set
fn seal(keys: &DerivedKeySet, cty: ContentType, plaintext: &[u8]) -> Result<Vec<u8>, String> {
    let mut cek = Zeroizing::new([0u8; DERIVED_KEY_LEN]);
    OsRng
        .try_fill_bytes(&mut cek[..])
        .map_err(|e| format!("Random CEK generation failed: {}", e))?;

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let aad = payload_aad(ENVELOPE_VERSION, cty);
    let ciphertext = cipher_for(&cek[..])?
        .encrypt(
            &nonce,
            Payload {
                msg: plaintext,
                aad: &aad,
            },
        )
        .map_err(|e| format!("Encryption failed: {}", e))?;

    let mut recipients = Vec::with_capacity(keys.len());
    for key in keys.iter() {
        let key_nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let encrypted_key = cipher_for(key.material())?
            .encrypt(
                &key_nonce,
                Payload {
                    msg: &cek[..],
                    aad: key.id().as_bytes(),
                },
            )
            .map_err(|e| format!("Key wrap failed for recipient {}: {}", recipients.len(), e))?;
        recipients.push(Recipient {
            kid: key.id().to_string(),
            nonce: hex::encode(key_nonce),
            encrypted_key: hex::encode(encrypted_key),
        });
    }

    let envelope = Envelope {
        v: ENVELOPE_VERSION,
        cty,
        recipients,
        nonce: hex::encode(nonce),
        ciphertext: hex::encode(ciphertext),
    };
    debug!(
        recipients = envelope.recipients.len(),
        cty = cty.as_str(),
        "Sealed envelope"
    );
    serde_json::to_vec(&envelope).map_err(|e| format!("Serialization failed: {}", e))
}

fn decode_nonce(hex_nonce: &str) -> Option<Vec<u8>> {
    let nonce = hex::decode(hex_nonce).ok()?;
    if nonce.len() != NONCE_LEN {
        return None;
    }
    Some(nonce)
}

/// Try one recipient entry with one candidate key
fn open_with(
    key: &DerivedKey,
    recipient: &Recipient,
    envelope: &Envelope,
    ciphertext: &[u8],
    nonce: &[u8],
) -> Option<Zeroizing<Vec<u8>>> {
    let key_nonce = decode_nonce(&recipient.nonce)?;
    let encrypted_key = hex::decode(&recipient.encrypted_key).ok()?;
    let cek = Zeroizing::new(
        cipher_for(key.material())
            .ok()?
            .decrypt(
                Nonce::from_slice(&key_nonce),
                Payload {
                    msg: &encrypted_key,
                    aad: key.id().as_bytes(),
                },
            )
            .ok()?,
    );
    if cek.len() != DERIVED_KEY_LEN {
        return None;
    }

    let aad = payload_aad(envelope.v, envelope.cty);
    let plaintext = cipher_for(&cek)
        .ok()?
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad: &aad,
            },
        )
        .ok()?;
    Some(Zeroizing::new(plaintext))
}

/// Trial-decrypt with each key in set order; `None` covers every failure alike
fn open(keys: &DerivedKeySet, cty: ContentType, bytes: &[u8]) -> Option<Zeroizing<Vec<u8>>> {
    let envelope: Envelope = serde_json::from_slice(bytes).ok()?;
    if envelope.v != ENVELOPE_VERSION || envelope.cty != cty {
        return None;
    }
    let nonce = decode_nonce(&envelope.nonce)?;
    let ciphertext = hex::decode(&envelope.ciphertext).ok()?;

    keys.iter().find_map(|key| {
        envelope
            .recipients
            .iter()
            .filter(|recipient| recipient.kid == key.id())
            .find_map(|recipient| open_with(key, recipient, &envelope, &ciphertext, &nonce))
    })
}

/// Serialize `clear_key` and seal it for every key in the set
pub fn wrap_key(keys: &DerivedKeySet, clear_key: &Jwk) -> UnsealResult<Vec<u8>> {
    let serialized = Zeroizing::new(
        serde_json::to_vec(clear_key)
            .map_err(|e| UnsealError::WrapFailed(format!("Serialization failed: {}", e)))?,
    );
    seal(keys, ContentType::Jwk, &serialized).map_err(UnsealError::WrapFailed)
}

/// Open a wrapped key; fails alike for wrong keys and malformed envelopes
pub fn unwrap_key(keys: &DerivedKeySet, envelope: &[u8]) -> UnsealResult<Jwk> {
    let serialized = open(keys, ContentType::Jwk, envelope).ok_or(UnsealError::UnwrapFailed)?;
    serde_json::from_slice(&serialized).map_err(|_| UnsealError::UnwrapFailed)
}

/// Seal opaque bytes for every key in the set. Empty payloads are rejected.
pub fn encrypt_data(keys: &DerivedKeySet, plaintext: &[u8]) -> UnsealResult<Vec<u8>> {
    if plaintext.is_empty() {
        return Err(UnsealError::EncryptFailed("data can't be empty".to_string()));
    }
    seal(keys, ContentType::Bytes, plaintext).map_err(UnsealError::EncryptFailed)
}

/// Open sealed bytes; fails alike for wrong keys and malformed envelopes
pub fn decrypt_data(keys: &DerivedKeySet, envelope: &[u8]) -> UnsealResult<Vec<u8>> {
    let plaintext = open(keys, ContentType::Bytes, envelope).ok_or(UnsealError::DecryptFailed)?;
    Ok(plaintext.to_vec())
}
