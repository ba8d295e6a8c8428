//! Derived key definitions
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


use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Unique identifier for a derived key
pub type KeyId = String;

/// Raw secret share as supplied by an operator or the environment
pub type RawShare = Vec<u8>;

/// Symmetric key length of every derived key (AES-256)
pub const DERIVED_KEY_LEN: usize = 32;

/// A key-encrypting key computed from one share combination (or loaded as-is in
/// simple mode). Material is zeroized on drop and on service shutdown.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    id: KeyId,
    material: [u8; DERIVED_KEY_LEN],
}

impl DerivedKey {
    pub fn new(id: KeyId, material: [u8; DERIVED_KEY_LEN]) -> Self {
        Self { id, material }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn material(&self) -> &[u8; DERIVED_KEY_LEN] {
        &self.material
    }

    /// Overwrite the key material with zeros, keeping the id
    pub(crate) fn wipe(&mut self) {
        self.material.zeroize();
    }

    #[cfg(test)]
    pub(crate) fn is_wiped(&self) -> bool {
        self.material.iter().all(|b| *b == 0)
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKey")
            .field("id", &self.id)
            .field("material", &"<redacted>")
            .finish()
    }
}

/// Ordered, non-empty set of derived keys; one per combination.
#[derive(Debug)]
pub struct DerivedKeySet {
    keys: Vec<DerivedKey>,
}

impl DerivedKeySet {
    /// Returns `None` for an empty key list
    pub fn new(keys: Vec<DerivedKey>) -> Option<Self> {
        if keys.is_empty() {
            None
        } else {
            Some(Self { keys })
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DerivedKey> {
        self.keys.iter()
    }

    pub fn ids(&self) -> Vec<KeyId> {
        self.keys.iter().map(|k| k.id.clone()).collect()
    }

    pub(crate) fn wipe(&mut self) {
        for key in &mut self.keys {
            key.wipe();
        }
    }

    #[cfg(test)]
    pub(crate) fn is_wiped(&self) -> bool {
        self.keys.iter().all(DerivedKey::is_wiped)
    }
}
