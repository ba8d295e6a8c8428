//! Barrier unseal key service for cryptoutil
//!
//! Derives the key-encrypting keys that protect every other secret in the
//! platform. Raw shares (files or a host fingerprint) are never persisted; only
//! a deterministic HKDF derivation over every M-choose-N share combination is
//! held in memory, and envelopes are recoverable by any one of those keys.
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


pub mod combinations;
pub mod derivation;
pub mod envelope;
pub mod error;
pub mod fingerprint;
pub mod jwk;
pub mod key_types;
pub mod provisioning;
pub mod service;
pub mod validator;

pub use error::{UnsealError, UnsealResult};
pub use jwk::{Jwk, KeyParams};
pub use key_types::{DerivedKey, DerivedKeySet, KeyId, RawShare};
pub use provisioning::UnsealMode;
pub use service::UnsealKeysService;
