//! Barrier unseal key service
//!
//! Holds the derived key set for the lifetime of the instance and exposes the
//! four envelope operations. `shutdown` takes the write side of the gate, so it
//! waits for in-flight operations and zeroes key material in place.
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
use crate::envelope;
use crate::error::{UnsealError, UnsealResult};
use crate::jwk::Jwk;
use crate::key_types::{DerivedKeySet, KeyId};
use crate::provisioning::{provision, UnsealMode};
use cryptoutil_config::UnsealSettings;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::info;

struct ServiceState {
    keys: DerivedKeySet,
    closed: bool,
}

/// Unseal key service over one derived key set
pub struct UnsealKeysService {
    mode: UnsealMode,
    state: RwLock<ServiceState>,
}

impl UnsealKeysService {
    /// Build the service for the configured unseal mode
    pub async fn from_settings(settings: &UnsealSettings) -> UnsealResult<Self> {
        let (mode, keys) = provision(settings).await?;
        Ok(Self::new(mode, keys))
    }

    /// Build the service directly from in-memory shared secrets
    pub fn from_shared_secrets<S: AsRef<[u8]>>(
        shares: &[S],
        choose_n: usize,
        max_combinations: usize,
    ) -> UnsealResult<Self> {
        let keys = derive_key_set(shares, choose_n, max_combinations)?;
        let mode = UnsealMode::Threshold {
            m: choose_n,
            n: shares.len(),
        };
        Ok(Self::new(mode, keys))
    }

    fn new(mode: UnsealMode, keys: DerivedKeySet) -> Self {
        info!(
            mode = mode.kind(),
            keys = keys.len(),
            "Unseal key service ready"
        );
        Self {
            mode,
            state: RwLock::new(ServiceState {
                keys,
                closed: false,
            }),
        }
    }

    /// Provisioning mode this instance was built with
    pub fn mode(&self) -> UnsealMode {
        self.mode
    }

    async fn keys(&self) -> UnsealResult<RwLockReadGuard<'_, ServiceState>> {
        let state = self.state.read().await;
        if state.closed {
            return Err(UnsealError::ServiceShutDown);
        }
        Ok(state)
    }

    /// Ids of the derived keys, in derivation order
    pub async fn key_ids(&self) -> UnsealResult<Vec<KeyId>> {
        Ok(self.keys().await?.keys.ids())
    }

    /// Wrap a key so any derived key of this set can unwrap it
    pub async fn wrap_key(&self, clear_key: &Jwk) -> UnsealResult<Vec<u8>> {
        let state = self.keys().await?;
        envelope::wrap_key(&state.keys, clear_key)
    }

    /// Unwrap a key wrapped by any instance sharing a derived key with this one
    pub async fn unwrap_key(&self, wrapped: &[u8]) -> UnsealResult<Jwk> {
        let state = self.keys().await?;
        envelope::unwrap_key(&state.keys, wrapped)
    }

    /// Encrypt bytes for every derived key of this set
    pub async fn encrypt_data(&self, plaintext: &[u8]) -> UnsealResult<Vec<u8>> {
        let state = self.keys().await?;
        envelope::encrypt_data(&state.keys, plaintext)
    }

    /// Decrypt bytes encrypted by any instance sharing a derived key with this one
    pub async fn decrypt_data(&self, ciphertext: &[u8]) -> UnsealResult<Vec<u8>> {
        let state = self.keys().await?;
        envelope::decrypt_data(&state.keys, ciphertext)
    }

    /// Zero all derived key material. Idempotent.
    pub async fn shutdown(&self) {
        let mut state = self.state.write().await;
        if state.closed {
            return;
        }
        state.keys.wipe();
        state.closed = true;
        info!(mode = self.mode.kind(), "Unseal key service shut down");
    }

    /// Whether `shutdown` has run
    pub async fn is_shut_down(&self) -> bool {
        self.state.read().await.closed
    }

    #[cfg(test)]
    async fn is_wiped(&self) -> bool {
        self.state.read().await.keys.is_wiped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn shares() -> Vec<Vec<u8>> {
        (0..3).map(|i| vec![0x40 + i as u8; 32]).collect()
    }

    fn service() -> UnsealKeysService {
        UnsealKeysService::from_shared_secrets(&shares(), 2, 4096).unwrap()
    }

    #[tokio::test]
    async fn test_operations_round_trip() {
        let service = service();
        assert_eq!(service.mode(), UnsealMode::Threshold { m: 2, n: 3 });
        assert_eq!(service.key_ids().await.unwrap().len(), 3);

        let sealed = service.encrypt_data(b"barrier payload").await.unwrap();
        assert_eq!(service.decrypt_data(&sealed).await.unwrap(), b"barrier payload");

        let root = Jwk::generate_oct256(Some("root".to_string())).unwrap();
        let wrapped = service.wrap_key(&root).await.unwrap();
        assert_eq!(service.unwrap_key(&wrapped).await.unwrap(), root);
    }

    #[tokio::test]
    async fn test_shutdown_zeroes_material() {
        let service = service();
        assert!(!service.is_wiped().await);

        service.shutdown().await;
        assert!(service.is_shut_down().await);
        assert!(service.is_wiped().await);

        // second call is a no-op
        service.shutdown().await;
        assert!(service.is_wiped().await);
    }

    #[tokio::test]
    async fn test_operations_refused_after_shutdown() {
        let service = service();
        let sealed = service.encrypt_data(b"before").await.unwrap();
        service.shutdown().await;

        assert!(matches!(
            service.decrypt_data(&sealed).await,
            Err(UnsealError::ServiceShutDown)
        ));
        assert!(matches!(
            service.encrypt_data(b"after").await,
            Err(UnsealError::ServiceShutDown)
        ));
        assert!(matches!(
            service.key_ids().await,
            Err(UnsealError::ServiceShutDown)
        ));
        let root = Jwk::generate_oct256(None).unwrap();
        assert!(service.wrap_key(&root).await.is_err());
        assert!(service.unwrap_key(&sealed).await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_use_then_shutdown() {
        let service = Arc::new(service());
        let mut handles = Vec::new();
        for i in 0..16u8 {
            let service = Arc::clone(&service);
            handles.push(tokio::spawn(async move {
                let payload = vec![i; 64];
                let sealed = service.encrypt_data(&payload).await?;
                let opened = service.decrypt_data(&sealed).await?;
                assert_eq!(opened, payload);
                Ok::<_, UnsealError>(())
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        service.shutdown().await;
        assert!(service.is_wiped().await);
    }

    #[tokio::test]
    async fn test_from_settings() {
        let service = UnsealKeysService::from_settings(&UnsealSettings::ephemeral_dev())
            .await
            .unwrap();
        assert_eq!(service.mode(), UnsealMode::EphemeralDev);
        assert_eq!(service.key_ids().await.unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_shares_fail_construction() {
        let short = vec![vec![0u8; 16]];
        assert!(matches!(
            UnsealKeysService::from_shared_secrets(&short, 1, 4096),
            Err(UnsealError::ShareTooShortAt { index: 0, .. })
        ));
    }
}
