//! Deterministic unseal key derivation from share combinations
//!
//! Each combination's shares are concatenated in combination order and fed to
//! HKDF-SHA256 twice, with distinct info strings for the key id and the key
//! material. Identical shares and `choose_n` always produce identical key sets,
//! which is what lets a restarted instance unseal with the same shares.
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


use crate::combinations::generate_combinations;
use crate::error::{UnsealError, UnsealResult};
use crate::key_types::{DerivedKey, DerivedKeySet, DERIVED_KEY_LEN};
use crate::validator::{validate_present_shares, MAX_SHARE_LEN};
use hkdf::Hkdf;
use sha2::Sha256;
use tracing::debug;
use zeroize::Zeroizing;

const KEY_ID_INFO: &[u8] = b"cryptoutil barrier unseal key id v1";
const KEY_MATERIAL_INFO: &[u8] = b"cryptoutil barrier unseal key material v1";

/// Derive the key for one combination (`index` is the combination's position,
/// used for diagnostics only)
pub fn derive_key<S: AsRef<[u8]>>(
    index: usize,
    shares: &[S],
    combination: &[usize],
) -> UnsealResult<DerivedKey> {
    let mut ikm = Zeroizing::new(Vec::with_capacity(combination.len() * MAX_SHARE_LEN));
    for &share_index in combination {
        let share = shares
            .get(share_index)
            .ok_or_else(|| UnsealError::KeyDerivationFailed {
                index,
                reason: format!("share index {} out of range", share_index),
            })?;
        ikm.extend_from_slice(share.as_ref());
    }

    let hkdf = Hkdf::<Sha256>::new(None, &ikm);

    let mut id_bytes = Zeroizing::new([0u8; 16]);
    hkdf.expand(KEY_ID_INFO, &mut id_bytes[..])
        .map_err(|e| UnsealError::KeyDerivationFailed {
            index,
            reason: format!("HKDF error: {}", e),
        })?;
    let id = uuid::Builder::from_random_bytes(*id_bytes)
        .into_uuid()
        .to_string();

    let mut material = Zeroizing::new([0u8; DERIVED_KEY_LEN]);
    hkdf.expand(KEY_MATERIAL_INFO, &mut material[..])
        .map_err(|e| UnsealError::KeyDerivationFailed {
            index,
            reason: format!("HKDF error: {}", e),
        })?;

    Ok(DerivedKey::new(id, *material))
}

/// Validate the shares, enumerate every `choose_n` combination and derive one key each
pub fn derive_key_set<S: AsRef<[u8]>>(
    shares: &[S],
    choose_n: usize,
    max_combinations: usize,
) -> UnsealResult<DerivedKeySet> {
    validate_present_shares(shares, choose_n)?;

    let combinations = generate_combinations(shares.len(), choose_n, max_combinations)?;
    let keys = combinations
        .iter()
        .enumerate()
        .map(|(index, combination)| derive_key(index, shares, combination))
        .collect::<UnsealResult<Vec<_>>>()?;

    debug!(
        shares = shares.len(),
        choose_n = choose_n,
        combinations = keys.len(),
        "Derived unseal keys"
    );

    DerivedKeySet::new(keys).ok_or(UnsealError::CombinationComputeFailed {
        m: shares.len(),
        choose_n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_LIMIT: usize = usize::MAX;

    fn test_shares(count: usize, len: usize) -> Vec<Vec<u8>> {
        (0..count)
            .map(|i| (0..len).map(|j| (i * 10 + j) as u8).collect())
            .collect()
    }

    #[test]
    fn test_deterministic() {
        let shares = test_shares(5, 32);
        let a = derive_key_set(&shares, 3, NO_LIMIT).unwrap();
        let b = derive_key_set(&shares, 3, NO_LIMIT).unwrap();

        assert_eq!(a.len(), 10);
        assert_eq!(a.ids(), b.ids());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.material(), y.material());
        }
    }

    #[test]
    fn test_ids_and_material_are_independent() {
        let shares = test_shares(3, 32);
        let set = derive_key_set(&shares, 2, NO_LIMIT).unwrap();
        for key in set.iter() {
            assert_ne!(key.id().as_bytes(), &key.material()[..]);
            assert_eq!(key.id().len(), 36);
        }

        let ids = set.ids();
        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn test_combination_order_matters() {
        let shares = test_shares(2, 32);
        let forward = derive_key(0, &shares, &[0, 1]).unwrap();
        let reverse = derive_key(0, &shares, &[1, 0]).unwrap();
        assert_ne!(forward.id(), reverse.id());
        assert_ne!(forward.material(), reverse.material());
    }

    #[test]
    fn test_different_shares_different_keys() {
        let shares = test_shares(3, 32);
        let mut changed = shares.clone();
        changed[2][0] ^= 0xFF;

        let a = derive_key_set(&shares, 3, NO_LIMIT).unwrap();
        let b = derive_key_set(&changed, 3, NO_LIMIT).unwrap();
        assert_ne!(a.ids(), b.ids());
    }

    #[test]
    fn test_partial_overlap_shares_a_key() {
        // 2-of-3 sets that agree on shares 0 and 1 share exactly the [0, 1] key
        let shares = test_shares(3, 32);
        let mut changed = shares.clone();
        changed[2][5] ^= 0x01;

        let a = derive_key_set(&shares, 2, NO_LIMIT).unwrap().ids();
        let b = derive_key_set(&changed, 2, NO_LIMIT).unwrap().ids();
        assert_eq!(a[0], b[0]);
        assert_ne!(a[1], b[1]);
        assert_ne!(a[2], b[2]);
    }

    #[test]
    fn test_validation_runs_first() {
        let shares = vec![vec![0u8; 32], vec![0u8; 31]];
        assert!(matches!(
            derive_key_set(&shares, 1, NO_LIMIT),
            Err(UnsealError::ShareTooShortAt { index: 1, .. })
        ));
    }

    #[test]
    fn test_bad_share_index_reports_combination() {
        let shares = test_shares(2, 32);
        let err = derive_key(4, &shares, &[0, 7]).unwrap_err();
        assert!(matches!(err, UnsealError::KeyDerivationFailed { index: 4, .. }));
    }

    #[test]
    fn test_limit_enforced() {
        let shares = test_shares(10, 32);
        assert!(matches!(
            derive_key_set(&shares, 5, 100),
            Err(UnsealError::CombinationLimitExceeded { .. })
        ));
    }
}
