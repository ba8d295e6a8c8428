//! Share count and length policy, checked before any derivation
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

/// Maximum number of shares in one service instance
pub const MAX_SHARES: usize = 256;
/// Minimum share length in bytes
pub const MIN_SHARE_LEN: usize = 32;
/// Maximum share length in bytes
pub const MAX_SHARE_LEN: usize = 64;

/// Validate a share list and `choose_n`.
///
/// Checks run in a fixed order and the first failure wins:
/// list absent, list empty, too many shares, then per share (absent, too short,
/// too long), then `choose_n` zero, negative, greater than the share count.
pub fn validate_shares<S: AsRef<[u8]>>(
    shares: Option<&[Option<S>]>,
    choose_n: i64,
) -> UnsealResult<()> {
    let shares = shares.ok_or(UnsealError::SharesNil)?;
    if shares.is_empty() {
        return Err(UnsealError::SharesEmpty);
    }
    if shares.len() > MAX_SHARES {
        return Err(UnsealError::SharesTooMany {
            count: shares.len(),
        });
    }

    for (index, share) in shares.iter().enumerate() {
        let len = match share {
            Some(share) => share.as_ref().len(),
            None => return Err(UnsealError::ShareNilAt(index)),
        };
        if len < MIN_SHARE_LEN {
            return Err(UnsealError::ShareTooShortAt { index, len });
        }
        if len > MAX_SHARE_LEN {
            return Err(UnsealError::ShareTooLongAt { index, len });
        }
    }

    if choose_n == 0 {
        return Err(UnsealError::ChooseNZero);
    }
    if choose_n < 0 {
        return Err(UnsealError::ChooseNNegative(choose_n));
    }
    if choose_n as u64 > shares.len() as u64 {
        return Err(UnsealError::ChooseNExceedsCount {
            choose_n,
            count: shares.len(),
        });
    }

    Ok(())
}

/// Validate shares that are all present
pub fn validate_present_shares<S: AsRef<[u8]>>(shares: &[S], choose_n: usize) -> UnsealResult<()> {
    let present: Vec<Option<&[u8]>> = shares.iter().map(|s| Some(s.as_ref())).collect();
    let choose_n = i64::try_from(choose_n).unwrap_or(i64::MAX);
    validate_shares(Some(present.as_slice()), choose_n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shares(count: usize, len: usize) -> Vec<Option<Vec<u8>>> {
        (0..count).map(|i| Some(vec![i as u8; len])).collect()
    }

    #[test]
    fn test_valid_shares() {
        let s = shares(3, 32);
        assert!(validate_shares(Some(s.as_slice()), 2).is_ok());
        assert!(validate_shares(Some(s.as_slice()), 3).is_ok());
    }

    #[test]
    fn test_absent_and_empty_list() {
        assert!(matches!(
            validate_shares::<Vec<u8>>(None, 1),
            Err(UnsealError::SharesNil)
        ));
        let empty: Vec<Option<Vec<u8>>> = Vec::new();
        assert!(matches!(
            validate_shares(Some(empty.as_slice()), 1),
            Err(UnsealError::SharesEmpty)
        ));
    }

    #[test]
    fn test_share_count_boundary() {
        let max = shares(MAX_SHARES, 32);
        assert!(validate_shares(Some(max.as_slice()), 1).is_ok());

        let too_many = shares(MAX_SHARES + 1, 32);
        assert!(matches!(
            validate_shares(Some(too_many.as_slice()), 1),
            Err(UnsealError::SharesTooMany { count: 257 })
        ));
    }

    #[test]
    fn test_share_length_boundaries() {
        for (len, ok) in [(31, false), (32, true), (64, true), (65, false)] {
            let s = vec![Some(vec![1u8; len])];
            assert_eq!(validate_shares(Some(s.as_slice()), 1).is_ok(), ok, "length {}", len);
        }

        let short = vec![Some(vec![1u8; 32]), Some(vec![1u8; 31])];
        let err = validate_shares(Some(short.as_slice()), 2).unwrap_err();
        assert!(matches!(err, UnsealError::ShareTooShortAt { index: 1, len: 31 }));
        assert!(err.to_string().contains("secret 1 length can't be less than"));

        let long = vec![Some(vec![1u8; 32]), Some(vec![1u8; 10_000])];
        let err = validate_shares(Some(long.as_slice()), 2).unwrap_err();
        assert!(matches!(err, UnsealError::ShareTooLongAt { index: 1, .. }));
        assert!(err.to_string().contains("secret 1 length can't be greater than"));
    }

    #[test]
    fn test_absent_share() {
        let s = vec![Some(vec![1u8; 32]), None, Some(vec![1u8; 32])];
        assert!(matches!(
            validate_shares(Some(s.as_slice()), 2),
            Err(UnsealError::ShareNilAt(1))
        ));
    }

    #[test]
    fn test_choose_n_boundaries() {
        let s = shares(4, 40);
        assert!(matches!(
            validate_shares(Some(s.as_slice()), 0),
            Err(UnsealError::ChooseNZero)
        ));
        assert!(matches!(
            validate_shares(Some(s.as_slice()), -2),
            Err(UnsealError::ChooseNNegative(-2))
        ));
        assert!(validate_shares(Some(s.as_slice()), 4).is_ok());
        assert!(matches!(
            validate_shares(Some(s.as_slice()), 5),
            Err(UnsealError::ChooseNExceedsCount { choose_n: 5, count: 4 })
        ));
    }

    #[test]
    fn test_first_failure_wins() {
        // a bad share is reported before a bad choose_n
        let s = vec![Some(vec![1u8; 32]), Some(vec![1u8; 8])];
        assert!(matches!(
            validate_shares(Some(s.as_slice()), 0),
            Err(UnsealError::ShareTooShortAt { index: 1, .. })
        ));

        // the earliest bad share is reported
        let s = vec![Some(vec![1u8; 100]), None];
        assert!(matches!(
            validate_shares(Some(s.as_slice()), 1),
            Err(UnsealError::ShareTooLongAt { index: 0, .. })
        ));
    }

    #[test]
    fn test_validate_present_shares() {
        let s = vec![vec![0u8; 32], vec![1u8; 33]];
        assert!(validate_present_shares(&s, 2).is_ok());
        assert!(matches!(
            validate_present_shares(&s, 3),
            Err(UnsealError::ChooseNExceedsCount { .. })
        ));
    }
}
