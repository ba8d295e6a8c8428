//! Lexicographic M-choose-N index combinations
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

/// One combination: ascending indexes into the original share list
pub type Combination = Vec<usize>;

/// C(m, k), or `None` on overflow
pub fn binomial(m: usize, k: usize) -> Option<u128> {
    if k > m {
        return Some(0);
    }
    let k = k.min(m - k);
    let mut result: u128 = 1;
    for i in 0..k {
        // exact at every step: result * (m - i) is divisible by (i + 1)
        result = result.checked_mul((m - i) as u128)? / (i as u128 + 1);
    }
    Some(result)
}

/// Enumerate all `choose_n`-sized index combinations of `0..m` in lexicographic order.
///
/// `max_combinations` bounds C(m, choose_n); enumeration is refused above it.
pub fn generate_combinations(
    m: usize,
    choose_n: usize,
    max_combinations: usize,
) -> UnsealResult<Vec<Combination>> {
    if choose_n > m {
        return Err(UnsealError::CombinationComputeFailed { m, choose_n });
    }

    let count = binomial(m, choose_n);
    match count {
        Some(count) if count <= max_combinations as u128 => {}
        Some(count) => {
            return Err(UnsealError::CombinationLimitExceeded {
                m,
                choose_n,
                count: count.to_string(),
                limit: max_combinations,
            })
        }
        None => {
            return Err(UnsealError::CombinationLimitExceeded {
                m,
                choose_n,
                count: "overflow".to_string(),
                limit: max_combinations,
            })
        }
    }

    let mut combinations = Vec::new();
    if choose_n > 0 {
        let mut indexes: Combination = (0..choose_n).collect();
        loop {
            combinations.push(indexes.clone());
            if !next_combination(&mut indexes, m) {
                break;
            }
        }
    }

    // an empty subset derives nothing, so C(m, 0) is refused here too
    if combinations.is_empty() {
        return Err(UnsealError::CombinationComputeFailed { m, choose_n });
    }
    Ok(combinations)
}

/// Advance to the next ascending index set; false once the last one was reached
fn next_combination(indexes: &mut [usize], m: usize) -> bool {
    let k = indexes.len();
    let mut i = k;
    while i > 0 {
        i -= 1;
        if indexes[i] < m - k + i {
            indexes[i] += 1;
            for j in i + 1..k {
                indexes[j] = indexes[j - 1] + 1;
            }
            return true;
        }
    }
    false
}
