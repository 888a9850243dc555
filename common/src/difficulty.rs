// PoW work/target checks (spec.md §4.4: validateWorkAmount / validateWorkTarget)
// and the retarget algorithm (Open Question decision, SPEC_FULL.md §12).

use crate::config::{RETARGET_CLAMP, RETARGET_WINDOW, TARGET_BLOCK_TIME_MS};
use crate::crypto::Hash;
use primitive_types::U256;
use thiserror::Error;

/// A PoW target: the block's hash must be `<= target` (big-endian integer
/// comparison, per spec.md §3: `BigUInt(header.hash) <= target`).
pub type Target = U256;

#[derive(Error, Debug)]
pub enum DifficultyError {
    #[error("target cannot be zero")]
    TargetCannotBeZero,
}

/// `validateWorkAmount`: `BigUInt(hash) <= target`.
pub fn check_work_amount(hash: &Hash, target: &Target) -> bool {
    let hash_work = U256::from_big_endian(hash.as_bytes());
    hash_work <= *target
}

/// Highest target (lowest difficulty) allowed by the network.
pub fn max_target() -> Target {
    U256::MAX
}

/// Retarget over a fixed window of header timestamps (oldest first),
/// aiming for `TARGET_BLOCK_TIME_MS` per block, clamped to
/// `[current / RETARGET_CLAMP, current * RETARGET_CLAMP]`.
///
/// `timestamps_ms` must contain at least 2 entries (oldest..newest) spanning
/// up to `RETARGET_WINDOW` headers; fewer than 2 entries returns the
/// unmodified `current_target` (nothing to retarget against yet, e.g. near
/// genesis).
pub fn retarget(current_target: &Target, timestamps_ms: &[u64]) -> Target {
    if timestamps_ms.len() < 2 {
        return *current_target;
    }

    let window: Vec<u64> = if timestamps_ms.len() > RETARGET_WINDOW {
        timestamps_ms[timestamps_ms.len() - RETARGET_WINDOW..].to_vec()
    } else {
        timestamps_ms.to_vec()
    };

    let span = window.len() as u64 - 1;
    let elapsed = window.last().unwrap().saturating_sub(*window.first().unwrap());
    let expected = TARGET_BLOCK_TIME_MS * span;

    if elapsed == 0 || expected == 0 {
        return *current_target;
    }

    // target scales with elapsed/expected: slower blocks (elapsed > expected)
    // raise the target (lower difficulty), faster blocks lower it. Divide
    // before multiplying to stay within U256 without an intermediate widen.
    let new_target = (*current_target / U256::from(expected))
        .saturating_mul(U256::from(elapsed));

    let clamp_divisor = U256::from(RETARGET_CLAMP);
    let min_target = current_target / clamp_divisor;
    let max_target = current_target.saturating_mul(clamp_divisor);

    new_target.clamp(min_target, max_target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash;

    #[test]
    fn test_check_work_amount() {
        let target = U256::MAX;
        let h = hash(b"anything");
        assert!(check_work_amount(&h, &target));

        let zero_target = U256::zero();
        assert!(!check_work_amount(&h, &zero_target));
    }

    #[test]
    fn test_retarget_stable_when_on_time() {
        let current = U256::from(1_000_000u64);
        let timestamps: Vec<u64> = (0..10).map(|i| i * TARGET_BLOCK_TIME_MS).collect();
        let next = retarget(&current, &timestamps);
        assert_eq!(next, current);
    }

    #[test]
    fn test_retarget_raises_target_when_slow() {
        let current = U256::from(1_000_000u64);
        // blocks took twice as long as expected -> target should increase (roughly double)
        let timestamps: Vec<u64> = (0..10).map(|i| i * TARGET_BLOCK_TIME_MS * 2).collect();
        let next = retarget(&current, &timestamps);
        assert!(next > current);
    }

    #[test]
    fn test_retarget_clamped() {
        let current = U256::from(1_000_000u64);
        // extreme slowdown: clamp should cap the increase at RETARGET_CLAMP x
        let timestamps = vec![0u64, TARGET_BLOCK_TIME_MS * 1000];
        let next = retarget(&current, &timestamps);
        assert!(next <= current.saturating_mul(U256::from(RETARGET_CLAMP)));
    }

    #[test]
    fn test_retarget_needs_two_timestamps() {
        let current = U256::from(1_000_000u64);
        assert_eq!(retarget(&current, &[42]), current);
        assert_eq!(retarget(&current, &[]), current);
    }
}
