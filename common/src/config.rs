// Consensus and protocol constants. Anything here is read by validation code
// on every node; changing a value is a hard fork.

use primitive_types::U256;

/// A compile-time assertion, since `const fn` assertions are the idiomatic
/// way to catch a broken invariant between constants before the binary ever
/// runs rather than deep inside a validation path.
#[macro_export]
macro_rules! static_assert {
    ($cond:expr, $msg:expr) => {
        const _: () = assert!($cond, $msg);
    };
}

// ===== Sharding =====

/// Shard group count `G`. `ChainIndex` ranges over `G * G` ordered pairs.
pub const GROUPS: u32 = 4;

// ===== Gas schedule (spec.md §6, §4.3) =====

pub const TX_BASE_GAS: u64 = 1000;
pub const TX_INPUT_BASE_GAS: u64 = 2000;
pub const TX_OUTPUT_BASE_GAS: u64 = 5000;
pub const P2PK_UNLOCK_GAS: u64 = 1060;

/// Smallest `gasAmount` a transaction may declare. Matches the gas vector in
/// spec.md §8 scenario 1: a 1-input 2-output P2PKH transfer spending exactly
/// `minimalGas` must produce `gasUsed == 14060`.
pub const MINIMAL_GAS: u64 = TX_BASE_GAS + TX_INPUT_BASE_GAS + 2 * TX_OUTPUT_BASE_GAS + P2PK_UNLOCK_GAS;
pub const MAX_GAS_PER_TX: u64 = 5_000_000;

/// Per-byte cost of an unlock/tx script's code size (P2SH path).
pub const GAS_PER_SCRIPT_BYTE: u64 = 1;
/// Per-byte cost of hashing a P2SH script to check against `scriptHash`.
pub const GAS_PER_HASH_BYTE: u64 = 1;
/// Constant call overhead for executing an unlock/tx script.
pub const SCRIPT_CALL_GAS: u64 = 200;
/// Per-byte cost of a tx script's contract-state load/store (stateful
/// dialect only; §4.2's "pure except via explicit world-state effects").
pub const GAS_PER_STATE_BYTE: u64 = 5;

static_assert!(MINIMAL_GAS == 14060, "minimal gas vector must match spec.md's gasUsed test vector");

// ===== Output / tx caps (spec.md §6) =====

pub const MAX_TX_INPUT_NUM: usize = 256;
pub const MAX_TX_OUTPUT_NUM: usize = 256;
pub const MAX_TOKEN_PER_UTXO: usize = 64;
pub const MAX_OUTPUT_DATA_SIZE: usize = 256;

/// Upper bound for an ALF amount; `gasPrice` must stay strictly below it.
pub fn max_alf_value() -> U256 {
    U256::MAX
}

// ===== VM (spec.md §4.2) =====

pub const FRAME_STACK_MAX_SIZE: usize = 1024;

// ===== BlockFlow / Flow Handler (spec.md §4.5, §5) =====

/// Pending-buffer capacity; oldest (lowest counter) entry is evicted first
/// once full.
pub const DEFAULT_STATUS_SIZE_LIMIT: usize = 10_000;

// ===== PoW / retarget (spec.md §4.4, Open Question decision in SPEC_FULL.md §12) =====

pub const TARGET_BLOCK_TIME_MS: u64 = 16_000;
pub const RETARGET_WINDOW: usize = 25;
/// A retarget adjustment is clamped so the new target is within
/// `[old / RETARGET_CLAMP, old * RETARGET_CLAMP]` of the old one.
pub const RETARGET_CLAMP: u64 = 4;

/// Timestamp skew window accepted during header validation (spec.md §4.4).
pub const TIMESTAMP_SKEW_MS: u64 = 60 * 60 * 1000;
