// Validation status taxonomies (spec.md §7). `IOError` (transient storage
// failure) lives in `blockflow_common::error` and is disjoint from these —
// see `BlockchainError` below for how the two compose at call sites.

use blockflow_common::crypto::Hash;
use blockflow_common::error::IOError;
use blockflow_common::vm::VmError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidHeaderStatus {
    #[error("header timestamp outside the accepted skew window")]
    InvalidTimeStamp,
    #[error("header hash does not satisfy its target")]
    InvalidWorkAmount,
    #[error("header target does not match the retarget computation")]
    InvalidWorkTarget,
    #[error("parent {0} is not present in its chain")]
    MissingParent(Hash),
    #[error("dependency {0} is not present in the flow")]
    MissingDeps(Hash),
    #[error("chain index does not belong to this broker's serviced groups")]
    InvalidGroup,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidBlockStatus {
    #[error(transparent)]
    Header(#[from] InvalidHeaderStatus),
    #[error("block has an empty transaction list")]
    EmptyTransactionList,
    #[error("first transaction is not a valid coinbase")]
    InvalidCoinbase,
    #[error("txsHash does not match the computed merkle root")]
    InvalidMerkleRoot,
    #[error("two inputs in this block reference the same output")]
    DoubleSpent,
    #[error("a referenced output does not exist")]
    InvalidCoins,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidTxStatus {
    #[error("unsigned.networkId does not match this node's network")]
    InvalidNetworkId,
    #[error("transaction has more than MaxTxInputNum inputs")]
    TooManyInputs,
    #[error("contract input used outside an intra-group transaction")]
    ContractInputForInterGroupTx,
    #[error("transaction has no outputs")]
    NoOutputs,
    #[error("transaction has more than MaxTxOutputNum outputs")]
    TooManyOutputs,
    #[error("generated output present in an inter-group transaction")]
    GeneratedOutputForInterGroupTx,
    #[error("gasAmount outside [minimalGas, maxGasPerTx]")]
    InvalidStartGas,
    #[error("gasPrice outside (0, MaxALFValue)")]
    InvalidGasPrice,
    #[error("an amount sum overflowed U256")]
    BalanceOverFlow,
    #[error("an output amount, token count, or additionalData size is invalid")]
    InvalidOutputStats,
    #[error("an input's hint does not resolve to chainIndex.from")]
    InvalidInputGroupIndex,
    #[error("output group assignment violates the inter/intra-group rule")]
    InvalidOutputGroupIndex,
    #[error("two inputs of this transaction share an outputRef")]
    TxDoubleSpending,
    #[error("additionalData exceeds MaxOutputDataSize")]
    OutputDataSizeExceeded,
    #[error("a referenced output does not exist in world state")]
    NonExistInput,
    #[error("a spent preOutput is still time-locked at the header timestamp")]
    TimeLockedTx,
    #[error("sum of input amounts does not equal sum of output amounts plus fee")]
    InvalidAlfBalance,
    #[error("sum of input token amounts does not equal sum of output token amounts")]
    InvalidTokenBalance,
    #[error("fewer signatures than distinct unlock conditions")]
    NotEnoughSignature,
    #[error("more signatures than distinct unlock conditions")]
    TooManySignatures,
    #[error("Hash(pubKey) does not match the lockup's pubKeyHash")]
    InvalidPublicKeyHash,
    #[error("a signature does not verify")]
    InvalidSignature,
    #[error("P2MPKH unlock script supplies the wrong number of public keys")]
    InvalidNumberOfPublicKey,
    #[error("P2MPKH unlock script indices are not strictly increasing")]
    InvalidP2mpkhUnlockScript,
    #[error("Hash(script.bytes) does not match the lockup's scriptHash")]
    InvalidScriptHash,
    #[error("unlock script execution failed: {0}")]
    UnlockScriptExeFailed(VmError),
    #[error("tx script execution failed: {0}")]
    TxScriptExeFailed(VmError),
}

/// The three-way result every validation function returns (spec.md §7
/// propagation policy): a rejection reason becomes the final status and is
/// never treated as fatal; an `IOError` bubbles unchanged to the caller.
#[derive(Error, Debug)]
pub enum BlockchainError {
    #[error(transparent)]
    Header(#[from] InvalidHeaderStatus),
    #[error(transparent)]
    Block(#[from] InvalidBlockStatus),
    #[error(transparent)]
    Tx(#[from] InvalidTxStatus),
    #[error(transparent)]
    Io(#[from] IOError),
}
