use crate::crypto::Hash;

/// A token is identified by the hash of the transaction that issued it
/// (mirroring how an `OutputRef` names a UTXO).
pub type TokenId = Hash;
