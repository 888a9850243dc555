// Merkle root over a block's transaction list (spec.md §3:
// `header.txsHash == Hash(transactions)`; §4.4 `validateMerkleRoot`).

use crate::crypto::{Hash, Hashable};
use crate::transaction::Transaction;
use std::sync::Arc;

/// Binary merkle tree over transaction hashes. An odd node at any level is
/// paired with itself; a single-transaction block's root is that tx's hash
/// paired with itself; an empty list (never valid per `validateNonEmptyTransactions`,
/// but harmless to define) is the zero hash.
pub fn calculate_merkle_root(transactions: &[Arc<Transaction>]) -> Hash {
    if transactions.is_empty() {
        return Hash::zero();
    }

    let mut hashes: Vec<Hash> = transactions.iter().map(|tx| tx.hash()).collect();

    if hashes.len() == 1 {
        return hash_pair(&hashes[0], &hashes[0]);
    }

    while hashes.len() > 1 {
        let mut next_level = Vec::with_capacity(hashes.len().div_ceil(2));

        for chunk in hashes.chunks(2) {
            let left = &chunk[0];
            let right = if chunk.len() == 2 { &chunk[1] } else { &chunk[0] };
            next_level.push(hash_pair(left, right));
        }

        hashes = next_level;
    }

    hashes[0].clone()
}

fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    use blake3::Hasher;

    let mut hasher = Hasher::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    Hash::new(*hasher.finalize().as_bytes())
}
