// Per-(from,to) chain storage (spec.md §4.6 / §9 design note: "per-pair
// inheritance of chain logic maps to a trait/interface over the capability
// set {contains, parent, height, getHashTarget, maxHeight} with two
// concrete variants"). `HeaderChain` stores headers only; `BlockChain`
// stores full blocks, keyed by hash.

use std::collections::HashMap;
use std::sync::Arc;

use blockflow_common::block::{Block, BlockHeader};
use blockflow_common::config::RETARGET_WINDOW;
use blockflow_common::crypto::{Hash, Hashable};
use blockflow_common::difficulty::{max_target, retarget, Target};

pub trait ChainLike {
    fn contains(&self, hash: &Hash) -> bool;
    fn parent(&self, hash: &Hash) -> Option<Hash>;
    fn height(&self, hash: &Hash) -> Option<u64>;
    fn get_hash_target(&self) -> Target;
    fn max_height(&self) -> u64;
}

#[derive(Debug, Clone)]
struct ChainEntry<T> {
    header: BlockHeader,
    height: u64,
    payload: T,
}

/// Shared append-structure behind both `HeaderChain` and `BlockChain`: keyed
/// by hash, tracks height (genesis = 0, otherwise parent height + 1) and the
/// best (highest) tip seen so far.
#[derive(Debug, Clone)]
struct Chain<T> {
    entries: HashMap<Hash, ChainEntry<T>>,
    tip: Option<Hash>,
    max_height: u64,
}

impl<T> Default for Chain<T> {
    fn default() -> Self {
        Self { entries: HashMap::new(), tip: None, max_height: 0 }
    }
}

impl<T> Chain<T> {
    fn new() -> Self {
        Self::default()
    }

    /// Inserts (or ignores, if already present) a header/payload pair,
    /// computing height from the parent already stored in this chain.
    fn insert(&mut self, header: BlockHeader, payload: T) -> Hash {
        let hash = header.hash();
        if self.entries.contains_key(&hash) {
            return hash;
        }

        let height = match self.entries.get(&header.parent_hash) {
            Some(parent) => parent.height + 1,
            None => 0,
        };

        if self.tip.is_none() || height >= self.max_height {
            self.max_height = height;
            self.tip = Some(hash);
        }

        self.entries.insert(hash, ChainEntry { header, height, payload });
        hash
    }

    fn contains(&self, hash: &Hash) -> bool {
        self.entries.contains_key(hash)
    }

    fn parent(&self, hash: &Hash) -> Option<Hash> {
        self.entries.get(hash).map(|entry| entry.header.parent_hash)
    }

    fn height(&self, hash: &Hash) -> Option<u64> {
        self.entries.get(hash).map(|entry| entry.height)
    }

    fn header(&self, hash: &Hash) -> Option<&BlockHeader> {
        self.entries.get(hash).map(|entry| &entry.header)
    }

    fn tip(&self) -> Option<Hash> {
        self.tip
    }

    /// Walks back up to `RETARGET_WINDOW` headers from the tip, oldest
    /// first, and feeds the timestamps to `difficulty::retarget`. An empty
    /// chain has nothing to target against yet, so it returns the loosest
    /// possible target.
    fn get_hash_target(&self) -> Target {
        let Some(tip) = self.tip else {
            return max_target();
        };

        let mut timestamps = Vec::with_capacity(RETARGET_WINDOW);
        let mut current = Some(tip);
        for _ in 0..RETARGET_WINDOW {
            let Some(hash) = current else { break };
            let Some(entry) = self.entries.get(&hash) else { break };
            timestamps.push(entry.header.timestamp_ms);
            current = if entry.header.parent_hash == Hash::zero() {
                None
            } else {
                Some(entry.header.parent_hash)
            };
        }
        timestamps.reverse();

        let current_target = self
            .entries
            .get(&tip)
            .map(|entry| entry.header.target)
            .unwrap_or_else(max_target);

        retarget(&current_target, &timestamps)
    }
}

#[derive(Debug, Clone, Default)]
pub struct HeaderChain {
    inner: Chain<()>,
}

impl HeaderChain {
    pub fn new() -> Self {
        Self { inner: Chain::new() }
    }

    pub fn insert_header(&mut self, header: BlockHeader) -> Hash {
        self.inner.insert(header, ())
    }

    pub fn header(&self, hash: &Hash) -> Option<&BlockHeader> {
        self.inner.header(hash)
    }

    pub fn tip(&self) -> Option<Hash> {
        self.inner.tip()
    }
}

impl ChainLike for HeaderChain {
    fn contains(&self, hash: &Hash) -> bool {
        self.inner.contains(hash)
    }

    fn parent(&self, hash: &Hash) -> Option<Hash> {
        self.inner.parent(hash)
    }

    fn height(&self, hash: &Hash) -> Option<u64> {
        self.inner.height(hash)
    }

    fn get_hash_target(&self) -> Target {
        self.inner.get_hash_target()
    }

    fn max_height(&self) -> u64 {
        self.inner.max_height
    }
}

#[derive(Debug, Clone, Default)]
pub struct BlockChain {
    inner: Chain<Arc<Block>>,
}

impl BlockChain {
    pub fn new() -> Self {
        Self { inner: Chain::new() }
    }

    pub fn insert_block(&mut self, block: Arc<Block>) -> Hash {
        let header = block.header().clone();
        self.inner.insert(header, block)
    }

    pub fn header(&self, hash: &Hash) -> Option<&BlockHeader> {
        self.inner.header(hash)
    }

    pub fn block(&self, hash: &Hash) -> Option<&Arc<Block>> {
        self.inner.entries.get(hash).map(|entry| &entry.payload)
    }

    pub fn tip(&self) -> Option<Hash> {
        self.inner.tip()
    }
}

impl ChainLike for BlockChain {
    fn contains(&self, hash: &Hash) -> bool {
        self.inner.contains(hash)
    }

    fn parent(&self, hash: &Hash) -> Option<Hash> {
        self.inner.parent(hash)
    }

    fn height(&self, hash: &Hash) -> Option<u64> {
        self.inner.height(hash)
    }

    fn get_hash_target(&self) -> Target {
        self.inner.get_hash_target()
    }

    fn max_height(&self) -> u64 {
        self.inner.max_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockflow_common::crypto::hash;

    fn header_with_parent(parent_hash: Hash, timestamp_ms: u64) -> BlockHeader {
        BlockHeader::new(
            parent_hash,
            vec![Hash::zero(); blockflow_common::block::deps_len()],
            hash(b"txs"),
            timestamp_ms,
            max_target(),
            0,
        )
    }

    #[test]
    fn test_genesis_height_zero() {
        let mut chain = HeaderChain::new();
        let genesis = BlockHeader::genesis(hash(b"txs"), 0, max_target());
        let genesis_hash = genesis.hash();
        chain.insert_header(genesis);

        assert!(chain.contains(&genesis_hash));
        assert_eq!(chain.height(&genesis_hash), Some(0));
        assert_eq!(chain.max_height(), 0);
    }

    #[test]
    fn test_height_increments_with_parent() {
        let mut chain = HeaderChain::new();
        let genesis = BlockHeader::genesis(hash(b"txs"), 0, max_target());
        let genesis_hash = chain.insert_header(genesis);

        let child = header_with_parent(genesis_hash, 1000);
        let child_hash = chain.insert_header(child);

        assert_eq!(chain.height(&child_hash), Some(1));
        assert_eq!(chain.parent(&child_hash), Some(genesis_hash));
        assert_eq!(chain.max_height(), 1);
        assert_eq!(chain.tip(), Some(child_hash));
    }

    #[test]
    fn test_reinsert_is_noop() {
        let mut chain = HeaderChain::new();
        let genesis = BlockHeader::genesis(hash(b"txs"), 0, max_target());
        let first = chain.insert_header(genesis.clone());
        let second = chain.insert_header(genesis);
        assert_eq!(first, second);
        assert_eq!(chain.max_height(), 0);
    }

    #[test]
    fn test_empty_chain_targets_loosest() {
        let chain = HeaderChain::new();
        assert_eq!(chain.get_hash_target(), max_target());
    }
}
