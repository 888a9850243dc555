// BlockHeader (spec.md §3): `(parentHash, blockDeps, txsHash, timestamp_ms,
// target, nonce)`. `blockDeps` carries one tip hash per other chain in the
// BlockFlow DAG; the parent (this chain's own tip) is tracked separately.

use std::fmt::{self, Display, Formatter};

use crate::chain_index::ChainIndex;
use crate::config::GROUPS;
use crate::crypto::{hash, Hash, Hashable};
use crate::difficulty::Target;
use crate::serializer::{Reader, ReaderError, Serializer, Writer};
use crate::time::TimestampMillis;

/// Number of dependency slots every header carries: one per chain other
/// than its own (spec.md §3: `blockDeps` has length `G*G − 1`).
pub fn deps_len() -> usize {
    (GROUPS * GROUPS) as usize - 1
}

/// Canonical ordering of `blockDeps`: the row-major enumeration of all
/// `(from, to)` pairs (see `ChainIndex::all`), skipping the header's own
/// chain index (Open Question decision, SPEC_FULL.md §12).
pub fn deps_order(own: ChainIndex) -> Vec<ChainIndex> {
    ChainIndex::all().into_iter().filter(|idx| *idx != own).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BlockHeader {
    pub parent_hash: Hash,
    pub block_deps: Vec<Hash>,
    pub txs_hash: Hash,
    pub timestamp_ms: TimestampMillis,
    pub target: Target,
    pub nonce: u64,
}

impl BlockHeader {
    pub fn new(
        parent_hash: Hash,
        block_deps: Vec<Hash>,
        txs_hash: Hash,
        timestamp_ms: TimestampMillis,
        target: Target,
        nonce: u64,
    ) -> Self {
        Self { parent_hash, block_deps, txs_hash, timestamp_ms, target, nonce }
    }

    /// Genesis headers have no real parent or deps to point at; they use
    /// the zero hash for both, same as a fresh chain's "nothing came before
    /// this" marker.
    pub fn genesis(txs_hash: Hash, timestamp_ms: TimestampMillis, target: Target) -> Self {
        Self {
            parent_hash: Hash::zero(),
            block_deps: vec![Hash::zero(); deps_len()],
            txs_hash,
            timestamp_ms,
            target,
            nonce: 0,
        }
    }
}

impl Serializer for BlockHeader {
    fn write(&self, writer: &mut Writer) {
        writer.write_hash(&self.parent_hash);
        self.block_deps.write(writer);
        writer.write_hash(&self.txs_hash);
        writer.write_u64(&self.timestamp_ms);
        writer.write_u256(&self.target);
        writer.write_u64(&self.nonce);
    }

    fn read(reader: &mut Reader) -> Result<BlockHeader, ReaderError> {
        let parent_hash = reader.read_hash()?;
        let block_deps = Vec::<Hash>::read(reader)?;
        if block_deps.len() != deps_len() {
            return Err(ReaderError::InvalidValue);
        }
        let txs_hash = reader.read_hash()?;
        let timestamp_ms = reader.read_u64()?;
        let target = reader.read_u256()?;
        let nonce = reader.read_u64()?;

        Ok(BlockHeader { parent_hash, block_deps, txs_hash, timestamp_ms, target, nonce })
    }

    fn size(&self) -> usize {
        32 + self.block_deps.size() + 32 + 8 + 32 + 8
    }
}

impl Hashable for BlockHeader {
    fn hash(&self) -> Hash {
        hash(&self.to_bytes())
    }
}

impl Display for BlockHeader {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BlockHeader[parent: {}, deps: {}, timestamp: {}, nonce: {}]",
            self.parent_hash,
            self.block_deps.len(),
            self.timestamp_ms,
            self.nonce
        )
    }
}
