// ChainIndex / GroupIndex (spec.md §3): pure value types describing shard
// coordinates. Tell which chain a hash, block, or address belongs to.

use crate::config::GROUPS;
use crate::crypto::Hash;
use crate::serializer::{Reader, ReaderError, Serializer, Writer};
use std::fmt;

/// A shard group in `[0, G)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct GroupIndex(pub u32);

impl GroupIndex {
    pub fn new(value: u32) -> Self {
        debug_assert!(value < GROUPS, "group index {} out of range [0, {})", value, GROUPS);
        Self(value)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// Derive the group a hash's low bits belong to. Used both for block
    /// hashes (`ChainIndex::from_hash`) and for an address's "script hint".
    pub fn from_low_bits(low_bits: u32) -> Self {
        Self(low_bits % GROUPS)
    }
}

impl fmt::Display for GroupIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serializer for GroupIndex {
    fn write(&self, writer: &mut Writer) {
        writer.write_u32(&self.0);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let value = reader.read_u32()?;
        if value >= GROUPS {
            return Err(ReaderError::InvalidValue);
        }
        Ok(GroupIndex(value))
    }

    fn size(&self) -> usize {
        4
    }
}

/// An ordered pair of shard groups identifying one chain in the BlockFlow
/// DAG. `from == to` is an intra-group chain; otherwise inter-group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct ChainIndex {
    pub from: GroupIndex,
    pub to: GroupIndex,
}

impl ChainIndex {
    pub fn new(from: GroupIndex, to: GroupIndex) -> Self {
        Self { from, to }
    }

    pub fn is_intra_group(&self) -> bool {
        self.from == self.to
    }

    /// `ChainIndex.fromHash(block.hash) == block.chainIndex` (spec.md §3
    /// invariant). The `to` group is derived from the low bits of the hash,
    /// and the `from` group must be supplied by the caller (the miner's own
    /// serviced group), matching how a block's producing group is external
    /// context rather than something recoverable from the hash alone.
    pub fn from_hash(hash: &Hash, from: GroupIndex) -> Self {
        let to = GroupIndex::from_low_bits(hash.low_bits());
        ChainIndex { from, to }
    }

    /// Every ordered pair `(from, to)` over `[0, G) x [0, G)`, in row-major
    /// order. This enumeration order is also what `blockDeps`'s canonical
    /// order is built from (see `BlockHeader::deps_order` in `block::header`).
    pub fn all() -> Vec<ChainIndex> {
        let mut out = Vec::with_capacity((GROUPS * GROUPS) as usize);
        for from in 0..GROUPS {
            for to in 0..GROUPS {
                out.push(ChainIndex::new(GroupIndex(from), GroupIndex(to)));
            }
        }
        out
    }
}

impl fmt::Display for ChainIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} -> {})", self.from, self.to)
    }
}

impl Serializer for ChainIndex {
    fn write(&self, writer: &mut Writer) {
        self.from.write(writer);
        self.to.write(writer);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(ChainIndex { from: GroupIndex::read(reader)?, to: GroupIndex::read(reader)? })
    }

    fn size(&self) -> usize {
        self.from.size() + self.to.size()
    }
}
