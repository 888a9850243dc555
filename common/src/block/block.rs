use std::{
    fmt::{Display, Error, Formatter},
    sync::Arc,
};

use crate::{
    chain_index::ChainIndex,
    crypto::{Hash, Hashable},
    serializer::{Reader, ReaderError, Serializer, Writer},
    transaction::Transaction,
};

use super::BlockHeader;

/// `Block = (header, transactions)`; `transactions` is non-empty and its
/// first entry is the coinbase (spec.md §3).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Block {
    header: BlockHeader,
    transactions: Vec<Arc<Transaction>>,
}

impl Block {
    pub fn new(header: BlockHeader, transactions: Vec<Arc<Transaction>>) -> Self {
        Block { header, transactions }
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn transactions(&self) -> &[Arc<Transaction>] {
        &self.transactions
    }

    pub fn coinbase(&self) -> Option<&Arc<Transaction>> {
        self.transactions.first()
    }

    /// `validateNonEmptyTransactions` (spec.md §4.4).
    pub fn has_transactions(&self) -> bool {
        !self.transactions.is_empty()
    }

    /// `validateCoinbase` (spec.md §4.4): the first tx, and only the first
    /// tx, satisfies the coinbase shape.
    pub fn has_valid_coinbase_shape(&self) -> bool {
        match self.coinbase() {
            Some(coinbase) => coinbase.is_coinbase_shape(),
            None => false,
        }
    }

    /// The chain this block was produced for; derived from its own hash,
    /// with `from` supplied externally since it names the producing broker
    /// rather than anything recoverable from the hash (spec.md §3 invariant:
    /// `ChainIndex.fromHash(block.hash) == block.chainIndex`).
    pub fn chain_index(&self, from: crate::chain_index::GroupIndex) -> ChainIndex {
        ChainIndex::from_hash(&self.hash(), from)
    }
}

impl Serializer for Block {
    fn write(&self, writer: &mut Writer) {
        self.header.write(writer);
        self.transactions.write(writer);
    }

    fn read(reader: &mut Reader) -> Result<Block, ReaderError> {
        let header = BlockHeader::read(reader)?;
        let txs = Vec::<Transaction>::read(reader)?.into_iter().map(Arc::new).collect();
        Ok(Block::new(header, txs))
    }

    fn size(&self) -> usize {
        self.header.size() + self.transactions.size()
    }
}

impl Hashable for Block {
    fn hash(&self) -> Hash {
        self.header.hash()
    }
}

impl Display for Block {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "Block[{}, txs: {}]", self.header, self.transactions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::calculate_merkle_root;
    use crate::crypto::{hash, KeyPair, Signature};
    use crate::difficulty::max_target;
    use crate::network::NetworkId;
    use crate::transaction::{AssetOutput, LockupScript, UnsignedTransaction};
    use primitive_types::U256;

    fn coinbase_tx(miner: &KeyPair) -> Transaction {
        let output = AssetOutput::simple(U256::from(100u64), LockupScript::p2pkh(&miner.public_key()));
        let unsigned = UnsignedTransaction {
            network_id: NetworkId::Testnet,
            script_opt: None,
            gas_amount: 0,
            gas_price: U256::zero(),
            inputs: vec![],
            fixed_outputs: vec![output],
        };
        Transaction {
            unsigned,
            input_signatures: vec![Signature::zero()],
            contract_inputs: vec![],
            generated_outputs: vec![],
        }
    }

    #[test]
    fn test_block_with_valid_coinbase() {
        let miner = KeyPair::generate();
        let coinbase = Arc::new(coinbase_tx(&miner));
        let txs = vec![coinbase];
        let txs_hash = calculate_merkle_root(&txs);
        let header = BlockHeader::genesis(txs_hash, 0, max_target());
        let block = Block::new(header, txs);

        assert!(block.has_transactions());
        assert!(block.has_valid_coinbase_shape());
    }

    #[test]
    fn test_block_roundtrip() {
        let miner = KeyPair::generate();
        let txs = vec![Arc::new(coinbase_tx(&miner))];
        let txs_hash = calculate_merkle_root(&txs);
        let header = BlockHeader::genesis(txs_hash, 1234, max_target());
        let block = Block::new(header, txs);

        let bytes = block.to_bytes();
        assert_eq!(bytes.len(), block.size());
        let decoded = Block::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.hash(), block.hash());
        assert_eq!(decoded.transactions().len(), 1);
    }

    #[test]
    fn test_empty_block_fails_nonempty_check() {
        let header = BlockHeader::genesis(hash(b"none"), 0, max_target());
        let block = Block::new(header, vec![]);
        assert!(!block.has_transactions());
        assert!(!block.has_valid_coinbase_shape());
    }
}
