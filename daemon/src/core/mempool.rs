// Mempool (spec.md §6 external interface): `collectTransactions(chainIndex)`,
// `remove(tx)`. The concrete implementation here is a simple in-memory
// store; a production mempool (fee ranking, eviction policy, propagation) is
// a non-goal — this core only needs the two operations BlockFlow and the
// Flow Handler call.

use std::collections::HashMap;
use std::sync::Arc;

use blockflow_common::chain_index::ChainIndex;
use blockflow_common::crypto::{Hash, Hashable};
use blockflow_common::transaction::Transaction;

pub trait Mempool: Send + Sync {
    fn collect_transactions(&self, chain_index: ChainIndex) -> Vec<Arc<Transaction>>;
    fn remove(&mut self, tx: &Transaction);
}

/// A minimal concurrent-free mempool: transactions are grouped by the
/// `ChainIndex` they were submitted for. Real group derivation (from input
/// hints) belongs to tx validation; callers here supply it directly.
#[derive(Debug, Default)]
pub struct SimpleMempool {
    by_chain: HashMap<ChainIndex, Vec<Arc<Transaction>>>,
}

impl SimpleMempool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, chain_index: ChainIndex, tx: Arc<Transaction>) {
        self.by_chain.entry(chain_index).or_default().push(tx);
    }

    pub fn len(&self) -> usize {
        self.by_chain.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Mempool for SimpleMempool {
    fn collect_transactions(&self, chain_index: ChainIndex) -> Vec<Arc<Transaction>> {
        self.by_chain.get(&chain_index).cloned().unwrap_or_default()
    }

    fn remove(&mut self, tx: &Transaction) {
        let target_hash: Hash = tx.hash();
        for txs in self.by_chain.values_mut() {
            txs.retain(|existing| existing.hash() != target_hash);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockflow_common::chain_index::GroupIndex;
    use blockflow_common::crypto::{KeyPair, Signature};
    use blockflow_common::network::NetworkId;
    use blockflow_common::transaction::{AssetOutput, LockupScript, UnsignedTransaction};
    use primitive_types::U256;

    fn sample_tx() -> Arc<Transaction> {
        let key_pair = KeyPair::generate();
        let output = AssetOutput::simple(U256::from(1u64), LockupScript::p2pkh(&key_pair.public_key()));
        let unsigned = UnsignedTransaction {
            network_id: NetworkId::Testnet,
            script_opt: None,
            gas_amount: 0,
            gas_price: U256::zero(),
            inputs: vec![],
            fixed_outputs: vec![output],
        };
        Arc::new(Transaction {
            unsigned,
            input_signatures: vec![Signature::zero()],
            contract_inputs: vec![],
            generated_outputs: vec![],
        })
    }

    #[test]
    fn test_add_and_collect() {
        let mut mempool = SimpleMempool::new();
        let chain_index = ChainIndex::new(GroupIndex::new(0), GroupIndex::new(0));
        let tx = sample_tx();
        mempool.add(chain_index, tx.clone());

        let collected = mempool.collect_transactions(chain_index);
        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].hash(), tx.hash());
    }

    #[test]
    fn test_remove() {
        let mut mempool = SimpleMempool::new();
        let chain_index = ChainIndex::new(GroupIndex::new(1), GroupIndex::new(2));
        let tx = sample_tx();
        mempool.add(chain_index, tx.clone());
        assert_eq!(mempool.len(), 1);

        mempool.remove(&tx);
        assert!(mempool.is_empty());
    }

    #[test]
    fn test_collect_unknown_chain_is_empty() {
        let mempool = SimpleMempool::new();
        let chain_index = ChainIndex::new(GroupIndex::new(3), GroupIndex::new(0));
        assert!(mempool.collect_transactions(chain_index).is_empty());
    }
}
