// World state: live asset/contract outputs plus contract state, committed
// under a single state root (spec.md §4.1).
//
// The concrete commitment here is an in-memory sorted digest trie — a
// deterministic hash over the sorted (key, value) pairs of each map, folded
// together into one root. A real disk-backed Merkle-Patricia trie is a
// non-goal (spec.md §1: "persistent storage engine internals"); this keeps
// the same external contract (`persist` returns a state root, `cached`
// returns a scratch view) so a storage engine could be substituted later
// without touching validation code.

use std::collections::BTreeMap;

use blockflow_common::crypto::{hash, Hash};
use blockflow_common::error::IOError;
use blockflow_common::serializer::Serializer;
use blockflow_common::transaction::{
    AssetOutput, AssetOutputRef, ContractOutput, ContractOutputRef, Transaction, TxOutput,
};
use blockflow_common::vm::StatefulWorld;

#[derive(Debug, Clone, Default)]
pub struct WorldState {
    assets: BTreeMap<AssetOutputRef, AssetOutput>,
    contracts: BTreeMap<ContractOutputRef, ContractOutput>,
    contract_state: BTreeMap<Hash, Vec<u8>>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_asset(&self, output_ref: &AssetOutputRef) -> Option<&AssetOutput> {
        self.assets.get(output_ref)
    }

    pub fn add_asset(&mut self, output_ref: AssetOutputRef, output: AssetOutput) {
        self.assets.insert(output_ref, output);
    }

    pub fn remove_asset(&mut self, output_ref: &AssetOutputRef) {
        self.assets.remove(output_ref);
    }

    pub fn get_contract_output(&self, output_ref: &ContractOutputRef) -> Option<&ContractOutput> {
        self.contracts.get(output_ref)
    }

    pub fn add_contract_output(&mut self, output_ref: ContractOutputRef, output: ContractOutput) {
        self.contracts.insert(output_ref, output);
    }

    pub fn remove_contract_output(&mut self, output_ref: &ContractOutputRef) {
        self.contracts.remove(output_ref);
    }

    /// Returns outputs in the exact order of `tx.inputs ++ tx.contractInputs`
    /// (spec.md §4.1 guarantee). A missing key surfaces as `KeyNotFound`; the
    /// tx validation layer is what turns that into `NonExistInput`.
    pub fn get_pre_outputs(&self, tx: &Transaction) -> Result<Vec<TxOutput>, IOError> {
        let mut outputs =
            Vec::with_capacity(tx.unsigned.inputs.len() + tx.contract_inputs.len());

        for input in &tx.unsigned.inputs {
            let output = self.get_asset(&input.output_ref).ok_or(IOError::KeyNotFound)?;
            outputs.push(TxOutput::Asset(output.clone()));
        }

        for contract_ref in &tx.contract_inputs {
            let output = self
                .get_contract_output(contract_ref)
                .ok_or(IOError::KeyNotFound)?;
            outputs.push(TxOutput::Contract(output.clone()));
        }

        Ok(outputs)
    }

    /// Copy-on-write scratch view used during validation. Mutations on the
    /// returned clone are invisible to `self` until folded back explicitly.
    pub fn cached(&self) -> WorldState {
        self.clone()
    }

    /// Commits this view as the new durable state, returning its root.
    /// Atomic in the sense that matters here: `self` is a plain value, so
    /// there is no partially-applied intermediate state to observe — the
    /// caller either has the fully-updated `WorldState` or the call never
    /// returned one.
    pub fn persist(&self) -> Hash {
        self.state_root()
    }

    pub fn state_root(&self) -> Hash {
        let mut bytes = Vec::new();

        for (output_ref, output) in &self.assets {
            bytes.extend_from_slice(&output_ref.to_bytes());
            bytes.extend_from_slice(&output.to_bytes());
        }
        for (output_ref, output) in &self.contracts {
            bytes.extend_from_slice(&output_ref.to_bytes());
            bytes.extend_from_slice(&output.to_bytes());
        }
        for (contract_id, state) in &self.contract_state {
            bytes.extend_from_slice(contract_id.as_bytes());
            bytes.extend_from_slice(state);
        }

        hash(&bytes)
    }
}

impl StatefulWorld for WorldState {
    fn get_contract_state(&self, contract_id: &Hash) -> Option<Vec<u8>> {
        self.contract_state.get(contract_id).cloned()
    }

    fn set_contract_state(&mut self, contract_id: &Hash, state: Vec<u8>) {
        self.contract_state.insert(*contract_id, state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockflow_common::crypto::KeyPair;
    use blockflow_common::network::NetworkId;
    use blockflow_common::transaction::{LockupScript, OutputRef, UnsignedTransaction};
    use blockflow_common::crypto::Signature;
    use primitive_types::U256;

    fn sample_output() -> AssetOutput {
        let key_pair = KeyPair::generate();
        AssetOutput::simple(U256::from(100u64), LockupScript::p2pkh(&key_pair.public_key()))
    }

    #[test]
    fn test_add_get_remove_asset() {
        let mut world = WorldState::new();
        let output_ref = OutputRef::for_output(&hash(b"tx"), 0, 0);
        let output = sample_output();

        assert!(world.get_asset(&output_ref).is_none());
        world.add_asset(output_ref, output.clone());
        assert_eq!(world.get_asset(&output_ref), Some(&output));

        world.remove_asset(&output_ref);
        assert!(world.get_asset(&output_ref).is_none());
    }

    #[test]
    fn test_get_pre_outputs_order_and_missing() {
        use blockflow_common::transaction::TxInput;

        let mut world = WorldState::new();
        let output_ref = OutputRef::for_output(&hash(b"tx"), 0, 0);
        let output = sample_output();
        world.add_asset(output_ref, output.clone());

        let key_pair = KeyPair::generate();
        let unlock = blockflow_common::transaction::UnlockScript::P2PKH(key_pair.public_key());
        let unsigned = UnsignedTransaction {
            network_id: NetworkId::Testnet,
            script_opt: None,
            gas_amount: 0,
            gas_price: U256::zero(),
            inputs: vec![TxInput { output_ref, unlock_script: unlock }],
            fixed_outputs: vec![],
        };
        let tx = Transaction {
            unsigned,
            input_signatures: vec![Signature::zero()],
            contract_inputs: vec![],
            generated_outputs: vec![],
        };

        let pre_outputs = world.get_pre_outputs(&tx).unwrap();
        assert_eq!(pre_outputs.len(), 1);
        assert_eq!(pre_outputs[0].amount(), output.amount);
    }

    #[test]
    fn test_get_pre_outputs_missing_key() {
        let world = WorldState::new();
        let output_ref = OutputRef::for_output(&hash(b"missing"), 0, 0);
        let key_pair = KeyPair::generate();
        let unlock = blockflow_common::transaction::UnlockScript::P2PKH(key_pair.public_key());
        let unsigned = UnsignedTransaction {
            network_id: NetworkId::Testnet,
            script_opt: None,
            gas_amount: 0,
            gas_price: U256::zero(),
            inputs: vec![blockflow_common::transaction::TxInput { output_ref, unlock_script: unlock }],
            fixed_outputs: vec![],
        };
        let tx = Transaction {
            unsigned,
            input_signatures: vec![Signature::zero()],
            contract_inputs: vec![],
            generated_outputs: vec![],
        };

        assert!(world.get_pre_outputs(&tx).is_err());
    }

    #[test]
    fn test_cached_is_independent() {
        let mut world = WorldState::new();
        let output_ref = OutputRef::for_output(&hash(b"tx"), 0, 0);
        world.add_asset(output_ref, sample_output());

        let mut scratch = world.cached();
        scratch.remove_asset(&output_ref);

        assert!(world.get_asset(&output_ref).is_some());
        assert!(scratch.get_asset(&output_ref).is_none());
    }

    #[test]
    fn test_state_root_changes_on_mutation() {
        let world = WorldState::new();
        let root_empty = world.state_root();

        let mut world2 = world.clone();
        world2.add_asset(OutputRef::for_output(&hash(b"tx"), 0, 0), sample_output());
        let root_populated = world2.state_root();

        assert_ne!(root_empty, root_populated);
    }
}
