// Header and block validation (spec.md §4.4). Headers are checked
// independently of the blocks that carry them (a header can be known before
// its body, spec.md §3 invariant); block checks build on top and additionally
// walk the block's transactions against a scratch world state.

use std::collections::HashSet;

use blockflow_common::block::{calculate_merkle_root, Block, BlockHeader};
use blockflow_common::chain_index::{ChainIndex, GroupIndex};
use blockflow_common::config::TIMESTAMP_SKEW_MS;
use blockflow_common::crypto::{Hash, Hashable};
use blockflow_common::difficulty::check_work_amount;
use blockflow_common::transaction::{OutputRef, Transaction, TxOutput};

use super::chain::ChainLike;
use super::blockflow::BlockFlow;
use super::error::{BlockchainError, InvalidBlockStatus, InvalidHeaderStatus};
use super::tx_validation::{validate_stateful, validate_stateless, BlockEnvironment};
use super::world_state::WorldState;

// ===== Header checks =====

/// `validateTimeStamp`: `headerTs <= now + skew`; unless syncing, also
/// `headerTs >= now - skew` (spec.md §4.4). A syncing node is pulling
/// historical headers, so the lower bound would reject everything but the
/// chain tip. The genesis header (`parentHash == zero`) is exempt from the
/// lower bound the same way the original chain exempts it: genesis carries
/// a fixed, possibly long-past timestamp, and a non-syncing node must still
/// be able to bootstrap from it.
pub fn validate_timestamp(
    header: &BlockHeader,
    now_ms: u64,
    syncing: bool,
) -> Result<(), InvalidHeaderStatus> {
    if header.timestamp_ms > now_ms.saturating_add(TIMESTAMP_SKEW_MS) {
        return Err(InvalidHeaderStatus::InvalidTimeStamp);
    }
    let is_genesis = header.parent_hash == Hash::zero();
    if !syncing && !is_genesis && header.timestamp_ms < now_ms.saturating_sub(TIMESTAMP_SKEW_MS) {
        return Err(InvalidHeaderStatus::InvalidTimeStamp);
    }
    Ok(())
}

/// `validateWorkAmount`: `BigUInt(hash) <= target`.
pub fn validate_work_amount(header: &BlockHeader) -> Result<(), InvalidHeaderStatus> {
    if !check_work_amount(&header.hash(), &header.target) {
        return Err(InvalidHeaderStatus::InvalidWorkAmount);
    }
    Ok(())
}

/// `validateWorkTarget`: the header's target must equal this chain's own
/// retarget computation.
pub fn validate_work_target(header: &BlockHeader, chain: &dyn ChainLike) -> Result<(), InvalidHeaderStatus> {
    if header.target != chain.get_hash_target() {
        return Err(InvalidHeaderStatus::InvalidWorkTarget);
    }
    Ok(())
}

/// `validateParent`: the zero hash marks a genesis header, which has no
/// parent to look up.
pub fn validate_parent(header: &BlockHeader, chain: &dyn ChainLike) -> Result<(), InvalidHeaderStatus> {
    if header.parent_hash != Hash::zero() && !chain.contains(&header.parent_hash) {
        return Err(InvalidHeaderStatus::MissingParent(header.parent_hash));
    }
    Ok(())
}

/// `validateDeps`: every non-zero dep must already be a known header
/// somewhere in the flow.
pub fn validate_deps(header: &BlockHeader, flow: &BlockFlow) -> Result<(), InvalidHeaderStatus> {
    for dep in &header.block_deps {
        if *dep != Hash::zero() && !flow.contains_header(dep) {
            return Err(InvalidHeaderStatus::MissingDeps(*dep));
        }
    }
    Ok(())
}

/// Runs all header checks in spec order, short-circuiting on the first
/// failure.
pub fn validate_header(
    header: &BlockHeader,
    chain: &dyn ChainLike,
    flow: &BlockFlow,
    now_ms: u64,
    syncing: bool,
) -> Result<(), InvalidHeaderStatus> {
    validate_timestamp(header, now_ms, syncing)?;
    validate_work_amount(header)?;
    validate_work_target(header, chain)?;
    validate_parent(header, chain)?;
    validate_deps(header, flow)?;
    Ok(())
}

// ===== Block checks =====

/// `validateGroup`: the block's declared chain index must be one this
/// broker actually services. `InvalidGroup` belongs to `InvalidHeaderStatus`
/// (spec.md §7: block statuses are "the [header statuses] plus ..."), even
/// though the check itself is block-level (spec.md §4.4).
pub fn validate_group(chain_index: ChainIndex, serviced: &[ChainIndex]) -> Result<(), InvalidHeaderStatus> {
    if !serviced.contains(&chain_index) {
        return Err(InvalidHeaderStatus::InvalidGroup);
    }
    Ok(())
}

pub fn validate_non_empty_transactions(block: &Block) -> Result<(), InvalidBlockStatus> {
    if !block.has_transactions() {
        return Err(InvalidBlockStatus::EmptyTransactionList);
    }
    Ok(())
}

pub fn validate_coinbase(block: &Block) -> Result<(), InvalidBlockStatus> {
    if !block.has_valid_coinbase_shape() {
        return Err(InvalidBlockStatus::InvalidCoinbase);
    }
    Ok(())
}

pub fn validate_merkle_root(block: &Block) -> Result<(), InvalidBlockStatus> {
    if block.header().txs_hash != calculate_merkle_root(block.transactions()) {
        return Err(InvalidBlockStatus::InvalidMerkleRoot);
    }
    Ok(())
}

/// Cross-tx double-spend check (spec.md §4.4): no two inputs, across the
/// whole block, reference the same `outputRef`. Each tx's own internal
/// double-spend check (`checkUniqueInputs`, tx_validation.rs) already rules
/// out duplicates *within* one tx; this rules out duplicates *across* txs.
pub fn validate_no_double_spend_in_block(block: &Block) -> Result<(), InvalidBlockStatus> {
    let mut seen: HashSet<OutputRef> = HashSet::new();
    for tx in block.transactions() {
        for output_ref in tx.all_spent_refs() {
            if !seen.insert(*output_ref) {
                return Err(InvalidBlockStatus::DoubleSpent);
            }
        }
    }
    Ok(())
}

/// Removes a tx's spent outputs and inserts its new ones into `world`, in
/// `tx.hash()`-derived output-ref order. Runs after a tx has passed its
/// validation pipeline (or, for the coinbase, unconditionally) so that a
/// later tx in the same block may spend an earlier tx's output.
fn apply_tx_to_world(tx: &Transaction, world: &mut WorldState) {
    for input in &tx.unsigned.inputs {
        world.remove_asset(&input.output_ref);
    }
    for contract_ref in &tx.contract_inputs {
        world.remove_contract_output(contract_ref);
    }

    let tx_hash = tx.hash();
    let mut index: u32 = 0;
    for output in &tx.unsigned.fixed_outputs {
        let hint = GroupIndex::from_low_bits(output.lockup_script.group_hash().low_bits()).value();
        world.add_asset(OutputRef::for_output(&tx_hash, index, hint), output.clone());
        index += 1;
    }
    for output in &tx.generated_outputs {
        let hint = GroupIndex::from_low_bits(output.lockup_script().group_hash().low_bits()).value();
        let output_ref = OutputRef::for_output(&tx_hash, index, hint);
        match output {
            TxOutput::Asset(asset) => world.add_asset(output_ref, asset.clone()),
            TxOutput::Contract(contract) => world.add_contract_output(output_ref, contract.clone()),
        }
        index += 1;
    }
}

/// `validateTransactions`: runs the tx validation pipeline for every
/// non-coinbase tx against `world`, applying each tx's effects before
/// moving to the next so later txs in the block see earlier ones' outputs.
/// A missing preOutput at this layer is `InvalidCoins`, distinct from the
/// tx-layer `NonExistInput` that `get_pre_outputs` would otherwise produce.
pub fn validate_transactions(
    block: &Block,
    chain_index: ChainIndex,
    world: &mut WorldState,
    env: &BlockEnvironment,
) -> Result<(), BlockchainError> {
    let mut transactions = block.transactions().iter();

    if let Some(coinbase) = transactions.next() {
        apply_tx_to_world(coinbase, world);
    }

    for tx in transactions {
        let pre_outputs = world.get_pre_outputs(tx).map_err(|_| InvalidBlockStatus::InvalidCoins)?;
        validate_stateless(tx, chain_index, env)?;
        validate_stateful(tx, &pre_outputs, world, env.header_timestamp_ms)?;
        apply_tx_to_world(tx, world);
    }

    Ok(())
}

/// Runs every header and block check in spec order, then walks the
/// transaction list, mutating `world` with each tx's effects as it goes.
#[allow(clippy::too_many_arguments)]
pub fn validate_block(
    block: &Block,
    chain_index: ChainIndex,
    chain: &dyn ChainLike,
    flow: &BlockFlow,
    serviced: &[ChainIndex],
    env: &BlockEnvironment,
    now_ms: u64,
    syncing: bool,
    world: &mut WorldState,
) -> Result<(), BlockchainError> {
    validate_header(block.header(), chain, flow, now_ms, syncing)?;
    validate_group(chain_index, serviced)?;
    validate_non_empty_transactions(block)?;
    validate_coinbase(block)?;
    validate_merkle_root(block)?;
    validate_no_double_spend_in_block(block)?;
    validate_transactions(block, chain_index, world, env)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockflow_common::chain_index::GroupIndex;
    use blockflow_common::crypto::{hash, KeyPair, Signature};
    use blockflow_common::difficulty::max_target;
    use blockflow_common::network::NetworkId;
    use blockflow_common::transaction::{AssetOutput, LockupScript, UnsignedTransaction};
    use primitive_types::U256;
    use std::sync::Arc;

    use super::super::chain::HeaderChain;

    fn coinbase_tx(miner: &KeyPair) -> Arc<Transaction> {
        let output = AssetOutput::simple(U256::from(100u64), LockupScript::p2pkh(&miner.public_key()));
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

    fn genesis_block(miner: &KeyPair) -> Block {
        let txs = vec![coinbase_tx(miner)];
        let txs_hash = calculate_merkle_root(&txs);
        let header = BlockHeader::genesis(txs_hash, 1000, max_target());
        Block::new(header, txs)
    }

    #[test]
    fn test_validate_merkle_root_pass_and_fail() {
        let miner = KeyPair::generate();
        let block = genesis_block(&miner);
        assert!(validate_merkle_root(&block).is_ok());

        let mut bad_header = block.header().clone();
        bad_header.txs_hash = hash(b"wrong");
        let bad_block = Block::new(bad_header, block.transactions().to_vec());
        assert_eq!(validate_merkle_root(&bad_block), Err(InvalidBlockStatus::InvalidMerkleRoot));
    }

    #[test]
    fn test_validate_coinbase_and_nonempty() {
        let miner = KeyPair::generate();
        let block = genesis_block(&miner);
        assert!(validate_non_empty_transactions(&block).is_ok());
        assert!(validate_coinbase(&block).is_ok());

        let empty_block = Block::new(block.header().clone(), vec![]);
        assert_eq!(
            validate_non_empty_transactions(&empty_block),
            Err(InvalidBlockStatus::EmptyTransactionList)
        );
        assert_eq!(validate_coinbase(&empty_block), Err(InvalidBlockStatus::InvalidCoinbase));
    }

    #[test]
    fn test_validate_group_rejects_unserviced_index() {
        let chain_index = ChainIndex::new(GroupIndex::new(0), GroupIndex::new(1));
        let serviced = [ChainIndex::new(GroupIndex::new(2), GroupIndex::new(2))];
        assert_eq!(validate_group(chain_index, &serviced), Err(InvalidHeaderStatus::InvalidGroup));
        assert!(validate_group(chain_index, &[chain_index]).is_ok());
    }

    #[test]
    fn test_validate_work_amount_rejects_zero_target() {
        let miner = KeyPair::generate();
        let mut block = genesis_block(&miner);
        let mut header = block.header().clone();
        header.target = U256::zero();
        block = Block::new(header, block.transactions().to_vec());
        assert_eq!(validate_work_amount(block.header()), Err(InvalidHeaderStatus::InvalidWorkAmount));
    }

    #[test]
    fn test_validate_parent_missing() {
        let chain = HeaderChain::new();
        let header = BlockHeader::new(
            hash(b"unseen parent"),
            vec![Hash::zero(); blockflow_common::block::deps_len()],
            hash(b"txs"),
            0,
            max_target(),
            0,
        );
        assert_eq!(
            validate_parent(&header, &chain),
            Err(InvalidHeaderStatus::MissingParent(hash(b"unseen parent")))
        );
    }

    #[test]
    fn test_validate_timestamp_rejects_future() {
        let header = BlockHeader::genesis(hash(b"txs"), 10_000_000, max_target());
        assert_eq!(validate_timestamp(&header, 0, false), Err(InvalidHeaderStatus::InvalidTimeStamp));
        assert!(validate_timestamp(&header, 10_000_000, false).is_ok());
    }

    #[test]
    fn test_double_spend_within_block() {
        let miner = KeyPair::generate();
        let shared_ref = OutputRef::for_output(&hash(b"funding"), 0, 0);
        let unlock = blockflow_common::transaction::UnlockScript::P2PKH(miner.public_key());

        let make_spender = || {
            let unsigned = UnsignedTransaction {
                network_id: NetworkId::Testnet,
                script_opt: None,
                gas_amount: blockflow_common::config::MINIMAL_GAS,
                gas_price: U256::zero(),
                inputs: vec![blockflow_common::transaction::TxInput {
                    output_ref: shared_ref,
                    unlock_script: unlock.clone(),
                }],
                fixed_outputs: vec![AssetOutput::simple(
                    U256::from(1u64),
                    LockupScript::p2pkh(&miner.public_key()),
                )],
            };
            Arc::new(Transaction {
                unsigned,
                input_signatures: vec![miner.sign(b"whatever")],
                contract_inputs: vec![],
                generated_outputs: vec![],
            })
        };

        let coinbase = coinbase_tx(&miner);
        let block = Block::new(
            BlockHeader::genesis(hash(b"txs"), 0, max_target()),
            vec![coinbase, make_spender(), make_spender()],
        );

        assert_eq!(validate_no_double_spend_in_block(&block), Err(InvalidBlockStatus::DoubleSpent));
    }
}
