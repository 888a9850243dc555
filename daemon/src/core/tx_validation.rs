// Transaction validation (spec.md §4.3): stateless pipeline (pure function of
// the tx and its declared chainIndex) followed by a stateful pipeline
// (requires preOutputs fetched from world state). Both pipelines short-circuit
// on the first failure, matching the propagation policy in spec.md §7.

use std::collections::{HashMap, HashSet};

use blockflow_common::chain_index::{ChainIndex, GroupIndex};
use blockflow_common::config::{
    GAS_PER_HASH_BYTE, MAX_GAS_PER_TX, MAX_OUTPUT_DATA_SIZE, MAX_TOKEN_PER_UTXO, MAX_TX_INPUT_NUM,
    MAX_TX_OUTPUT_NUM, MINIMAL_GAS, P2PK_UNLOCK_GAS, TX_BASE_GAS, TX_INPUT_BASE_GAS, TX_OUTPUT_BASE_GAS,
};
use blockflow_common::config::max_alf_value;
use blockflow_common::crypto::Hashable;
use blockflow_common::network::NetworkId;
use blockflow_common::transaction::{LockupScript, TokenId, Transaction, TxOutput, UnlockScript};
use blockflow_common::vm::{Context, Runtime};
use primitive_types::U256;

use super::error::InvalidTxStatus;
use super::world_state::WorldState;

type TxResult<T> = Result<T, InvalidTxStatus>;

/// The block-level facts a tx is checked against: which network this node
/// runs, and the timestamp of the header it would be included in.
#[derive(Debug, Clone, Copy)]
pub struct BlockEnvironment {
    pub network_id: NetworkId,
    pub header_timestamp_ms: u64,
}

// ===== Stateless pipeline (spec.md §4.3, steps 1-7) =====

pub fn check_network_id(tx: &Transaction, env: &BlockEnvironment) -> TxResult<()> {
    if tx.unsigned.network_id != env.network_id {
        return Err(InvalidTxStatus::InvalidNetworkId);
    }
    Ok(())
}

/// No dedicated "zero inputs" status exists in the taxonomy (spec.md §7), so
/// both the lower and upper bound violations map to `TooManyInputs`.
pub fn check_input_num(tx: &Transaction, chain_index: ChainIndex) -> TxResult<()> {
    let n = tx.unsigned.inputs.len();
    if n == 0 || n > MAX_TX_INPUT_NUM {
        return Err(InvalidTxStatus::TooManyInputs);
    }
    if !tx.contract_inputs.is_empty() && !chain_index.is_intra_group() {
        return Err(InvalidTxStatus::ContractInputForInterGroupTx);
    }
    Ok(())
}

pub fn check_output_num(tx: &Transaction, chain_index: ChainIndex) -> TxResult<()> {
    let total = tx.unsigned.fixed_outputs.len() + tx.generated_outputs.len();
    if total == 0 {
        return Err(InvalidTxStatus::NoOutputs);
    }
    if total > MAX_TX_OUTPUT_NUM {
        return Err(InvalidTxStatus::TooManyOutputs);
    }
    if !chain_index.is_intra_group() && !tx.generated_outputs.is_empty() {
        return Err(InvalidTxStatus::GeneratedOutputForInterGroupTx);
    }
    Ok(())
}

pub fn check_gas_bound(tx: &Transaction) -> TxResult<()> {
    let gas = tx.unsigned.gas_amount;
    if gas < MINIMAL_GAS || gas > MAX_GAS_PER_TX {
        return Err(InvalidTxStatus::InvalidStartGas);
    }
    if tx.unsigned.gas_price.is_zero() || tx.unsigned.gas_price >= max_alf_value() {
        return Err(InvalidTxStatus::InvalidGasPrice);
    }
    Ok(())
}

fn check_single_output_stats(amount: U256, tokens: &[(TokenId, U256)], additional_len: usize) -> TxResult<()> {
    if amount.is_zero() {
        return Err(InvalidTxStatus::InvalidOutputStats);
    }
    if tokens.len() > MAX_TOKEN_PER_UTXO {
        return Err(InvalidTxStatus::InvalidOutputStats);
    }
    if tokens.iter().any(|(_, amount)| amount.is_zero()) {
        return Err(InvalidTxStatus::InvalidOutputStats);
    }
    if additional_len > MAX_OUTPUT_DATA_SIZE {
        return Err(InvalidTxStatus::OutputDataSizeExceeded);
    }
    Ok(())
}

pub fn check_output_stats(tx: &Transaction) -> TxResult<()> {
    let mut alf_total = U256::zero();

    for output in &tx.unsigned.fixed_outputs {
        check_single_output_stats(output.amount, &output.tokens, output.additional_data.len())?;
        alf_total = alf_total.checked_add(output.amount).ok_or(InvalidTxStatus::BalanceOverFlow)?;
    }
    for output in &tx.generated_outputs {
        let additional_len = match output {
            TxOutput::Asset(asset) => asset.additional_data.len(),
            TxOutput::Contract(_) => 0,
        };
        check_single_output_stats(output.amount(), output.tokens(), additional_len)?;
        alf_total = alf_total.checked_add(output.amount()).ok_or(InvalidTxStatus::BalanceOverFlow)?;
    }

    Ok(())
}

/// `getChainIndex`: every input's hint must resolve to `chainIndex.from`;
/// every output's lockup must resolve to `chainIndex.from` (intra-group, all
/// of them) or either `from`/`to` with at least one landing on `to`
/// (inter-group). A lockup's group is derived via `LockupScript::group_hash`
/// (see DESIGN.md for that derivation's grounding).
pub fn check_chain_index(tx: &Transaction, chain_index: ChainIndex) -> TxResult<()> {
    for input in &tx.unsigned.inputs {
        let group = GroupIndex::from_low_bits(input.output_ref.hint);
        if group != chain_index.from {
            return Err(InvalidTxStatus::InvalidInputGroupIndex);
        }
    }

    let lockups = tx
        .unsigned
        .fixed_outputs
        .iter()
        .map(|output| &output.lockup_script)
        .chain(tx.generated_outputs.iter().map(|output| output.lockup_script()));

    let mut has_to_output = false;
    for lockup in lockups {
        let group = GroupIndex::from_low_bits(lockup.group_hash().low_bits());
        if chain_index.is_intra_group() {
            if group != chain_index.from {
                return Err(InvalidTxStatus::InvalidOutputGroupIndex);
            }
        } else if group == chain_index.to {
            has_to_output = true;
        } else if group != chain_index.from {
            return Err(InvalidTxStatus::InvalidOutputGroupIndex);
        }
    }

    if !chain_index.is_intra_group() && !has_to_output {
        return Err(InvalidTxStatus::InvalidOutputGroupIndex);
    }

    Ok(())
}

pub fn check_unique_inputs(tx: &Transaction, chain_index: ChainIndex) -> TxResult<()> {
    let mut seen = HashSet::new();
    for output_ref in tx.input_refs() {
        if !seen.insert(*output_ref) {
            return Err(InvalidTxStatus::TxDoubleSpending);
        }
    }
    if chain_index.is_intra_group() {
        for contract_ref in &tx.contract_inputs {
            if !seen.insert(*contract_ref) {
                return Err(InvalidTxStatus::TxDoubleSpending);
            }
        }
    }
    Ok(())
}

/// Runs the stateless pipeline in spec order, short-circuiting on the first
/// failure.
pub fn validate_stateless(tx: &Transaction, chain_index: ChainIndex, env: &BlockEnvironment) -> TxResult<()> {
    check_network_id(tx, env)?;
    check_input_num(tx, chain_index)?;
    check_output_num(tx, chain_index)?;
    check_gas_bound(tx)?;
    check_output_stats(tx)?;
    check_chain_index(tx, chain_index)?;
    check_unique_inputs(tx, chain_index)?;
    Ok(())
}

// ===== Stateful pipeline (spec.md §4.3, requires preOutputs) =====

/// `IOError::KeyNotFound` from world state resolves to `NonExistInput` at
/// this layer (spec.md §4.1: "`KeyNotFound` signals `NonExistInput` at the
/// tx layer").
pub fn get_pre_outputs(world: &WorldState, tx: &Transaction) -> TxResult<Vec<TxOutput>> {
    world.get_pre_outputs(tx).map_err(|_| InvalidTxStatus::NonExistInput)
}

pub fn check_lock_time(pre_outputs: &[TxOutput], header_timestamp_ms: u64) -> TxResult<()> {
    for output in pre_outputs {
        if let TxOutput::Asset(asset) = output {
            if asset.lock_time_ms > 0 && header_timestamp_ms < asset.lock_time_ms {
                return Err(InvalidTxStatus::TimeLockedTx);
            }
        }
    }
    Ok(())
}

pub fn check_alf_balance(tx: &Transaction, pre_outputs: &[TxOutput]) -> TxResult<()> {
    let mut in_total = U256::zero();
    for output in pre_outputs {
        in_total = in_total.checked_add(output.amount()).ok_or(InvalidTxStatus::BalanceOverFlow)?;
    }

    let mut out_total = U256::zero();
    for output in &tx.unsigned.fixed_outputs {
        out_total = out_total.checked_add(output.amount).ok_or(InvalidTxStatus::BalanceOverFlow)?;
    }
    for output in &tx.generated_outputs {
        out_total = out_total.checked_add(output.amount()).ok_or(InvalidTxStatus::BalanceOverFlow)?;
    }

    let fee = tx
        .unsigned
        .gas_price
        .checked_mul(U256::from(tx.unsigned.gas_amount))
        .ok_or(InvalidTxStatus::BalanceOverFlow)?;
    let expected = out_total.checked_add(fee).ok_or(InvalidTxStatus::BalanceOverFlow)?;

    if in_total != expected {
        return Err(InvalidTxStatus::InvalidAlfBalance);
    }
    Ok(())
}

/// A token absent from `preOutputs` but present in the outputs is treated as
/// newly issued, permitted only when the tx carries a script (only a script
/// can mint); spec.md leaves "newly issued" undefined beyond that phrase, so
/// this is the filled-in rule (see DESIGN.md).
pub fn check_token_balance(tx: &Transaction, pre_outputs: &[TxOutput]) -> TxResult<()> {
    let mut in_map: HashMap<TokenId, U256> = HashMap::new();
    for output in pre_outputs {
        for (token_id, amount) in output.tokens() {
            let entry = in_map.entry(*token_id).or_insert_with(U256::zero);
            *entry = entry.checked_add(*amount).ok_or(InvalidTxStatus::BalanceOverFlow)?;
        }
    }

    let mut out_map: HashMap<TokenId, U256> = HashMap::new();
    let out_token_lists = tx
        .unsigned
        .fixed_outputs
        .iter()
        .map(|output| output.tokens.as_slice())
        .chain(tx.generated_outputs.iter().map(|output| output.tokens()));
    for tokens in out_token_lists {
        for (token_id, amount) in tokens {
            let entry = out_map.entry(*token_id).or_insert_with(U256::zero);
            *entry = entry.checked_add(*amount).ok_or(InvalidTxStatus::BalanceOverFlow)?;
        }
    }

    let mut token_ids: HashSet<TokenId> = in_map.keys().copied().collect();
    token_ids.extend(out_map.keys().copied());

    for token_id in token_ids {
        let in_amount = in_map.get(&token_id).copied().unwrap_or_default();
        let out_amount = out_map.get(&token_id).copied().unwrap_or_default();
        if in_amount != out_amount {
            let newly_issued = in_amount.is_zero() && tx.unsigned.script_opt.is_some();
            if !newly_issued {
                return Err(InvalidTxStatus::InvalidTokenBalance);
            }
        }
    }

    Ok(())
}

fn charge(gas_remaining: u64, amount: u64) -> TxResult<u64> {
    gas_remaining.checked_sub(amount).ok_or(InvalidTxStatus::InvalidStartGas)
}

fn signatures_needed(lockup: &LockupScript) -> usize {
    match lockup {
        LockupScript::P2PKH(_) => 1,
        LockupScript::P2MPKH { m, .. } => *m as usize,
        // P2SH spending authority lives entirely in the revealed script;
        // it never consumes an `inputSignatures` slot.
        LockupScript::P2SH(_) => 0,
    }
}

/// `checkGasAndWitnesses` (spec.md §4.3 step 5): validates each input's
/// unlock condition against its preOutput's lockup, charges the matching
/// per-kind gas, and enforces the signature-compression rule. Returns the
/// gas remaining after every input is processed.
fn check_gas_and_witnesses(tx: &Transaction, pre_outputs: &[TxOutput], mut gas_remaining: u64) -> TxResult<u64> {
    let n = tx.unsigned.inputs.len();

    // Assign each input to a "slot": the first-occurrence index of its
    // (lockup, unlockScript) pair. Every distinct slot claims a contiguous
    // run of `signatures_needed(lockup)` signatures from the shared pool, in
    // slot order.
    let mut distinct_pairs: Vec<(LockupScript, UnlockScript)> = Vec::new();
    let mut slot_starts: Vec<usize> = Vec::new();
    let mut slot_for_input: Vec<usize> = Vec::with_capacity(n);
    let mut next_sig_start = 0usize;

    for i in 0..n {
        let lockup = pre_outputs[i].lockup_script();
        let unlock = &tx.unsigned.inputs[i].unlock_script;
        let existing = distinct_pairs.iter().position(|(l, u)| l == lockup && u == unlock);
        let slot = match existing {
            Some(pos) => pos,
            None => {
                slot_starts.push(next_sig_start);
                next_sig_start += signatures_needed(lockup);
                distinct_pairs.push((lockup.clone(), unlock.clone()));
                distinct_pairs.len() - 1
            }
        };
        slot_for_input.push(slot);
    }

    if tx.input_signatures.len() < next_sig_start {
        return Err(InvalidTxStatus::NotEnoughSignature);
    }
    if tx.input_signatures.len() > next_sig_start {
        return Err(InvalidTxStatus::TooManySignatures);
    }

    let message = tx.unsigned.hash().to_bytes();

    for i in 0..n {
        let lockup = pre_outputs[i].lockup_script();
        let unlock = &tx.unsigned.inputs[i].unlock_script;
        let sig_start = slot_starts[slot_for_input[i]];

        match (lockup, unlock) {
            (LockupScript::P2PKH(pub_key_hash), UnlockScript::P2PKH(pub_key)) => {
                if pub_key.hash() != *pub_key_hash {
                    return Err(InvalidTxStatus::InvalidPublicKeyHash);
                }
                let signature = &tx.input_signatures[sig_start];
                pub_key
                    .verify(&message, signature)
                    .map_err(|_| InvalidTxStatus::InvalidSignature)?;
                gas_remaining = charge(gas_remaining, P2PK_UNLOCK_GAS)?;
            }
            (LockupScript::P2MPKH { pub_keys, m }, UnlockScript::P2MPKH(entries)) => {
                if entries.len() != *m as usize {
                    return Err(InvalidTxStatus::InvalidNumberOfPublicKey);
                }
                let mut last_index: Option<u8> = None;
                for (offset, (pub_key, index)) in entries.iter().enumerate() {
                    if let Some(last) = last_index {
                        if *index <= last {
                            return Err(InvalidTxStatus::InvalidP2mpkhUnlockScript);
                        }
                    }
                    last_index = Some(*index);

                    let expected = pub_keys.get(*index as usize).ok_or(InvalidTxStatus::InvalidP2mpkhUnlockScript)?;
                    if expected != pub_key {
                        return Err(InvalidTxStatus::InvalidPublicKeyHash);
                    }

                    let signature = &tx.input_signatures[sig_start + offset];
                    pub_key
                        .verify(&message, signature)
                        .map_err(|_| InvalidTxStatus::InvalidSignature)?;
                    gas_remaining = charge(gas_remaining, P2PK_UNLOCK_GAS)?;
                }
            }
            (LockupScript::P2SH(script_hash), UnlockScript::P2SH { script, args }) => {
                if script.hash() != *script_hash {
                    return Err(InvalidTxStatus::InvalidScriptHash);
                }
                gas_remaining = charge(gas_remaining, script.bytes_gas_cost())?;
                gas_remaining = charge(gas_remaining, script.size() as u64 * GAS_PER_HASH_BYTE)?;
                gas_remaining = charge(gas_remaining, blockflow_common::vm::call_overhead_gas())?;

                let arg_values = args.iter().cloned().map(blockflow_common::vm::StackValue::Bytes).collect();
                let runtime = Runtime::new(script, Context::Stateless, vec![], arg_values, gas_remaining);
                let outcome = runtime.execute().map_err(InvalidTxStatus::UnlockScriptExeFailed)?;
                gas_remaining = outcome.gas_remaining;
            }
            // A lockup/unlock kind mismatch has no dedicated status in
            // spec.md's taxonomy; it is treated as a failed signature check.
            _ => return Err(InvalidTxStatus::InvalidSignature),
        }
    }

    Ok(gas_remaining)
}

/// Runs the stateful pipeline in spec order and returns `gasUsed`. `world` is
/// the scratch view `checkTxScript` may mutate; callers pass a `cached()`
/// view, never the durable state directly.
pub fn validate_stateful(
    tx: &Transaction,
    pre_outputs: &[TxOutput],
    world: &mut WorldState,
    header_timestamp_ms: u64,
) -> TxResult<u64> {
    check_lock_time(pre_outputs, header_timestamp_ms)?;
    check_alf_balance(tx, pre_outputs)?;
    check_token_balance(tx, pre_outputs)?;

    let mut gas_remaining = tx.unsigned.gas_amount;
    gas_remaining = charge(gas_remaining, TX_BASE_GAS)?;
    gas_remaining = charge(gas_remaining, TX_INPUT_BASE_GAS * tx.unsigned.inputs.len() as u64)?;
    let output_count = (tx.unsigned.fixed_outputs.len() + tx.generated_outputs.len()) as u64;
    gas_remaining = charge(gas_remaining, TX_OUTPUT_BASE_GAS * output_count)?;

    if let Some(script) = &tx.unsigned.script_opt {
        let ctx = Context::Stateful(world);
        let runtime = Runtime::new(script, ctx, vec![], vec![], gas_remaining);
        let outcome = runtime.execute().map_err(InvalidTxStatus::TxScriptExeFailed)?;
        gas_remaining = outcome.gas_remaining;
    }

    gas_remaining = check_gas_and_witnesses(tx, pre_outputs, gas_remaining)?;

    Ok(tx.unsigned.gas_amount - gas_remaining)
}
