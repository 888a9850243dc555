// UTXO transaction model (spec.md §3, §4.3).

mod script;
mod token;

pub use script::{LockupScript, TxSignature, UnlockScript};
pub use token::TokenId;

use crate::crypto::{hash, Hash, Hashable, Signature};
use crate::network::NetworkId;
use crate::serializer::{Reader, ReaderError, Serializer, Writer};
use crate::vm::Script;
use primitive_types::U256;

/// `(hint, key)`: the hint encodes which group the referenced output
/// belongs to; the key is the output's unique identifier, derived from the
/// hash of the transaction that created it plus the output's position
/// (spec.md §3: "the key is the UTXO identifier").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct OutputRef {
    pub hint: u32,
    pub key: Hash,
}

impl OutputRef {
    pub fn new(hint: u32, key: Hash) -> Self {
        Self { hint, key }
    }

    /// Derive the key for the `index`-th output of a transaction whose
    /// unsigned part hashes to `tx_hash`.
    pub fn for_output(tx_hash: &Hash, index: u32, hint: u32) -> Self {
        let mut bytes = Vec::with_capacity(36);
        bytes.extend_from_slice(tx_hash.as_bytes());
        bytes.extend_from_slice(&index.to_be_bytes());
        Self { hint, key: hash(&bytes) }
    }
}

impl Serializer for OutputRef {
    fn write(&self, writer: &mut Writer) {
        writer.write_u32(&self.hint);
        writer.write_hash(&self.key);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(OutputRef { hint: reader.read_u32()?, key: reader.read_hash()? })
    }

    fn size(&self) -> usize {
        4 + 32
    }
}

/// Alias used wherever an `OutputRef` names an asset (plain-value) output,
/// as opposed to a contract output.
pub type AssetOutputRef = OutputRef;
pub type ContractOutputRef = OutputRef;

/// `(outputRef, unlockScript)` (spec.md §3).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TxInput {
    pub output_ref: AssetOutputRef,
    pub unlock_script: UnlockScript,
}

impl Serializer for TxInput {
    fn write(&self, writer: &mut Writer) {
        self.output_ref.write(writer);
        self.unlock_script.write(writer);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(TxInput {
            output_ref: OutputRef::read(reader)?,
            unlock_script: UnlockScript::read(reader)?,
        })
    }

    fn size(&self) -> usize {
        self.output_ref.size() + self.unlock_script.size()
    }
}

/// A plain-value, possibly multi-token output (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AssetOutput {
    pub amount: U256,
    pub lockup_script: LockupScript,
    pub lock_time_ms: u64,
    pub tokens: Vec<(TokenId, U256)>,
    pub additional_data: Vec<u8>,
}

impl AssetOutput {
    pub fn simple(amount: U256, lockup_script: LockupScript) -> Self {
        Self { amount, lockup_script, lock_time_ms: 0, tokens: Vec::new(), additional_data: Vec::new() }
    }
}

impl Serializer for AssetOutput {
    fn write(&self, writer: &mut Writer) {
        writer.write_u256(&self.amount);
        self.lockup_script.write(writer);
        writer.write_u64(&self.lock_time_ms);
        writer.write_u32(&(self.tokens.len() as u32));
        for (id, amount) in &self.tokens {
            writer.write_hash(id);
            writer.write_u256(amount);
        }
        writer.write_blob(&self.additional_data);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let amount = reader.read_u256()?;
        let lockup_script = LockupScript::read(reader)?;
        let lock_time_ms = reader.read_u64()?;
        let tokens_len = reader.read_u32()? as usize;
        let mut tokens = Vec::with_capacity(tokens_len.min(1 << 16));
        for _ in 0..tokens_len {
            tokens.push((reader.read_hash()?, reader.read_u256()?));
        }
        let additional_data = reader.read_blob()?;
        Ok(AssetOutput { amount, lockup_script, lock_time_ms, tokens, additional_data })
    }

    fn size(&self) -> usize {
        32 + self.lockup_script.size()
            + 8
            + 4
            + self.tokens.len() * (32 + 32)
            + 4
            + self.additional_data.len()
    }
}

/// A contract-owned output produced by a tx script (spec.md §4.1 world
/// state: contract outputs keyed by `ContractOutputRef`).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ContractOutput {
    pub amount: U256,
    pub lockup_script: LockupScript,
    pub tokens: Vec<(TokenId, U256)>,
}

impl Serializer for ContractOutput {
    fn write(&self, writer: &mut Writer) {
        writer.write_u256(&self.amount);
        self.lockup_script.write(writer);
        writer.write_u32(&(self.tokens.len() as u32));
        for (id, amount) in &self.tokens {
            writer.write_hash(id);
            writer.write_u256(amount);
        }
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let amount = reader.read_u256()?;
        let lockup_script = LockupScript::read(reader)?;
        let tokens_len = reader.read_u32()? as usize;
        let mut tokens = Vec::with_capacity(tokens_len.min(1 << 16));
        for _ in 0..tokens_len {
            tokens.push((reader.read_hash()?, reader.read_u256()?));
        }
        Ok(ContractOutput { amount, lockup_script, tokens })
    }

    fn size(&self) -> usize {
        32 + self.lockup_script.size() + 4 + self.tokens.len() * 64
    }
}

/// An output produced by VM execution rather than declared up front
/// (spec.md §3: `generatedOutputs: [TxOutput]`).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TxOutput {
    Asset(AssetOutput),
    Contract(ContractOutput),
}

impl TxOutput {
    pub fn amount(&self) -> U256 {
        match self {
            TxOutput::Asset(out) => out.amount,
            TxOutput::Contract(out) => out.amount,
        }
    }

    pub fn tokens(&self) -> &[(TokenId, U256)] {
        match self {
            TxOutput::Asset(out) => &out.tokens,
            TxOutput::Contract(out) => &out.tokens,
        }
    }

    pub fn lockup_script(&self) -> &LockupScript {
        match self {
            TxOutput::Asset(out) => &out.lockup_script,
            TxOutput::Contract(out) => &out.lockup_script,
        }
    }
}

impl Serializer for TxOutput {
    fn write(&self, writer: &mut Writer) {
        match self {
            TxOutput::Asset(out) => {
                writer.write_u8(0);
                out.write(writer);
            }
            TxOutput::Contract(out) => {
                writer.write_u8(1);
                out.write(writer);
            }
        }
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(match reader.read_u8()? {
            0 => TxOutput::Asset(AssetOutput::read(reader)?),
            1 => TxOutput::Contract(ContractOutput::read(reader)?),
            _ => return Err(ReaderError::InvalidValue),
        })
    }

    fn size(&self) -> usize {
        1 + match self {
            TxOutput::Asset(out) => out.size(),
            TxOutput::Contract(out) => out.size(),
        }
    }
}

/// The part of a transaction that gets signed (spec.md §3).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UnsignedTransaction {
    pub network_id: NetworkId,
    pub script_opt: Option<Script>,
    pub gas_amount: u64,
    pub gas_price: U256,
    pub inputs: Vec<TxInput>,
    pub fixed_outputs: Vec<AssetOutput>,
}

impl Serializer for UnsignedTransaction {
    fn write(&self, writer: &mut Writer) {
        self.network_id.write(writer);
        self.script_opt.write(writer);
        writer.write_u64(&self.gas_amount);
        writer.write_u256(&self.gas_price);
        self.inputs.write(writer);
        self.fixed_outputs.write(writer);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(UnsignedTransaction {
            network_id: NetworkId::read(reader)?,
            script_opt: Option::<Script>::read(reader)?,
            gas_amount: reader.read_u64()?,
            gas_price: reader.read_u256()?,
            inputs: Vec::<TxInput>::read(reader)?,
            fixed_outputs: Vec::<AssetOutput>::read(reader)?,
        })
    }

    fn size(&self) -> usize {
        self.network_id.size()
            + self.script_opt.size()
            + 8
            + 32
            + self.inputs.size()
            + self.fixed_outputs.size()
    }
}

impl Hashable for UnsignedTransaction {}

/// `(unsigned, inputSignatures, contractInputs, generatedOutputs)` (spec.md §3).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Transaction {
    pub unsigned: UnsignedTransaction,
    pub input_signatures: Vec<Signature>,
    pub contract_inputs: Vec<ContractOutputRef>,
    pub generated_outputs: Vec<TxOutput>,
}

impl Transaction {
    /// Coinbase shape invariant (spec.md §3): zero inputs, exactly one
    /// output, no contract inputs or generated outputs, and a single zero
    /// signature standing in for "unsigned".
    pub fn is_coinbase_shape(&self) -> bool {
        self.unsigned.inputs.is_empty()
            && self.unsigned.fixed_outputs.len() == 1
            && self.contract_inputs.is_empty()
            && self.generated_outputs.is_empty()
            && self.input_signatures.len() == 1
            && self.input_signatures[0].is_zero()
    }

    /// All asset-output refs this tx consumes, in `tx.inputs` order — the
    /// order `getPreOutputs` must preserve (spec.md §4.1).
    pub fn input_refs(&self) -> impl Iterator<Item = &AssetOutputRef> {
        self.unsigned.inputs.iter().map(|input| &input.output_ref)
    }

    /// Every `OutputRef` this tx would spend, inputs then contract inputs —
    /// the exact concatenation order `getPreOutputs` returns (spec.md §4.1:
    /// "`tx.inputs ++ tx.contractInputs`").
    pub fn all_spent_refs(&self) -> impl Iterator<Item = &OutputRef> {
        self.input_refs().chain(self.contract_inputs.iter())
    }
}

impl Serializer for Transaction {
    fn write(&self, writer: &mut Writer) {
        self.unsigned.write(writer);
        self.input_signatures.write(writer);
        self.contract_inputs.write(writer);
        self.generated_outputs.write(writer);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Transaction {
            unsigned: UnsignedTransaction::read(reader)?,
            input_signatures: Vec::<Signature>::read(reader)?,
            contract_inputs: Vec::<ContractOutputRef>::read(reader)?,
            generated_outputs: Vec::<TxOutput>::read(reader)?,
        })
    }

    fn size(&self) -> usize {
        self.unsigned.size()
            + self.input_signatures.size()
            + self.contract_inputs.size()
            + self.generated_outputs.size()
    }
}

impl Hashable for Transaction {}

impl AsRef<Transaction> for Transaction {
    fn as_ref(&self) -> &Transaction {
        self
    }
}
