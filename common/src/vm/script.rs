// Script bytecode: the unit a Frame executes (spec.md §4.2). Used both as a
// P2SH unlock script (stateless) and as a tx script (stateful, intra-group
// only). `Script::to_bytes()` is what `Hash(script.bytes) == lockup.scriptHash`
// checks against (spec.md §4.3), so its `Serializer` impl IS its wire format.

use crate::config::GAS_PER_SCRIPT_BYTE;
use crate::crypto::Hashable;
use crate::serializer::{Reader, ReaderError, Serializer, Writer};
use primitive_types::U256;

/// A value living on a frame's operand stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackValue {
    Bytes(Vec<u8>),
    U256(U256),
    Bool(bool),
}

impl StackValue {
    pub fn is_truthy(&self) -> bool {
        match self {
            StackValue::Bool(b) => *b,
            StackValue::U256(v) => !v.is_zero(),
            StackValue::Bytes(b) => !b.is_empty(),
        }
    }
}

/// A single VM instruction. Deliberately small: this is the instruction set
/// P2SH unlock scripts and tx scripts are built from, not a general-purpose
/// language — every op is O(1) to gas-cost and has one obvious effect on the
/// stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    PushBytes(Vec<u8>),
    PushU256(U256),
    Dup,
    Pop,
    Equal,
    /// Pop one value; halt with `AssertionFailed` unless it is truthy.
    Verify,
    /// Pop bytes, push their hash (as bytes).
    Hash,
    /// Push a copy of `fields[index]` (the frame's read-only contract-field
    /// vector, supplied by `startFrame`).
    LoadField(u16),
    Return,
    /// Pop a 32-byte contract id; push its stored state (empty bytes if
    /// unset). Stateful context only (spec.md §4.2: world-state effects).
    LoadContractState,
    /// Pop state bytes, then a 32-byte contract id; write the state under
    /// that id. Stateful context only.
    StoreContractState,
}

impl Instruction {
    fn tag(&self) -> u8 {
        match self {
            Instruction::PushBytes(_) => 0,
            Instruction::PushU256(_) => 1,
            Instruction::Dup => 2,
            Instruction::Pop => 3,
            Instruction::Equal => 4,
            Instruction::Verify => 5,
            Instruction::Hash => 6,
            Instruction::Return => 7,
            Instruction::LoadField(_) => 8,
            Instruction::LoadContractState => 9,
            Instruction::StoreContractState => 10,
        }
    }
}

impl Serializer for Instruction {
    fn write(&self, writer: &mut Writer) {
        writer.write_u8(self.tag());
        match self {
            Instruction::PushBytes(bytes) => writer.write_blob(bytes),
            Instruction::PushU256(value) => writer.write_u256(value),
            Instruction::LoadField(index) => writer.write_u16(*index),
            Instruction::Dup
            | Instruction::Pop
            | Instruction::Equal
            | Instruction::Verify
            | Instruction::Hash
            | Instruction::Return
            | Instruction::LoadContractState
            | Instruction::StoreContractState => {}
        }
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(match reader.read_u8()? {
            0 => Instruction::PushBytes(reader.read_blob()?),
            1 => Instruction::PushU256(reader.read_u256()?),
            2 => Instruction::Dup,
            3 => Instruction::Pop,
            4 => Instruction::Equal,
            5 => Instruction::Verify,
            6 => Instruction::Hash,
            7 => Instruction::Return,
            8 => Instruction::LoadField(reader.read_u16()?),
            9 => Instruction::LoadContractState,
            10 => Instruction::StoreContractState,
            _ => return Err(ReaderError::InvalidValue),
        })
    }

    fn size(&self) -> usize {
        1 + match self {
            Instruction::PushBytes(bytes) => 4 + bytes.len(),
            Instruction::PushU256(_) => 32,
            Instruction::LoadField(_) => 2,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Script {
    pub instructions: Vec<InstructionRepr>,
}

/// Serde-friendly mirror of `Instruction`. Kept separate so `Instruction`
/// stays a plain consensus-codec type while `Script` can still round-trip
/// through JSON (RPC payloads, test fixtures) without hand rolling a second
/// serde impl for `U256`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum InstructionRepr {
    PushBytes(Vec<u8>),
    PushU256([u8; 32]),
    Dup,
    Pop,
    Equal,
    Verify,
    Hash,
    LoadField(u16),
    Return,
    LoadContractState,
    StoreContractState,
}

impl From<&Instruction> for InstructionRepr {
    fn from(instr: &Instruction) -> Self {
        match instr {
            Instruction::PushBytes(b) => InstructionRepr::PushBytes(b.clone()),
            Instruction::PushU256(v) => {
                let mut buf = [0u8; 32];
                v.to_big_endian(&mut buf);
                InstructionRepr::PushU256(buf)
            }
            Instruction::Dup => InstructionRepr::Dup,
            Instruction::Pop => InstructionRepr::Pop,
            Instruction::Equal => InstructionRepr::Equal,
            Instruction::Verify => InstructionRepr::Verify,
            Instruction::Hash => InstructionRepr::Hash,
            Instruction::LoadField(index) => InstructionRepr::LoadField(*index),
            Instruction::Return => InstructionRepr::Return,
            Instruction::LoadContractState => InstructionRepr::LoadContractState,
            Instruction::StoreContractState => InstructionRepr::StoreContractState,
        }
    }
}

impl From<&InstructionRepr> for Instruction {
    fn from(repr: &InstructionRepr) -> Self {
        match repr {
            InstructionRepr::PushBytes(b) => Instruction::PushBytes(b.clone()),
            InstructionRepr::PushU256(buf) => Instruction::PushU256(U256::from_big_endian(buf)),
            InstructionRepr::Dup => Instruction::Dup,
            InstructionRepr::Pop => Instruction::Pop,
            InstructionRepr::Equal => Instruction::Equal,
            InstructionRepr::Verify => Instruction::Verify,
            InstructionRepr::Hash => Instruction::Hash,
            InstructionRepr::LoadField(index) => Instruction::LoadField(*index),
            InstructionRepr::Return => Instruction::Return,
            InstructionRepr::LoadContractState => Instruction::LoadContractState,
            InstructionRepr::StoreContractState => Instruction::StoreContractState,
        }
    }
}

impl Script {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions: instructions.iter().map(InstructionRepr::from).collect() }
    }

    pub fn instructions(&self) -> Vec<Instruction> {
        self.instructions.iter().map(Instruction::from).collect()
    }

    /// Gas charged up front for carrying this script's bytes, before a
    /// single instruction executes (spec.md §4.3: "Gas is charged for
    /// `script.bytes.size`... ").
    pub fn bytes_gas_cost(&self) -> u64 {
        self.size() as u64 * GAS_PER_SCRIPT_BYTE
    }
}

impl Serializer for Script {
    fn write(&self, writer: &mut Writer) {
        self.instructions().write(writer);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let instructions = Vec::<Instruction>::read(reader)?;
        Ok(Script::new(instructions))
    }

    fn size(&self) -> usize {
        self.instructions().iter().map(|i| i.size()).sum::<usize>() + 4
    }
}

/// `Hash(script.bytes) == lockup.scriptHash` (spec.md §4.3 P2SH check) is
/// exactly this trait's default `hash()`.
impl Hashable for Script {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_roundtrip() {
        let script = Script::new(vec![
            Instruction::PushBytes(vec![1, 2, 3]),
            Instruction::Hash,
            Instruction::Verify,
        ]);
        let bytes = script.to_bytes();
        assert_eq!(bytes.len(), script.size());
        let decoded = Script::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.instructions(), script.instructions());
    }

    #[test]
    fn test_truthy() {
        assert!(StackValue::Bool(true).is_truthy());
        assert!(!StackValue::Bool(false).is_truthy());
        assert!(!StackValue::U256(U256::zero()).is_truthy());
        assert!(StackValue::U256(U256::one()).is_truthy());
    }
}
