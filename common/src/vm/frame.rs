// A single frame's execution (spec.md §4.2: "while the stack is non-empty,
// inspect the top frame; if complete, pop; else advance it by one step").
// `Frame::step` performs exactly one such advance.

use crate::config::{GAS_PER_HASH_BYTE, GAS_PER_STATE_BYTE, SCRIPT_CALL_GAS};
use crate::crypto::{hash, Hash};
use super::context::Context;
use super::error::VmError;
use super::gas::GasBox;
use super::script::{Instruction, Script, StackValue};

const STEP_GAS: u64 = 1;

/// Pops a 32-byte contract id off `stack` for `LoadContractState`/
/// `StoreContractState`.
fn pop_contract_id(stack: &mut Vec<StackValue>) -> Result<Hash, VmError> {
    match stack.pop().ok_or(VmError::StackUnderflow)? {
        StackValue::Bytes(bytes) => {
            let array: [u8; 32] = bytes.try_into().map_err(|_| VmError::TypeMismatch)?;
            Ok(Hash::new(array))
        }
        _ => Err(VmError::TypeMismatch),
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Complete(Option<StackValue>),
}

/// One activation of a `Script`: its own operand stack, instruction
/// pointer, and read-only field vector (contract fields for a stateful
/// script, empty for an unlock script).
pub struct Frame {
    instructions: Vec<Instruction>,
    fields: Vec<StackValue>,
    ip: usize,
    stack: Vec<StackValue>,
}

impl Frame {
    /// `startFrame(ctx, fields, args, returnSink)`: the `ctx` and
    /// `returnSink` ends of that contract are the `Context` and `Runtime`
    /// surrounding this frame, not the frame itself.
    pub fn start(script: &Script, fields: Vec<StackValue>, args: Vec<StackValue>) -> Self {
        Self { instructions: script.instructions(), fields, ip: 0, stack: args }
    }

    fn pop(&mut self) -> Result<StackValue, VmError> {
        self.stack.pop().ok_or(VmError::StackUnderflow)
    }

    pub fn step(&mut self, gas: &mut GasBox, ctx: &mut Context) -> Result<StepOutcome, VmError> {
        if self.ip >= self.instructions.len() {
            return Ok(StepOutcome::Complete(self.stack.pop()));
        }

        gas.consume(STEP_GAS)?;
        let instr = self.instructions[self.ip].clone();
        self.ip += 1;

        match instr {
            Instruction::PushBytes(bytes) => self.stack.push(StackValue::Bytes(bytes)),
            Instruction::PushU256(value) => self.stack.push(StackValue::U256(value)),
            Instruction::Dup => {
                let top = self.stack.last().ok_or(VmError::StackUnderflow)?.clone();
                self.stack.push(top);
            }
            Instruction::Pop => {
                self.pop()?;
            }
            Instruction::Equal => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.stack.push(StackValue::Bool(a == b));
            }
            Instruction::Verify => {
                let top = self.pop()?;
                if !top.is_truthy() {
                    return Err(VmError::AssertionFailed);
                }
            }
            Instruction::Hash => {
                let bytes = match self.pop()? {
                    StackValue::Bytes(b) => b,
                    _ => return Err(VmError::TypeMismatch),
                };
                gas.consume(bytes.len() as u64 * GAS_PER_HASH_BYTE)?;
                self.stack.push(StackValue::Bytes(hash(&bytes).as_bytes().to_vec()));
            }
            Instruction::LoadField(index) => {
                let value = self
                    .fields
                    .get(index as usize)
                    .cloned()
                    .ok_or(VmError::InvalidInstruction)?;
                self.stack.push(value);
            }
            Instruction::Return => {
                let value = self.stack.pop();
                return Ok(StepOutcome::Complete(value));
            }
            Instruction::LoadContractState => {
                let world = match ctx {
                    Context::Stateful(world) => world,
                    Context::Stateless => return Err(VmError::InvalidInstruction),
                };
                let contract_id = pop_contract_id(&mut self.stack)?;
                let state = world.get_contract_state(&contract_id).unwrap_or_default();
                gas.consume(state.len() as u64 * GAS_PER_STATE_BYTE)?;
                self.stack.push(StackValue::Bytes(state));
            }
            Instruction::StoreContractState => {
                let world = match ctx {
                    Context::Stateful(world) => world,
                    Context::Stateless => return Err(VmError::InvalidInstruction),
                };
                let state = match self.pop()? {
                    StackValue::Bytes(bytes) => bytes,
                    _ => return Err(VmError::TypeMismatch),
                };
                let contract_id = pop_contract_id(&mut self.stack)?;
                gas.consume(state.len() as u64 * GAS_PER_STATE_BYTE)?;
                world.set_contract_state(&contract_id, state);
            }
        }

        Ok(StepOutcome::Continue)
    }
}

/// Constant overhead charged once per script call, on top of its per-byte
/// and per-step costs (spec.md §4.3: "Gas is charged for ... the call
/// (constant overhead)").
pub fn call_overhead_gas() -> u64 {
    SCRIPT_CALL_GAS
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::context::StatefulWorld;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeWorld {
        state: HashMap<Hash, Vec<u8>>,
    }

    impl StatefulWorld for FakeWorld {
        fn get_contract_state(&self, contract_id: &Hash) -> Option<Vec<u8>> {
            self.state.get(contract_id).cloned()
        }

        fn set_contract_state(&mut self, contract_id: &Hash, state: Vec<u8>) {
            self.state.insert(*contract_id, state);
        }
    }

    #[test]
    fn test_store_then_load_contract_state() {
        let contract_id = hash(b"contract");
        let script = Script::new(vec![
            Instruction::PushBytes(contract_id.to_bytes().to_vec()),
            Instruction::PushBytes(b"hello".to_vec()),
            Instruction::StoreContractState,
            Instruction::PushBytes(contract_id.to_bytes().to_vec()),
            Instruction::LoadContractState,
        ]);
        let mut frame = Frame::start(&script, vec![], vec![]);
        let mut gas = GasBox::new(10_000);
        let mut world = FakeWorld::default();
        let mut ctx = Context::Stateful(&mut world);

        let result = loop {
            match frame.step(&mut gas, &mut ctx).unwrap() {
                StepOutcome::Continue => continue,
                StepOutcome::Complete(value) => break value,
            }
        };

        assert_eq!(result, Some(StackValue::Bytes(b"hello".to_vec())));
        assert_eq!(world.get_contract_state(&contract_id), Some(b"hello".to_vec()));
    }

    #[test]
    fn test_load_contract_state_in_stateless_context_fails() {
        let contract_id = hash(b"contract");
        let script = Script::new(vec![
            Instruction::PushBytes(contract_id.to_bytes().to_vec()),
            Instruction::LoadContractState,
        ]);
        let mut frame = Frame::start(&script, vec![], vec![]);
        let mut gas = GasBox::new(1000);
        let mut ctx = Context::Stateless;

        assert_eq!(frame.step(&mut gas, &mut ctx), Err(VmError::InvalidInstruction));
    }

    #[test]
    fn test_push_and_verify() {
        let script = Script::new(vec![Instruction::PushU256(1u64.into()), Instruction::Verify]);
        let mut frame = Frame::start(&script, vec![], vec![]);
        let mut gas = GasBox::new(1000);
        let mut ctx = Context::Stateless;

        loop {
            match frame.step(&mut gas, &mut ctx).unwrap() {
                StepOutcome::Continue => continue,
                StepOutcome::Complete(value) => {
                    assert!(value.is_none());
                    break;
                }
            }
        }
    }

    #[test]
    fn test_verify_false_fails() {
        let script = Script::new(vec![Instruction::PushU256(0u64.into()), Instruction::Verify]);
        let mut frame = Frame::start(&script, vec![], vec![]);
        let mut gas = GasBox::new(1000);
        let mut ctx = Context::Stateless;

        let err = loop {
            match frame.step(&mut gas, &mut ctx) {
                Ok(StepOutcome::Continue) => continue,
                Ok(StepOutcome::Complete(_)) => panic!("expected failure"),
                Err(e) => break e,
            }
        };
        assert_eq!(err, VmError::AssertionFailed);
    }

    #[test]
    fn test_hash_instruction() {
        let script = Script::new(vec![Instruction::PushBytes(b"abc".to_vec()), Instruction::Hash]);
        let mut frame = Frame::start(&script, vec![], vec![]);
        let mut gas = GasBox::new(1000);
        let mut ctx = Context::Stateless;

        let result = loop {
            match frame.step(&mut gas, &mut ctx).unwrap() {
                StepOutcome::Continue => continue,
                StepOutcome::Complete(value) => break value,
            }
        };

        match result {
            Some(StackValue::Bytes(bytes)) => assert_eq!(bytes, hash(b"abc").as_bytes().to_vec()),
            _ => panic!("expected hash bytes"),
        }
    }
}
