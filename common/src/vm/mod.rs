// Frame-stack interpreter for unlock scripts (stateless) and tx scripts
// (stateful), per spec.md §4.2 and the design note in §9: "the VM's frame
// stack with two context variants maps to a tagged-variant Context; the
// execute loop is generic over the context. Recursive tail execution maps
// to an explicit loop bounded by frameStackMaxSize."

mod context;
mod error;
mod frame;
mod gas;
mod script;

pub use context::{Context, StatefulWorld};
pub use error::VmError;
pub use frame::call_overhead_gas;
use frame::{Frame, StepOutcome};
pub use gas::GasBox;
pub use script::{Instruction, Script, StackValue};

use crate::config::FRAME_STACK_MAX_SIZE;

/// One VM run: a bounded stack of frames plus the gas meter they share.
/// `execute` drains the stack exactly as the design note describes: while
/// non-empty, look at the top frame; step it; pop it when it completes.
pub struct Runtime<'w> {
    frames: Vec<Frame>,
    gas: GasBox,
    ctx: Context<'w>,
    return_value: Option<StackValue>,
}

/// What a completed run leaves behind: the value (if any) the outermost
/// frame returned, and the gas left in the box — callers derive `gasUsed`
/// as `gasAmount - gas_remaining` (spec.md §4.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub return_value: Option<StackValue>,
    pub gas_remaining: u64,
}

impl<'w> Runtime<'w> {
    pub fn new(script: &Script, ctx: Context<'w>, fields: Vec<StackValue>, args: Vec<StackValue>, gas_amount: u64) -> Self {
        Self {
            frames: vec![Frame::start(script, fields, args)],
            gas: GasBox::new(gas_amount),
            ctx,
            return_value: None,
        }
    }

    pub fn gas_remaining(&self) -> u64 {
        self.gas.remaining()
    }

    /// Runs to completion or to the first error. Never yields: a VM run is
    /// synchronous and bounded purely by gas and frame depth (spec.md §4.2:
    /// "Suspension: none").
    pub fn execute(mut self) -> Result<ExecutionOutcome, VmError> {
        loop {
            if self.frames.len() > FRAME_STACK_MAX_SIZE {
                return Err(VmError::StackOverflow);
            }

            let frame = match self.frames.last_mut() {
                Some(frame) => frame,
                None => {
                    return Ok(ExecutionOutcome {
                        return_value: self.return_value,
                        gas_remaining: self.gas.remaining(),
                    })
                }
            };

            match frame.step(&mut self.gas, &mut self.ctx)? {
                StepOutcome::Continue => continue,
                StepOutcome::Complete(value) => {
                    self.frames.pop();
                    if self.frames.is_empty() {
                        self.return_value = value;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_executes_to_completion() {
        let script = Script::new(vec![Instruction::PushU256(1u64.into()), Instruction::Verify]);
        let runtime = Runtime::new(&script, Context::Stateless, vec![], vec![], 1000);
        let outcome = runtime.execute().unwrap();
        assert!(outcome.return_value.is_none());
        assert!(outcome.gas_remaining > 0);
    }

    #[test]
    fn test_runtime_out_of_gas() {
        let script = Script::new(vec![Instruction::PushU256(1u64.into()), Instruction::Verify]);
        let runtime = Runtime::new(&script, Context::Stateless, vec![], vec![], 1);
        assert_eq!(runtime.execute(), Err(VmError::OutOfGas));
    }

    #[test]
    fn test_runtime_returns_value() {
        let script = Script::new(vec![Instruction::PushU256(42u64.into()), Instruction::Return]);
        let runtime = Runtime::new(&script, Context::Stateless, vec![], vec![], 1000);
        let outcome = runtime.execute().unwrap();
        assert_eq!(outcome.return_value, Some(StackValue::U256(42u64.into())));
    }
}
