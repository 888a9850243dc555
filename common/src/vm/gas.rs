use super::error::VmError;

/// Remaining-gas counter for one VM run. Every step and every explicit
/// accounting charge (tx base cost, per-input cost, unlock cost, script
/// bytes cost...) flows through `consume`, so a single place enforces
/// "execution halts the instant gas is exhausted" (spec.md §4.2).
#[derive(Debug, Clone, Copy)]
pub struct GasBox {
    remaining: u64,
}

impl GasBox {
    pub fn new(amount: u64) -> Self {
        Self { remaining: amount }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn consume(&mut self, amount: u64) -> Result<(), VmError> {
        self.remaining = self.remaining.checked_sub(amount).ok_or(VmError::OutOfGas)?;
        Ok(())
    }

    /// Gas spent so far, given the amount this box started with.
    pub fn used_since(&self, starting: u64) -> u64 {
        starting - self.remaining
    }
}
