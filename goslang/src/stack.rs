use crate::{Address, RuntimeError};

/// Initial capacities of the two stacks. Both grow on demand.
#[derive(Debug, Clone)]
pub struct ExecutionStateInfo {
    pub stack_size: usize,
    pub return_stack_size: usize,
}

impl Default for ExecutionStateInfo {
    fn default() -> Self {
        Self {
            stack_size: 256,
            return_stack_size: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionStats {
    pub instructions: u64,
    pub peak_depth: usize,
    pub peak_return_depth: usize,
}

/// Registers of one execution unit: operand stack, program counter,
/// current environment and control stack.
#[derive(Debug, Clone)]
pub struct ExecutionState {
    pub stack: Vec<Address>,
    pub return_stack: Vec<Address>,
    pub pc: usize,
    pub env: Address,
    pub stats: ExecutionStats,
}

impl ExecutionState {
    #[must_use]
    pub fn new(info: &ExecutionStateInfo, env: Address, pc: usize) -> Self {
        Self {
            stack: Vec::with_capacity(info.stack_size),
            return_stack: Vec::with_capacity(info.return_stack_size),
            pc,
            env,
            stats: ExecutionStats::default(),
        }
    }

    /// Returns the active portion of the operand stack
    #[must_use]
    pub fn stack(&self) -> &[Address] {
        &self.stack
    }

    /// Returns the active portion of the control stack
    #[must_use]
    pub fn return_stack(&self) -> &[Address] {
        &self.return_stack
    }

    pub fn push(&mut self, value: Address) {
        self.stack.push(value);
        self.stats.peak_depth = self.stats.peak_depth.max(self.stack.len());
    }

    pub fn pop(&mut self) -> Result<Address, RuntimeError> {
        self.stack.pop().ok_or(RuntimeError::StackUnderflow)
    }

    /// Removes the top n values, bottom-most first.
    pub fn pop_slice(&mut self, n: usize) -> Result<Vec<Address>, RuntimeError> {
        let start = self
            .stack
            .len()
            .checked_sub(n)
            .ok_or(RuntimeError::StackUnderflow)?;
        Ok(self.stack.split_off(start))
    }

    /// Gets the nth value from the top of the stack (0-indexed)
    pub fn stack_get_nth(&self, n: usize) -> Result<Address, RuntimeError> {
        self.stack
            .len()
            .checked_sub(n + 1)
            .map(|idx| self.stack[idx])
            .ok_or(RuntimeError::StackUnderflow)
    }

    pub fn push_return(&mut self, marker: Address) {
        self.return_stack.push(marker);
        self.stats.peak_return_depth = self.stats.peak_return_depth.max(self.return_stack.len());
    }

    pub fn pop_return(&mut self) -> Result<Address, RuntimeError> {
        self.return_stack
            .pop()
            .ok_or(RuntimeError::ControlStackUnderflow)
    }

    pub fn peek_return(&self) -> Option<Address> {
        self.return_stack.last().copied()
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    #[must_use]
    pub fn return_depth(&self) -> usize {
        self.return_stack.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> ExecutionState {
        ExecutionState::new(&ExecutionStateInfo::default(), Address::new(1), 0)
    }

    #[test]
    fn push_pop_and_nth() {
        let mut s = state();
        s.push(Address::new(10));
        s.push(Address::new(11));
        s.push(Address::new(12));
        assert_eq!(s.stack_get_nth(0).unwrap(), Address::new(12));
        assert_eq!(s.stack_get_nth(2).unwrap(), Address::new(10));
        assert_eq!(s.stack_get_nth(3), Err(RuntimeError::StackUnderflow));
        assert_eq!(s.pop().unwrap(), Address::new(12));
        assert_eq!(s.depth(), 2);
        assert_eq!(s.stats.peak_depth, 3);
    }

    #[test]
    fn pop_slice_keeps_push_order() {
        let mut s = state();
        for i in 1..=4 {
            s.push(Address::new(i));
        }
        let top = s.pop_slice(3).unwrap();
        assert_eq!(top, vec![Address::new(2), Address::new(3), Address::new(4)]);
        assert_eq!(s.stack(), &[Address::new(1)]);
        assert_eq!(s.pop_slice(2), Err(RuntimeError::StackUnderflow));
        assert_eq!(s.pop_slice(0).unwrap(), vec![]);
    }

    #[test]
    fn empty_stacks_underflow() {
        let mut s = state();
        assert_eq!(s.pop(), Err(RuntimeError::StackUnderflow));
        assert_eq!(s.pop_return(), Err(RuntimeError::ControlStackUnderflow));
        s.push_return(Address::new(3));
        assert_eq!(s.peek_return(), Some(Address::new(3)));
        assert_eq!(s.stats.peak_return_depth, 1);
    }
}
