use crate::error::CpuError;

/// Return addresses pushed by CALL and popped by RET.
///
/// Kept apart from the data stack in memory, so PUSH/POP can never clobber
/// a return address.
#[derive(Debug, Clone)]
pub struct CallStack {
    frames: Vec<usize>,
    limit: usize,
}

impl CallStack {
    pub fn new(limit: usize) -> Self {
        CallStack {
            frames: Vec::new(),
            limit,
        }
    }

    pub fn push(&mut self, return_address: usize) -> Result<(), CpuError> {
        if self.frames.len() >= self.limit {
            return Err(CpuError::StackOverflow);
        }
        self.frames.push(return_address);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<usize, CpuError> {
        self.frames.pop().ok_or(CpuError::CallStackUnderflow)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}
