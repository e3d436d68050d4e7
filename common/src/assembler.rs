use crate::protocol::{EOF, SOF};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    Idle,
    Accumulating,
}

/// A message delimited by SOF and EOF, both included. Its contents are not
/// validated; that is the command processor's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(Vec<u8>);

impl Frame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct FrameAssembler {
    state: AssemblerState,
    buffer: Vec<u8>,
    capacity: usize,
    discarded: u64,
}

impl FrameAssembler {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            state: AssemblerState::Idle,
            buffer: Vec::with_capacity(capacity),
            capacity,
            discarded: 0,
        }
    }

    pub fn state(&self) -> AssemblerState {
        self.state
    }

    /// Messages dropped because they outgrew the buffer.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Consumes one byte and returns a frame once its EOF arrives.
    pub fn push(&mut self, byte: u8) -> Option<Frame> {
        match self.state {
            AssemblerState::Idle => {
                if byte == SOF {
                    self.buffer.clear();
                    self.buffer.push(byte);
                    self.state = AssemblerState::Accumulating;
                }
                None
            }
            AssemblerState::Accumulating => {
                self.buffer.push(byte);
                if byte == EOF {
                    self.state = AssemblerState::Idle;
                    return Some(Frame(std::mem::take(&mut self.buffer)));
                }
                if self.buffer.len() >= self.capacity {
                    self.discarded = self.discarded.saturating_add(1);
                    self.reset();
                }
                None
            }
        }
    }

    /// Consumes a chunk, returning every frame it completes in order.
    pub fn extend(&mut self, bytes: &[u8]) -> Vec<Frame> {
        bytes.iter().filter_map(|byte| self.push(*byte)).collect()
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.state = AssemblerState::Idle;
    }
}
