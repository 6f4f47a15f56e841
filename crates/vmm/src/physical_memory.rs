//! The simulated physical store.

use alloc::boxed::Box;
use alloc::vec;

use crate::{FrameNumber, PhysicalAddress, layout};

/// Simulated RAM.
///
/// A zero-filled byte buffer of `RAM_SIZE` bytes, addressed by [`PhysicalAddress`]. The store
/// performs no locking of its own; the [`MemoryManager`](crate::MemoryManager) keeps it behind
/// its global lock.
pub struct PhysicalMemory {
    memory: Box<[u8]>,
}

impl PhysicalMemory {
    /// Creates a zeroed physical store.
    pub fn new() -> Self {
        Self {
            memory: vec![0u8; layout::RAM_SIZE].into_boxed_slice(),
        }
    }

    /// Reads the byte at `addr`.
    ///
    /// # Panics
    /// Panics if `addr` is outside the store.
    pub fn read(&self, addr: PhysicalAddress) -> u8 {
        assert!(
            addr.as_usize() < self.memory.len(),
            "physical address out of bounds"
        );
        self.memory[addr.as_usize()]
    }

    /// Writes `value` to the byte at `addr`.
    ///
    /// # Panics
    /// Panics if `addr` is outside the store.
    pub fn write(&mut self, addr: PhysicalAddress, value: u8) {
        assert!(
            addr.as_usize() < self.memory.len(),
            "physical address out of bounds"
        );
        self.memory[addr.as_usize()] = value;
    }

    /// Returns the bytes backing `frame`.
    ///
    /// # Panics
    /// Panics if `frame` is not below `NUM_PAGES`.
    pub fn frame(&self, frame: FrameNumber) -> &[u8] {
        &self.memory[frame.start().as_usize()..frame.end().as_usize()]
    }

    /// Returns the size of the store in bytes.
    pub fn size(&self) -> usize {
        self.memory.len()
    }
}

impl Default for PhysicalMemory {
    fn default() -> Self {
        Self::new()
    }
}
