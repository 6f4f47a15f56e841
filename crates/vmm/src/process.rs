//! Process control block fields used by the memory manager.
//!
//! Creation and teardown of processes belong to the scheduler; this module only carries what
//! the memory manager reads and mutates: the process id, the scheduling priority, the break
//! pointer and the first-level translation table.

use core::fmt;
use core::num::NonZeroU32;

use crate::{SegmentTable, VirtualAddress, layout};

/// Identifier of a simulated process.
///
/// Id 0 is reserved to mark free frames and is never a valid process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ProcessId(NonZeroU32);

impl ProcessId {
    /// Creates a process id, or returns `None` for 0.
    pub const fn new(raw: u32) -> Option<Self> {
        match NonZeroU32::new(raw) {
            Some(id) => Some(Self(id)),
            None => None,
        }
    }

    /// Returns the raw id.
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A simulated process as seen by the memory manager.
///
/// Each process owns its translation tables. The break pointer starts one page into the
/// address space, so [`VirtualAddress::NULL`] is never the start of an allocation, and only ever
/// moves up.
#[derive(Debug)]
pub struct Process {
    pid: ProcessId,
    priority: u32,
    break_pointer: VirtualAddress,
    segments: SegmentTable,
}

impl Process {
    /// Creates a process with an empty address space.
    pub fn new(pid: ProcessId, priority: u32) -> Self {
        Self {
            pid,
            priority,
            break_pointer: VirtualAddress::new(layout::PAGE_SIZE),
            segments: SegmentTable::new(),
        }
    }

    /// Returns the process id.
    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    /// Returns the scheduling priority (lower is more urgent).
    pub fn priority(&self) -> u32 {
        self.priority
    }

    /// Returns the next unused virtual address.
    pub fn break_pointer(&self) -> VirtualAddress {
        self.break_pointer
    }

    pub(crate) fn advance_break(&mut self, bytes: usize) {
        self.break_pointer = self.break_pointer + bytes;
    }

    /// Returns the first-level translation table.
    pub fn segments(&self) -> &SegmentTable {
        &self.segments
    }

    pub(crate) fn segments_mut(&mut self) -> &mut SegmentTable {
        &mut self.segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_not_a_process_id() {
        assert_eq!(ProcessId::new(0), None);
        assert_eq!(ProcessId::new(7).map(ProcessId::get), Some(7));
    }

    #[test]
    fn new_process_has_empty_address_space() {
        let process = Process::new(ProcessId::new(1).unwrap(), 3);
        assert_eq!(process.priority(), 3);
        assert_eq!(process.break_pointer().as_usize(), layout::PAGE_SIZE);
        assert!(process.segments().is_empty());
    }
}
