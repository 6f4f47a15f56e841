//! The memory manager: region allocation, release and byte access for simulated processes.
//!
//! All state shared between processes (the physical store and the frame table) lives behind a
//! single lock. Every operation holds it for its full duration, so operations from different
//! processes never interleave. A process's own translation tables are only modified through
//! `&mut Process` while that lock is held.

use alloc::vec::Vec;
use core::fmt;

use spin::{Mutex, Once};

use crate::dump::{DumpedFrame, MemoryDump};
use crate::frame::FrameTable;
use crate::{
    Frame, FrameNumber, PhysicalAddress, PhysicalMemory, Process, TranslateError, VirtualAddress,
    layout,
};

/// Errors that can occur when allocating a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// Zero bytes were requested.
    ZeroSize,
    /// Fewer frames are free than the region needs.
    OutOfFrames { requested: usize, available: usize },
    /// The region would extend the process past the end of its virtual address space.
    VirtualSpaceExhausted {
        requested: usize,
        break_pointer: VirtualAddress,
    },
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroSize => write!(f, "cannot allocate an empty region"),
            Self::OutOfFrames {
                requested,
                available,
            } => write!(
                f,
                "{requested} frames requested but only {available} are free"
            ),
            Self::VirtualSpaceExhausted {
                requested,
                break_pointer,
            } => write!(
                f,
                "{requested} pages from {break_pointer} exceed the virtual address space"
            ),
        }
    }
}

impl core::error::Error for AllocError {}

/// Errors that can occur when freeing a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeError {
    /// The address is not mapped for the process.
    Unmapped(TranslateError),
    /// The address is mapped but lies inside a region rather than on its first page.
    NotRegionStart {
        address: VirtualAddress,
        chain_position: usize,
    },
}

impl fmt::Display for FreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unmapped(err) => write!(f, "cannot free unmapped address: {err}"),
            Self::NotRegionStart {
                address,
                chain_position,
            } => write!(
                f,
                "{address} is page {chain_position} of its region, not the start"
            ),
        }
    }
}

impl core::error::Error for FreeError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Unmapped(err) => Some(err),
            Self::NotRegionStart { .. } => None,
        }
    }
}

impl From<TranslateError> for FreeError {
    fn from(err: TranslateError) -> Self {
        Self::Unmapped(err)
    }
}

/// State guarded by the global lock.
struct State {
    memory: PhysicalMemory,
    frames: FrameTable,
}

impl State {
    /// Releases the region starting at `start`. The lock must be held by the caller.
    fn free(&mut self, start: VirtualAddress, process: &mut Process) -> Result<usize, FreeError> {
        let phys = process.segments().translate(start)?;
        let head = phys.frame_number();

        let chain_position = self
            .frames
            .get(head)
            .map_or(0, |frame| frame.chain_position());
        if chain_position != 0 {
            return Err(FreeError::NotRegionStart {
                address: start,
                chain_position,
            });
        }

        let pages = self.frames.release(head);
        for n in 0..pages {
            process.segments_mut().unmap(start.nth_page(n));
        }

        Ok(pages)
    }
}

/// Global memory manager instance.
static GLOBAL: Once<MemoryManager> = Once::new();

/// Manages the simulated physical store on behalf of every process.
///
/// The manager is `Sync`; share it by reference between the threads running simulated
/// processes.
pub struct MemoryManager {
    state: Mutex<State>,
}

impl MemoryManager {
    /// Creates a manager with a zeroed physical store and every frame free.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                memory: PhysicalMemory::new(),
                frames: FrameTable::new(),
            }),
        }
    }

    /// Creates the process-wide manager.
    ///
    /// # Panics
    ///
    /// Panics if the global manager has already been initialized.
    pub fn init() -> &'static MemoryManager {
        let mut created = false;
        let manager = GLOBAL.call_once(|| {
            created = true;
            Self::new()
        });
        assert!(created, "memory manager already initialized");
        log::debug!(
            "memory manager initialized: {} frames of {} bytes",
            layout::NUM_PAGES,
            layout::PAGE_SIZE
        );
        manager
    }

    /// Returns the process-wide manager.
    ///
    /// # Panics
    ///
    /// Panics if [`MemoryManager::init`] has not been called.
    pub fn global() -> &'static MemoryManager {
        GLOBAL
            .get()
            .expect("memory manager not initialized; call MemoryManager::init first")
    }

    /// Allocates a region of at least `size` bytes for `process`.
    ///
    /// The region covers `ceil(size / PAGE_SIZE)` pages starting at the process's break
    /// pointer, which advances past it. Backing frames are the lowest-numbered free frames and
    /// need not be contiguous. On error nothing is changed.
    pub fn allocate(
        &self,
        size: usize,
        process: &mut Process,
    ) -> Result<VirtualAddress, AllocError> {
        let pages = layout::pages_for(size);
        if pages == 0 {
            return Err(AllocError::ZeroSize);
        }

        let mut state = self.state.lock();

        let available = state.frames.free_count();
        if available < pages {
            log::warn!(
                "pid {}: {} frames requested, {} free",
                process.pid(),
                pages,
                available
            );
            return Err(AllocError::OutOfFrames {
                requested: pages,
                available,
            });
        }

        let start = process.break_pointer();
        let bytes = pages * layout::PAGE_SIZE;
        if start.as_usize() + bytes > layout::RAM_SIZE {
            log::warn!(
                "pid {}: {} pages from {} exceed the virtual address space",
                process.pid(),
                pages,
                start
            );
            return Err(AllocError::VirtualSpaceExhausted {
                requested: pages,
                break_pointer: start,
            });
        }

        let head = state
            .frames
            .claim(pages, process.pid())
            .ok_or(AllocError::OutOfFrames {
                requested: pages,
                available,
            })?;
        process.advance_break(bytes);

        for (position, frame) in state.frames.chain(head).enumerate() {
            let page = start.nth_page(position);
            log::trace!("pid {}: mapping {} -> frame {}", process.pid(), page, frame);
            process.segments_mut().map(page, frame);
        }

        log::debug!(
            "pid {}: allocated {} bytes ({} pages) at {}",
            process.pid(),
            size,
            pages,
            start
        );
        Ok(start)
    }

    /// Frees the region starting at `start` and returns the number of pages released.
    ///
    /// `start` must be an address returned by [`MemoryManager::allocate`] for this process.
    /// The break pointer is not moved back, so the freed virtual range is not reused. On error
    /// nothing is changed.
    pub fn deallocate(
        &self,
        start: VirtualAddress,
        process: &mut Process,
    ) -> Result<usize, FreeError> {
        let mut state = self.state.lock();
        match state.free(start, process) {
            Ok(pages) => {
                log::debug!("pid {}: freed {} pages at {}", process.pid(), pages, start);
                Ok(pages)
            }
            Err(err) => {
                log::debug!("pid {}: free of {} failed: {}", process.pid(), start, err);
                Err(err)
            }
        }
    }

    /// Frees every region `process` still owns and returns the number of pages released.
    pub fn release_all(&self, process: &mut Process) -> usize {
        let mut state = self.state.lock();

        let starts: Vec<VirtualAddress> = process
            .segments()
            .mappings()
            .filter(|(_, frame)| {
                state
                    .frames
                    .get(*frame)
                    .is_some_and(|info| info.chain_position() == 0)
            })
            .map(|(page, _)| page)
            .collect();

        let mut released = 0;
        for start in starts {
            match state.free(start, process) {
                Ok(pages) => released += pages,
                Err(err) => {
                    log::warn!("pid {}: release of {} failed: {}", process.pid(), start, err)
                }
            }
        }

        log::debug!("pid {}: released {} pages", process.pid(), released);
        released
    }

    /// Translates `virt` for `process`.
    pub fn translate(
        &self,
        virt: VirtualAddress,
        process: &Process,
    ) -> Result<PhysicalAddress, TranslateError> {
        let _state = self.state.lock();
        process.segments().translate(virt)
    }

    /// Reads the byte at `virt` in the address space of `process`.
    pub fn read_byte(
        &self,
        virt: VirtualAddress,
        process: &Process,
    ) -> Result<u8, TranslateError> {
        let state = self.state.lock();
        let phys = process.segments().translate(virt)?;
        Ok(state.memory.read(phys))
    }

    /// Writes `value` to `virt` in the address space of `process`.
    pub fn write_byte(
        &self,
        virt: VirtualAddress,
        process: &Process,
        value: u8,
    ) -> Result<(), TranslateError> {
        let mut state = self.state.lock();
        let phys = process.segments().translate(virt)?;
        state.memory.write(phys, value);
        Ok(())
    }

    /// Returns the number of free frames.
    pub fn free_frames(&self) -> usize {
        self.state.lock().frames.free_count()
    }

    /// Returns a copy of the frame table entry for `frame`.
    pub fn frame(&self, frame: FrameNumber) -> Option<Frame> {
        self.state.lock().frames.get(frame).copied()
    }

    /// Takes a snapshot of every occupied frame and its non-zero bytes.
    pub fn dump(&self) -> MemoryDump {
        let state = self.state.lock();
        let frames = state
            .frames
            .occupied()
            .map(|(frame, info)| {
                let bytes = state
                    .memory
                    .frame(frame)
                    .iter()
                    .enumerate()
                    .filter(|(_, value)| **value != 0)
                    .map(|(offset, value)| (PhysicalAddress::from_parts(frame, offset), *value))
                    .collect();
                DumpedFrame {
                    frame,
                    info: *info,
                    bytes,
                }
            })
            .collect();
        MemoryDump::new(frames)
    }
}

impl Default for MemoryManager {
    fn default() -> Self {
        Self::new()
    }
}
