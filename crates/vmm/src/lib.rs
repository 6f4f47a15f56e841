#![cfg_attr(not(test), no_std)]

//! # Virtual Memory Manager (VMM)
//!
//! A simulated two-level paged virtual memory manager. It provides:
//!
//! - A fixed-size simulated physical store carved into frames.
//! - Per-process segment and page tables translating virtual addresses to frames.
//! - Region allocation and release backed by a global frame table, serialized by one lock.
//! - A bounded priority queue for the scheduler to pick the next process.
//!
//! Memory geometry is fixed at build time; see [`layout`].

extern crate alloc;

mod address;
mod dump;
mod frame;
pub mod layout;
mod memory_manager;
mod numbers;
mod page_table;
mod physical_memory;
mod process;
mod queue;

pub use address::{PhysicalAddress, VirtualAddress};
pub use dump::{DumpedFrame, MemoryDump};
pub use frame::{Frame, FrameChain, FrameTable};
pub use memory_manager::{AllocError, FreeError, MemoryManager};
pub use numbers::FrameNumber;
pub use page_table::{PageEntry, PageTable, SegmentEntry, SegmentTable, TranslateError};
pub use physical_memory::PhysicalMemory;
pub use process::{Process, ProcessId};
pub use queue::{Prioritized, ProcessQueue, QueueFull};

pub use layout::{MAX_QUEUE_SIZE, NUM_PAGES, PAGE_SIZE, RAM_SIZE};
