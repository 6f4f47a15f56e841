//! Diagnostic snapshot of the physical store.

use alloc::vec::Vec;
use core::fmt;

use crate::{Frame, FrameNumber, PhysicalAddress};

/// One occupied frame and the non-zero bytes it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpedFrame {
    /// The frame number.
    pub frame: FrameNumber,
    /// The frame table entry at the time of the dump.
    pub info: Frame,
    /// Every non-zero byte of the frame, in address order.
    pub bytes: Vec<(PhysicalAddress, u8)>,
}

/// A snapshot of every occupied frame, taken under the memory manager's lock.
///
/// The [`Display`](fmt::Display) output lists one line per frame followed by one indented line
/// per non-zero byte:
///
/// ```text
/// 003: 00c00-00fff - PID: 01 (idx 000, nxt: 004)
///         00c14: 64
/// ```
///
/// A missing successor prints as `-01`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryDump {
    frames: Vec<DumpedFrame>,
}

impl MemoryDump {
    pub(crate) fn new(frames: Vec<DumpedFrame>) -> Self {
        Self { frames }
    }

    /// Returns the occupied frames in index order.
    pub fn frames(&self) -> &[DumpedFrame] {
        &self.frames
    }

    /// Returns true if no frame is occupied.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl fmt::Display for MemoryDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for dumped in &self.frames {
            let owner = dumped.info.owner().map_or(0, |pid| pid.get());
            let next = dumped
                .info
                .next()
                .map_or(-1, |frame| frame.as_usize() as i64);
            writeln!(
                f,
                "{:03}: {:05x}-{:05x} - PID: {:02} (idx {:03}, nxt: {:03})",
                dumped.frame.as_usize(),
                dumped.frame.start().as_usize(),
                dumped.frame.end().as_usize() - 1,
                owner,
                dumped.info.chain_position(),
                next,
            )?;
            for (addr, value) in &dumped.bytes {
                writeln!(f, "\t{:05x}: {:02x}", addr.as_usize(), value)?;
            }
        }
        Ok(())
    }
}
