//! Frame table: per-frame ownership and region chains.

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

use crate::{FrameNumber, ProcessId, layout};

/// Holds metadata for a physical frame.
///
/// A claimed frame belongs to exactly one region of one process. The frames of a region form a
/// chain: the first frame has chain position 0 and each frame links to the next one, the last
/// frame has no successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Frame {
    owner: Option<ProcessId>,
    chain_position: usize,
    next: Option<FrameNumber>,
}

impl Frame {
    /// Returns the owning process, or `None` if the frame is free.
    pub fn owner(&self) -> Option<ProcessId> {
        self.owner
    }

    /// Returns true if no process owns this frame.
    pub fn is_free(&self) -> bool {
        self.owner.is_none()
    }

    /// Returns the ordinal of this frame within its region.
    ///
    /// Only meaningful when the frame is owned.
    pub fn chain_position(&self) -> usize {
        self.chain_position
    }

    /// Returns the next frame of the same region, or `None` if this frame is the last one.
    pub fn next(&self) -> Option<FrameNumber> {
        self.next
    }
}

/// The global frame table.
///
/// One [`Frame`] per physical frame, all free on construction.
pub struct FrameTable {
    frames: Box<[Frame]>,
}

impl FrameTable {
    /// Creates a frame table with every frame free.
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::default(); layout::NUM_PAGES].into_boxed_slice(),
        }
    }

    /// Returns the metadata for `frame`, or `None` if it is out of range.
    pub fn get(&self, frame: FrameNumber) -> Option<&Frame> {
        self.frames.get(frame.as_usize())
    }

    /// Returns the number of free frames.
    pub fn free_count(&self) -> usize {
        self.frames.iter().filter(|frame| frame.is_free()).count()
    }

    /// Claims `count` free frames for `owner` and links them into a chain.
    ///
    /// Frames are taken in increasing index order and chained in that order. Returns the first
    /// frame of the chain, or `None` without modifying anything if fewer than `count` frames are
    /// free or `count` is zero.
    pub fn claim(&mut self, count: usize, owner: ProcessId) -> Option<FrameNumber> {
        if count == 0 || self.free_count() < count {
            return None;
        }

        let claimed: Vec<usize> = (0..self.frames.len())
            .filter(|&index| self.frames[index].is_free())
            .take(count)
            .collect();

        let mut head = None;
        let mut previous: Option<usize> = None;
        for (position, &index) in claimed.iter().enumerate() {
            self.frames[index] = Frame {
                owner: Some(owner),
                chain_position: position,
                next: None,
            };
            match previous {
                Some(prev) => self.frames[prev].next = Some(FrameNumber::new(index)),
                None => head = Some(FrameNumber::new(index)),
            }
            previous = Some(index);
        }

        head
    }

    /// Frees every frame of the chain starting at `head` and returns how many were freed.
    pub fn release(&mut self, head: FrameNumber) -> usize {
        let mut released = 0;
        let mut current = Some(head);
        while let Some(frame) = current {
            let Some(entry) = self.frames.get_mut(frame.as_usize()) else {
                break;
            };
            current = entry.next;
            *entry = Frame::default();
            released += 1;
        }
        released
    }

    /// Returns an iterator over the frames of the chain starting at `head`, in chain order.
    pub fn chain(&self, head: FrameNumber) -> FrameChain<'_> {
        FrameChain {
            table: self,
            current: Some(head),
        }
    }

    /// Returns an iterator over all owned frames in index order.
    pub fn occupied(&self) -> impl Iterator<Item = (FrameNumber, &Frame)> {
        self.frames
            .iter()
            .enumerate()
            .filter(|(_, frame)| !frame.is_free())
            .map(|(index, frame)| (FrameNumber::new(index), frame))
    }
}

impl Default for FrameTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the frames of one region, following the `next` links.
pub struct FrameChain<'a> {
    table: &'a FrameTable,
    current: Option<FrameNumber>,
}

impl Iterator for FrameChain<'_> {
    type Item = FrameNumber;

    fn next(&mut self) -> Option<Self::Item> {
        let frame = self.current?;
        self.current = self.table.get(frame).and_then(Frame::next);
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(raw: u32) -> ProcessId {
        ProcessId::new(raw).unwrap()
    }

    #[test]
    fn starts_all_free() {
        let table = FrameTable::new();
        assert_eq!(table.free_count(), layout::NUM_PAGES);
        assert_eq!(table.occupied().count(), 0);
    }

    #[test]
    fn claims_lowest_frames_in_order() {
        let mut table = FrameTable::new();
        let head = table.claim(3, pid(1)).unwrap();

        assert_eq!(head, FrameNumber::new(0));
        let chain: Vec<_> = table.chain(head).collect();
        assert_eq!(
            chain,
            [FrameNumber::new(0), FrameNumber::new(1), FrameNumber::new(2)]
        );
        for (position, frame) in chain.iter().enumerate() {
            let entry = table.get(*frame).unwrap();
            assert_eq!(entry.owner(), Some(pid(1)));
            assert_eq!(entry.chain_position(), position);
        }
        assert_eq!(table.get(FrameNumber::new(2)).unwrap().next(), None);
        assert_eq!(table.free_count(), layout::NUM_PAGES - 3);
    }

    #[test]
    fn chain_skips_owned_frames() {
        let mut table = FrameTable::new();
        let first = table.claim(2, pid(1)).unwrap();
        let second = table.claim(1, pid(2)).unwrap();
        table.release(first);

        let third = table.claim(3, pid(3)).unwrap();
        let chain: Vec<_> = table.chain(third).collect();
        assert_eq!(second, FrameNumber::new(2));
        assert_eq!(
            chain,
            [FrameNumber::new(0), FrameNumber::new(1), FrameNumber::new(3)]
        );
    }

    #[test]
    fn claim_fails_without_side_effects() {
        let mut table = FrameTable::new();
        table.claim(layout::NUM_PAGES - 1, pid(1)).unwrap();

        assert_eq!(table.claim(2, pid(2)), None);
        assert_eq!(table.claim(0, pid(2)), None);
        assert_eq!(table.free_count(), 1);
    }

    #[test]
    fn release_frees_exactly_the_chain() {
        let mut table = FrameTable::new();
        let first = table.claim(2, pid(1)).unwrap();
        let second = table.claim(2, pid(1)).unwrap();

        assert_eq!(table.release(first), 2);
        assert_eq!(table.free_count(), layout::NUM_PAGES - 2);
        assert!(table.get(FrameNumber::new(0)).unwrap().is_free());
        assert!(table.get(FrameNumber::new(1)).unwrap().is_free());
        assert_eq!(table.chain(second).count(), 2);
        assert_eq!(
            table.get(FrameNumber::new(2)).unwrap().next(),
            Some(FrameNumber::new(3))
        );
    }

    #[test]
    fn get_out_of_range() {
        let table = FrameTable::new();
        assert!(table.get(FrameNumber::new(layout::NUM_PAGES)).is_none());
    }
}
