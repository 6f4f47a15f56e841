//! Per-process two-level translation tables.
//!
//! The first level ([`SegmentTable`]) maps a segment index to a second-level [`PageTable`], which
//! maps a page index to a physical frame. Both levels are unordered lists searched linearly;
//! entries are removed by swapping in the last entry, so their order is not stable.
//!
//! A page table exists only while it holds at least one entry: it is created on the first
//! mapping into its segment and dropped together with its segment entry when the last mapping
//! is removed.

use alloc::vec::Vec;
use core::fmt;

use crate::{FrameNumber, PhysicalAddress, VirtualAddress, layout};

/// Errors reported when a virtual address has no mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslateError {
    /// The first-level table has no entry for the segment.
    NoSegment { segment: usize },
    /// The segment exists but its page table has no entry for the page.
    NoPage { segment: usize, page: usize },
}

impl fmt::Display for TranslateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSegment { segment } => write!(f, "segment {segment} is not mapped"),
            Self::NoPage { segment, page } => {
                write!(f, "page {page} of segment {segment} is not mapped")
            }
        }
    }
}

impl core::error::Error for TranslateError {}

/// A second-level entry mapping a page index to a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageEntry {
    page: usize,
    frame: FrameNumber,
}

impl PageEntry {
    /// Returns the page index this entry maps.
    pub fn page(&self) -> usize {
        self.page
    }

    /// Returns the frame backing the page.
    pub fn frame(&self) -> FrameNumber {
        self.frame
    }
}

/// A second-level table.
#[derive(Debug, Default)]
pub struct PageTable {
    entries: Vec<PageEntry>,
}

impl PageTable {
    fn new() -> Self {
        Self {
            entries: Vec::with_capacity(layout::PAGE_ENTRIES),
        }
    }

    /// Returns the frame mapped at `page`, if any.
    pub fn lookup(&self, page: usize) -> Option<FrameNumber> {
        self.entries
            .iter()
            .find(|entry| entry.page == page)
            .map(PageEntry::frame)
    }

    /// Maps `page` to `frame`, replacing an existing mapping for the same page.
    fn insert(&mut self, page: usize, frame: FrameNumber) {
        match self.entries.iter_mut().find(|entry| entry.page == page) {
            Some(entry) => entry.frame = frame,
            None => self.entries.push(PageEntry { page, frame }),
        }
    }

    /// Removes the mapping for `page` and returns the frame it pointed to.
    fn remove(&mut self, page: usize) -> Option<FrameNumber> {
        let index = self.entries.iter().position(|entry| entry.page == page)?;
        Some(self.entries.swap_remove(index).frame)
    }

    /// Returns the entries of this table in storage order.
    pub fn entries(&self) -> &[PageEntry] {
        &self.entries
    }

    /// Returns the number of mapped pages.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no page is mapped.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A first-level entry owning the page table of one segment.
#[derive(Debug)]
pub struct SegmentEntry {
    segment: usize,
    pages: PageTable,
}

impl SegmentEntry {
    /// Returns the segment index this entry covers.
    pub fn segment(&self) -> usize {
        self.segment
    }

    /// Returns the page table of this segment.
    pub fn pages(&self) -> &PageTable {
        &self.pages
    }
}

/// A first-level table, owned by a [`Process`](crate::Process).
#[derive(Debug, Default)]
pub struct SegmentTable {
    entries: Vec<SegmentEntry>,
}

impl SegmentTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Returns the page table for `segment`, if the segment is present.
    pub fn page_table(&self, segment: usize) -> Option<&PageTable> {
        self.entries
            .iter()
            .find(|entry| entry.segment == segment)
            .map(SegmentEntry::pages)
    }

    fn page_table_mut(&mut self, segment: usize) -> Option<&mut PageTable> {
        self.entries
            .iter_mut()
            .find(|entry| entry.segment == segment)
            .map(|entry| &mut entry.pages)
    }

    /// Translates `virt` to the physical address it is mapped to.
    pub fn translate(&self, virt: VirtualAddress) -> Result<PhysicalAddress, TranslateError> {
        let segment = virt.segment_index();
        let page = virt.page_index();

        let table = self
            .page_table(segment)
            .ok_or(TranslateError::NoSegment { segment })?;
        let frame = table
            .lookup(page)
            .ok_or(TranslateError::NoPage { segment, page })?;

        Ok(PhysicalAddress::from_parts(frame, virt.page_offset()))
    }

    /// Maps the page containing `virt` to `frame`.
    ///
    /// The segment entry and its page table are created if this is the first mapping in the
    /// segment.
    pub fn map(&mut self, virt: VirtualAddress, frame: FrameNumber) {
        let segment = virt.segment_index();
        let page = virt.page_index();

        if self.page_table(segment).is_none() {
            log::trace!("creating page table for segment {segment}");
            self.entries.push(SegmentEntry {
                segment,
                pages: PageTable::new(),
            });
        }

        if let Some(table) = self.page_table_mut(segment) {
            table.insert(page, frame);
        }
    }

    /// Removes the mapping for the page containing `virt` and returns its frame.
    ///
    /// When the last page of a segment is removed, the segment entry and its page table are
    /// removed too.
    pub fn unmap(&mut self, virt: VirtualAddress) -> Option<FrameNumber> {
        let segment = virt.segment_index();
        let index = self
            .entries
            .iter()
            .position(|entry| entry.segment == segment)?;

        let frame = self.entries[index].pages.remove(virt.page_index())?;
        if self.entries[index].pages.is_empty() {
            log::trace!("dropping empty page table for segment {segment}");
            self.entries.swap_remove(index);
        }

        Some(frame)
    }

    /// Returns the segment entries in storage order.
    pub fn segments(&self) -> &[SegmentEntry] {
        &self.entries
    }

    /// Returns every mapping as the page-aligned virtual address and its frame.
    pub fn mappings(&self) -> impl Iterator<Item = (VirtualAddress, FrameNumber)> + '_ {
        self.entries.iter().flat_map(|segment| {
            segment.pages.entries.iter().map(move |entry| {
                let base = (segment.segment << (layout::OFFSET_BITS + layout::PAGE_BITS))
                    | (entry.page << layout::OFFSET_BITS);
                (VirtualAddress::new(base), entry.frame)
            })
        })
    }

    /// Returns the total number of mapped pages.
    pub fn mapped_pages(&self) -> usize {
        self.entries.iter().map(|entry| entry.pages.len()).sum()
    }

    /// Returns the number of segment entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no segment is present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::PAGE_SIZE;

    fn page_at(segment: usize, page: usize) -> VirtualAddress {
        VirtualAddress::new((segment << 15) | (page << 10))
    }

    #[test]
    fn empty_table_misses_segment() {
        let table = SegmentTable::new();
        assert_eq!(
            table.translate(page_at(2, 3)),
            Err(TranslateError::NoSegment { segment: 2 })
        );
    }

    #[test]
    fn missing_page_in_present_segment() {
        let mut table = SegmentTable::new();
        table.map(page_at(0, 1), FrameNumber::new(5));
        assert_eq!(
            table.translate(page_at(0, 2)),
            Err(TranslateError::NoPage {
                segment: 0,
                page: 2
            })
        );
    }

    #[test]
    fn translates_with_offset() {
        let mut table = SegmentTable::new();
        table.map(page_at(1, 4), FrameNumber::new(9));

        let phys = table.translate(page_at(1, 4) + 0x3C).unwrap();
        assert_eq!(phys.as_usize(), (9 << layout::OFFSET_BITS) | 0x3C);
        assert_eq!(phys.frame_number(), FrameNumber::new(9));
    }

    #[test]
    fn creates_one_segment_per_index() {
        let mut table = SegmentTable::new();
        table.map(page_at(0, 30), FrameNumber::new(1));
        table.map(page_at(0, 31), FrameNumber::new(2));
        table.map(page_at(1, 0), FrameNumber::new(3));

        assert_eq!(table.len(), 2);
        assert_eq!(table.page_table(0).unwrap().len(), 2);
        assert_eq!(table.page_table(1).unwrap().len(), 1);
        assert_eq!(table.mapped_pages(), 3);
    }

    #[test]
    fn remapping_a_page_replaces_it() {
        let mut table = SegmentTable::new();
        table.map(page_at(0, 1), FrameNumber::new(1));
        table.map(page_at(0, 1), FrameNumber::new(2));

        assert_eq!(table.mapped_pages(), 1);
        assert_eq!(
            table.translate(page_at(0, 1)).unwrap().frame_number(),
            FrameNumber::new(2)
        );
    }

    #[test]
    fn unmap_keeps_segment_while_pages_remain() {
        let mut table = SegmentTable::new();
        table.map(page_at(0, 1), FrameNumber::new(1));
        table.map(page_at(0, 2), FrameNumber::new(2));

        assert_eq!(table.unmap(page_at(0, 1)), Some(FrameNumber::new(1)));
        assert_eq!(table.len(), 1);
        assert!(table.translate(page_at(0, 1)).is_err());
        assert!(table.translate(page_at(0, 2)).is_ok());
    }

    #[test]
    fn unmap_last_page_drops_only_its_segment() {
        let mut table = SegmentTable::new();
        table.map(page_at(0, 1), FrameNumber::new(1));
        table.map(page_at(1, 1), FrameNumber::new(2));
        table.map(page_at(2, 1), FrameNumber::new(3));

        assert_eq!(table.unmap(page_at(0, 1)), Some(FrameNumber::new(1)));
        assert_eq!(table.len(), 2);
        assert!(table.page_table(0).is_none());
        assert!(table.page_table(1).is_some());
        assert!(table.page_table(2).is_some());
        assert!(table.translate(page_at(2, 1)).is_ok());
    }

    #[test]
    fn unmap_unknown_page() {
        let mut table = SegmentTable::new();
        assert_eq!(table.unmap(page_at(0, 0)), None);
        table.map(page_at(0, 0), FrameNumber::new(1));
        assert_eq!(table.unmap(page_at(0, 1)), None);
        assert_eq!(table.mapped_pages(), 1);
    }

    #[test]
    fn mappings_report_page_addresses() {
        let mut table = SegmentTable::new();
        table.map(page_at(3, 7) + 12, FrameNumber::new(4));

        let mappings: Vec<_> = table.mappings().collect();
        assert_eq!(mappings, [(page_at(3, 7), FrameNumber::new(4))]);
        assert_eq!(page_at(3, 7).as_usize() % PAGE_SIZE, 0);
    }
}
