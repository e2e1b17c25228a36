use std::collections::BTreeMap;
use std::fmt;

use bitflags::bitflags;
use serde::Serialize;

use crate::translation::split_address;
use crate::{FrameId, ProcessId};

/// Logical page number inside a paging-simulator process
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PageId(pub u64);

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

bitflags! {
    /// Access rights recorded in a page table entry
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Protection: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const EXECUTE = 1 << 2;
    }
}

impl Default for Protection {
    fn default() -> Self {
        Protection::READ | Protection::WRITE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PageStatus {
    NotPresent,
    Present,
    Modified,
    Referenced,
}

/// One entry of a page table. `frame` is set exactly when the page is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTableEntry {
    page: PageId,
    frame: Option<FrameId>,
    modified: bool,
    referenced: bool,
    protection: Protection,
    status: PageStatus,
}

impl PageTableEntry {
    /// A not-present entry with default protection
    pub fn new(page: PageId) -> Self {
        PageTableEntry {
            page,
            frame: None,
            modified: false,
            referenced: false,
            protection: Protection::default(),
            status: PageStatus::NotPresent,
        }
    }

    /// Page number this entry describes
    #[inline]
    pub fn page(&self) -> PageId {
        self.page
    }

    /// Backing frame, if the page is present
    #[inline]
    pub fn frame(&self) -> Option<FrameId> {
        self.frame
    }

    /// Whether the page is mapped to a frame
    #[inline]
    pub fn is_present(&self) -> bool {
        self.frame.is_some()
    }

    /// Dirty bit
    #[inline]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Set on every translation or access
    #[inline]
    pub fn is_referenced(&self) -> bool {
        self.referenced
    }

    /// Access rights of the page
    #[inline]
    pub fn protection(&self) -> Protection {
        self.protection
    }

    /// Replace the access rights
    pub fn set_protection(&mut self, protection: Protection) {
        self.protection = protection;
    }

    /// Present, modified or not present
    #[inline]
    pub fn status(&self) -> PageStatus {
        self.status
    }

    /// Mark the page present in `frame`
    pub fn map_to_frame(&mut self, frame: FrameId) {
        self.frame = Some(frame);
        self.status = PageStatus::Present;
    }

    /// Drop the frame mapping
    pub fn unmap(&mut self) {
        self.frame = None;
        self.status = PageStatus::NotPresent;
    }

    pub fn mark_modified(&mut self) {
        self.modified = true;
        self.status = PageStatus::Modified;
    }

    pub fn mark_referenced(&mut self) {
        self.referenced = true;
        if self.status == PageStatus::Present {
            self.status = PageStatus::Referenced;
        }
    }

    pub fn clear_referenced(&mut self) {
        self.referenced = false;
        if self.status == PageStatus::Referenced {
            self.status = PageStatus::Present;
        }
    }
}

/// Read-only row of a page table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageTableEntryView {
    pub page_id: PageId,
    pub frame_id: Option<FrameId>,
    pub present: bool,
    pub modified: bool,
    pub referenced: bool,
    pub protection_bits: u8,
    pub status: PageStatus,
}

impl From<&PageTableEntry> for PageTableEntryView {
    fn from(entry: &PageTableEntry) -> Self {
        PageTableEntryView {
            page_id: entry.page,
            frame_id: entry.frame,
            present: entry.is_present(),
            modified: entry.modified,
            referenced: entry.referenced,
            protection_bits: entry.protection.bits(),
            status: entry.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageTableStats {
    pub process_id: ProcessId,
    pub total_pages: usize,
    pub mapped_pages: usize,
    pub unmapped_pages: usize,
    pub page_size: u64,
}

/// Sparse page table of a single process
#[derive(Debug, Clone)]
pub struct PageTable {
    process: ProcessId,
    page_size: u64,
    entries: BTreeMap<PageId, PageTableEntry>,
}

impl PageTable {
    /// An empty table for `process`
    pub fn new(process: ProcessId, page_size: u64) -> Self {
        PageTable { process, page_size, entries: BTreeMap::new() }
    }

    #[inline]
    pub fn process(&self) -> ProcessId {
        self.process
    }

    #[inline]
    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Look up the entry of `page`
    pub fn entry(&self, page: PageId) -> Option<&PageTableEntry> {
        self.entries.get(&page)
    }

    pub fn entry_mut(&mut self, page: PageId) -> Option<&mut PageTableEntry> {
        self.entries.get_mut(&page)
    }

    /// Entry for `page`, created not-present on first reference
    pub fn create_page(&mut self, page: PageId) -> &mut PageTableEntry {
        self.entries.entry(page).or_insert_with(|| PageTableEntry::new(page))
    }

    /// Map `page` to `frame`, creating the entry if needed
    pub fn map_page(&mut self, page: PageId, frame: FrameId) {
        self.create_page(page).map_to_frame(frame);
    }

    /// Unmap a page. Returns `false` if the table has no entry for it.
    pub fn unmap_page(&mut self, page: PageId) -> bool {
        match self.entries.get_mut(&page) {
            Some(entry) => {
                entry.unmap();
                true
            }
            None => false,
        }
    }

    /// Pages currently backed by a frame, with their frames
    pub fn mapped(&self) -> impl Iterator<Item = (PageId, FrameId)> + '_ {
        self.entries.values().filter_map(|e| e.frame.map(|f| (e.page, f)))
    }

    /// Split a logical address into its page and offset
    pub fn split(&self, logical_address: u64) -> (PageId, u64) {
        let (page, offset) = split_address(logical_address, self.page_size);
        (PageId(page), offset)
    }

    /// Entry of the page containing `logical_address`
    pub fn entry_for_address(&self, logical_address: u64) -> Option<&PageTableEntry> {
        self.entry(self.split(logical_address).0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mapped and unmapped page counts
    pub fn stats(&self) -> PageTableStats {
        let total_pages = self.entries.len();
        let mapped_pages = self.mapped().count();
        PageTableStats {
            process_id: self.process,
            total_pages,
            mapped_pages,
            unmapped_pages: total_pages - mapped_pages,
            page_size: self.page_size,
        }
    }

    /// Entries sorted by page number
    pub fn view(&self) -> Vec<PageTableEntryView> {
        self.entries.values().map(PageTableEntryView::from).collect()
    }
}
