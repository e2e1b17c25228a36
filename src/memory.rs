use std::collections::BTreeMap;

use serde::Serialize;

use crate::constants::*;
use crate::page_table::PageId;
use crate::replacement::VirtualPageId;
use crate::{FrameId, ProcessId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FrameStatus {
    Free,
    Allocated,
}

/// The process page currently held by an allocated frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameOwner {
    pub process: ProcessId,
    pub page: PageId,
}

/// A single physical frame. The owner is set exactly when the frame is allocated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    id: FrameId,
    size: u64,
    owner: Option<FrameOwner>,
    allocated_size: u64,
}

impl Frame {
    pub fn new(id: FrameId, size: u64) -> Self {
        Frame { id, size, owner: None, allocated_size: 0 }
    }

    #[inline]
    pub fn id(&self) -> FrameId {
        self.id
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn owner(&self) -> Option<FrameOwner> {
        self.owner
    }

    #[inline]
    pub fn allocated_size(&self) -> u64 {
        self.allocated_size
    }

    #[inline]
    pub fn status(&self) -> FrameStatus {
        match self.owner {
            Some(_) => FrameStatus::Allocated,
            None => FrameStatus::Free,
        }
    }

    #[inline]
    pub fn is_free(&self) -> bool {
        self.owner.is_none()
    }

    /// Whether a request of `size` bytes may be placed here
    #[inline]
    pub fn fits(&self, size: u64) -> bool {
        self.is_free() && size <= self.size
    }

    /// Hand the frame to a process page. Fails if taken or too small.
    pub fn allocate(&mut self, process: ProcessId, page: PageId, size: u64) -> bool {
        if !self.fits(size) {
            return false;
        }
        self.owner = Some(FrameOwner { process, page });
        self.allocated_size = size;
        true
    }

    /// Return the frame to the free state. Freeing a free frame is a no-op failure.
    pub fn release(&mut self) -> bool {
        if self.owner.take().is_none() {
            return false;
        }
        self.allocated_size = 0;
        true
    }
}

/// Aggregate usage of a frame pool
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryStats {
    pub total_frames: usize,
    pub free_frames: usize,
    pub allocated_frames: usize,
    pub total_size: u64,
    pub used_size: u64,
    pub free_size: u64,
    pub utilization_percent: f64,
}

/// Read-only row of the physical memory layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameView {
    pub frame_id: FrameId,
    pub status: FrameStatus,
    pub process_id: Option<ProcessId>,
    pub page_id: Option<PageId>,
    pub size: u64,
    pub allocated_size: u64,
}

/// Physical memory as a fixed array of frames
#[derive(Debug, Clone)]
pub struct FramePool {
    frames: Vec<Frame>,
    frame_size: u64,
}

impl FramePool {
    /// Create `num_frames` free frames of `frame_size` bytes each
    pub fn new(num_frames: usize, frame_size: u64) -> Self {
        let frames = (0..num_frames).map(|id| Frame::new(id, frame_size)).collect();
        FramePool { frames, frame_size }
    }

    /// Create one free frame per entry of `sizes`. The nominal frame size is the largest entry.
    pub fn with_sizes(sizes: &[u64]) -> Self {
        let frames = sizes.iter().enumerate().map(|(id, &size)| Frame::new(id, size)).collect();
        let frame_size = sizes.iter().copied().max().unwrap_or(0);
        FramePool { frames, frame_size }
    }

    #[inline]
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn frame_size(&self) -> u64 {
        self.frame_size
    }

    #[inline]
    pub fn frame(&self, id: FrameId) -> Option<&Frame> {
        self.frames.get(id)
    }

    #[inline]
    pub fn frame_mut(&mut self, id: FrameId) -> Option<&mut Frame> {
        self.frames.get_mut(id)
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Direct access for the allocator's scans
    pub fn frames_mut(&mut self) -> &mut [Frame] {
        &mut self.frames
    }

    /// Free a frame; fails without side effects on free or out-of-range ids
    pub fn deallocate(&mut self, id: FrameId) -> bool {
        self.frames.get_mut(id).is_some_and(Frame::release)
    }

    pub fn free_count(&self) -> usize {
        self.frames.iter().filter(|f| f.is_free()).count()
    }

    pub fn allocated_count(&self) -> usize {
        self.frames.len() - self.free_count()
    }

    pub fn stats(&self) -> MemoryStats {
        let total_frames = self.frames.len();
        let allocated_frames = self.allocated_count();
        let total_size: u64 = self.frames.iter().map(Frame::size).sum();
        let used_size: u64 = self.frames.iter().filter(|f| !f.is_free()).map(Frame::size).sum();
        let utilization_percent = if total_size > 0 {
            used_size as f64 / total_size as f64 * 100.0
        } else {
            0.0
        };

        MemoryStats {
            total_frames,
            free_frames: total_frames - allocated_frames,
            allocated_frames,
            total_size,
            used_size,
            free_size: total_size - used_size,
            utilization_percent,
        }
    }

    pub fn layout(&self) -> Vec<FrameView> {
        self.frames
            .iter()
            .map(|f| FrameView {
                frame_id: f.id,
                status: f.status(),
                process_id: f.owner.map(|o| o.process),
                page_id: f.owner.map(|o| o.page),
                size: f.size,
                allocated_size: f.allocated_size,
            })
            .collect()
    }

    /// Set every frame free
    pub fn reset(&mut self) {
        for frame in &mut self.frames {
            frame.release();
        }
    }
}

impl Default for FramePool {
    fn default() -> Self {
        Self::new(DEFAULT_NUM_FRAMES, DEFAULT_FRAME_SIZE)
    }
}

/// Backing store - simulates secondary storage for demand paging.
///
/// Holds an opaque blob for every page known to the virtual memory
/// subsystem, whether or not it is resident.
#[derive(Debug, Clone, Default)]
pub struct BackingStore {
    pages: BTreeMap<VirtualPageId, Box<[u8]>>,
}

impl BackingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a page image, replacing any previous one
    pub fn store(&mut self, page: VirtualPageId, data: Box<[u8]>) {
        self.pages.insert(page, data);
    }

    /// Write a zero-filled image of `size` bytes
    pub fn store_zeroed(&mut self, page: VirtualPageId, size: u64) {
        self.store(page, vec![0u8; size as usize].into_boxed_slice());
    }

    pub fn load(&self, page: VirtualPageId) -> Option<&[u8]> {
        self.pages.get(&page).map(|data| &data[..])
    }

    #[inline]
    pub fn contains(&self, page: VirtualPageId) -> bool {
        self.pages.contains_key(&page)
    }

    pub fn remove(&mut self, page: VirtualPageId) -> bool {
        self.pages.remove(&page).is_some()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn clear(&mut self) {
        self.pages.clear();
    }
}
