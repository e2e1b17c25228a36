//! Paging simulator: physical frames, per-process page tables and a
//! pluggable frame allocator.
//!
//! ```
//! use memory_sim::paging::PagingSimulator;
//! use memory_sim::page_table::PageId;
//!
//! let mut sim = PagingSimulator::new(16, 4096, Default::default());
//! sim.create_process(1, 0).unwrap();
//! let frame = sim.allocate_page(1, PageId(0), None).unwrap();
//! let t = sim.translate_address(1, 0x10).unwrap();
//! assert_eq!(t.physical_address, Some(frame as u64 * 4096 + 0x10));
//! ```

use std::collections::BTreeMap;

use serde::Serialize;

use crate::allocator::{AllocationStrategy, FrameAllocator};
use crate::config::PagingConfig;
use crate::error::{SimError, SimResult};
use crate::logging::LogHandle;
use crate::memory::{FramePool, FrameView, MemoryStats};
use crate::page_table::{PageId, PageTable, PageTableEntryView};
use crate::translation::PageTranslation;
use crate::{FrameId, ProcessId};

/// Bookkeeping kept per process next to its page table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessInfo {
    pub num_pages: u64,
    pub allocated_pages: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagingStats {
    pub memory: MemoryStats,
    pub strategy: AllocationStrategy,
    pub total_processes: usize,
    pub total_pages: usize,
    pub page_faults: u64,
    pub successful_translations: u64,
    pub page_fault_rate: f64,
}

#[derive(Debug)]
pub struct PagingSimulator {
    pool: FramePool,
    allocator: FrameAllocator,
    page_tables: BTreeMap<ProcessId, PageTable>,
    processes: BTreeMap<ProcessId, ProcessInfo>,
    page_faults: u64,
    successful_translations: u64,
    log: LogHandle,
}

impl PagingSimulator {
    /// # Panics
    /// Panics if `frame_size` is zero.
    pub fn new(num_frames: usize, frame_size: u64, strategy: AllocationStrategy) -> Self {
        assert!(frame_size > 0, "frame size must be positive");
        Self::with_pool(FramePool::new(num_frames, frame_size), strategy)
    }

    /// Build on an existing pool, e.g. one with uneven frame sizes.
    ///
    /// # Panics
    /// Panics if the pool's page size (its largest frame) is zero, which
    /// includes an empty pool.
    pub fn with_pool(pool: FramePool, strategy: AllocationStrategy) -> Self {
        assert!(pool.frame_size() > 0, "frame size must be positive");
        PagingSimulator {
            pool,
            allocator: FrameAllocator::new(strategy),
            page_tables: BTreeMap::new(),
            processes: BTreeMap::new(),
            page_faults: 0,
            successful_translations: 0,
            log: LogHandle::noop(),
        }
    }

    /// Build from the `[paging]` config section
    pub fn from_config(config: &PagingConfig) -> Self {
        Self::new(config.num_frames, config.frame_size, config.strategy)
    }

    /// Attach a log handle
    pub fn with_logger(mut self, log: LogHandle) -> Self {
        self.log = log;
        self
    }

    #[inline]
    pub fn frame_size(&self) -> u64 {
        self.pool.frame_size()
    }

    #[inline]
    pub fn num_frames(&self) -> usize {
        self.pool.num_frames()
    }

    pub fn pool(&self) -> &FramePool {
        &self.pool
    }

    #[inline]
    pub fn strategy(&self) -> AllocationStrategy {
        self.allocator.strategy()
    }

    /// Switch strategy for later allocations. Existing mappings stay.
    pub fn set_allocation_strategy(&mut self, strategy: AllocationStrategy) {
        self.allocator.set_strategy(strategy);
        self.log.info(format_args!("allocation strategy set to {}", strategy));
    }

    /// Create a process with `num_pages` not-present pages
    pub fn create_process(&mut self, process: ProcessId, num_pages: u64) -> SimResult<()> {
        if self.page_tables.contains_key(&process) {
            return Err(SimError::ProcessExists(process));
        }

        let mut table = PageTable::new(process, self.pool.frame_size());
        for page in 0..num_pages {
            table.create_page(PageId(page));
        }
        self.page_tables.insert(process, table);
        self.processes.insert(process, ProcessInfo { num_pages, allocated_pages: 0 });

        self.log.info(format_args!("created process {} with {} pages", process, num_pages));
        Ok(())
    }

    /// Remove a process, releasing every frame its page table maps
    pub fn remove_process(&mut self, process: ProcessId) -> SimResult<()> {
        let table = self.page_tables.remove(&process).ok_or(SimError::InvalidProcess(process))?;
        self.processes.remove(&process);

        let mut freed = 0;
        for (_, frame) in table.mapped() {
            if self.pool.deallocate(frame) {
                freed += 1;
            }
        }

        self.log.info(format_args!("removed process {}, freed {} frames", process, freed));
        Ok(())
    }

    /// Whether `process` has a page table
    pub fn has_process(&self, process: ProcessId) -> bool {
        self.page_tables.contains_key(&process)
    }

    /// Process ids in ascending order
    pub fn processes(&self) -> impl Iterator<Item = ProcessId> + '_ {
        self.page_tables.keys().copied()
    }

    /// Requested and allocated page counts of a process
    pub fn process_info(&self, process: ProcessId) -> Option<ProcessInfo> {
        self.processes.get(&process).copied()
    }

    /// Page table of a process
    pub fn page_table(&self, process: ProcessId) -> Option<&PageTable> {
        self.page_tables.get(&process)
    }

    /// Serializable rows of a process's page table, ordered by page
    pub fn page_table_view(&self, process: ProcessId) -> SimResult<Vec<PageTableEntryView>> {
        self.page_tables
            .get(&process)
            .map(PageTable::view)
            .ok_or(SimError::InvalidProcess(process))
    }

    /// Back `page` with a frame. An already present page keeps its frame.
    ///
    /// `size` defaults to the frame size.
    pub fn allocate_page(
        &mut self,
        process: ProcessId,
        page: PageId,
        size: Option<u64>,
    ) -> SimResult<FrameId> {
        let table = self.page_tables.get_mut(&process).ok_or(SimError::InvalidProcess(process))?;
        let entry = table.create_page(page);
        if let Some(frame) = entry.frame() {
            return Ok(frame);
        }

        let size = size.unwrap_or(self.pool.frame_size());
        let frame = match self.allocator.allocate(&mut self.pool, process, page, size) {
            Ok(frame) => frame,
            Err(e) => {
                self.log.warn(format_args!(
                    "process {} page {}: no frame for {} bytes ({})",
                    process,
                    page,
                    size,
                    self.allocator.strategy()
                ));
                return Err(e);
            }
        };

        entry.map_to_frame(frame);
        if let Some(info) = self.processes.get_mut(&process) {
            info.allocated_pages += 1;
        }

        self.log.debug(format_args!("process {} page {} -> frame {}", process, page, frame));
        Ok(frame)
    }

    /// Free the frame behind a present page
    pub fn deallocate_page(&mut self, process: ProcessId, page: PageId) -> SimResult<()> {
        let table = self.page_tables.get_mut(&process).ok_or(SimError::InvalidProcess(process))?;
        let entry = table
            .entry_mut(page)
            .filter(|e| e.is_present())
            .ok_or(SimError::InvalidPage { process, page: page.0 })?;

        if let Some(frame) = entry.frame() {
            self.pool.deallocate(frame);
        }
        entry.unmap();

        if let Some(info) = self.processes.get_mut(&process) {
            info.allocated_pages = info.allocated_pages.saturating_sub(1);
        }

        self.log.debug(format_args!("process {} page {} released", process, page));
        Ok(())
    }

    /// Translate a logical address. A missing or non-present page faults.
    pub fn translate_address(
        &mut self,
        process: ProcessId,
        logical_address: u64,
    ) -> SimResult<PageTranslation> {
        let frame_size = self.pool.frame_size();
        let table = self.page_tables.get_mut(&process).ok_or(SimError::InvalidProcess(process))?;
        let (page, offset) = table.split(logical_address);

        let Some(entry) = table.entry_mut(page) else {
            self.page_faults += 1;
            self.log.debug(format_args!("process {} page {}: fault (no entry)", process, page));
            return Ok(PageTranslation::fault(offset));
        };

        entry.mark_referenced();
        match entry.frame() {
            Some(frame) => {
                self.successful_translations += 1;
                Ok(PageTranslation::hit(frame as u64 * frame_size + offset, offset))
            }
            None => {
                self.page_faults += 1;
                self.log.debug(format_args!("process {} page {}: fault (not present)", process, page));
                Ok(PageTranslation::fault(offset))
            }
        }
    }

    /// Touch a page without computing an address.
    ///
    /// Returns `Ok(true)` on a hit and `Ok(false)` on a page fault.
    pub fn access_page(&mut self, process: ProcessId, page: PageId, write: bool) -> SimResult<bool> {
        let table = self.page_tables.get_mut(&process).ok_or(SimError::InvalidProcess(process))?;

        match table.entry_mut(page).filter(|e| e.is_present()) {
            Some(entry) => {
                entry.mark_referenced();
                if write {
                    entry.mark_modified();
                }
                self.successful_translations += 1;
                Ok(true)
            }
            None => {
                self.page_faults += 1;
                Ok(false)
            }
        }
    }

    #[inline]
    pub fn page_faults(&self) -> u64 {
        self.page_faults
    }

    #[inline]
    pub fn successful_translations(&self) -> u64 {
        self.successful_translations
    }

    /// One row per frame, in frame order
    pub fn memory_layout(&self) -> Vec<FrameView> {
        self.pool.layout()
    }

    /// Memory usage plus translation counters
    pub fn statistics(&self) -> PagingStats {
        let attempts = self.page_faults + self.successful_translations;
        PagingStats {
            memory: self.pool.stats(),
            strategy: self.allocator.strategy(),
            total_processes: self.processes.len(),
            total_pages: self.page_tables.values().map(PageTable::len).sum(),
            page_faults: self.page_faults,
            successful_translations: self.successful_translations,
            page_fault_rate: if attempts > 0 {
                self.page_faults as f64 / attempts as f64
            } else {
                0.0
            },
        }
    }

    /// Drop every process, free every frame and zero the counters
    pub fn reset(&mut self) {
        self.pool.reset();
        self.page_tables.clear();
        self.processes.clear();
        self.page_faults = 0;
        self.successful_translations = 0;
        self.allocator.reset();
        self.log.info(format_args!("paging simulator reset"));
    }
}

impl Default for PagingSimulator {
    fn default() -> Self {
        Self::from_config(&PagingConfig::default())
    }
}
