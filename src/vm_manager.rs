//! Demand-paged virtual memory on top of a [`ReplacementEngine`].
//!
//! Every page a process registers is seeded in the backing store, so an
//! absent page is always swapped in from there. Evicted pages are written
//! back as fresh blobs.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::config::VmConfig;
use crate::error::{SimError, SimResult};
use crate::logging::LogHandle;
use crate::memory::{BackingStore, FrameStatus};
use crate::replacement::{ReplacementEngine, ReplacementPolicy, ReplacementStats, VirtualPageId};
use crate::translation::{split_address, PageTranslation};
use crate::ProcessId;

/// Result of [`VirtualMemoryManager::access_page`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccessOutcome {
    pub process_id: ProcessId,
    pub page_id: VirtualPageId,
    pub write: bool,
    pub fault: bool,
    pub replaced_page: Option<VirtualPageId>,
    pub frame_index: Option<usize>,
    pub swap_in: bool,
    pub swap_out: bool,
    pub policy: ReplacementPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VmStats {
    pub policy: ReplacementPolicy,
    pub num_frames: usize,
    pub frame_size: u64,
    pub swap_ins: u64,
    pub swap_outs: u64,
    pub total_swaps: u64,
    pub processes: usize,
    pub backing_store_pages: usize,
    #[serde(flatten)]
    pub replacement: ReplacementStats,
}

/// One physical slot of the virtual memory layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VmFrameView {
    pub frame_id: usize,
    pub page_id: Option<VirtualPageId>,
    pub status: FrameStatus,
    pub base_address: u64,
    pub size: u64,
}

#[derive(Debug)]
pub struct VirtualMemoryManager {
    frame_size: u64,
    replacement: ReplacementEngine,
    backing_store: BackingStore,
    process_pages: BTreeMap<ProcessId, BTreeSet<VirtualPageId>>,
    swap_ins: u64,
    swap_outs: u64,
    log: LogHandle,
}

impl VirtualMemoryManager {
    /// # Panics
    /// Panics if `num_frames` or `frame_size` is zero.
    pub fn new(num_frames: usize, frame_size: u64, policy: ReplacementPolicy) -> Self {
        assert!(num_frames > 0, "at least one frame is required");
        assert!(frame_size > 0, "frame size must be positive");
        VirtualMemoryManager {
            frame_size,
            replacement: ReplacementEngine::new(policy, num_frames),
            backing_store: BackingStore::new(),
            process_pages: BTreeMap::new(),
            swap_ins: 0,
            swap_outs: 0,
            log: LogHandle::noop(),
        }
    }

    /// Build from the `[virtual_memory]` config section
    pub fn from_config(config: &VmConfig) -> Self {
        Self::new(config.num_frames, config.frame_size, config.policy)
    }

    pub fn with_logger(mut self, log: LogHandle) -> Self {
        self.log = log;
        self
    }

    #[inline]
    pub fn frame_size(&self) -> u64 {
        self.frame_size
    }

    #[inline]
    pub fn num_frames(&self) -> usize {
        self.replacement.num_frames()
    }

    #[inline]
    pub fn policy(&self) -> ReplacementPolicy {
        self.replacement.policy()
    }

    pub fn replacement(&self) -> &ReplacementEngine {
        &self.replacement
    }

    pub fn backing_store(&self) -> &BackingStore {
        &self.backing_store
    }

    /// Register the pages of a process. Pages not yet on the backing store
    /// get a zero-filled image there; nothing is loaded into memory.
    ///
    /// Loading an existing process replaces its page set.
    pub fn load_process<I>(&mut self, process: ProcessId, pages: I)
    where
        I: IntoIterator<Item = VirtualPageId>,
    {
        let pages: BTreeSet<VirtualPageId> = pages.into_iter().collect();
        let mut seeded = 0;
        for &page in &pages {
            if !self.backing_store.contains(page) {
                self.backing_store.store_zeroed(page, self.frame_size);
                seeded += 1;
            }
        }

        self.log.info(format_args!(
            "loaded process {} with {} pages ({} new on backing store)",
            process,
            pages.len(),
            seeded
        ));
        self.process_pages.insert(process, pages);
    }

    /// Drop a process: its pages leave the backing store and any resident
    /// slot they hold is freed.
    ///
    /// Page ids are global, so a page another process still registers
    /// stays on the backing store and keeps its slot.
    pub fn remove_process(&mut self, process: ProcessId) -> SimResult<()> {
        let pages = self.process_pages.remove(&process).ok_or(SimError::InvalidProcess(process))?;

        let mut freed = 0;
        for page in pages {
            if self.process_pages.values().any(|other| other.contains(&page)) {
                continue;
            }
            self.backing_store.remove(page);
            if self.replacement.evict_page(page).is_some() {
                freed += 1;
            }
        }

        self.log.info(format_args!("removed process {}, freed {} frames", process, freed));
        Ok(())
    }

    /// Whether `process` is registered
    pub fn has_process(&self, process: ProcessId) -> bool {
        self.process_pages.contains_key(&process)
    }

    pub fn process_pages(&self, process: ProcessId) -> Option<impl Iterator<Item = VirtualPageId> + '_> {
        self.process_pages.get(&process).map(|pages| pages.iter().copied())
    }

    fn check_page(&self, process: ProcessId, page: VirtualPageId) -> SimResult<()> {
        let pages = self.process_pages.get(&process).ok_or(SimError::InvalidProcess(process))?;
        if !pages.contains(&page) {
            return Err(SimError::InvalidPage { process, page: page.0 });
        }
        Ok(())
    }

    /// Reference a page, swapping it in on a fault.
    ///
    /// `future` is only consulted by the Optimal policy.
    pub fn access_page(
        &mut self,
        process: ProcessId,
        page: VirtualPageId,
        write: bool,
        future: &[VirtualPageId],
    ) -> SimResult<AccessOutcome> {
        self.check_page(process, page)?;

        if self.replacement.is_resident(page) {
            let result = self.replacement.access(page, future);
            return Ok(AccessOutcome {
                process_id: process,
                page_id: page,
                write,
                fault: result.fault,
                replaced_page: None,
                frame_index: result.frame_index,
                swap_in: false,
                swap_out: false,
                policy: result.policy,
            });
        }

        if !self.backing_store.contains(page) {
            self.log.error(format_args!(
                "process {} page {} is registered but not on the backing store",
                process, page
            ));
            return Err(SimError::BackingStoreInconsistency(page.0));
        }

        let result = self.replacement.access(page, future);

        let swap_out = match result.replaced_page {
            Some(victim) => {
                self.backing_store.store_zeroed(victim, self.frame_size);
                self.swap_outs += 1;
                self.log.debug(format_args!("swap out page {} from frame {:?}", victim, result.frame_index));
                true
            }
            None => false,
        };
        self.swap_ins += 1;
        self.log.debug(format_args!(
            "process {} page {}: fault, swapped into frame {:?}",
            process, page, result.frame_index
        ));

        Ok(AccessOutcome {
            process_id: process,
            page_id: page,
            write,
            fault: result.fault,
            replaced_page: result.replaced_page,
            frame_index: result.frame_index,
            swap_in: true,
            swap_out,
            policy: result.policy,
        })
    }

    /// Translate a virtual address of `process`.
    ///
    /// Returns `None` for unknown processes and for pages outside the
    /// process's set. A non-resident page faults without loading it.
    pub fn translate_address(&self, process: ProcessId, virtual_address: u64) -> Option<PageTranslation> {
        let (page, offset) = split_address(virtual_address, self.frame_size);
        let page = VirtualPageId(page);
        self.check_page(process, page).ok()?;

        Some(match self.replacement.slot_of(page) {
            Some(slot) => PageTranslation::hit(slot as u64 * self.frame_size + offset, offset),
            None => PageTranslation::fault(offset),
        })
    }

    /// Replace the replacement policy.
    ///
    /// This is destructive: a fresh engine is built, so every resident page
    /// and the hit/fault counters are dropped. Registered processes and the
    /// backing store survive, and dropped pages fault back in on next access.
    pub fn set_replacement_policy(&mut self, policy: ReplacementPolicy) {
        let resident = self.replacement.loaded_pages().len();
        if resident > 0 {
            self.log.warn(format_args!(
                "switching to {} discards {} resident pages",
                policy, resident
            ));
        }
        self.replacement = ReplacementEngine::new(policy, self.replacement.num_frames());
    }

    /// Swap counters plus the replacement engine's hit/fault figures
    pub fn statistics(&self) -> VmStats {
        VmStats {
            policy: self.policy(),
            num_frames: self.num_frames(),
            frame_size: self.frame_size,
            swap_ins: self.swap_ins,
            swap_outs: self.swap_outs,
            total_swaps: self.swap_ins + self.swap_outs,
            processes: self.process_pages.len(),
            backing_store_pages: self.backing_store.len(),
            replacement: self.replacement.statistics(),
        }
    }

    /// One row per frame slot
    pub fn memory_layout(&self) -> Vec<VmFrameView> {
        self.replacement
            .slots()
            .iter()
            .enumerate()
            .map(|(index, &page)| VmFrameView {
                frame_id: index,
                page_id: page,
                status: if page.is_some() { FrameStatus::Allocated } else { FrameStatus::Free },
                base_address: index as u64 * self.frame_size,
                size: self.frame_size,
            })
            .collect()
    }

    /// Forget every process and page, keeping policy and frame count
    pub fn reset(&mut self) {
        self.replacement = ReplacementEngine::new(self.policy(), self.num_frames());
        self.backing_store.clear();
        self.process_pages.clear();
        self.swap_ins = 0;
        self.swap_outs = 0;
        self.log.info(format_args!("virtual memory manager reset"));
    }
}

impl Default for VirtualMemoryManager {
    fn default() -> Self {
        Self::from_config(&VmConfig::default())
    }
}
