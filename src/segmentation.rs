//! Base/limit segmentation with external fragmentation accounting.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::SegmentationConfig;
use crate::constants::*;
use crate::error::{SimError, SimResult};
use crate::logging::LogHandle;
use crate::translation::{out_of_bounds_reason, SegmentTranslation};
use crate::{ProcessId, SegmentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SegmentStatus {
    Allocated,
    Free,
}

/// A named region `[base, base + limit)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub segment_id: SegmentId,
    pub name: String,
    pub base: u64,
    pub limit: u64,
    pub status: SegmentStatus,
}

impl Segment {
    /// An allocated segment
    pub fn new(segment_id: SegmentId, name: impl Into<String>, base: u64, limit: u64) -> Self {
        Segment { segment_id, name: name.into(), base, limit, status: SegmentStatus::Allocated }
    }

    /// First address past the segment
    #[inline]
    pub fn end(&self) -> u64 {
        self.base + self.limit
    }

    /// Whether `offset` lies in `[0, limit)`
    #[inline]
    pub fn contains(&self, offset: i64) -> bool {
        offset >= 0 && (offset as u64) < self.limit
    }

    /// `base + offset`, or `None` when out of bounds
    pub fn translate(&self, offset: i64) -> Option<u64> {
        self.contains(offset).then(|| self.base + offset as u64)
    }
}

/// Segment table of a single process
#[derive(Debug, Clone)]
pub struct SegmentTable {
    process: ProcessId,
    segments: BTreeMap<SegmentId, Segment>,
}

impl SegmentTable {
    pub fn new(process: ProcessId) -> Self {
        SegmentTable { process, segments: BTreeMap::new() }
    }

    #[inline]
    pub fn process(&self) -> ProcessId {
        self.process
    }

    /// Insert a segment, replacing any segment with the same id
    pub fn insert(&mut self, segment: Segment) {
        self.segments.insert(segment.segment_id, segment);
    }

    /// Look up a segment by id
    pub fn segment(&self, segment: SegmentId) -> Option<&Segment> {
        self.segments.get(&segment)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Sum of all segment limits
    pub fn total_size(&self) -> u64 {
        self.segments.values().map(|s| s.limit).sum()
    }

    /// Translate within this table, with a reason on failure
    pub fn translate(&self, segment: SegmentId, offset: i64) -> SegmentTranslation {
        let Some(seg) = self.segment(segment) else {
            return SegmentTranslation::invalid(format!("Segment {} does not exist", segment));
        };
        match seg.translate(offset) {
            Some(pa) => SegmentTranslation::valid(pa),
            None => SegmentTranslation::invalid(out_of_bounds_reason(offset, seg.limit)),
        }
    }

    /// Segments ordered by id
    pub fn view(&self) -> Vec<Segment> {
        self.segments.values().cloned().collect()
    }

    /// Gaps between segments sorted by base
    pub fn fragmentation(&self) -> Fragmentation {
        let mut sorted: Vec<&Segment> = self.segments.values().collect();
        sorted.sort_by_key(|s| s.base);

        let external_bytes: u64 = sorted
            .windows(2)
            .map(|pair| pair[1].base.saturating_sub(pair[0].end()))
            .sum();
        let total = self.total_size();
        let percent = |bytes: u64| if total > 0 { bytes as f64 / total as f64 * 100.0 } else { 0.0 };

        // Per-segment usage is not tracked, so internal fragmentation is always zero
        Fragmentation {
            internal_bytes: 0,
            external_bytes,
            internal_percent: 0.0,
            external_percent: percent(external_bytes),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Fragmentation {
    pub internal_bytes: u64,
    pub external_bytes: u64,
    pub internal_percent: f64,
    pub external_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentationStats {
    pub total_processes: usize,
    pub access_attempts: u64,
    pub access_successes: u64,
    pub bounds_violations: u64,
    pub success_rate: f64,
    pub next_base_address: u64,
}

#[derive(Debug)]
pub struct SegmentationEngine {
    tables: BTreeMap<ProcessId, SegmentTable>,
    base_start: u64,
    gap: u64,
    next_base: u64,
    access_attempts: u64,
    access_successes: u64,
    bounds_violations: u64,
    log: LogHandle,
}

impl SegmentationEngine {
    pub fn new() -> Self {
        Self::with_layout(SEGMENT_BASE_START, SEGMENT_GAP)
    }

    /// Auto-placed segments start at `base_start` and are `gap` bytes apart
    pub fn with_layout(base_start: u64, gap: u64) -> Self {
        SegmentationEngine {
            tables: BTreeMap::new(),
            base_start,
            gap,
            next_base: base_start,
            access_attempts: 0,
            access_successes: 0,
            bounds_violations: 0,
            log: LogHandle::noop(),
        }
    }

    /// Build from the `[segmentation]` config section
    pub fn from_config(config: &SegmentationConfig) -> Self {
        Self::with_layout(config.base_start, config.gap)
    }

    /// Attach a log handle
    pub fn with_logger(mut self, log: LogHandle) -> Self {
        self.log = log;
        self
    }

    /// Create an empty segment table for `process`
    pub fn create_process(&mut self, process: ProcessId) -> SimResult<()> {
        if self.tables.contains_key(&process) {
            return Err(SimError::ProcessExists(process));
        }
        self.tables.insert(process, SegmentTable::new(process));
        self.log.info(format_args!("created process {}", process));
        Ok(())
    }

    /// Drop a process and its segments. The placement cursor does not move back.
    pub fn remove_process(&mut self, process: ProcessId) -> SimResult<()> {
        self.tables.remove(&process).ok_or(SimError::InvalidProcess(process))?;
        self.log.info(format_args!("removed process {}", process));
        Ok(())
    }

    /// Whether `process` has a segment table
    pub fn has_process(&self, process: ProcessId) -> bool {
        self.tables.contains_key(&process)
    }

    /// Segment table of a process
    pub fn segment_table(&self, process: ProcessId) -> Option<&SegmentTable> {
        self.tables.get(&process)
    }

    /// Where the next auto-placed segment goes
    #[inline]
    pub fn next_base_address(&self) -> u64 {
        self.next_base
    }

    /// Add a segment of `size` bytes. Without `base` the segment is placed
    /// at the auto-placement cursor, which then moves past it plus the gap.
    /// Explicit bases are the caller's business and may overlap.
    ///
    /// Returns the base the segment was placed at.
    pub fn add_segment(
        &mut self,
        process: ProcessId,
        segment: SegmentId,
        name: &str,
        size: u64,
        base: Option<u64>,
    ) -> SimResult<u64> {
        if size == 0 {
            return Err(SimError::InvalidSize(size));
        }
        let table = self.tables.get_mut(&process).ok_or(SimError::InvalidProcess(process))?;

        let base = match base {
            Some(base) => {
                base.checked_add(size).ok_or(SimError::InvalidSize(size))?;
                base
            }
            None => {
                let base = self.next_base;
                self.next_base = base
                    .checked_add(size)
                    .and_then(|end| end.checked_add(self.gap))
                    .ok_or(SimError::InvalidSize(size))?;
                base
            }
        };

        table.insert(Segment::new(segment, name, base, size));
        self.log.debug(format_args!(
            "process {} segment {} ({}) at {:#x}, limit {:#x}",
            process, segment, name, base, size
        ));
        Ok(base)
    }

    /// Translate `(segment, offset)` for a process. An unknown process only
    /// counts as an attempt; a missing segment or bad offset is also a
    /// bounds violation.
    pub fn translate_address(&mut self, process: ProcessId, segment: SegmentId, offset: i64) -> SegmentTranslation {
        self.access_attempts += 1;

        let Some(table) = self.tables.get(&process) else {
            self.log.debug(format_args!("process {} does not exist", process));
            return SegmentTranslation::invalid(format!("Process {} does not exist", process));
        };
        let result = table.translate(segment, offset);

        if result.valid {
            self.access_successes += 1;
        } else {
            self.bounds_violations += 1;
            self.log.debug(format_args!("process {} segment {}: {}", process, segment, result.reason));
        }
        result
    }

    /// Like [`Self::translate_address`], but as a `Result`
    pub fn translate_checked(&mut self, process: ProcessId, segment: SegmentId, offset: i64) -> SimResult<u64> {
        if !self.tables.contains_key(&process) {
            self.translate_address(process, segment, offset);
            return Err(SimError::InvalidProcess(process));
        }
        let exists = self.tables.get(&process).is_some_and(|t| t.segment(segment).is_some());
        let result = self.translate_address(process, segment, offset);
        match result.physical_address {
            Some(pa) => Ok(pa),
            None if !exists => Err(SimError::InvalidSegment { process, segment }),
            None => Err(SimError::AddressOutOfBounds(result.reason)),
        }
    }

    /// Fragmentation of one process; zero for unknown processes
    pub fn fragmentation(&self, process: ProcessId) -> Fragmentation {
        self.tables.get(&process).map(SegmentTable::fragmentation).unwrap_or_default()
    }

    /// Global translation counters
    pub fn statistics(&self) -> SegmentationStats {
        SegmentationStats {
            total_processes: self.tables.len(),
            access_attempts: self.access_attempts,
            access_successes: self.access_successes,
            bounds_violations: self.bounds_violations,
            success_rate: if self.access_attempts > 0 {
                self.access_successes as f64 / self.access_attempts as f64
            } else {
                0.0
            },
            next_base_address: self.next_base,
        }
    }

    /// Drop every process, rewind the cursor and zero the counters
    pub fn reset(&mut self) {
        self.tables.clear();
        self.next_base = self.base_start;
        self.access_attempts = 0;
        self.access_successes = 0;
        self.bounds_violations = 0;
        self.log.info(format_args!("segmentation engine reset"));
    }
}

impl Default for SegmentationEngine {
    fn default() -> Self {
        Self::new()
    }
}
