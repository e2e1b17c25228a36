use std::collections::HashMap;

use serde::Serialize;

use crate::constants::*;
use crate::FrameId;

/// Split an address into (page number, offset) for a given page size
#[inline]
pub fn split_address(address: u64, page_size: u64) -> (u64, u64) {
    (address / page_size, address % page_size)
}

/// Inverse of [`split_address`]
#[inline]
pub fn combine_address(page: u64, offset: u64, page_size: u64) -> u64 {
    page * page_size + offset
}

/// Outcome of a page-based translation. A fault is a normal outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageTranslation {
    pub physical_address: Option<u64>,
    pub offset: u64,
    pub fault: bool,
}

impl PageTranslation {
    pub fn hit(physical_address: u64, offset: u64) -> Self {
        PageTranslation { physical_address: Some(physical_address), offset, fault: false }
    }

    pub fn fault(offset: u64) -> Self {
        PageTranslation { physical_address: None, offset, fault: true }
    }

    /// Convert to the output format (-1 for faults, PA otherwise)
    pub fn to_output(&self) -> i64 {
        match self.physical_address {
            Some(pa) => pa as i64,
            None => INVALID_ADDRESS,
        }
    }
}

/// Outcome of a segment-based translation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentTranslation {
    pub physical_address: Option<u64>,
    pub valid: bool,
    pub reason: String,
}

impl SegmentTranslation {
    pub fn valid(physical_address: u64) -> Self {
        SegmentTranslation { physical_address: Some(physical_address), valid: true, reason: String::new() }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        SegmentTranslation { physical_address: None, valid: false, reason: reason.into() }
    }

    pub fn to_output(&self) -> i64 {
        match self.physical_address {
            Some(pa) if self.valid => pa as i64,
            _ => INVALID_ADDRESS,
        }
    }
}

/// Reason reported when a segment offset falls outside `0..limit`
pub fn out_of_bounds_reason(offset: i64, limit: u64) -> String {
    format!("Offset {} out of bounds (limit: {})", offset, limit)
}

/// Translate against a bare page → frame map.
///
/// Returns `None` for pages missing from the map; a page mapped to no frame
/// faults.
pub fn logical_to_physical_paging(
    logical_address: u64,
    page_size: u64,
    page_table: &HashMap<u64, Option<FrameId>>,
    frame_size: u64,
) -> Option<PageTranslation> {
    let (page, offset) = split_address(logical_address, page_size);
    match page_table.get(&page)? {
        Some(frame) => Some(PageTranslation::hit(*frame as u64 * frame_size + offset, offset)),
        None => Some(PageTranslation::fault(offset)),
    }
}

/// Translate against a bare segment → (base, limit) map.
///
/// Returns `None` for unknown segments.
pub fn logical_to_physical_segmentation(
    segment: u32,
    offset: i64,
    segment_table: &HashMap<u32, (u64, u64)>,
) -> Option<SegmentTranslation> {
    let &(base, limit) = segment_table.get(&segment)?;
    if offset < 0 || offset as u64 >= limit {
        return Some(SegmentTranslation::invalid(out_of_bounds_reason(offset, limit)));
    }
    Some(SegmentTranslation::valid(base + offset as u64))
}
