//! Errors surfaced by the simulation engines.
//!
//! Page faults are not errors: translation and access report them through a
//! `fault` flag on their result records.

use crate::{FrameId, ProcessId, SegmentId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    #[error("process {0} does not exist")]
    InvalidProcess(ProcessId),
    #[error("process {0} already exists")]
    ProcessExists(ProcessId),
    #[error("page {page} is not valid for process {process}")]
    InvalidPage { process: ProcessId, page: u64 },
    #[error("segment {segment} does not exist in process {process}")]
    InvalidSegment { process: ProcessId, segment: SegmentId },
    #[error("frame {0} is not allocated or out of range")]
    InvalidFrame(FrameId),
    #[error("no free frame can hold {size} bytes")]
    AllocationFailure { size: u64 },
    #[error("{0}")]
    AddressOutOfBounds(String),
    #[error("invalid size {0}")]
    InvalidSize(u64),
    #[error("page {0} is registered but missing from the backing store")]
    BackingStoreInconsistency(u64),
}

pub type SimResult<T> = Result<T, SimError>;
