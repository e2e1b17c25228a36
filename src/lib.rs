pub mod allocator;
pub mod config;
pub mod constants;
pub mod error;
pub mod io;
pub mod logging;
pub mod memory;
pub mod page_table;
pub mod paging;
pub mod replacement;
pub mod segmentation;
pub mod sync;
pub mod translation;
pub mod vm_manager;

pub type ProcessId = u32;
pub type FrameId = usize;
pub type SegmentId = u32;

// Re-export commonly used items for convenience
pub use allocator::AllocationStrategy;
pub use error::{SimError, SimResult};
pub use logging::LogHandle;
pub use page_table::PageId;
pub use paging::PagingSimulator;
pub use replacement::{ReplacementPolicy, VirtualPageId};
pub use segmentation::SegmentationEngine;
pub use translation::{PageTranslation, SegmentTranslation};
pub use vm_manager::VirtualMemoryManager;
