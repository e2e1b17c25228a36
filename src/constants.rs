// Paging simulator defaults
pub const DEFAULT_NUM_FRAMES: usize = 16;
pub const DEFAULT_FRAME_SIZE: u64 = 4096;

// Virtual memory defaults: a small resident set so replacement kicks in early
pub const DEFAULT_VM_FRAMES: usize = 4;
pub const DEFAULT_VM_FRAME_SIZE: u64 = 4096;

// Segmentation auto-placement
pub const SEGMENT_BASE_START: u64 = 0x1000;
pub const SEGMENT_GAP: u64 = 0x100;

/// Output value for a translation that did not produce an address
pub const INVALID_ADDRESS: i64 = -1;
