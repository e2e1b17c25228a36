//! Simulator configuration, read from TOML.
//!
//! ```toml
//! [paging]
//! num_frames = 16
//! frame_size = 4096
//! strategy = "BEST_FIT"
//!
//! [virtual_memory]
//! num_frames = 4
//! policy = "LRU"
//!
//! [segmentation]
//! base_start = 0x1000
//! gap = 0x100
//!
//! [log]
//! level = "debug"
//! ```
//!
//! Every key is optional.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::allocator::AllocationStrategy;
use crate::constants::*;
use crate::replacement::ReplacementPolicy;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PagingConfig {
    pub num_frames: usize,
    pub frame_size: u64,
    pub strategy: AllocationStrategy,
}

impl Default for PagingConfig {
    fn default() -> Self {
        PagingConfig {
            num_frames: DEFAULT_NUM_FRAMES,
            frame_size: DEFAULT_FRAME_SIZE,
            strategy: AllocationStrategy::FirstFit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VmConfig {
    pub num_frames: usize,
    pub frame_size: u64,
    pub policy: ReplacementPolicy,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            num_frames: DEFAULT_VM_FRAMES,
            frame_size: DEFAULT_VM_FRAME_SIZE,
            policy: ReplacementPolicy::Fifo,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SegmentationConfig {
    pub base_start: u64,
    pub gap: u64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        SegmentationConfig { base_start: SEGMENT_BASE_START, gap: SEGMENT_GAP }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    pub level: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    pub paging: PagingConfig,
    pub virtual_memory: VmConfig,
    pub segmentation: SegmentationConfig,
    pub log: LogConfig,
}

impl SimConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.paging.frame_size == 0 {
            return Err(ConfigError::Invalid("paging.frame_size must be positive".into()));
        }
        if self.virtual_memory.frame_size == 0 {
            return Err(ConfigError::Invalid("virtual_memory.frame_size must be positive".into()));
        }
        if self.virtual_memory.num_frames == 0 {
            return Err(ConfigError::Invalid("virtual_memory.num_frames must be positive".into()));
        }
        Ok(())
    }
}
