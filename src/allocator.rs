//! Frame allocation strategies: first fit, best fit and next fit.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::memory::{Frame, FramePool};
use crate::page_table::PageId;
use crate::{FrameId, ProcessId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum AllocationStrategy {
    #[default]
    FirstFit,
    BestFit,
    NextFit,
}

impl AllocationStrategy {
    pub const ALL: [AllocationStrategy; 3] = [Self::FirstFit, Self::BestFit, Self::NextFit];

    pub fn name(self) -> &'static str {
        match self {
            Self::FirstFit => "FIRST_FIT",
            Self::BestFit => "BEST_FIT",
            Self::NextFit => "NEXT_FIT",
        }
    }
}

impl fmt::Display for AllocationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AllocationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "firstfit" | "first" => Ok(Self::FirstFit),
            "bestfit" | "best" => Ok(Self::BestFit),
            "nextfit" | "next" => Ok(Self::NextFit),
            _ => Err(format!("Unknown allocation strategy: {}", s)),
        }
    }
}

impl TryFrom<String> for AllocationStrategy {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Picks frames out of a [`FramePool`]. The only state is the next-fit cursor.
#[derive(Debug, Clone, Default)]
pub struct FrameAllocator {
    strategy: AllocationStrategy,
    next_fit_start: usize,
}

impl FrameAllocator {
    pub fn new(strategy: AllocationStrategy) -> Self {
        FrameAllocator { strategy, next_fit_start: 0 }
    }

    #[inline]
    pub fn strategy(&self) -> AllocationStrategy {
        self.strategy
    }

    /// Where the next next-fit scan begins
    #[inline]
    pub fn cursor(&self) -> usize {
        self.next_fit_start
    }

    /// Switching to next fit restarts its scan at frame 0
    pub fn set_strategy(&mut self, strategy: AllocationStrategy) {
        self.strategy = strategy;
        if strategy == AllocationStrategy::NextFit {
            self.next_fit_start = 0;
        }
    }

    pub fn reset(&mut self) {
        self.next_fit_start = 0;
    }

    /// Select a frame for `size` bytes and mark it allocated to `process`/`page`
    pub fn allocate(
        &mut self,
        pool: &mut FramePool,
        process: ProcessId,
        page: PageId,
        size: u64,
    ) -> SimResult<FrameId> {
        let frames = pool.frames_mut();
        let chosen = match self.strategy {
            AllocationStrategy::FirstFit => first_fit(frames, size),
            AllocationStrategy::BestFit => best_fit(frames, size),
            AllocationStrategy::NextFit => {
                let chosen = next_fit(frames, size, self.next_fit_start);
                if let Some(index) = chosen {
                    self.next_fit_start = (index + 1) % frames.len();
                }
                chosen
            }
        };

        let index = chosen.ok_or(SimError::AllocationFailure { size })?;
        let frame = &mut frames[index];
        if !frame.allocate(process, page, size) {
            return Err(SimError::AllocationFailure { size });
        }
        Ok(frame.id())
    }

    pub fn deallocate(&self, pool: &mut FramePool, frame: FrameId) -> SimResult<()> {
        if pool.deallocate(frame) {
            Ok(())
        } else {
            Err(SimError::InvalidFrame(frame))
        }
    }
}

fn first_fit(frames: &[Frame], size: u64) -> Option<usize> {
    frames.iter().position(|f| f.fits(size))
}

/// Smallest waste wins; the earliest frame wins ties
fn best_fit(frames: &[Frame], size: u64) -> Option<usize> {
    let mut best: Option<(usize, u64)> = None;
    for (index, frame) in frames.iter().enumerate() {
        if !frame.fits(size) {
            continue;
        }
        let waste = frame.size() - size;
        if best.is_none_or(|(_, best_waste)| waste < best_waste) {
            best = Some((index, waste));
        }
    }
    best.map(|(index, _)| index)
}

/// Scan `start..len`, then wrap around `0..start`
fn next_fit(frames: &[Frame], size: u64, start: usize) -> Option<usize> {
    let start = start.min(frames.len());
    (start..frames.len())
        .chain(0..start)
        .find(|&index| frames[index].fits(size))
}
