//! Page replacement: FIFO, LRU and Optimal over a fixed set of frame slots.
//!
//! The engine only knows which virtual page sits in which slot. Each policy
//! keeps just the bookkeeping it needs: FIFO an insertion queue, LRU a
//! recency list with the most recently used page last, Optimal nothing (it
//! looks at the caller's future references on every eviction).

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Page number in the virtual memory subsystem.
///
/// Deliberately distinct from [`crate::page_table::PageId`]: the paging
/// simulator and the virtual memory manager number pages independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VirtualPageId(pub u64);

impl fmt::Display for VirtualPageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum ReplacementPolicy {
    #[default]
    Fifo,
    Lru,
    Optimal,
}

impl ReplacementPolicy {
    pub const ALL: [ReplacementPolicy; 3] = [Self::Fifo, Self::Lru, Self::Optimal];

    pub fn name(self) -> &'static str {
        match self {
            Self::Fifo => "FIFO",
            Self::Lru => "LRU",
            Self::Optimal => "OPTIMAL",
        }
    }
}

impl fmt::Display for ReplacementPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReplacementPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fifo" => Ok(Self::Fifo),
            "lru" => Ok(Self::Lru),
            "optimal" | "opt" => Ok(Self::Optimal),
            _ => Err(format!("Unknown replacement policy: {}", s)),
        }
    }
}

impl TryFrom<String> for ReplacementPolicy {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Policy tag plus the order structure that policy needs
#[derive(Debug, Clone)]
enum PolicyState {
    Fifo { queue: VecDeque<VirtualPageId> },
    Lru { recency: VecDeque<VirtualPageId> },
    Optimal,
}

impl PolicyState {
    fn new(policy: ReplacementPolicy) -> Self {
        match policy {
            ReplacementPolicy::Fifo => PolicyState::Fifo { queue: VecDeque::new() },
            ReplacementPolicy::Lru => PolicyState::Lru { recency: VecDeque::new() },
            ReplacementPolicy::Optimal => PolicyState::Optimal,
        }
    }

    fn policy(&self) -> ReplacementPolicy {
        match self {
            PolicyState::Fifo { .. } => ReplacementPolicy::Fifo,
            PolicyState::Lru { .. } => ReplacementPolicy::Lru,
            PolicyState::Optimal => ReplacementPolicy::Optimal,
        }
    }

    fn order_mut(&mut self) -> Option<&mut VecDeque<VirtualPageId>> {
        match self {
            PolicyState::Fifo { queue } => Some(queue),
            PolicyState::Lru { recency } => Some(recency),
            PolicyState::Optimal => None,
        }
    }

    fn order(&self) -> Option<&VecDeque<VirtualPageId>> {
        match self {
            PolicyState::Fifo { queue } => Some(queue),
            PolicyState::Lru { recency } => Some(recency),
            PolicyState::Optimal => None,
        }
    }
}

/// What happened on one access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccessResult {
    pub page_id: VirtualPageId,
    pub fault: bool,
    pub replaced_page: Option<VirtualPageId>,
    pub frame_index: Option<usize>,
    pub policy: ReplacementPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplacementStats {
    pub page_faults: u64,
    pub page_hits: u64,
    pub total_accesses: u64,
    pub fault_rate: f64,
    pub hit_rate: f64,
    pub loaded_pages: Vec<VirtualPageId>,
}

#[derive(Debug, Clone)]
pub struct ReplacementEngine {
    slots: Vec<Option<VirtualPageId>>,
    state: PolicyState,
    page_faults: u64,
    page_hits: u64,
}

impl ReplacementEngine {
    pub fn new(policy: ReplacementPolicy, num_frames: usize) -> Self {
        ReplacementEngine {
            slots: vec![None; num_frames],
            state: PolicyState::new(policy),
            page_faults: 0,
            page_hits: 0,
        }
    }

    #[inline]
    pub fn policy(&self) -> ReplacementPolicy {
        self.state.policy()
    }

    #[inline]
    pub fn num_frames(&self) -> usize {
        self.slots.len()
    }

    /// Slot contents, indexed by frame
    pub fn slots(&self) -> &[Option<VirtualPageId>] {
        &self.slots
    }

    pub fn slot_of(&self, page: VirtualPageId) -> Option<usize> {
        self.slots.iter().position(|&p| p == Some(page))
    }

    #[inline]
    pub fn is_resident(&self, page: VirtualPageId) -> bool {
        self.slot_of(page).is_some()
    }

    pub fn loaded_pages(&self) -> Vec<VirtualPageId> {
        self.slots.iter().flatten().copied().collect()
    }

    #[inline]
    pub fn page_faults(&self) -> u64 {
        self.page_faults
    }

    #[inline]
    pub fn page_hits(&self) -> u64 {
        self.page_hits
    }

    /// Reference `page`, loading it (and evicting if needed) on a fault.
    ///
    /// `future` is the upcoming reference string; only Optimal reads it, and
    /// an empty slice means no page is referenced again.
    pub fn access(&mut self, page: VirtualPageId, future: &[VirtualPageId]) -> AccessResult {
        let policy = self.policy();

        if let Some(slot) = self.slot_of(page) {
            self.page_hits += 1;
            if let PolicyState::Lru { recency } = &mut self.state {
                touch(recency, page);
            }
            return AccessResult { page_id: page, fault: false, replaced_page: None, frame_index: Some(slot), policy };
        }

        self.page_faults += 1;

        let (slot, replaced_page) = match self.slots.iter().position(Option::is_none) {
            Some(free) => (Some(free), None),
            None => match self.select_victim(future) {
                Some(victim) => (Some(victim), self.slots[victim]),
                None => (None, None),
            },
        };

        if let Some(slot) = slot {
            self.slots[slot] = Some(page);
            if let Some(order) = self.state.order_mut() {
                // A page re-entering after a removal may still have a stale entry
                order.retain(|&p| p != page);
                order.push_back(page);
            }
        }

        AccessResult { page_id: page, fault: true, replaced_page, frame_index: slot, policy }
    }

    /// Pick the slot to evict. Only called when every slot is occupied.
    fn select_victim(&mut self, future: &[VirtualPageId]) -> Option<usize> {
        if self.slots.is_empty() {
            return None;
        }

        let slots = &self.slots;
        match &mut self.state {
            PolicyState::Fifo { queue: order } | PolicyState::Lru { recency: order } => {
                // Entries whose page was removed behind our back are skipped
                while let Some(head) = order.pop_front() {
                    if let Some(slot) = slots.iter().position(|&p| p == Some(head)) {
                        return Some(slot);
                    }
                }
                Some(0)
            }
            PolicyState::Optimal => Some(optimal_victim(slots, future)),
        }
    }

    /// Free the slot holding `page` without touching the order structure.
    ///
    /// Returns the slot that was freed.
    pub fn evict_page(&mut self, page: VirtualPageId) -> Option<usize> {
        let slot = self.slot_of(page)?;
        self.slots[slot] = None;
        Some(slot)
    }

    /// Order structure contents, oldest / least recent first
    pub fn order(&self) -> Option<Vec<VirtualPageId>> {
        self.state.order().map(|order| order.iter().copied().collect())
    }

    pub fn statistics(&self) -> ReplacementStats {
        let total_accesses = self.page_faults + self.page_hits;
        let rate = |n: u64| if total_accesses > 0 { n as f64 / total_accesses as f64 } else { 0.0 };
        ReplacementStats {
            page_faults: self.page_faults,
            page_hits: self.page_hits,
            total_accesses,
            fault_rate: rate(self.page_faults),
            hit_rate: rate(self.page_hits),
            loaded_pages: self.loaded_pages(),
        }
    }

    pub fn reset(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.state = PolicyState::new(self.policy());
        self.page_faults = 0;
        self.page_hits = 0;
    }
}

/// Move `page` to the most recently used end
fn touch(recency: &mut VecDeque<VirtualPageId>, page: VirtualPageId) {
    if let Some(index) = recency.iter().position(|&p| p == page) {
        recency.remove(index);
    }
    recency.push_back(page);
}

/// Scan resident pages in slot order. The first page that never recurs is
/// taken at once; otherwise the page whose next use is farthest away wins,
/// with the earliest slot kept on ties.
fn optimal_victim(slots: &[Option<VirtualPageId>], future: &[VirtualPageId]) -> usize {
    let mut best: Option<(usize, usize)> = None;
    for (slot, page) in slots.iter().enumerate() {
        let Some(page) = page else {
            continue;
        };
        match future.iter().position(|p| p == page) {
            None => return slot,
            Some(distance) => {
                if best.is_none_or(|(_, farthest)| distance > farthest) {
                    best = Some((slot, distance));
                }
            }
        }
    }
    best.map_or(0, |(slot, _)| slot)
}

/// One row of a reference-string run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationStep {
    pub page_id: VirtualPageId,
    pub fault: bool,
    pub replaced_page: Option<VirtualPageId>,
    pub frame_index: Option<usize>,
    pub frames: Vec<Option<VirtualPageId>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    pub policy: ReplacementPolicy,
    pub num_frames: usize,
    pub steps: Vec<SimulationStep>,
    pub stats: ReplacementStats,
}

/// Run a whole reference string through a fresh engine.
///
/// At step `i` the engine sees `references[i + 1..]` as its future.
pub fn simulate(
    policy: ReplacementPolicy,
    num_frames: usize,
    references: &[VirtualPageId],
) -> SimulationReport {
    let mut engine = ReplacementEngine::new(policy, num_frames);
    let steps = references
        .iter()
        .enumerate()
        .map(|(i, &page)| {
            let result = engine.access(page, &references[i + 1..]);
            SimulationStep {
                page_id: page,
                fault: result.fault,
                replaced_page: result.replaced_page,
                frame_index: result.frame_index,
                frames: engine.slots().to_vec(),
            }
        })
        .collect();

    SimulationReport { policy, num_frames, steps, stats: engine.statistics() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(ids: &[u64]) -> Vec<VirtualPageId> {
        ids.iter().copied().map(VirtualPageId).collect()
    }

    fn run(engine: &mut ReplacementEngine, ids: &[u64]) -> Vec<AccessResult> {
        ids.iter().map(|&p| engine.access(VirtualPageId(p), &[])).collect()
    }

    fn slots(engine: &ReplacementEngine) -> Vec<Option<u64>> {
        engine.slots().iter().map(|s| s.map(|p| p.0)).collect()
    }

    #[test]
    fn test_fifo_sequence() {
        let mut engine = ReplacementEngine::new(ReplacementPolicy::Fifo, 3);
        let results = run(&mut engine, &[1, 2, 3, 1, 2, 4, 5, 1]);

        assert_eq!(engine.page_faults(), 6);
        assert_eq!(engine.page_hits(), 2);
        assert_eq!(results[5].replaced_page, Some(VirtualPageId(1)));
        assert_eq!(results[5].frame_index, Some(0));
        assert_eq!(results[6].replaced_page, Some(VirtualPageId(2)));
        assert_eq!(results[7].replaced_page, Some(VirtualPageId(3)));
        assert_eq!(slots(&engine), vec![Some(4), Some(5), Some(1)]);
    }

    #[test]
    fn test_lru_sequence() {
        let mut engine = ReplacementEngine::new(ReplacementPolicy::Lru, 3);
        let results = run(&mut engine, &[1, 2, 3, 1, 2, 4, 5, 1]);

        assert_eq!(engine.page_faults(), 6);
        assert_eq!(engine.page_hits(), 2);
        assert_eq!(results[5].replaced_page, Some(VirtualPageId(3)));
        assert_eq!(results[5].frame_index, Some(2));
        assert_eq!(slots(&engine), vec![Some(5), Some(1), Some(4)]);
        assert_eq!(engine.order(), Some(pages(&[4, 5, 1])));
    }

    #[test]
    fn test_hit_reports_slot() {
        let mut engine = ReplacementEngine::new(ReplacementPolicy::Fifo, 2);
        run(&mut engine, &[7, 8]);
        let hit = engine.access(VirtualPageId(8), &[]);
        assert!(!hit.fault);
        assert_eq!(hit.frame_index, Some(1));
        assert_eq!(hit.replaced_page, None);
        // FIFO order untouched by hits
        assert_eq!(engine.order(), Some(pages(&[7, 8])));
    }

    #[test]
    fn test_optimal_farthest_wins() {
        let mut engine = ReplacementEngine::new(ReplacementPolicy::Optimal, 2);
        run(&mut engine, &[1, 2]);
        let result = engine.access(VirtualPageId(3), &pages(&[1, 2, 3]));
        assert_eq!(result.replaced_page, Some(VirtualPageId(2)));
        assert_eq!(result.frame_index, Some(1));
    }

    #[test]
    fn test_optimal_empty_future_takes_lowest_slot() {
        let mut engine = ReplacementEngine::new(ReplacementPolicy::Optimal, 3);
        run(&mut engine, &[4, 5, 6]);
        let result = engine.access(VirtualPageId(7), &[]);
        assert_eq!(result.replaced_page, Some(VirtualPageId(4)));
        assert_eq!(slots(&engine), vec![Some(7), Some(5), Some(6)]);
    }

    #[test]
    fn test_optimal_first_never_used_wins() {
        let mut engine = ReplacementEngine::new(ReplacementPolicy::Optimal, 3);
        run(&mut engine, &[1, 2, 3]);
        // 1 recurs; 2 and 3 never do: the scan stops at 2
        let result = engine.access(VirtualPageId(9), &pages(&[1, 1]));
        assert_eq!(result.replaced_page, Some(VirtualPageId(2)));
    }

    #[test]
    fn test_optimal_tie_keeps_earliest() {
        let mut engine = ReplacementEngine::new(ReplacementPolicy::Optimal, 2);
        run(&mut engine, &[1, 2]);
        // Both recur; 2 is farther
        let result = engine.access(VirtualPageId(3), &pages(&[1, 3, 2]));
        assert_eq!(result.replaced_page, Some(VirtualPageId(2)));

        let slots = [Some(VirtualPageId(1)), Some(VirtualPageId(2))];
        assert_eq!(optimal_victim(&slots, &pages(&[1, 2])), 1);
        assert_eq!(optimal_victim(&slots, &pages(&[2, 1])), 0);
    }

    #[test]
    fn test_free_slot_reused_first() {
        let mut engine = ReplacementEngine::new(ReplacementPolicy::Lru, 3);
        run(&mut engine, &[1, 2, 3]);
        assert_eq!(engine.evict_page(VirtualPageId(2)), Some(1));
        let result = engine.access(VirtualPageId(9), &[]);
        assert_eq!(result.frame_index, Some(1));
        assert_eq!(result.replaced_page, None);
    }

    #[test]
    fn test_stale_order_entries_are_skipped() {
        let mut engine = ReplacementEngine::new(ReplacementPolicy::Fifo, 2);
        run(&mut engine, &[1, 2]);
        engine.evict_page(VirtualPageId(1));
        // Order still references page 1
        assert_eq!(engine.order(), Some(pages(&[1, 2])));

        run(&mut engine, &[3]);
        let result = engine.access(VirtualPageId(4), &[]);
        // Stale 1 is skipped; 2 is the oldest resident page
        assert_eq!(result.replaced_page, Some(VirtualPageId(2)));
        assert_eq!(slots(&engine), vec![Some(3), Some(4)]);
        assert_eq!(engine.order(), Some(pages(&[3, 4])));
    }

    #[test]
    fn test_reentering_page_drops_stale_entry() {
        let mut engine = ReplacementEngine::new(ReplacementPolicy::Fifo, 2);
        run(&mut engine, &[1, 2]);
        engine.evict_page(VirtualPageId(1));
        run(&mut engine, &[1]);
        assert_eq!(engine.order(), Some(pages(&[2, 1])));
    }

    #[test]
    fn test_zero_frames() {
        let mut engine = ReplacementEngine::new(ReplacementPolicy::Lru, 0);
        let result = engine.access(VirtualPageId(1), &[]);
        assert!(result.fault);
        assert_eq!(result.frame_index, None);
        assert_eq!(engine.page_faults(), 1);
    }

    #[test]
    fn test_statistics_and_reset() {
        let mut engine = ReplacementEngine::new(ReplacementPolicy::Lru, 2);
        run(&mut engine, &[1, 1, 2, 1]);
        let stats = engine.statistics();
        assert_eq!(stats.page_faults, 2);
        assert_eq!(stats.page_hits, 2);
        assert_eq!(stats.total_accesses, 4);
        assert!((stats.hit_rate - 0.5).abs() < 1e-9);
        assert_eq!(stats.loaded_pages, pages(&[1, 2]));

        engine.reset();
        assert_eq!(engine.statistics(), ReplacementEngine::new(ReplacementPolicy::Lru, 2).statistics());
        assert_eq!(engine.order(), Some(vec![]));
        assert_eq!(engine.policy(), ReplacementPolicy::Lru);
    }

    #[test]
    fn test_simulate_optimal_uses_lookahead() {
        // Classic string: Optimal beats FIFO
        let refs = pages(&[7, 0, 1, 2, 0, 3, 0, 4, 2, 3, 0, 3, 2]);
        let optimal = simulate(ReplacementPolicy::Optimal, 3, &refs);
        let fifo = simulate(ReplacementPolicy::Fifo, 3, &refs);

        assert_eq!(optimal.stats.page_faults, 7);
        assert_eq!(fifo.stats.page_faults, 10);
        assert_eq!(optimal.steps.len(), refs.len());
        // 2 evicts 7, which never recurs
        assert_eq!(optimal.steps[3].replaced_page, Some(VirtualPageId(7)));
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("lru".parse(), Ok(ReplacementPolicy::Lru));
        assert_eq!("OPTIMAL".parse(), Ok(ReplacementPolicy::Optimal));
        assert!("clock".parse::<ReplacementPolicy>().is_err());
        assert_eq!(ReplacementPolicy::Fifo.to_string(), "FIFO");
    }
}
