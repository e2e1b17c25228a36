use std::collections::HashSet;

use memory_sim::memory::FramePool;
use memory_sim::replacement::{simulate, ReplacementEngine};
use memory_sim::{
    AllocationStrategy, PageId, PagingSimulator, ReplacementPolicy, SegmentationEngine, SimError,
    VirtualMemoryManager, VirtualPageId,
};

fn pages(ids: &[u64]) -> Vec<VirtualPageId> {
    ids.iter().copied().map(VirtualPageId).collect()
}

/// Small linear congruential generator, enough to shuffle operations
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: u64) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 33) % bound
    }
}

fn check_frame_invariants(sim: &PagingSimulator) {
    let mut seen = HashSet::new();
    let mut mapped = 0;
    for process in sim.processes() {
        for (_, frame) in sim.page_table(process).unwrap().mapped() {
            assert!(seen.insert(frame), "frame {} mapped twice", frame);
            mapped += 1;
        }
    }
    let stats = sim.statistics().memory;
    assert!(stats.allocated_frames <= stats.total_frames);
    assert_eq!(stats.allocated_frames, mapped);
    assert_eq!(stats.allocated_frames + stats.free_frames, stats.total_frames);
}

#[test]
fn frames_are_conserved_and_exclusive() {
    for strategy in AllocationStrategy::ALL {
        let mut sim = PagingSimulator::new(8, 256, strategy);
        for pid in 1..=3 {
            sim.create_process(pid, 6).unwrap();
        }

        let mut rng = Lcg(0x5eed + strategy as u64);
        for _ in 0..400 {
            let pid = rng.next(3) as u32 + 1;
            let page = PageId(rng.next(6));
            if rng.next(3) == 0 {
                let _ = sim.deallocate_page(pid, page);
            } else {
                match sim.allocate_page(pid, page, Some(1 + rng.next(256))) {
                    Ok(_) | Err(SimError::AllocationFailure { .. }) => {}
                    Err(e) => panic!("unexpected error {e}"),
                }
            }
            check_frame_invariants(&sim);
        }

        sim.remove_process(2).unwrap();
        check_frame_invariants(&sim);
    }
}

#[test]
fn first_fit_fills_in_order() {
    let mut sim = PagingSimulator::with_pool(FramePool::with_sizes(&[3, 3, 3]), AllocationStrategy::FirstFit);
    sim.create_process(1, 4).unwrap();

    let frames: Vec<_> = (0..3).map(|p| sim.allocate_page(1, PageId(p), Some(2)).unwrap()).collect();
    assert_eq!(frames, vec![0, 1, 2]);
    assert_eq!(sim.allocate_page(1, PageId(3), Some(1)), Err(SimError::AllocationFailure { size: 1 }));
}

#[test]
fn best_fit_picks_tightest_frame() {
    let mut sim = PagingSimulator::with_pool(FramePool::with_sizes(&[4, 2, 2]), AllocationStrategy::BestFit);
    sim.create_process(1, 1).unwrap();
    assert_eq!(sim.allocate_page(1, PageId(0), Some(2)), Ok(1));
}

#[test]
fn fifo_and_lru_on_shared_string() {
    let refs = pages(&[1, 2, 3, 1, 2, 4, 5, 1]);

    let fifo = simulate(ReplacementPolicy::Fifo, 3, &refs);
    let lru = simulate(ReplacementPolicy::Lru, 3, &refs);

    for report in [&fifo, &lru] {
        assert_eq!(report.stats.page_faults, 6);
        assert_eq!(report.stats.page_hits, 2);
        assert_eq!(report.stats.total_accesses, 8);
    }

    // the fault on page 4 is step 5
    assert_eq!(fifo.steps[5].replaced_page, Some(VirtualPageId(1)));
    assert_eq!(lru.steps[5].replaced_page, Some(VirtualPageId(3)));

    let mut fifo_end = fifo.stats.loaded_pages.clone();
    let mut lru_end = lru.stats.loaded_pages.clone();
    fifo_end.sort();
    lru_end.sort();
    assert_eq!(fifo_end, pages(&[1, 4, 5]));
    assert_eq!(lru_end, pages(&[1, 4, 5]));
}

#[test]
fn fifo_and_lru_eviction_order() {
    let refs = pages(&[1, 2, 3, 1, 2, 4, 5, 1]);

    let mut fifo = ReplacementEngine::new(ReplacementPolicy::Fifo, 3);
    let mut lru = ReplacementEngine::new(ReplacementPolicy::Lru, 3);
    for &page in &refs {
        fifo.access(page, &[]);
        lru.access(page, &[]);
    }
    assert_eq!(fifo.order(), Some(pages(&[4, 5, 1])));
    assert_eq!(lru.order(), Some(pages(&[5, 1, 4])));
}

#[test]
fn optimal_evicts_farthest_use() {
    let mut engine = ReplacementEngine::new(ReplacementPolicy::Optimal, 2);
    engine.access(VirtualPageId(1), &[]);
    engine.access(VirtualPageId(2), &[]);

    let result = engine.access(VirtualPageId(3), &pages(&[1, 2, 3]));
    assert!(result.fault);
    assert_eq!(result.replaced_page, Some(VirtualPageId(2)));
}

#[test]
fn optimal_without_lookahead_evicts_lowest_slot() {
    let mut engine = ReplacementEngine::new(ReplacementPolicy::Optimal, 2);
    engine.access(VirtualPageId(1), &[]);
    engine.access(VirtualPageId(2), &[]);

    let result = engine.access(VirtualPageId(3), &[]);
    assert_eq!(result.replaced_page, Some(VirtualPageId(1)));
    assert_eq!(result.frame_index, Some(0));
}

#[test]
fn auto_placed_segments_leave_a_gap() {
    let mut engine = SegmentationEngine::new();
    engine.create_process(1).unwrap();

    assert_eq!(engine.add_segment(1, 0, "CODE", 0x1000, None), Ok(0x1000));
    assert_eq!(engine.add_segment(1, 1, "DATA", 0x1000, None), Ok(0x2100));

    let frag = engine.fragmentation(1);
    assert_eq!(frag.external_bytes, 0x100);
    assert!((frag.external_percent - 3.125).abs() < 1e-9);
    assert_eq!(frag.internal_bytes, 0);

    assert_eq!(engine.translate_checked(1, 1, 0x10), Ok(0x2110));
    assert!(matches!(engine.translate_checked(1, 1, 0x1000), Err(SimError::AddressOutOfBounds(_))));
}

#[test]
fn reset_matches_fresh_instances() {
    let mut paging = PagingSimulator::new(4, 1024, AllocationStrategy::NextFit);
    paging.create_process(1, 4).unwrap();
    paging.allocate_page(1, PageId(0), None).unwrap();
    paging.translate_address(1, 5000).unwrap();
    paging.reset();
    assert_eq!(paging.statistics(), PagingSimulator::new(4, 1024, AllocationStrategy::NextFit).statistics());

    let mut vm = VirtualMemoryManager::new(2, 1024, ReplacementPolicy::Lru);
    vm.load_process(1, pages(&[0, 1, 2]));
    for p in [0, 1, 2, 0] {
        vm.access_page(1, VirtualPageId(p), false, &[]).unwrap();
    }
    vm.reset();
    assert_eq!(vm.statistics(), VirtualMemoryManager::new(2, 1024, ReplacementPolicy::Lru).statistics());

    let mut seg = SegmentationEngine::new();
    seg.create_process(1).unwrap();
    seg.add_segment(1, 0, "CODE", 0x400, None).unwrap();
    seg.translate_address(1, 0, 0x500);
    seg.reset();
    assert_eq!(seg.statistics(), SegmentationEngine::new().statistics());
}

#[test]
fn translation_round_trip() {
    let mut sim = PagingSimulator::new(8, 512, AllocationStrategy::FirstFit);
    sim.create_process(1, 4).unwrap();
    let frames: Vec<_> = (0..4).map(|p| sim.allocate_page(1, PageId(p), None).unwrap()).collect();

    for (page, &frame) in frames.iter().enumerate() {
        for k in [0, 1, 255, 511] {
            let t = sim.translate_address(1, page as u64 * 512 + k).unwrap();
            assert!(!t.fault);
            assert_eq!(t.physical_address, Some(frame as u64 * 512 + k));
            assert_eq!(t.offset, k);
        }
    }

    let mut vm = VirtualMemoryManager::new(2, 256, ReplacementPolicy::Fifo);
    vm.load_process(7, pages(&[3, 4]));
    let outcome = vm.access_page(7, VirtualPageId(4), false, &[]).unwrap();
    let frame = outcome.frame_index.unwrap() as u64;
    let t = vm.translate_address(7, 4 * 256 + 17).unwrap();
    assert_eq!(t.physical_address, Some(frame * 256 + 17));
    assert!(vm.translate_address(7, 3 * 256).unwrap().fault);
}
