use std::collections::VecDeque;

use serde::Serialize;

use crate::ProcessId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Adjustment {
    Grow,
    Shrink,
    Hold,
}

/// Sliding record of one process's most recent references.
#[derive(Debug, Clone)]
pub struct WorkingSet {
    allocated: usize,
    window: VecDeque<bool>,
    window_size: usize,
}

impl WorkingSet {
    pub fn new(allocated: usize, window_size: usize) -> Self {
        WorkingSet {
            allocated,
            window: VecDeque::with_capacity(window_size + 1),
            window_size,
        }
    }

    pub fn allocated(&self) -> usize {
        self.allocated
    }

    fn record(&mut self, fault: bool) {
        self.window.push_back(fault);
        while self.window.len() > self.window_size {
            self.window.pop_front();
        }
    }

    pub fn faults_in_window(&self) -> usize {
        self.window.iter().filter(|&&f| f).count()
    }
}

/// Grows or shrinks each process's frame allowance by one based on how
/// many of its last `window_size` references faulted.
///
/// Decisions only start once more than `window_size` references have run
/// in total, counted across all processes.
#[derive(Debug)]
pub struct WorkingSetController {
    sets: Vec<WorkingSet>,
    window_size: usize,
    min_faults: usize,
    max_faults: usize,
    max_allocation: usize,
    grows: u64,
    shrinks: u64,
}

impl WorkingSetController {
    pub fn new(
        n_processes: usize,
        initial: usize,
        window_size: usize,
        min_faults: usize,
        max_faults: usize,
        max_allocation: usize,
    ) -> Self {
        WorkingSetController {
            sets: vec![WorkingSet::new(initial, window_size); n_processes],
            window_size,
            min_faults,
            max_faults,
            max_allocation,
            grows: 0,
            shrinks: 0,
        }
    }

    pub fn sets(&self) -> &[WorkingSet] {
        &self.sets
    }

    pub fn allocation(&self, pid: ProcessId) -> usize {
        self.sets[pid].allocated
    }

    pub fn grows(&self) -> u64 {
        self.grows
    }

    pub fn shrinks(&self) -> u64 {
        self.shrinks
    }

    pub fn record(&mut self, pid: ProcessId, fault: bool) {
        self.sets[pid].record(fault);
    }

    /// Apply at most one adjustment for `pid` after `processed` references.
    /// Shrinking stops at one frame and growing at the size of the pool.
    pub fn decide(&mut self, pid: ProcessId, processed: u64) -> Adjustment {
        if processed <= self.window_size as u64 {
            return Adjustment::Hold;
        }
        let set = &mut self.sets[pid];
        let faults = set.faults_in_window();
        if faults < self.min_faults && set.allocated > 1 {
            set.allocated -= 1;
            self.shrinks += 1;
            Adjustment::Shrink
        } else if faults > self.max_faults && set.allocated < self.max_allocation {
            set.allocated += 1;
            self.grows += 1;
            Adjustment::Grow
        } else {
            Adjustment::Hold
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_forgets_old_references() {
        let mut ws = WorkingSet::new(2, 3);
        for fault in [true, true, false, false, false] {
            ws.record(fault);
        }
        assert_eq!(ws.faults_in_window(), 0);
        ws.record(true);
        assert_eq!(ws.faults_in_window(), 1);
    }

    #[test]
    fn holds_until_the_window_has_passed() {
        let mut c = WorkingSetController::new(1, 4, 3, 1, 2, 8);
        for n in 1..=3 {
            c.record(0, false);
            assert_eq!(c.decide(0, n), Adjustment::Hold);
        }
        c.record(0, false);
        assert_eq!(c.decide(0, 4), Adjustment::Shrink);
        assert_eq!(c.allocation(0), 3);
    }

    #[test]
    fn fault_heavy_window_grows_by_one() {
        let mut c = WorkingSetController::new(2, 4, 3, 1, 2, 8);
        for _ in 0..3 {
            c.record(1, true);
        }
        assert_eq!(c.decide(1, 10), Adjustment::Grow);
        assert_eq!(c.allocation(1), 5);
        assert_eq!(c.allocation(0), 4);
        assert_eq!(c.grows(), 1);
    }

    #[test]
    fn between_thresholds_holds() {
        let mut c = WorkingSetController::new(1, 4, 4, 1, 3, 8);
        c.record(0, true);
        c.record(0, false);
        assert_eq!(c.decide(0, 10), Adjustment::Hold);
    }

    #[test]
    fn allocation_is_clamped() {
        let mut c = WorkingSetController::new(1, 1, 2, 1, 1, 2);
        assert_eq!(c.decide(0, 10), Adjustment::Hold);
        c.record(0, true);
        c.record(0, true);
        assert_eq!(c.decide(0, 11), Adjustment::Grow);
        assert_eq!(c.decide(0, 12), Adjustment::Hold);
        assert_eq!(c.allocation(0), 2);
    }
}
