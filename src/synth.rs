use crate::{
    trace::{Operation, ReferenceEvent},
    PageNumber, ProcessId, PAGE_SIZE,
};

/// Number of recently used pages a process may revisit.
const RECENT: usize = 8;

/// Deterministic synthetic reference stream. Each process mostly revisits
/// a handful of recent pages and occasionally jumps elsewhere; processes
/// run in bursts.
#[derive(Debug, Clone)]
pub struct SynthTrace {
    pub seed: u64,
    pub references: usize,
    pub processes: usize,
    pub pages: PageNumber,
    /// chance of reusing a recent page, 0.0..=1.0
    pub locality: f64,
    pub write_ratio: f64,
    /// mean references between process switches
    pub burst: usize,
}

impl Default for SynthTrace {
    fn default() -> Self {
        SynthTrace {
            seed: 0,
            references: 10_000,
            processes: 5,
            pages: 256,
            locality: 0.9,
            write_ratio: 0.3,
            burst: 20,
        }
    }
}

impl SynthTrace {
    pub fn events(&self) -> Vec<ReferenceEvent> {
        let mut rng = fastrand::Rng::with_seed(self.seed);
        let processes = self.processes.max(1);
        let pages = self.pages.max(1);
        let burst = self.burst.max(1);
        let mut recent: Vec<Vec<PageNumber>> = vec![Vec::with_capacity(RECENT); processes];
        let mut pid: ProcessId = 0;
        let mut left_in_burst = rng.usize(1..=2 * burst);

        let mut events = Vec::with_capacity(self.references);
        for _ in 0..self.references {
            if left_in_burst == 0 {
                pid = rng.usize(0..processes);
                left_in_burst = rng.usize(1..=2 * burst);
            }
            left_in_burst -= 1;

            let hot = &mut recent[pid];
            let page = if !hot.is_empty() && rng.f64() < self.locality {
                hot[rng.usize(0..hot.len())]
            } else {
                let page = rng.u64(0..pages);
                if hot.len() == RECENT {
                    hot.remove(0);
                }
                hot.push(page);
                page
            };
            let op = if rng.f64() < self.write_ratio {
                Operation::Write
            } else {
                Operation::Read
            };
            let addr = page * PAGE_SIZE + rng.u64(0..PAGE_SIZE);
            events.push(ReferenceEvent { pid, op, addr });
        }
        events
    }
}
