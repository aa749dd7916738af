/// Latency classes charged once per resolved reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Charge {
    TlbHit,
    /// `extra` is the page-table organization's lookup overhead.
    MemoryHit { extra: f64 },
    /// Disk service followed by the memory access that completes it.
    Fault,
}

/// Running access-time totals, all in nanoseconds.
#[derive(Debug, Clone)]
pub struct AccessTimer {
    tlb_time: f64,
    mm_time: f64,
    disk_time: f64,
    total: f64,
    charged: u64,
}

impl AccessTimer {
    pub fn new(tlb_time: u64, mm_time: u64, disk_time: u64) -> Self {
        AccessTimer {
            tlb_time: tlb_time as f64,
            mm_time: mm_time as f64,
            disk_time: disk_time as f64,
            total: 0.0,
            charged: 0,
        }
    }

    pub fn cost(&self, charge: Charge) -> f64 {
        match charge {
            Charge::TlbHit => self.tlb_time,
            Charge::MemoryHit { extra } => self.mm_time + extra,
            Charge::Fault => self.disk_time + self.mm_time,
        }
    }

    pub fn charge(&mut self, charge: Charge) -> f64 {
        let cost = self.cost(charge);
        self.total += cost;
        self.charged += 1;
        cost
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn charged(&self) -> u64 {
        self.charged
    }

    pub fn average(&self) -> f64 {
        if self.charged == 0 {
            0.0
        } else {
            self.total / self.charged as f64
        }
    }
}
