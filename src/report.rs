use log::{debug, info};

use crate::{
    page_table::Organization,
    sim::{Outcome, Path, Simulator},
    trace::ReferenceEvent,
};

/// Read-only view of the run after each reference.
pub trait Observer {
    fn on_reference(&mut self, sim: &Simulator, event: &ReferenceEvent, outcome: &Outcome);

    fn on_finish(&mut self, _sim: &Simulator) {}
}

impl Observer for () {
    fn on_reference(&mut self, _: &Simulator, _: &ReferenceEvent, _: &Outcome) {}
}

/// Progress heartbeat on stdout and, when verbose, a dump of every
/// structure after each reference.
pub struct Report {
    verbose: bool,
    heartbeat: u64,
    next_heartbeat: u64,
}

impl Report {
    pub fn new(verbose: bool, heartbeat: u64) -> Self {
        Report {
            verbose,
            heartbeat,
            next_heartbeat: heartbeat,
        }
    }
}

impl Observer for Report {
    fn on_reference(&mut self, sim: &Simulator, event: &ReferenceEvent, outcome: &Outcome) {
        if self.verbose {
            debug!("{}", snapshot(sim, event, outcome));
        }
        let n = sim.references();
        if self.heartbeat != 0 && n >= self.next_heartbeat {
            println!("References: {}", n);
            while self.next_heartbeat <= n {
                self.next_heartbeat += self.heartbeat;
            }
        }
    }

    fn on_finish(&mut self, sim: &Simulator) {
        let stats = sim.make_stats();
        info!(
            "{} references: {} TLB hits, {} memory hits, {} faults, {} invalid",
            stats.references, stats.tlb_hits, stats.memory_hits, stats.faults, stats.invalid
        );
        info!(
            "{} frames ({}), TLB {} entries ({}), {} page table",
            sim.frames().capacity(),
            sim.frames().policy(),
            sim.tlb().capacity(),
            sim.tlb().policy(),
            sim.page_table().kind()
        );
        info!(
            "average access time {:.3} ns, total {:.0} ns",
            stats.average_time_ns, stats.total_time_ns
        );
    }
}

fn path_name(path: Path) -> &'static str {
    match path {
        Path::TlbHit => "found it in the TLB",
        Path::MemoryHit => "found it in the page table",
        Path::Fault => "page fault",
        Path::Invalid => "segmentation fault",
    }
}

/// Multi-line dump of frames, TLB and assigned table pages.
pub fn snapshot(sim: &Simulator, event: &ReferenceEvent, outcome: &Outcome) -> String {
    let timer = sim.timer();
    let frames: String = sim
        .frames()
        .frames()
        .iter()
        .filter_map(|f| f.occupant)
        .map(|o| format!(" {}:{:#x}", o.pid, o.page))
        .collect();
    let tlb: String = sim
        .tlb()
        .entries()
        .map(|e| format!(" {:#x}->{}", e.page, e.frame))
        .collect();
    let table = match sim.page_table().organization() {
        Organization::Single(table) => format!("page table: {} pages mapped", table.mapped(event.pid)),
        Organization::Directory(dir) => {
            let slots: String = dir
                .assigned()
                .map(|(_, pid, start)| format!(" {}:{:#x}", pid, start))
                .collect();
            format!(
                "page directory [{} ] {}/{}",
                slots,
                dir.assigned().count(),
                dir.capacity()
            )
        }
        Organization::Inverted(table) => format!(
            "hash table: load {:.2}, longest chain {}",
            table.load_factor(),
            table.longest_chain()
        ),
    };

    [
        format!("reference {}: {}", sim.references(), event),
        format!(
            "  {} (+{} ns), running average {:.3} ns, running total {:.0} ns",
            path_name(outcome.path),
            outcome.cost,
            timer.average(),
            timer.total()
        ),
        format!("  frames [{} ]", frames),
        format!("  tlb [{} ]", tlb),
        format!("  {}", table),
    ]
    .join("\n")
}
