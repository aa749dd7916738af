use log::{debug, warn};
use serde::Serialize;

use crate::{
    error::SimError,
    frames::{FramePool, Occupant},
    page_table::{Organization, PageTable, Resolution},
    report::Observer,
    timing::{AccessTimer, Charge},
    tlb::Tlb,
    trace::{Operation, Record, ReferenceEvent},
    working_set::{Adjustment, WorkingSetController},
    FrameIndex, PageNumber, ProcessId, PAGE_SIZE,
};

/// Which way a reference was satisfied. Exactly one per reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Path {
    TlbHit,
    MemoryHit,
    Fault,
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Outcome {
    pub path: Path,
    pub frame: Option<FrameIndex>,
    /// ns charged for this reference
    pub cost: f64,
    pub adjustment: Adjustment,
}

impl Outcome {
    fn invalid() -> Self {
        Outcome {
            path: Path::Invalid,
            frame: None,
            cost: 0.0,
            adjustment: Adjustment::Hold,
        }
    }
}

/// A reference that missed both the TLB and the page table. It has been
/// counted as a fault but holds no frame until
/// [`Simulator::complete_fault`] is called with it.
#[must_use]
#[derive(Debug, PartialEq, Eq)]
pub struct PendingFault {
    event: ReferenceEvent,
    page: PageNumber,
}

impl PendingFault {
    pub fn event(&self) -> ReferenceEvent {
        self.event
    }

    pub fn page(&self) -> PageNumber {
        self.page
    }
}

#[must_use]
#[derive(Debug, PartialEq)]
pub enum Step {
    Done(Outcome),
    Fault(PendingFault),
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessStats {
    pub pid: ProcessId,
    pub allocated: usize,
    pub resident: usize,
    pub faults_in_window: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    pub references: u64,
    pub tlb_hits: u64,
    pub memory_hits: u64,
    pub faults: u64,
    pub invalid: u64,
    pub malformed: u64,
    pub evictions: u64,
    pub dirty_evictions: u64,
    pub pt_page_evictions: u64,
    pub pt_released_frames: u64,
    pub tlb_evictions: u64,
    pub tlb_flushes: u64,
    pub ws_grows: u64,
    pub ws_shrinks: u64,
    pub total_time_ns: f64,
    pub average_time_ns: f64,
    pub tlb_hit_rate: f64,
    pub fault_rate: f64,
    pub processes: Vec<ProcessStats>,
}

/// Drives every reference through TLB, page table and frame pool, and
/// owns all of them for the length of the run.
#[derive(Debug)]
pub struct Simulator {
    frames: FramePool,
    tlb: Tlb,
    page_table: PageTable,
    working_sets: WorkingSetController,
    timer: AccessTimer,
    prev_pid: Option<ProcessId>,
    pending: Option<(ReferenceEvent, PageNumber)>,

    references: u64,
    tlb_hits: u64,
    memory_hits: u64,
    faults: u64,
    invalid: u64,
    malformed: u64,
    evictions: u64,
    dirty_evictions: u64,
    pt_released_frames: u64,
    tlb_flushes: u64,
}

impl Simulator {
    pub fn new(
        frames: FramePool,
        tlb: Tlb,
        page_table: PageTable,
        working_sets: WorkingSetController,
        timer: AccessTimer,
    ) -> Self {
        Simulator {
            frames,
            tlb,
            page_table,
            working_sets,
            timer,
            prev_pid: None,
            pending: None,
            references: 0,
            tlb_hits: 0,
            memory_hits: 0,
            faults: 0,
            invalid: 0,
            malformed: 0,
            evictions: 0,
            dirty_evictions: 0,
            pt_released_frames: 0,
            tlb_flushes: 0,
        }
    }

    pub fn frames(&self) -> &FramePool {
        &self.frames
    }

    pub fn tlb(&self) -> &Tlb {
        &self.tlb
    }

    pub fn page_table(&self) -> &PageTable {
        &self.page_table
    }

    pub fn working_sets(&self) -> &WorkingSetController {
        &self.working_sets
    }

    pub fn timer(&self) -> &AccessTimer {
        &self.timer
    }

    pub fn references(&self) -> u64 {
        self.references
    }

    pub fn faults(&self) -> u64 {
        self.faults
    }

    pub fn tlb_flushes(&self) -> u64 {
        self.tlb_flushes
    }

    /// Resolve a reference up to the point where a frame is needed.
    pub fn begin_reference(&mut self, event: ReferenceEvent) -> Result<Step, SimError> {
        if self.pending.is_some() {
            return Err(SimError::FaultPending);
        }
        self.references += 1;

        let pid = event.pid;
        let page = event.addr / PAGE_SIZE;
        if pid >= self.working_sets.sets().len() || !self.page_table.in_bounds(page) {
            return Ok(Step::Done(self.skip(event)));
        }

        if self.prev_pid != Some(pid) {
            // virtual pages are not tagged with a process in the TLB
            if self.prev_pid.is_some() {
                self.tlb.flush();
                self.tlb_flushes += 1;
            }
            self.prev_pid = Some(pid);
        }

        if let Some(frame) = self.tlb.lookup(page) {
            self.tlb_hits += 1;
            self.touch(frame, event.op);
            let cost = self.timer.charge(Charge::TlbHit);
            let adjustment = self.settle(pid, false);
            debug!("{} -> TLB hit, frame {}", event, frame);
            return Ok(Step::Done(Outcome {
                path: Path::TlbHit,
                frame: Some(frame),
                cost,
                adjustment,
            }));
        }

        match self.page_table.translate(pid, page) {
            Resolution::Mapped { frame, extra } => {
                self.memory_hits += 1;
                self.touch(frame, event.op);
                self.tlb.insert(page, frame);
                let cost = self.timer.charge(Charge::MemoryHit { extra });
                let adjustment = self.settle(pid, false);
                debug!("{} -> memory hit, frame {} (+{} ns)", event, frame, extra);
                Ok(Step::Done(Outcome {
                    path: Path::MemoryHit,
                    frame: Some(frame),
                    cost,
                    adjustment,
                }))
            }
            Resolution::Unmapped => {
                self.faults += 1;
                self.working_sets.record(pid, true);
                self.pending = Some((event, page));
                debug!("{} -> page fault", event);
                Ok(Step::Fault(PendingFault { event, page }))
            }
            Resolution::InvalidAddress => Ok(Step::Done(self.skip(event))),
        }
    }

    /// Load the faulting page into a frame, evicting first if needed, then
    /// install it in the page table and TLB.
    pub fn complete_fault(&mut self, fault: PendingFault) -> Result<Outcome, SimError> {
        let PendingFault { event, page } = fault;
        match self.pending {
            None => return Err(SimError::NoPendingFault),
            Some(pending) if pending != (event, page) => return Err(SimError::FaultMismatch),
            Some(_) => {}
        }
        let pid = event.pid;

        self.make_room(pid);
        let frame = self.frames.allocate(Occupant { pid, page })?;
        if event.op == Operation::Write {
            self.frames.mark_dirty(frame);
        }

        self.tlb.invalidate_page(page);
        for orphan in self.page_table.map(pid, page, frame) {
            self.release(orphan);
        }
        self.tlb.insert(page, frame);

        self.pending = None;
        let cost = self.timer.charge(Charge::Fault);
        let adjustment = self.apply_adjustment(pid);
        debug!("{} loaded into frame {}", event, frame);
        Ok(Outcome {
            path: Path::Fault,
            frame: Some(frame),
            cost,
            adjustment,
        })
    }

    /// Run one reference to completion.
    pub fn step(&mut self, event: ReferenceEvent) -> Result<Outcome, SimError> {
        match self.begin_reference(event)? {
            Step::Done(outcome) => Ok(outcome),
            Step::Fault(fault) => self.complete_fault(fault),
        }
    }

    /// Consume a whole trace in order. Malformed records are logged and
    /// counted; only internal logic errors stop the run.
    pub fn run<I, O>(&mut self, records: I, observer: &mut O) -> Result<(), SimError>
    where
        I: IntoIterator<Item = Record>,
        O: Observer + ?Sized,
    {
        for record in records {
            match record {
                Ok(event) => {
                    let outcome = self.step(event)?;
                    observer.on_reference(self, &event, &outcome);
                }
                Err(err) => {
                    warn!("skipping {}", err);
                    self.malformed += 1;
                }
            }
        }
        observer.on_finish(self);
        Ok(())
    }

    fn skip(&mut self, event: ReferenceEvent) -> Outcome {
        self.invalid += 1;
        warn!("segmentation fault: {} is outside the address space", event);
        Outcome::invalid()
    }

    fn touch(&mut self, frame: FrameIndex, op: Operation) {
        self.frames.mark_referenced(frame);
        if op == Operation::Write {
            self.frames.mark_dirty(frame);
        }
    }

    /// Book a non-faulting reference in the working set and act on it.
    fn settle(&mut self, pid: ProcessId, fault: bool) -> Adjustment {
        self.working_sets.record(pid, fault);
        self.apply_adjustment(pid)
    }

    fn apply_adjustment(&mut self, pid: ProcessId) -> Adjustment {
        let adjustment = self.working_sets.decide(pid, self.references);
        match adjustment {
            Adjustment::Shrink => {
                if let Some(victim) = self.frames.victim_of(pid) {
                    self.evict(victim);
                }
                debug!(
                    "working set of {} shrinks to {}",
                    pid,
                    self.working_sets.allocation(pid)
                );
            }
            Adjustment::Grow => debug!(
                "working set of {} grows to {}",
                pid,
                self.working_sets.allocation(pid)
            ),
            Adjustment::Hold => {}
        }
        adjustment
    }

    /// Free a frame for `pid`: replace one of its own pages once it has
    /// used its allowance, otherwise take a free frame or evict globally.
    fn make_room(&mut self, pid: ProcessId) {
        let local = if self.frames.resident(pid) >= self.working_sets.allocation(pid) {
            self.frames.victim_of(pid)
        } else {
            None
        };
        let victim = match local {
            Some(victim) => Some(victim),
            None if self.frames.free_count() == 0 => self.frames.victim(),
            None => None,
        };
        if let Some(victim) = victim {
            self.evict(victim);
        }
    }

    fn evict(&mut self, frame: FrameIndex) {
        if let Some(evicted) = self.frames.evict(frame) {
            let Occupant { pid, page } = evicted.occupant;
            self.page_table.unmap(pid, page);
            self.tlb.invalidate_frame(frame);
            self.evictions += 1;
            if evicted.dirty {
                self.dirty_evictions += 1;
            }
            debug!("evicted page {:#x} of {} from frame {}", page, pid, frame);
        }
    }

    /// Drop a frame whose mapping disappeared with its table page.
    fn release(&mut self, frame: FrameIndex) {
        if let Some(evicted) = self.frames.evict(frame) {
            self.tlb.invalidate_frame(frame);
            self.pt_released_frames += 1;
            if evicted.dirty {
                self.dirty_evictions += 1;
            }
        }
    }

    pub fn make_stats(&self) -> RunStats {
        let resolved = (self.tlb_hits + self.memory_hits + self.faults) as f64;
        let rate = |n: u64| if resolved > 0.0 { n as f64 / resolved } else { 0.0 };
        let pt_page_evictions = match self.page_table.organization() {
            Organization::Directory(d) => d.evictions(),
            _ => 0,
        };
        let processes = self
            .working_sets
            .sets()
            .iter()
            .enumerate()
            .map(|(pid, ws)| ProcessStats {
                pid,
                allocated: ws.allocated(),
                resident: self.frames.resident(pid),
                faults_in_window: ws.faults_in_window(),
            })
            .collect();

        RunStats {
            references: self.references,
            tlb_hits: self.tlb_hits,
            memory_hits: self.memory_hits,
            faults: self.faults,
            invalid: self.invalid,
            malformed: self.malformed,
            evictions: self.evictions,
            dirty_evictions: self.dirty_evictions,
            pt_page_evictions,
            pt_released_frames: self.pt_released_frames,
            tlb_evictions: self.tlb.evictions(),
            tlb_flushes: self.tlb_flushes,
            ws_grows: self.working_sets.grows(),
            ws_shrinks: self.working_sets.shrinks(),
            total_time_ns: self.timer.total(),
            average_time_ns: self.timer.average(),
            tlb_hit_rate: rate(self.tlb_hits),
            fault_rate: rate(self.faults),
            processes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, page_table::PageTableKind, replace::ReplPolicy};

    fn sim(config: Config) -> Simulator {
        config.to_simulator()
    }

    fn small() -> Config {
        Config {
            num_frames: 3,
            tlb_entries: 2,
            frame_repl: ReplPolicy::Fifo,
            page_table: PageTableKind::Single,
            init_ws: 3,
            wsw: 50,
            ..Config::default()
        }
    }

    fn at(page: u64) -> u64 {
        page * PAGE_SIZE
    }

    #[test]
    fn fault_then_tlb_hit_then_memory_hit() {
        let mut s = sim(Config {
            tlb_entries: 1,
            ..small()
        });
        assert_eq!(s.step(ReferenceEvent::read(0, at(1))).unwrap().path, Path::Fault);
        assert_eq!(s.step(ReferenceEvent::read(0, at(1))).unwrap().path, Path::TlbHit);
        assert_eq!(s.step(ReferenceEvent::read(0, at(2))).unwrap().path, Path::Fault);
        assert_eq!(s.step(ReferenceEvent::read(0, at(1))).unwrap().path, Path::MemoryHit);
    }

    #[test]
    fn two_phase_fault_must_be_completed() {
        let mut s = sim(small());
        let Step::Fault(fault) = s.begin_reference(ReferenceEvent::write(0, at(4))).unwrap() else {
            panic!("expected a fault");
        };
        assert_eq!(fault.page(), 4);
        assert_eq!(
            s.begin_reference(ReferenceEvent::read(0, at(5))),
            Err(SimError::FaultPending)
        );
        // only the fault that was raised can be completed
        let other = PendingFault {
            event: ReferenceEvent::read(0, at(9)),
            page: 9,
        };
        assert_eq!(s.complete_fault(other), Err(SimError::FaultMismatch));
        assert!(s.page_table().lookup(0, 9).is_none());
        assert_eq!(s.frames().free_count(), 3);
        let outcome = s.complete_fault(fault).unwrap();
        assert_eq!(outcome.path, Path::Fault);
        let frame = outcome.frame.unwrap();
        assert!(s.frames().frames()[frame].dirty);
        assert_eq!(
            s.complete_fault(PendingFault {
                event: ReferenceEvent::read(0, 0),
                page: 0
            }),
            Err(SimError::NoPendingFault)
        );
    }

    #[test]
    fn out_of_bounds_reference_touches_nothing() {
        let mut s = sim(Config {
            max_pages: 4,
            ..small()
        });
        s.step(ReferenceEvent::read(0, at(1))).unwrap();
        let outcome = s.step(ReferenceEvent::read(1, at(4))).unwrap();
        assert_eq!(outcome, Outcome::invalid());
        // no flush: the previous process is still current
        assert_eq!(s.tlb_flushes(), 0);
        assert_eq!(s.tlb().len(), 1);
        assert_eq!(s.timer().charged(), 1);
        assert_eq!(s.make_stats().invalid, 1);
    }

    #[test]
    fn unknown_process_is_skipped() {
        let mut s = sim(Config {
            num_processes: 2,
            ..small()
        });
        assert_eq!(s.step(ReferenceEvent::read(2, 0)).unwrap().path, Path::Invalid);
    }

    #[test]
    fn process_switch_flushes_the_tlb() {
        let mut s = sim(small());
        s.step(ReferenceEvent::read(1, at(0))).unwrap();
        assert_eq!(s.tlb_flushes(), 0);
        assert_eq!(s.step(ReferenceEvent::read(2, at(0))).unwrap().path, Path::Fault);
        assert_eq!(s.tlb_flushes(), 1);
        assert_eq!(s.step(ReferenceEvent::read(2, at(0))).unwrap().path, Path::TlbHit);
        assert_eq!(s.tlb_flushes(), 1);
    }

    #[test]
    fn allocation_limit_forces_local_replacement() {
        let mut s = sim(Config {
            num_frames: 4,
            init_ws: 1,
            ..small()
        });
        s.step(ReferenceEvent::read(0, at(0))).unwrap();
        s.step(ReferenceEvent::read(0, at(1))).unwrap();
        assert_eq!(s.frames().resident(0), 1);
        assert_eq!(s.frames().free_count(), 3);
        assert_eq!(s.make_stats().evictions, 1);
    }

    #[test]
    fn full_pool_evicts_globally_and_unmaps_the_victim() {
        let mut s = sim(Config {
            num_frames: 2,
            init_ws: 2,
            ..small()
        });
        s.step(ReferenceEvent::read(0, at(0))).unwrap();
        s.step(ReferenceEvent::read(1, at(0))).unwrap();
        s.step(ReferenceEvent::read(1, at(1))).unwrap();
        assert_eq!(s.frames().resident(0), 0);
        assert_eq!(s.step(ReferenceEvent::read(0, at(0))).unwrap().path, Path::Fault);
    }

    #[test]
    fn dirty_evictions_are_counted() {
        let mut s = sim(Config {
            num_frames: 1,
            init_ws: 1,
            ..small()
        });
        s.step(ReferenceEvent::write(0, at(0))).unwrap();
        s.step(ReferenceEvent::read(0, at(1))).unwrap();
        s.step(ReferenceEvent::read(0, at(2))).unwrap();
        let stats = s.make_stats();
        assert_eq!(stats.evictions, 2);
        assert_eq!(stats.dirty_evictions, 1);
    }

    #[test]
    fn shrink_evicts_one_of_the_process_frames() {
        let mut s = sim(Config {
            num_frames: 4,
            init_ws: 4,
            wsw: 2,
            min_page_fault: 1,
            max_page_fault: 2,
            ..small()
        });
        s.step(ReferenceEvent::read(0, at(0))).unwrap();
        s.step(ReferenceEvent::read(0, at(1))).unwrap();
        s.step(ReferenceEvent::read(0, at(0))).unwrap();
        // window [fault, hit] at reference 3: one fault, no change
        let outcome = s.step(ReferenceEvent::read(0, at(0))).unwrap();
        // window [hit, hit]: below the minimum
        assert_eq!(outcome.adjustment, Adjustment::Shrink);
        assert_eq!(s.working_sets().allocation(0), 3);
        assert_eq!(s.frames().resident(0), 1);
    }

    #[test]
    fn directory_reclaim_releases_orphaned_frames() {
        use crate::page_table::directory::PT_PAGE_ENTRIES;
        let mut s = sim(Config {
            num_frames: 4,
            init_ws: 4,
            page_table: PageTableKind::Directory,
            num_pt_pages: 1,
            ..small()
        });
        s.step(ReferenceEvent::read(0, at(0))).unwrap();
        s.step(ReferenceEvent::read(0, at(1))).unwrap();
        s.step(ReferenceEvent::read(0, at(PT_PAGE_ENTRIES))).unwrap();
        let stats = s.make_stats();
        assert_eq!(stats.pt_page_evictions, 1);
        assert_eq!(stats.pt_released_frames, 2);
        assert_eq!(s.frames().resident(0), 1);
        assert_eq!(s.tlb().len(), 1);
        assert_eq!(s.step(ReferenceEvent::read(0, at(0))).unwrap().path, Path::Fault);
    }
}
