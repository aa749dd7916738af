use crate::{
    replace::{Replace, Stamp, Ticks},
    FrameIndex, PageNumber, ProcessId,
};

use super::Resolution;

/// Entries held by one second-level table page.
pub const PT_PAGE_ENTRIES: u64 = 1024;

#[derive(Debug, Clone)]
struct TablePage {
    /// (process, directory slot) this page currently backs
    owner: Option<(ProcessId, usize)>,
    entries: Vec<Option<FrameIndex>>,
    stamp: Stamp,
}

impl TablePage {
    fn empty() -> Self {
        TablePage {
            owner: None,
            entries: vec![None; PT_PAGE_ENTRIES as usize],
            stamp: Stamp::default(),
        }
    }
}

/// Two-level table. Each process owns a directory whose slots point into a
/// shared, fixed pool of second-level table pages; when the pool is full a
/// table page is reclaimed by policy and every mapping it held is lost.
#[derive(Debug)]
pub struct Directory {
    dirs: Vec<Vec<Option<usize>>>,
    pages: Vec<TablePage>,
    repl: Box<dyn Replace>,
    ticks: Ticks,
    extra: f64,
    evictions: u64,
}

impl Directory {
    /// `extra` is the indexing overhead charged on every mapped lookup.
    pub fn new(
        n_processes: usize,
        max_pages: PageNumber,
        n_pt_pages: usize,
        repl: Box<dyn Replace>,
        extra: f64,
    ) -> Self {
        let n_slots = max_pages.div_ceil(PT_PAGE_ENTRIES) as usize;
        Directory {
            dirs: vec![vec![None; n_slots]; n_processes],
            pages: vec![TablePage::empty(); n_pt_pages],
            repl,
            ticks: Ticks::default(),
            extra,
            evictions: 0,
        }
    }

    fn split(page: PageNumber) -> (usize, usize) {
        (
            (page / PT_PAGE_ENTRIES) as usize,
            (page % PT_PAGE_ENTRIES) as usize,
        )
    }

    pub fn translate(&mut self, pid: ProcessId, page: PageNumber) -> Resolution {
        let (slot, offset) = Self::split(page);
        let Some(tp) = self.dirs[pid][slot] else {
            return Resolution::Unmapped;
        };
        let tick = self.ticks.next();
        let table = &mut self.pages[tp];
        table.stamp.touch(tick);
        match table.entries[offset] {
            Some(frame) => Resolution::Mapped {
                frame,
                extra: self.extra,
            },
            None => Resolution::Unmapped,
        }
    }

    /// Like `translate`, but leaves the table page's replacement stamp alone.
    pub fn peek(&self, pid: ProcessId, page: PageNumber) -> Resolution {
        let (slot, offset) = Self::split(page);
        match self.dirs[pid][slot].and_then(|tp| self.pages[tp].entries[offset]) {
            Some(frame) => Resolution::Mapped {
                frame,
                extra: self.extra,
            },
            None => Resolution::Unmapped,
        }
    }

    /// Install a mapping, assigning a table page to the directory slot if
    /// needed. Returns the frames orphaned by a reclaimed table page.
    pub fn map(&mut self, pid: ProcessId, page: PageNumber, frame: FrameIndex) -> Vec<FrameIndex> {
        let (slot, offset) = Self::split(page);
        let mut released = Vec::new();
        let tp = match self.dirs[pid][slot] {
            Some(tp) => tp,
            None => {
                let tp = match self.pages.iter().position(|p| p.owner.is_none()) {
                    Some(tp) => tp,
                    None => {
                        let mut candidates = self
                            .pages
                            .iter()
                            .enumerate()
                            .map(|(idx, p)| (idx, p.stamp));
                        // the pool is never empty, so a full pool always yields a victim
                        let tp = self.repl.victim(&mut candidates).unwrap_or(0);
                        released = self.reclaim(tp);
                        tp
                    }
                };
                let table = &mut self.pages[tp];
                table.owner = Some((pid, slot));
                table.stamp = Stamp::new(self.ticks.next());
                self.dirs[pid][slot] = Some(tp);
                tp
            }
        };
        self.pages[tp].entries[offset] = Some(frame);
        released
    }

    fn reclaim(&mut self, tp: usize) -> Vec<FrameIndex> {
        let table = &mut self.pages[tp];
        if let Some((pid, slot)) = table.owner.take() {
            self.dirs[pid][slot] = None;
        }
        self.evictions += 1;
        table.entries.iter_mut().filter_map(Option::take).collect()
    }

    pub fn unmap(&mut self, pid: ProcessId, page: PageNumber) {
        let (slot, offset) = Self::split(page);
        if let Some(tp) = self.dirs[pid][slot] {
            self.pages[tp].entries[offset] = None;
        }
    }

    /// Table-page reclaims so far.
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    pub fn capacity(&self) -> usize {
        self.pages.len()
    }

    /// `(table page, process, first virtual page covered)` for every
    /// assigned table page.
    pub fn assigned(&self) -> impl Iterator<Item = (usize, ProcessId, PageNumber)> + '_ {
        self.pages.iter().enumerate().filter_map(|(idx, p)| {
            p.owner
                .map(|(pid, slot)| (idx, pid, slot as PageNumber * PT_PAGE_ENTRIES))
        })
    }
}
