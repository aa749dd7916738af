use crate::{
    replace::{Replace, Stamp, Ticks},
    FrameIndex, PageNumber,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlbEntry {
    pub page: PageNumber,
    pub frame: FrameIndex,
    stamp: Stamp,
}

/// Small fully associative translation cache.
///
/// Entries carry no process tag, so the owner must call [`Tlb::flush`]
/// whenever the running process changes.
#[derive(Debug)]
pub struct Tlb {
    entries: Vec<Option<TlbEntry>>,
    repl: Box<dyn Replace>,
    ticks: Ticks,
    evictions: u64,
}

impl Tlb {
    pub fn new(capacity: usize, repl: Box<dyn Replace>) -> Self {
        Tlb {
            entries: vec![None; capacity],
            repl,
            ticks: Ticks::default(),
            evictions: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    pub fn policy(&self) -> &'static str {
        self.repl.name()
    }

    pub fn entries(&self) -> impl Iterator<Item = &TlbEntry> {
        self.entries.iter().flatten()
    }

    pub fn lookup(&mut self, page: PageNumber) -> Option<FrameIndex> {
        let tick = self.ticks.next();
        let entry = self.entries.iter_mut().flatten().find(|e| e.page == page)?;
        entry.stamp.touch(tick);
        Some(entry.frame)
    }

    /// Cache a translation, evicting by policy when full. Inserting a page
    /// that is already cached changes nothing.
    pub fn insert(&mut self, page: PageNumber, frame: FrameIndex) {
        if self.entries().any(|e| e.page == page) {
            return;
        }
        let slot = match self.entries.iter().position(Option::is_none) {
            Some(slot) => slot,
            None => {
                let mut candidates = self
                    .entries
                    .iter()
                    .enumerate()
                    .filter_map(|(slot, e)| e.map(|e| (slot, e.stamp)));
                match self.repl.victim(&mut candidates) {
                    Some(slot) => {
                        self.evictions += 1;
                        slot
                    }
                    // zero-capacity TLB
                    None => return,
                }
            }
        };
        self.entries[slot] = Some(TlbEntry {
            page,
            frame,
            stamp: Stamp::new(self.ticks.next()),
        });
    }

    pub fn flush(&mut self) {
        self.entries.iter_mut().for_each(|e| *e = None);
    }

    /// Drop any entry pointing at `frame`.
    pub fn invalidate_frame(&mut self, frame: FrameIndex) {
        for e in self.entries.iter_mut() {
            if e.map_or(false, |e| e.frame == frame) {
                *e = None;
            }
        }
    }

    pub fn invalidate_page(&mut self, page: PageNumber) {
        for e in self.entries.iter_mut() {
            if e.map_or(false, |e| e.page == page) {
                *e = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replace::ReplPolicy;

    #[test]
    fn miss_then_hit() {
        let mut tlb = Tlb::new(2, ReplPolicy::Lru.build());
        assert_eq!(tlb.lookup(4), None);
        tlb.insert(4, 1);
        assert_eq!(tlb.lookup(4), Some(1));
    }

    #[test]
    fn full_tlb_evicts_by_policy() {
        let mut tlb = Tlb::new(2, ReplPolicy::Lru.build());
        tlb.insert(1, 10);
        tlb.insert(2, 20);
        tlb.lookup(1);
        tlb.insert(3, 30);
        assert_eq!(tlb.lookup(2), None);
        assert_eq!(tlb.lookup(1), Some(10));
        assert_eq!(tlb.lookup(3), Some(30));
        assert_eq!(tlb.evictions(), 1);
    }

    #[test]
    fn duplicate_insert_is_ignored() {
        let mut tlb = Tlb::new(2, ReplPolicy::Fifo.build());
        tlb.insert(1, 10);
        tlb.insert(1, 99);
        assert_eq!(tlb.len(), 1);
        assert_eq!(tlb.lookup(1), Some(10));
    }

    #[test]
    fn flush_empties_everything() {
        let mut tlb = Tlb::new(3, ReplPolicy::Mfu.build());
        tlb.insert(1, 1);
        tlb.insert(2, 2);
        tlb.flush();
        assert!(tlb.is_empty());
        assert_eq!(tlb.lookup(1), None);
    }

    #[test]
    fn invalidation_by_frame_and_page() {
        let mut tlb = Tlb::new(3, ReplPolicy::Fifo.build());
        tlb.insert(1, 5);
        tlb.insert(2, 6);
        tlb.invalidate_frame(5);
        tlb.invalidate_page(2);
        assert!(tlb.is_empty());
    }
}
