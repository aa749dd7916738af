use crate::{FrameIndex, PageNumber, ProcessId};

use super::Resolution;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    pid: ProcessId,
    page: PageNumber,
    frame: FrameIndex,
}

/// Hashed table keyed by (process, page) with one chain per bucket.
#[derive(Debug)]
pub struct Inverted {
    buckets: Vec<Vec<Entry>>,
    /// overhead per colliding entry in the probed chain
    extra: f64,
}

impl Inverted {
    pub fn new(mod_num: usize, extra: f64) -> Self {
        Inverted {
            buckets: vec![Vec::new(); mod_num.max(1)],
            extra,
        }
    }

    fn bucket(&self, pid: ProcessId, page: PageNumber) -> usize {
        let key = page.wrapping_add((pid as u64) << 20);
        (key % self.buckets.len() as u64) as usize
    }

    pub fn translate(&self, pid: ProcessId, page: PageNumber) -> Resolution {
        let chain = &self.buckets[self.bucket(pid, page)];
        match chain.iter().find(|e| e.pid == pid && e.page == page) {
            Some(e) => Resolution::Mapped {
                frame: e.frame,
                extra: self.extra * (chain.len() - 1) as f64,
            },
            None => Resolution::Unmapped,
        }
    }

    pub fn map(&mut self, pid: ProcessId, page: PageNumber, frame: FrameIndex) {
        let b = self.bucket(pid, page);
        let chain = &mut self.buckets[b];
        match chain.iter_mut().find(|e| e.pid == pid && e.page == page) {
            Some(e) => e.frame = frame,
            None => chain.push(Entry { pid, page, frame }),
        }
    }

    pub fn unmap(&mut self, pid: ProcessId, page: PageNumber) {
        let b = self.bucket(pid, page);
        self.buckets[b].retain(|e| !(e.pid == pid && e.page == page));
    }

    pub fn load_factor(&self) -> f64 {
        let entries: usize = self.buckets.iter().map(Vec::len).sum();
        entries as f64 / self.buckets.len() as f64
    }

    pub fn longest_chain(&self) -> usize {
        self.buckets.iter().map(Vec::len).max().unwrap_or(0)
    }
}
