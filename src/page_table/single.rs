use crate::{FrameIndex, PageNumber, ProcessId};

use super::Resolution;

/// One flat table per process, indexed directly by page number. Tables
/// grow on demand up to the highest page mapped so far.
#[derive(Debug)]
pub struct SingleLevel {
    tables: Vec<Vec<Option<FrameIndex>>>,
}

impl SingleLevel {
    pub fn new(n_processes: usize) -> Self {
        SingleLevel {
            tables: vec![Vec::new(); n_processes],
        }
    }

    pub fn translate(&self, pid: ProcessId, page: PageNumber) -> Resolution {
        match self.tables[pid].get(page as usize).copied().flatten() {
            Some(frame) => Resolution::Mapped { frame, extra: 0.0 },
            None => Resolution::Unmapped,
        }
    }

    pub fn map(&mut self, pid: ProcessId, page: PageNumber, frame: FrameIndex) {
        let table = &mut self.tables[pid];
        let idx = page as usize;
        if table.len() <= idx {
            table.resize(idx + 1, None);
        }
        table[idx] = Some(frame);
    }

    pub fn unmap(&mut self, pid: ProcessId, page: PageNumber) {
        if let Some(entry) = self.tables[pid].get_mut(page as usize) {
            *entry = None;
        }
    }

    pub fn mapped(&self, pid: ProcessId) -> usize {
        self.tables
            .get(pid)
            .map_or(0, |table| table.iter().flatten().count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_translate_unmap() {
        let mut t = SingleLevel::new(2);
        t.map(1, 300, 4);
        assert_eq!(t.translate(1, 300), Resolution::Mapped { frame: 4, extra: 0.0 });
        assert_eq!(t.translate(0, 300), Resolution::Unmapped);
        t.unmap(1, 300);
        assert_eq!(t.translate(1, 300), Resolution::Unmapped);
        assert_eq!(t.mapped(1), 0);
    }
}
