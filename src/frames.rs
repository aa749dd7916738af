use serde::Serialize;

use crate::{
    error::SimError,
    replace::{Replace, Stamp, Ticks},
    FrameIndex, PageNumber, ProcessId,
};

/// The (process, virtual page) pair a frame is holding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Occupant {
    pub pid: ProcessId,
    pub page: PageNumber,
}

#[derive(Debug, Default, Clone)]
pub struct Frame {
    pub occupant: Option<Occupant>,
    pub dirty: bool,
    pub referenced: bool,
    stamp: Stamp,
}

impl Frame {
    pub fn is_empty(&self) -> bool {
        self.occupant.is_none()
    }

    pub fn owner(&self) -> Option<ProcessId> {
        self.occupant.map(|o| o.pid)
    }

    fn clear(&mut self) {
        *self = Frame::default();
    }
}

/// What a frame held at the moment it was evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evicted {
    pub occupant: Occupant,
    pub dirty: bool,
}

/// Fixed arena of physical frames. The slot index is the frame number.
///
/// The pool never evicts on its own: `allocate` fails when every frame is
/// taken and the caller picks a victim with [`FramePool::victim`] or
/// [`FramePool::victim_of`] first.
#[derive(Debug)]
pub struct FramePool {
    frames: Vec<Frame>,
    repl: Box<dyn Replace>,
    ticks: Ticks,
}

impl FramePool {
    pub fn new(n_frames: usize, repl: Box<dyn Replace>) -> Self {
        FramePool {
            frames: vec![Frame::default(); n_frames],
            repl,
            ticks: Ticks::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn policy(&self) -> &'static str {
        self.repl.name()
    }

    pub fn free_count(&self) -> usize {
        self.frames.iter().filter(|f| f.is_empty()).count()
    }

    pub fn resident(&self, pid: ProcessId) -> usize {
        self.frames.iter().filter(|f| f.owner() == Some(pid)).count()
    }

    /// Place `occupant` in the lowest free frame.
    pub fn allocate(&mut self, occupant: Occupant) -> Result<FrameIndex, SimError> {
        let (index, frame) = self
            .frames
            .iter_mut()
            .enumerate()
            .find(|(_, f)| f.is_empty())
            .ok_or(SimError::NoFreeFrame)?;
        frame.occupant = Some(occupant);
        frame.referenced = true;
        frame.stamp = Stamp::new(self.ticks.next());
        Ok(index)
    }

    /// Empty a frame. The caller is responsible for dropping the page-table
    /// and TLB entries that pointed at it.
    pub fn evict(&mut self, index: FrameIndex) -> Option<Evicted> {
        let frame = &mut self.frames[index];
        let occupant = frame.occupant?;
        let evicted = Evicted {
            occupant,
            dirty: frame.dirty,
        };
        frame.clear();
        Some(evicted)
    }

    pub fn mark_referenced(&mut self, index: FrameIndex) {
        let tick = self.ticks.next();
        let frame = &mut self.frames[index];
        frame.referenced = true;
        frame.stamp.touch(tick);
    }

    pub fn mark_dirty(&mut self, index: FrameIndex) {
        self.frames[index].dirty = true;
    }

    /// Global victim among every occupied frame.
    pub fn victim(&self) -> Option<FrameIndex> {
        self.pick(|_| true)
    }

    /// Victim restricted to the frames owned by `pid`.
    pub fn victim_of(&self, pid: ProcessId) -> Option<FrameIndex> {
        self.pick(|f| f.owner() == Some(pid))
    }

    fn pick(&self, keep: impl Fn(&Frame) -> bool) -> Option<FrameIndex> {
        let mut candidates = self
            .frames
            .iter()
            .enumerate()
            .filter(|(_, f)| !f.is_empty() && keep(f))
            .map(|(index, f)| (index, f.stamp));
        self.repl.victim(&mut candidates)
    }
}
