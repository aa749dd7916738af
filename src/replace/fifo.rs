use super::{Replace, Stamp};

#[derive(Debug)]
pub struct Fifo {}

impl Fifo {
    pub fn new() -> Self {
        Fifo {}
    }
}

impl Replace for Fifo {
    fn name(&self) -> &'static str {
        "FIFO"
    }

    fn victim(&self, candidates: &mut dyn Iterator<Item = (usize, Stamp)>) -> Option<usize> {
        candidates
            .min_by_key(|&(slot, stamp)| (stamp.inserted, slot))
            .map(|(slot, _)| slot)
    }
}
