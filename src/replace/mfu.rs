use std::cmp::Reverse;

use super::{Replace, Stamp};

/// Most-frequently-used: the slot with the highest use count goes first.
#[derive(Debug)]
pub struct Mfu {}

impl Mfu {
    pub fn new() -> Self {
        Mfu {}
    }
}

impl Replace for Mfu {
    fn name(&self) -> &'static str {
        "MFU"
    }

    fn victim(&self, candidates: &mut dyn Iterator<Item = (usize, Stamp)>) -> Option<usize> {
        candidates
            .min_by_key(|&(slot, stamp)| (Reverse(stamp.uses), slot))
            .map(|(slot, _)| slot)
    }
}
