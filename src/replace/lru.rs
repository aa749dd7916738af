use super::{Replace, Stamp};

#[derive(Debug)]
pub struct Lru {}

impl Lru {
    pub fn new() -> Self {
        Lru {}
    }
}

impl Replace for Lru {
    fn name(&self) -> &'static str {
        "LRU"
    }

    fn victim(&self, candidates: &mut dyn Iterator<Item = (usize, Stamp)>) -> Option<usize> {
        candidates
            .min_by_key(|&(slot, stamp)| (stamp.accessed, slot))
            .map(|(slot, _)| slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_hit_protects_a_slot() {
        let mut old = Stamp::new(1);
        old.touch(4);
        let newer = Stamp::new(2);
        let victim = Lru::new().victim(&mut vec![(0, old), (1, newer)].into_iter());
        assert_eq!(victim, Some(1));
    }
}
