pub mod fifo;
pub mod lru;
pub mod mfu;

use std::{fmt, str::FromStr};

use serde::Serialize;

use crate::error::ConfigError;

use self::{fifo::Fifo, lru::Lru, mfu::Mfu};

/// Replacement bookkeeping carried by every slot a policy can evict:
/// frames, TLB entries and page-table pages.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    pub inserted: u64,
    pub accessed: u64,
    pub uses: u64,
}

impl Stamp {
    pub fn new(tick: u64) -> Self {
        Stamp {
            inserted: tick,
            accessed: tick,
            uses: 1,
        }
    }

    /// Record a hit. Insertion order is left alone.
    pub fn touch(&mut self, tick: u64) {
        self.accessed = tick;
        self.uses += 1;
    }
}

/// Monotonic per-structure counter so that no two stamps compare equal on
/// time.
#[derive(Debug, Default, Clone)]
pub struct Ticks(u64);

impl Ticks {
    pub fn next(&mut self) -> u64 {
        self.0 += 1;
        self.0
    }
}

pub trait Replace: fmt::Debug {
    fn name(&self) -> &'static str;

    /// Pick the slot to evict out of `(slot, stamp)` candidates given in
    /// ascending slot order. Ties go to the lowest slot.
    fn victim(&self, candidates: &mut dyn Iterator<Item = (usize, Stamp)>) -> Option<usize>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplPolicy {
    Fifo,
    Lru,
    Mfu,
}

impl ReplPolicy {
    pub fn build(self) -> Box<dyn Replace> {
        match self {
            ReplPolicy::Fifo => Box::new(Fifo::new()),
            ReplPolicy::Lru => Box::new(Lru::new()),
            ReplPolicy::Mfu => Box::new(Mfu::new()),
        }
    }
}

impl FromStr for ReplPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fifo" | "0" => Ok(ReplPolicy::Fifo),
            "lru" | "1" => Ok(ReplPolicy::Lru),
            "mfu" | "2" => Ok(ReplPolicy::Mfu),
            _ => Err(ConfigError::UnknownPolicy(s.to_string())),
        }
    }
}

impl fmt::Display for ReplPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.build().name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamps() -> Vec<(usize, Stamp)> {
        // slot 0: old insert, recently used, used often
        // slot 1: newer insert, least recently used
        // slot 2: newest insert, used once
        vec![
            (0, Stamp { inserted: 1, accessed: 9, uses: 5 }),
            (1, Stamp { inserted: 2, accessed: 3, uses: 2 }),
            (2, Stamp { inserted: 4, accessed: 4, uses: 1 }),
        ]
    }

    #[test]
    fn each_policy_reads_its_own_key() {
        let pick = |p: ReplPolicy| p.build().victim(&mut stamps().into_iter());
        assert_eq!(pick(ReplPolicy::Fifo), Some(0));
        assert_eq!(pick(ReplPolicy::Lru), Some(1));
        assert_eq!(pick(ReplPolicy::Mfu), Some(0));
    }

    #[test]
    fn no_candidates_no_victim() {
        for p in [ReplPolicy::Fifo, ReplPolicy::Lru, ReplPolicy::Mfu] {
            assert_eq!(p.build().victim(&mut std::iter::empty()), None);
        }
    }

    #[test]
    fn touch_keeps_insertion_order() {
        let mut s = Stamp::new(3);
        s.touch(7);
        assert_eq!(s, Stamp { inserted: 3, accessed: 7, uses: 2 });
    }

    #[test]
    fn parses_names_and_legacy_codes() {
        assert_eq!("FIFO".parse::<ReplPolicy>().unwrap(), ReplPolicy::Fifo);
        assert_eq!("1".parse::<ReplPolicy>().unwrap(), ReplPolicy::Lru);
        assert_eq!("mfu".parse::<ReplPolicy>().unwrap(), ReplPolicy::Mfu);
        assert!("clock".parse::<ReplPolicy>().is_err());
    }
}
