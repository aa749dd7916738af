//! Trace-driven virtual memory simulator: TLB, three page-table
//! organizations, a frame pool with FIFO/LRU/MFU replacement and a
//! per-process working-set controller, scored by simulated access time.

pub mod config;
pub mod error;
pub mod frames;
pub mod page_table;
pub mod replace;
pub mod report;
pub mod sim;
pub mod synth;
pub mod timing;
pub mod tlb;
pub mod trace;
pub mod working_set;

pub type ProcessId = usize;
pub type PageNumber = u64;
pub type FrameIndex = usize;
pub type VirtualAddress = u64;

pub const PAGE_SIZE: u64 = 4096;

pub use config::Config;
pub use error::{ConfigError, SimError, TraceError};
pub use sim::{Outcome, Path, PendingFault, RunStats, Simulator, Step};
pub use trace::{Operation, ReferenceEvent, Trace};
