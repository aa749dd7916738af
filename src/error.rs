use thiserror::Error;

/// Rejected configuration input.
///
/// `OutOfRange`, `InvalidType` and the unknown-selector variants are
/// recoverable: the loader logs them and keeps the default. `Io` and `Json`
/// mean there was no usable document at all.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{name}={value} is out of range ({min}..={max}), keeping default")]
    OutOfRange {
        name: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("{name} has the wrong type ({reason}), keeping default")]
    InvalidType { name: &'static str, reason: String },

    #[error("unrecognized replacement policy: {0}")]
    UnknownPolicy(String),

    #[error("unrecognized page table type: {0}")]
    UnknownPageTable(String),

    #[error("could not read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("trace io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed trace record on line {line} ({reason}): {text:?}")]
    Malformed {
        line: usize,
        text: String,
        reason: &'static str,
    },
}

/// Logic errors inside the reference driver. None of these can happen
/// while the driver evicts before allocating and completes every fault.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SimError {
    #[error("no free frame available")]
    NoFreeFrame,

    #[error("a page fault is still pending")]
    FaultPending,

    #[error("no page fault is pending")]
    NoPendingFault,

    #[error("completed fault does not match the pending one")]
    FaultMismatch,
}
