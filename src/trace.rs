use std::{
    fmt, fs,
    io::{self, BufRead, BufReader, Read, Write},
    path::PathBuf,
    thread::{self, JoinHandle},
};

use crossbeam::channel::{Receiver, Sender};
use serde::Serialize;
use xz2::read::XzDecoder;

use crate::{error::TraceError, ProcessId, VirtualAddress};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operation {
    Read,
    Write,
}

/// One line of the trace: `<pid> <R|W> <hex address>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReferenceEvent {
    pub pid: ProcessId,
    pub op: Operation,
    pub addr: VirtualAddress,
}

impl ReferenceEvent {
    pub fn read(pid: ProcessId, addr: VirtualAddress) -> Self {
        ReferenceEvent {
            pid,
            op: Operation::Read,
            addr,
        }
    }

    pub fn write(pid: ProcessId, addr: VirtualAddress) -> Self {
        ReferenceEvent {
            pid,
            op: Operation::Write,
            addr,
        }
    }
}

impl fmt::Display for ReferenceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.op {
            Operation::Read => 'R',
            Operation::Write => 'W',
        };
        write!(f, "{} {} {:x}", self.pid, op, self.addr)
    }
}

/// Parse one trace line. Blank lines and `#` comments yield `Ok(None)`.
pub fn parse_line(line: usize, text: &str) -> Result<Option<ReferenceEvent>, TraceError> {
    let body = text.split('#').next().unwrap_or("").trim();
    if body.is_empty() {
        return Ok(None);
    }
    let malformed = |reason| TraceError::Malformed {
        line,
        text: text.to_string(),
        reason,
    };

    let mut fields = body.split_whitespace();
    let (Some(pid), Some(op), Some(addr), None) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return Err(malformed("expected 3 fields"));
    };

    let pid = pid.parse().map_err(|_| malformed("bad process id"))?;
    let op = match op {
        "R" | "r" => Operation::Read,
        "W" | "w" => Operation::Write,
        _ => return Err(malformed("operation must be R or W")),
    };
    let digits = addr
        .strip_prefix("0x")
        .or_else(|| addr.strip_prefix("0X"))
        .unwrap_or(addr);
    let addr = VirtualAddress::from_str_radix(digits, 16).map_err(|_| malformed("bad address"))?;

    Ok(Some(ReferenceEvent { pid, op, addr }))
}

pub type Record = Result<ReferenceEvent, TraceError>;

/// Trace records delivered in file order, in blocks, by a read-ahead
/// thread. The channel closing marks the end of the trace.
pub struct Trace {
    pub rec: Receiver<Vec<Record>>,
    _thread: Option<JoinHandle<()>>,
}

impl Trace {
    /// Open a text trace; a `.xz` extension is decompressed on the fly.
    pub fn open(path: PathBuf, records_per_block: usize, blocks_per_queue: usize) -> io::Result<Trace> {
        let file = fs::File::open(&path)?;
        let stream: Box<dyn Read + Send> = match path.extension() {
            Some(ext) if ext == "xz" => Box::new(XzDecoder::new(file)),
            _ => Box::new(file),
        };
        let (sender, receiver) = crossbeam::channel::bounded(blocks_per_queue.max(1));

        let records_per_block = records_per_block.max(1);
        let t = thread::spawn(move || Trace::run_thread(stream, records_per_block, sender));

        Ok(Trace {
            rec: receiver,
            _thread: Some(t),
        })
    }

    pub fn from_events(events: Vec<ReferenceEvent>) -> Trace {
        let (sender, receiver) = crossbeam::channel::unbounded();
        // the receiver is alive, so this cannot fail
        let _ = sender.send(events.into_iter().map(Ok).collect());
        Trace {
            rec: receiver,
            _thread: None,
        }
    }

    pub fn records(&self) -> impl Iterator<Item = Record> + '_ {
        self.rec.iter().flatten()
    }

    fn run_thread(stream: Box<dyn Read + Send>, records_per_block: usize, queue: Sender<Vec<Record>>) {
        let mut reader = BufReader::new(stream);
        let mut block = Vec::with_capacity(records_per_block);
        let mut buf = Vec::new();
        let mut line = 0;
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {}
                Err(err) => {
                    block.push(Err(TraceError::Io(err)));
                    break;
                }
            }
            line += 1;

            let record = match std::str::from_utf8(&buf) {
                Ok(text) => match parse_line(line, text.trim_end_matches(['\r', '\n'])) {
                    Ok(Some(event)) => Ok(event),
                    Ok(None) => continue,
                    Err(err) => Err(err),
                },
                Err(_) => Err(TraceError::Malformed {
                    line,
                    text: String::from_utf8_lossy(&buf).trim_end().to_string(),
                    reason: "invalid utf-8",
                }),
            };
            block.push(record);
            if block.len() == records_per_block {
                let full = std::mem::replace(&mut block, Vec::with_capacity(records_per_block));
                if queue.send(full).is_err() {
                    return;
                }
            }
        }
        if !block.is_empty() {
            let _ = queue.send(block);
        }
    }
}

/// Write events in the text trace format.
pub fn write_events<W: Write>(mut out: W, events: impl IntoIterator<Item = ReferenceEvent>) -> io::Result<()> {
    for event in events {
        writeln!(out, "{}", event)?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reads_and_writes() {
        assert_eq!(
            parse_line(1, "3 W 0x1a2b").unwrap(),
            Some(ReferenceEvent::write(3, 0x1a2b))
        );
        assert_eq!(
            parse_line(2, "  0 R ffff1000  ").unwrap(),
            Some(ReferenceEvent::read(0, 0xffff_1000))
        );
    }

    #[test]
    fn skips_blank_lines_and_comments() {
        assert_eq!(parse_line(1, "").unwrap(), None);
        assert_eq!(parse_line(1, "   # header").unwrap(), None);
        assert_eq!(
            parse_line(1, "1 R 10 # trailing").unwrap(),
            Some(ReferenceEvent::read(1, 0x10))
        );
    }

    #[test]
    fn rejects_malformed_lines() {
        for bad in ["1 R", "1 X 10", "p R 10", "1 R zz", "1 R 10 extra"] {
            match parse_line(7, bad) {
                Err(TraceError::Malformed { line, .. }) => assert_eq!(line, 7),
                other => panic!("{bad:?} parsed as {other:?}"),
            }
        }
    }

    #[test]
    fn display_round_trips_through_the_parser() {
        let event = ReferenceEvent::write(2, 0xdead000);
        assert_eq!(parse_line(1, &event.to_string()).unwrap(), Some(event));
    }

    #[test]
    fn reader_thread_keeps_order_and_reports_bad_lines() {
        let path = std::env::temp_dir().join(format!("vmsim-trace-{}.txt", std::process::id()));
        fs::write(&path, "0 R 0\n\n0 W 1000\nbogus\n1 R 2000\n").unwrap();
        let trace = Trace::open(path.clone(), 2, 1).unwrap();
        let records: Vec<_> = trace.records().collect();
        fs::remove_file(&path).unwrap();

        assert_eq!(records.len(), 4);
        assert_eq!(records[0].as_ref().unwrap(), &ReferenceEvent::read(0, 0));
        assert_eq!(records[1].as_ref().unwrap(), &ReferenceEvent::write(0, 0x1000));
        assert!(matches!(records[2], Err(TraceError::Malformed { line: 4, .. })));
        assert_eq!(records[3].as_ref().unwrap(), &ReferenceEvent::read(1, 0x2000));
    }

    #[test]
    fn reader_thread_reads_past_invalid_utf8() {
        let path = std::env::temp_dir().join(format!("vmsim-utf8-{}.txt", std::process::id()));
        fs::write(&path, b"0 R 0\n0 R \xff\xfe\n0 R 1000\r\n0 R 2000").unwrap();
        let trace = Trace::open(path.clone(), 3, 1).unwrap();
        let records: Vec<_> = trace.records().collect();
        fs::remove_file(&path).unwrap();

        assert_eq!(records.len(), 4);
        assert!(matches!(
            records[1],
            Err(TraceError::Malformed { line: 2, reason: "invalid utf-8", .. })
        ));
        assert_eq!(records[2].as_ref().unwrap(), &ReferenceEvent::read(0, 0x1000));
        assert_eq!(records[3].as_ref().unwrap(), &ReferenceEvent::read(0, 0x2000));
    }

    #[test]
    fn xz_trace_is_decompressed() {
        use xz2::write::XzEncoder;

        let path = std::env::temp_dir().join(format!("vmsim-trace-{}.xz", std::process::id()));
        let events = vec![
            ReferenceEvent::read(0, 0x1000),
            ReferenceEvent::write(1, 0x2fff),
            ReferenceEvent::read(4, 0),
        ];
        let mut encoder = XzEncoder::new(fs::File::create(&path).unwrap(), 6);
        write_events(&mut encoder, events.clone()).unwrap();
        encoder.finish().unwrap();

        let trace = Trace::open(path.clone(), 2, 2).unwrap();
        let records: Vec<_> = trace.records().map(|r| r.unwrap()).collect();
        fs::remove_file(&path).unwrap();
        assert_eq!(records, events);
    }

    #[test]
    fn in_memory_trace_ends_after_its_events() {
        let trace = Trace::from_events(vec![ReferenceEvent::read(0, 1), ReferenceEvent::read(1, 2)]);
        assert_eq!(trace.records().count(), 2);
    }
}
