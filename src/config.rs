use std::{fs, path::Path};

use log::{debug, warn};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    error::ConfigError,
    frames::FramePool,
    page_table::{
        directory::Directory, inverted::Inverted, single::SingleLevel, Organization, PageTable,
        PageTableKind,
    },
    replace::ReplPolicy,
    sim::Simulator,
    timing::AccessTimer,
    tlb::Tlb,
    working_set::WorkingSetController,
};

pub const MAX_FRAMES: i64 = 4096;
pub const MAX_TLB: i64 = 512;
pub const MAX_TIME: i64 = 9_999_999;
pub const MAX_WSW: i64 = 50;
pub const MAX_PT_PAGES: i64 = 256;
/// 32-bit address space in 4 KiB pages
pub const MAX_PAGES: i64 = 1 << 20;
pub const MAX_PROCESSES: i64 = 64;

/// Policy and page-table selectors may be given by name or legacy code.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
enum Selector {
    Name(String),
    Code(i64),
}

impl Selector {
    fn text(&self) -> String {
        match self {
            Selector::Name(s) => s.clone(),
            Selector::Code(c) => c.to_string(),
        }
    }
}

/// Validated run parameters. Times are in ns except `disk_time`, which is
/// in ms.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    pub num_frames: usize,
    pub tlb_entries: usize,
    pub mm_time: u64,
    pub tlb_time: u64,
    pub disk_time: u64,
    pub frame_repl: ReplPolicy,
    pub tlb_repl: ReplPolicy,
    pub pt_page_repl: ReplPolicy,
    pub page_table: PageTableKind,
    pub wsw: usize,
    pub init_ws: usize,
    pub min_page_fault: usize,
    pub max_page_fault: usize,
    pub num_pt_pages: usize,
    pub directory_pct: u32,
    pub collision_pct: u32,
    pub mod_num: usize,
    pub max_pages: u64,
    pub num_processes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            num_frames: 64,
            tlb_entries: 10,
            mm_time: 2,
            tlb_time: 1,
            disk_time: 5,
            frame_repl: ReplPolicy::Lru,
            tlb_repl: ReplPolicy::Lru,
            pt_page_repl: ReplPolicy::Lru,
            page_table: PageTableKind::Directory,
            wsw: 5,
            init_ws: 8,
            min_page_fault: 1,
            max_page_fault: 4,
            num_pt_pages: 8,
            directory_pct: 10,
            collision_pct: 10,
            mod_num: 16,
            max_pages: MAX_PAGES as u64,
            num_processes: 5,
        }
    }
}

/// Pulls fields out of the document one at a time, collecting rejected
/// values instead of failing the whole load.
struct Validator {
    doc: Map<String, Value>,
    rejected: Vec<ConfigError>,
}

impl Validator {
    /// A missing or `null` field is `None`; a value of the wrong type is
    /// rejected.
    fn field<T: DeserializeOwned>(&mut self, name: &'static str) -> Option<T> {
        let value = self.doc.remove(name)?;
        match serde_json::from_value::<Option<T>>(value) {
            Ok(v) => v,
            Err(err) => {
                self.reject(ConfigError::InvalidType {
                    name,
                    reason: err.to_string(),
                });
                None
            }
        }
    }

    fn range(&mut self, name: &'static str, min: i64, max: i64) -> Option<i64> {
        let value = self.field::<i64>(name)?;
        if (min..=max).contains(&value) {
            Some(value)
        } else {
            self.reject(ConfigError::OutOfRange {
                name,
                value,
                min,
                max,
            });
            None
        }
    }

    fn parse<T>(&mut self, name: &'static str) -> Option<T>
    where
        T: std::str::FromStr<Err = ConfigError>,
    {
        match self.field::<Selector>(name)?.text().parse() {
            Ok(v) => Some(v),
            Err(err) => {
                self.reject(err);
                None
            }
        }
    }

    fn reject(&mut self, err: ConfigError) {
        warn!("{}", err);
        self.rejected.push(err);
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<(Config, Vec<ConfigError>), ConfigError> {
        let text = fs::read_to_string(path)?;
        Config::from_json(&text)
    }

    /// Parse and validate a JSON document. Out-of-range and unrecognized
    /// values are returned alongside the config, which keeps the default
    /// for each of them.
    pub fn from_json(text: &str) -> Result<(Config, Vec<ConfigError>), ConfigError> {
        let doc: Map<String, Value> = serde_json::from_str(text)?;
        Ok(Config::validate(doc))
    }

    fn validate(doc: Map<String, Value>) -> (Config, Vec<ConfigError>) {
        let mut v = Validator {
            doc,
            rejected: Vec::new(),
        };
        let mut c = Config::default();

        if let Some(n) = v.range("num_frames", 1, MAX_FRAMES) {
            c.num_frames = n as usize;
        }
        if let Some(n) = v.range("tlb_entries", 1, MAX_TLB) {
            c.tlb_entries = n as usize;
        }
        if let Some(n) = v.range("mm_time", 1, MAX_TIME) {
            c.mm_time = n as u64;
        }
        if let Some(n) = v.range("tlb_time", 1, MAX_TIME) {
            c.tlb_time = n as u64;
        }
        if let Some(n) = v.range("disk_time", 1, MAX_TIME) {
            c.disk_time = n as u64;
        }
        if let Some(p) = v.parse("frame_repl") {
            c.frame_repl = p;
        }
        if let Some(p) = v.parse("tlb_repl") {
            c.tlb_repl = p;
        }
        if let Some(p) = v.parse("pt_page_repl") {
            c.pt_page_repl = p;
        }
        if let Some(k) = v.parse("page_table") {
            c.page_table = k;
        }
        if let Some(n) = v.range("wsw", 1, MAX_WSW) {
            c.wsw = n as usize;
        }

        // the rest are bounded by values validated above
        c.init_ws = c.init_ws.min(c.num_frames);
        if let Some(n) = v.range("init_ws", 1, c.num_frames as i64) {
            c.init_ws = n as usize;
        }
        c.min_page_fault = c.min_page_fault.min(c.wsw);
        if let Some(n) = v.range("min_page_fault", 0, c.wsw as i64) {
            c.min_page_fault = n as usize;
        }
        c.max_page_fault = c.max_page_fault.min(c.wsw);
        if let Some(n) = v.range("max_page_fault", 1, c.wsw as i64) {
            c.max_page_fault = n as usize;
        }
        if let Some(n) = v.range("num_pt_pages", 1, MAX_PT_PAGES) {
            c.num_pt_pages = n as usize;
        }
        if let Some(n) = v.range("directory_pct", 0, 100) {
            c.directory_pct = n as u32;
        }
        if let Some(n) = v.range("collision_pct", 0, 100) {
            c.collision_pct = n as u32;
        }
        c.mod_num = c.mod_num.min(c.num_frames);
        if let Some(n) = v.range("mod_num", 1, c.num_frames as i64) {
            c.mod_num = n as usize;
        }
        if let Some(n) = v.range("max_pages", 1, MAX_PAGES) {
            c.max_pages = n as u64;
        }
        if let Some(n) = v.range("num_processes", 1, MAX_PROCESSES) {
            c.num_processes = n as usize;
        }

        for name in v.doc.keys() {
            debug!("ignoring unknown config field {}", name);
        }
        debug!("validated config: {:?}", c);
        (c, v.rejected)
    }

    pub fn disk_time_ns(&self) -> u64 {
        self.disk_time * 1000
    }

    /// Directory indexing overhead per mapped lookup, in ns.
    pub fn directory_extra(&self) -> f64 {
        self.directory_pct as f64 / 100.0 * self.mm_time as f64
    }

    /// Inverted-table overhead per colliding chain entry, in ns.
    pub fn collision_extra(&self) -> f64 {
        self.collision_pct as f64 / 100.0 * self.mm_time as f64
    }

    pub fn to_simulator(&self) -> Simulator {
        let org = match self.page_table {
            PageTableKind::Single => Organization::Single(SingleLevel::new(self.num_processes)),
            PageTableKind::Directory => Organization::Directory(Directory::new(
                self.num_processes,
                self.max_pages,
                self.num_pt_pages,
                self.pt_page_repl.build(),
                self.directory_extra(),
            )),
            PageTableKind::Inverted => {
                Organization::Inverted(Inverted::new(self.mod_num, self.collision_extra()))
            }
        };
        Simulator::new(
            FramePool::new(self.num_frames, self.frame_repl.build()),
            Tlb::new(self.tlb_entries, self.tlb_repl.build()),
            PageTable::new(self.max_pages, org),
            WorkingSetController::new(
                self.num_processes,
                self.init_ws,
                self.wsw,
                self.min_page_fault,
                self.max_page_fault,
                self.num_frames,
            ),
            AccessTimer::new(self.tlb_time, self.mm_time, self.disk_time_ns()),
        )
    }
}
