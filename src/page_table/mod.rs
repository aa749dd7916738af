pub mod directory;
pub mod inverted;
pub mod single;

use std::{fmt, str::FromStr};

use serde::Serialize;

use crate::{error::ConfigError, FrameIndex, PageNumber, ProcessId};

use self::{directory::Directory, inverted::Inverted, single::SingleLevel};

/// Outcome of walking the page table for one reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    /// Present. `extra` is the organization's lookup overhead in ns.
    Mapped { frame: FrameIndex, extra: f64 },
    Unmapped,
    InvalidAddress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PageTableKind {
    Single,
    Directory,
    Inverted,
}

impl FromStr for PageTableKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "single" | "0" => Ok(PageTableKind::Single),
            "directory" | "1" => Ok(PageTableKind::Directory),
            "inverted" | "2" => Ok(PageTableKind::Inverted),
            _ => Err(ConfigError::UnknownPageTable(s.to_string())),
        }
    }
}

impl fmt::Display for PageTableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PageTableKind::Single => "single-level",
            PageTableKind::Directory => "directory",
            PageTableKind::Inverted => "inverted",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum Organization {
    Single(SingleLevel),
    Directory(Directory),
    Inverted(Inverted),
}

/// Address translation for every process, fronted by the address-space
/// bound check. The organization is chosen once at construction.
#[derive(Debug)]
pub struct PageTable {
    max_pages: PageNumber,
    org: Organization,
}

impl PageTable {
    pub fn new(max_pages: PageNumber, org: Organization) -> Self {
        PageTable { max_pages, org }
    }

    pub fn organization(&self) -> &Organization {
        &self.org
    }

    pub fn kind(&self) -> PageTableKind {
        match self.org {
            Organization::Single(_) => PageTableKind::Single,
            Organization::Directory(_) => PageTableKind::Directory,
            Organization::Inverted(_) => PageTableKind::Inverted,
        }
    }

    pub fn in_bounds(&self, page: PageNumber) -> bool {
        page < self.max_pages
    }

    pub fn translate(&mut self, pid: ProcessId, page: PageNumber) -> Resolution {
        if !self.in_bounds(page) {
            return Resolution::InvalidAddress;
        }
        match &mut self.org {
            Organization::Single(t) => t.translate(pid, page),
            Organization::Directory(t) => t.translate(pid, page),
            Organization::Inverted(t) => t.translate(pid, page),
        }
    }

    /// The frame mapped for `page`, without touching replacement state or
    /// charging anything.
    pub fn lookup(&self, pid: ProcessId, page: PageNumber) -> Option<FrameIndex> {
        if !self.in_bounds(page) {
            return None;
        }
        let resolution = match &self.org {
            Organization::Single(t) => t.translate(pid, page),
            Organization::Directory(t) => t.peek(pid, page),
            Organization::Inverted(t) => t.translate(pid, page),
        };
        match resolution {
            Resolution::Mapped { frame, .. } => Some(frame),
            _ => None,
        }
    }

    /// Install `page -> frame` for `pid`. Returns the frames whose mappings
    /// were dropped to make room (only the directory organization ever
    /// drops any); the caller must release them.
    pub fn map(&mut self, pid: ProcessId, page: PageNumber, frame: FrameIndex) -> Vec<FrameIndex> {
        match &mut self.org {
            Organization::Single(t) => {
                t.map(pid, page, frame);
                Vec::new()
            }
            Organization::Directory(t) => t.map(pid, page, frame),
            Organization::Inverted(t) => {
                t.map(pid, page, frame);
                Vec::new()
            }
        }
    }

    pub fn unmap(&mut self, pid: ProcessId, page: PageNumber) {
        match &mut self.org {
            Organization::Single(t) => t.unmap(pid, page),
            Organization::Directory(t) => t.unmap(pid, page),
            Organization::Inverted(t) => t.unmap(pid, page),
        }
    }
}
