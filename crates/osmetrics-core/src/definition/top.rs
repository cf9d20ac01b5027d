//! Patterns over the header block printed by `top`.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::error::ParseError;

/// A lazily compiled regex that reports failures as [`ParseError`].
pub struct Pattern {
    source: &'static str,
    compiled: OnceLock<Result<Regex, regex::Error>>,
}

impl Pattern {
    pub const fn new(source: &'static str) -> Self {
        Self {
            source,
            compiled: OnceLock::new(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.source
    }

    /// First match of the pattern in `text`.
    pub fn captures<'t>(&self, text: &'t str) -> Result<Captures<'t>, ParseError> {
        let regex = self
            .compiled
            .get_or_init(|| Regex::new(self.source))
            .as_ref()
            .map_err(|e| ParseError::new(format!("invalid pattern {}: {e}", self.source)))?;

        regex
            .captures(text)
            .ok_or_else(|| ParseError::new(format!("no match for {}", self.source)))
    }
}

/// Text of capture group `index`, which must have participated in the match.
pub fn group<'t>(caps: &Captures<'t>, index: usize) -> Result<&'t str, ParseError> {
    caps.get(index)
        .map(|m| m.as_str())
        .ok_or_else(|| ParseError::new(format!("capture group {index} is empty")))
}

/// `%Cpu(s):  2.8 us,  1.3 sy, ...`; groups 1..=8 are us sy ni id wa hi si st.
pub static LINUX_CPU: Pattern = Pattern::new(
    r"%Cpu\(s\):\s*([\d.]+)\s*us,\s*([\d.]+)\s*sy,\s*([\d.]+)\s*ni,\s*([\d.]+)\s*id,\s*([\d.]+)\s*wa,\s*([\d.]+)\s*hi,\s*([\d.]+)\s*si,\s*([\d.]+)\s*st",
);

/// `CPU usage: 5.50% user, 8.21% sys, 86.28% idle`.
pub static MAC_CPU: Pattern =
    Pattern::new(r"CPU usage: ([\d.]+)% user, ([\d.]+)% sys, ([\d.]+)% idle");

/// `KiB Mem : total, free, used, buff/cache`; group 1 is the unit token.
pub static LINUX_MEM: Pattern = Pattern::new(
    r"([KMGiB]+) *Mem *: *(\d+) total, *(\d+) free, *(\d+) used, *(\d+) buff/cache",
);

/// `KiB Swap: total, free, used.`; group 1 is the unit token.
pub static LINUX_SWAP: Pattern =
    Pattern::new(r"([KMGiB]+) *Swap *: *(\d+) total, *(\d+) free, *(\d+) used\.");

/// `PhysMem: 12G used (2149M wired), 4305M unused.`
pub static MAC_MEM: Pattern = Pattern::new(r"PhysMem: (\d+)([MG]+) used .* (\d+)([MG]+) unused");

/// Linux prints `load average:`, macOS prints `Load Avg:`.
pub static LOAD_AVERAGE: Pattern =
    Pattern::new(r"(?i)load av(?:erage|g): ([\d.]+), ([\d.]+), ([\d.]+)");
