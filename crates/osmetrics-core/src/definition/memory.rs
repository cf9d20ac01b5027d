//! Physical memory and swap sizes, in bytes.

use crate::address::Address;
use crate::error::{MetricError, ParseError};
use crate::os_type::OsType;
use crate::property::{PropertyFactory, PropertyType, Value};
use crate::units::{MeasureUnit, parse_memory};

use super::procfs::{MemInfo, parse_meminfo};
use super::top::{LINUX_MEM, LINUX_SWAP, MAC_MEM, group};
use super::{
    Acquisition, LINUX_TOP_COMMAND, MAC_TOP_COMMAND, MetricDefinition, OsMetricDefinition,
    PROC_MEMINFO, PlatformTable, PreParsedContent, Reading, finish, reject_state,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryField {
    PhysicalTotal,
    PhysicalFree,
    PhysicalUsed,
    SwapTotal,
    SwapFree,
}

impl MemoryField {
    pub const ALL: [MemoryField; 5] = [
        MemoryField::PhysicalTotal,
        MemoryField::PhysicalFree,
        MemoryField::PhysicalUsed,
        MemoryField::SwapTotal,
        MemoryField::SwapFree,
    ];

    pub fn id(self) -> &'static str {
        match self {
            MemoryField::PhysicalTotal => "PhysicalMemoryTotal",
            MemoryField::PhysicalFree => "PhysicalMemoryFree",
            MemoryField::PhysicalUsed => "PhysicalMemoryUsed",
            MemoryField::SwapTotal => "SwapTotal",
            MemoryField::SwapFree => "SwapFree",
        }
    }

    pub fn from_id(id: &str) -> Option<MemoryField> {
        MemoryField::ALL.into_iter().find(|f| f.id() == id)
    }

    fn label(self) -> &'static str {
        match self {
            MemoryField::PhysicalTotal => "Total Physical Memory",
            MemoryField::PhysicalFree => "Free Physical Memory",
            MemoryField::PhysicalUsed => "Used Physical Memory",
            MemoryField::SwapTotal => "Total Swap",
            MemoryField::SwapFree => "Free Swap",
        }
    }

    fn description(self) -> &'static str {
        match self {
            MemoryField::PhysicalTotal => "Total amount of physical RAM.",
            MemoryField::PhysicalFree => "Physical RAM not used for anything.",
            MemoryField::PhysicalUsed => {
                "Physical RAM in use, not counting buffers and page cache."
            }
            MemoryField::SwapTotal => "Total amount of swap space.",
            MemoryField::SwapFree => "Swap space not in use.",
        }
    }

    fn is_swap(self) -> bool {
        matches!(self, MemoryField::SwapTotal | MemoryField::SwapFree)
    }
}

/// One memory quantity, in bytes.
#[derive(Debug, Clone)]
pub struct Memory {
    field: MemoryField,
    source: Address,
    platforms: PlatformTable,
}

impl Memory {
    pub fn new(field: MemoryField, source: Address) -> Self {
        // macOS top has no swap line.
        let mac = if field.is_swap() {
            Acquisition::NONE
        } else {
            Acquisition::command(MAC_TOP_COMMAND)
        };
        Self {
            field,
            source,
            platforms: PlatformTable {
                linux: Acquisition::file_or_command(PROC_MEMINFO, LINUX_TOP_COMMAND),
                mac,
                windows: Acquisition::NONE,
            },
        }
    }

    pub fn field(&self) -> MemoryField {
        self.field
    }

    fn from_meminfo(&self, info: &MemInfo) -> Result<i64, ParseError> {
        let require = |value: Option<u64>, key: &str| {
            value.ok_or_else(|| ParseError::new(format!("meminfo has no {key}")))
        };
        let kb = match self.field {
            MemoryField::PhysicalTotal => require(info.mem_total, "MemTotal")?,
            MemoryField::PhysicalFree => require(info.mem_free, "MemFree")?,
            MemoryField::PhysicalUsed => require(info.mem_total, "MemTotal")?
                .saturating_sub(require(info.mem_free, "MemFree")?)
                .saturating_sub(info.buffers.unwrap_or(0))
                .saturating_sub(info.cached.unwrap_or(0)),
            MemoryField::SwapTotal => require(info.swap_total, "SwapTotal")?,
            MemoryField::SwapFree => require(info.swap_free, "SwapFree")?,
        };
        // meminfo's "kB" is KiB
        parse_memory(&kb.to_string(), "KiB", MeasureUnit::Byte)
    }

    fn from_linux_top(&self, stdout: &str) -> Result<i64, ParseError> {
        let (pattern, index) = match self.field {
            MemoryField::PhysicalTotal => (&LINUX_MEM, 2),
            MemoryField::PhysicalFree => (&LINUX_MEM, 3),
            MemoryField::PhysicalUsed => (&LINUX_MEM, 4),
            MemoryField::SwapTotal => (&LINUX_SWAP, 2),
            MemoryField::SwapFree => (&LINUX_SWAP, 3),
        };
        let caps = pattern.captures(stdout)?;
        parse_memory(group(&caps, index)?, group(&caps, 1)?, MeasureUnit::Byte)
    }

    fn from_mac_top(&self, stdout: &str) -> Result<i64, ParseError> {
        let caps = MAC_MEM.captures(stdout)?;
        let used = || parse_memory(group(&caps, 1)?, group(&caps, 2)?, MeasureUnit::Byte);
        let unused = || parse_memory(group(&caps, 3)?, group(&caps, 4)?, MeasureUnit::Byte);
        match self.field {
            MemoryField::PhysicalUsed => used(),
            MemoryField::PhysicalFree => unused(),
            MemoryField::PhysicalTotal => used()?
                .checked_add(unused()?)
                .ok_or_else(|| ParseError::new("total physical memory overflows")),
            MemoryField::SwapTotal | MemoryField::SwapFree => Err(ParseError::new(format!(
                "{} is not reported on MAC",
                self.id()
            ))),
        }
    }
}

impl MetricDefinition for Memory {
    fn id(&self) -> &str {
        self.field.id()
    }

    fn label(&self) -> &str {
        self.field.label()
    }

    fn description(&self) -> &str {
        self.field.description()
    }

    fn property_type(&self) -> PropertyType {
        PropertyType::Long
    }

    fn base_unit(&self) -> Option<MeasureUnit> {
        Some(MeasureUnit::Byte)
    }

    fn source(&self) -> &Address {
        &self.source
    }

    fn as_os_metric(&self) -> Option<&dyn OsMetricDefinition> {
        Some(self)
    }
}

impl OsMetricDefinition for Memory {
    fn source_file(&self, os: OsType) -> Option<&str> {
        self.platforms.get(os).file
    }

    fn parse_file(
        &self,
        os: OsType,
        content: Option<&[u8]>,
        previous: Option<&PreParsedContent>,
    ) -> Result<Reading, MetricError> {
        reject_state(self.id(), previous)?;
        let property = match (content, self.source_file(os)) {
            (Some(content), Some(path)) => {
                let text = String::from_utf8_lossy(content);
                let outcome = parse_meminfo(&text)
                    .and_then(|info| self.from_meminfo(&info))
                    .map(Value::Long);
                finish(self, outcome, path, &text)
            }
            _ => PropertyFactory::for_definition(self),
        };
        Ok(Reading::new(property, None))
    }

    fn command(&self, os: OsType) -> Option<&str> {
        self.platforms.get(os).command
    }

    fn parse_command(
        &self,
        os: OsType,
        stdout: Option<&str>,
        previous: Option<&PreParsedContent>,
    ) -> Result<Reading, MetricError> {
        reject_state(self.id(), previous)?;
        let Some(stdout) = stdout else {
            return Ok(Reading::new(PropertyFactory::for_definition(self), None));
        };
        let outcome = match os {
            OsType::Linux => self.from_linux_top(stdout),
            OsType::Mac => self.from_mac_top(stdout),
            _ => Err(ParseError::new(format!("{} is not supported on {os}", self.id()))),
        };
        let origin = self.command(os).unwrap_or("top");
        let property = finish(self, outcome.map(Value::Long), origin, stdout);
        Ok(Reading::new(property, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINUX_TOP: &str = "\
%Cpu(s):  2.8 us,  8.1 sy,  0.0 ni, 88.7 id,  0.4 wa,  0.0 hi,  0.1 si,  0.0 st
KiB Mem :   999936 total,   735636 free,   117680 used,   146620 buff/cache
KiB Swap:  2097148 total,  2097100 free,       48 used.   715508 avail Mem
";

    const MAC_TOP: &str = "\
CPU usage: 2.73% user, 10.95% sys, 86.30% idle
PhysMem: 12G used (2149M wired), 4305M unused.
";

    const MEMINFO: &str = "\
MemTotal:        1000000 kB
MemFree:          400000 kB
MemAvailable:     700000 kB
Buffers:           50000 kB
Cached:           150000 kB
SwapCached:            0 kB
SwapTotal:        204800 kB
SwapFree:         102400 kB
";

    fn long(field: MemoryField, os: OsType, stdout: &str) -> Option<i64> {
        Memory::new(field, Address::Local)
            .parse_command(os, Some(stdout), None)
            .unwrap()
            .property
            .value()
            .and_then(Value::as_i64)
    }

    fn from_file(field: MemoryField, content: &str) -> Option<i64> {
        Memory::new(field, Address::Local)
            .parse_file(OsType::Linux, Some(content.as_bytes()), None)
            .unwrap()
            .property
            .value()
            .and_then(Value::as_i64)
    }

    #[test]
    fn test_linux_top_physical() {
        assert_eq!(
            long(MemoryField::PhysicalTotal, OsType::Linux, LINUX_TOP),
            Some(999936 * 1024)
        );
        assert_eq!(
            long(MemoryField::PhysicalFree, OsType::Linux, LINUX_TOP),
            Some(735636 * 1024)
        );
        assert_eq!(
            long(MemoryField::PhysicalUsed, OsType::Linux, LINUX_TOP),
            Some(117680 * 1024)
        );
    }

    #[test]
    fn test_linux_top_parts_add_up() {
        let total = long(MemoryField::PhysicalTotal, OsType::Linux, LINUX_TOP).unwrap();
        let free = long(MemoryField::PhysicalFree, OsType::Linux, LINUX_TOP).unwrap();
        let used = long(MemoryField::PhysicalUsed, OsType::Linux, LINUX_TOP).unwrap();
        assert_eq!(total, free + used + 146620 * 1024);
    }

    #[test]
    fn test_linux_top_swap() {
        assert_eq!(
            long(MemoryField::SwapTotal, OsType::Linux, LINUX_TOP),
            Some(2097148 * 1024)
        );
        assert_eq!(
            long(MemoryField::SwapFree, OsType::Linux, LINUX_TOP),
            Some(2097100 * 1024)
        );
    }

    #[test]
    fn test_linux_top_mib_units() {
        let top = "MiB Mem :   7821.4 total";
        // fractional amounts are not memory integers
        assert_eq!(long(MemoryField::PhysicalTotal, OsType::Linux, top), None);

        let top = "MiB Mem :   7821 total,   1000 free,   2000 used,   4821 buff/cache";
        assert_eq!(
            long(MemoryField::PhysicalTotal, OsType::Linux, top),
            Some(7821 * 1024 * 1024)
        );
    }

    #[test]
    fn test_unknown_unit_token_is_null() {
        let top = "iB Mem :   100 total,   50 free,   25 used,   25 buff/cache";
        assert_eq!(long(MemoryField::PhysicalTotal, OsType::Linux, top), None);
    }

    #[test]
    fn test_mac_top() {
        assert_eq!(
            long(MemoryField::PhysicalUsed, OsType::Mac, MAC_TOP),
            Some(12 * (1 << 30))
        );
        assert_eq!(
            long(MemoryField::PhysicalFree, OsType::Mac, MAC_TOP),
            Some(4305 * (1 << 20))
        );
        assert_eq!(
            long(MemoryField::PhysicalTotal, OsType::Mac, MAC_TOP),
            Some(12 * (1 << 30) + 4305 * (1 << 20))
        );
    }

    #[test]
    fn test_mac_has_no_swap() {
        let swap = Memory::new(MemoryField::SwapFree, Address::Local);
        assert!(swap.command(OsType::Mac).is_none());
        assert!(swap.source_file(OsType::Mac).is_none());
        assert_eq!(long(MemoryField::SwapFree, OsType::Mac, MAC_TOP), None);
    }

    #[test]
    fn test_meminfo() {
        assert_eq!(
            from_file(MemoryField::PhysicalTotal, MEMINFO),
            Some(1_000_000 * 1024)
        );
        assert_eq!(
            from_file(MemoryField::PhysicalFree, MEMINFO),
            Some(400_000 * 1024)
        );
        assert_eq!(
            from_file(MemoryField::PhysicalUsed, MEMINFO),
            Some(400_000 * 1024)
        );
        assert_eq!(from_file(MemoryField::SwapTotal, MEMINFO), Some(204_800 * 1024));
        assert_eq!(from_file(MemoryField::SwapFree, MEMINFO), Some(102_400 * 1024));
    }

    #[test]
    fn test_meminfo_missing_swap_is_null() {
        let content = "MemTotal: 1000 kB\nMemFree: 10 kB\n";
        assert_eq!(from_file(MemoryField::SwapTotal, content), None);
        assert_eq!(from_file(MemoryField::PhysicalTotal, content), Some(1000 * 1024));
    }

    #[test]
    fn test_null_input_and_garbage() {
        let used = Memory::new(MemoryField::PhysicalUsed, Address::Local);
        let reading = used.parse_command(OsType::Linux, None, None).unwrap();
        assert!(reading.property.is_null());
        assert_eq!(reading.property.unit(), Some(MeasureUnit::Byte));
        assert!(reading.state.is_none());

        assert_eq!(long(MemoryField::PhysicalUsed, OsType::Linux, "garbage"), None);
        assert_eq!(from_file(MemoryField::PhysicalUsed, "garbage"), None);
    }
}
