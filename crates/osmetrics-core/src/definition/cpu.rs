//! CPU time breakdown as a percentage of total CPU time.
//!
//! Linux prefers `/proc/stat`, which gives cumulative tick counters; the
//! percentage is a rate between two readings, so each definition carries the
//! previous counters as state. `top` reports percentages directly and needs
//! no state.

use tracing::{debug, warn};

use crate::address::Address;
use crate::error::{MetricError, ParseError};
use crate::os_type::OsType;
use crate::property::{PropertyFactory, PropertyType, Value};
use crate::units::MeasureUnit;

use super::procfs::{CpuTicks, parse_cpu_ticks};
use super::top::{LINUX_CPU, MAC_CPU, group};
use super::{
    Acquisition, LINUX_TOP_COMMAND, MAC_TOP_COMMAND, MetricDefinition, OsMetricDefinition,
    PROC_STAT, PlatformTable, PreParsedContent, Reading, StatePayload, finish,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CpuField {
    User,
    System,
    Nice,
    Idle,
    IoWait,
    HardwareInterrupt,
    SoftwareInterrupt,
    Stolen,
}

impl CpuField {
    pub const ALL: [CpuField; 8] = [
        CpuField::User,
        CpuField::System,
        CpuField::Nice,
        CpuField::Idle,
        CpuField::IoWait,
        CpuField::HardwareInterrupt,
        CpuField::SoftwareInterrupt,
        CpuField::Stolen,
    ];

    pub fn id(self) -> &'static str {
        match self {
            CpuField::User => "CpuUserTime",
            CpuField::System => "CpuSystemTime",
            CpuField::Nice => "CpuNiceTime",
            CpuField::Idle => "CpuIdleTime",
            CpuField::IoWait => "CpuIoWaitTime",
            CpuField::HardwareInterrupt => "CpuHardwareInterruptTime",
            CpuField::SoftwareInterrupt => "CpuSoftwareInterruptTime",
            CpuField::Stolen => "CpuStolenTime",
        }
    }

    pub fn from_id(id: &str) -> Option<CpuField> {
        CpuField::ALL.into_iter().find(|f| f.id() == id)
    }

    fn label(self) -> &'static str {
        match self {
            CpuField::User => "CPU User Time",
            CpuField::System => "CPU System Time",
            CpuField::Nice => "CPU Nice Time",
            CpuField::Idle => "CPU Idle Time",
            CpuField::IoWait => "CPU I/O Wait Time",
            CpuField::HardwareInterrupt => "CPU Hardware Interrupt Time",
            CpuField::SoftwareInterrupt => "CPU Software Interrupt Time",
            CpuField::Stolen => "CPU Stolen Time",
        }
    }

    fn description(self) -> &'static str {
        match self {
            CpuField::User => "Time the CPU spent running user processes that are not niced.",
            CpuField::System => "Time the CPU spent running the kernel.",
            CpuField::Nice => "Time the CPU spent running niced user processes.",
            CpuField::Idle => "Time the CPU spent in the kernel idle handler.",
            CpuField::IoWait => "Time the CPU spent idle while waiting for I/O to complete.",
            CpuField::HardwareInterrupt => "Time the CPU spent servicing hardware interrupts.",
            CpuField::SoftwareInterrupt => "Time the CPU spent servicing software interrupts.",
            CpuField::Stolen => {
                "Time a virtual CPU waited for the hypervisor to service another virtual CPU."
            }
        }
    }

    /// Capture group in the Linux `%Cpu(s)` line.
    fn linux_top_group(self) -> usize {
        match self {
            CpuField::User => 1,
            CpuField::System => 2,
            CpuField::Nice => 3,
            CpuField::Idle => 4,
            CpuField::IoWait => 5,
            CpuField::HardwareInterrupt => 6,
            CpuField::SoftwareInterrupt => 7,
            CpuField::Stolen => 8,
        }
    }

    /// Capture group in the macOS `CPU usage` line. macOS only reports three.
    fn mac_top_group(self) -> Option<usize> {
        match self {
            CpuField::User => Some(1),
            CpuField::System => Some(2),
            CpuField::Idle => Some(3),
            _ => None,
        }
    }
}

/// One CPU time component, in percent of total CPU time.
#[derive(Debug, Clone)]
pub struct CpuTime {
    field: CpuField,
    source: Address,
    platforms: PlatformTable,
}

impl CpuTime {
    pub fn new(field: CpuField, source: Address) -> Self {
        let mac = match field.mac_top_group() {
            Some(_) => Acquisition::command(MAC_TOP_COMMAND),
            None => Acquisition::NONE,
        };
        Self {
            field,
            source,
            platforms: PlatformTable {
                linux: Acquisition::file_or_command(PROC_STAT, LINUX_TOP_COMMAND),
                mac,
                windows: Acquisition::NONE,
            },
        }
    }

    pub fn field(&self) -> CpuField {
        self.field
    }

    /// Previous ticks, if `previous` is this definition's own state.
    fn previous_ticks<'a>(
        &self,
        previous: Option<&'a PreParsedContent>,
    ) -> Result<Option<&'a CpuTicks>, MetricError> {
        match previous {
            None => Ok(None),
            Some(state) => match state.owned_by(self.id())?.payload() {
                StatePayload::CpuTicks(ticks) => Ok(Some(ticks)),
            },
        }
    }

    fn parse_top(&self, os: OsType, stdout: &str) -> Result<Value, ParseError> {
        let (pattern, index) = match os {
            OsType::Linux => (&LINUX_CPU, self.field.linux_top_group()),
            OsType::Mac => {
                let index = self.field.mac_top_group().ok_or_else(|| {
                    ParseError::new(format!("{} is not reported on {os}", self.id()))
                })?;
                (&MAC_CPU, index)
            }
            _ => return Err(ParseError::new(format!("{} is not supported on {os}", self.id()))),
        };
        let caps = pattern.captures(stdout)?;
        parse_percent(group(&caps, index)?).map(Value::Float)
    }

    /// Percent of CPU time spent in this field between `baseline` and `current`.
    fn percent_since(
        &self,
        baseline: Option<&CpuTicks>,
        current: &CpuTicks,
    ) -> Result<Value, ParseError> {
        let zero = CpuTicks::default();
        let baseline = match baseline {
            Some(prev) if current.regressed_from(prev) => {
                debug!(
                    metric = self.id(),
                    "cpu counters went backwards, using zero baseline"
                );
                &zero
            }
            Some(prev) => prev,
            None => &zero,
        };

        let elapsed = current.total() - baseline.total();
        if elapsed == 0 {
            return Err(ParseError::new("no CPU time elapsed since previous reading"));
        }
        let spent = current.get(self.field) - baseline.get(self.field);
        let percent = 100.0 * spent as f64 / elapsed as f64;
        Ok(Value::Float(percent.clamp(0.0, 100.0) as f32))
    }
}

fn parse_percent(s: &str) -> Result<f32, ParseError> {
    s.parse::<f32>()
        .ok()
        .filter(|v| (0.0..=100.0).contains(v))
        .ok_or_else(|| ParseError::new(format!("'{s}' is not a percentage")))
}

impl MetricDefinition for CpuTime {
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
        PropertyType::Float
    }

    fn base_unit(&self) -> Option<MeasureUnit> {
        Some(MeasureUnit::Percent)
    }

    fn source(&self) -> &Address {
        &self.source
    }

    fn as_os_metric(&self) -> Option<&dyn OsMetricDefinition> {
        Some(self)
    }
}

impl OsMetricDefinition for CpuTime {
    fn source_file(&self, os: OsType) -> Option<&str> {
        self.platforms.get(os).file
    }

    fn parse_file(
        &self,
        os: OsType,
        content: Option<&[u8]>,
        previous: Option<&PreParsedContent>,
    ) -> Result<Reading, MetricError> {
        let baseline = self.previous_ticks(previous)?;
        let Some(content) = content else {
            // Nothing read this round; keep the old counters for the next one.
            return Ok(Reading::new(
                PropertyFactory::for_definition(self),
                previous.cloned(),
            ));
        };
        let Some(path) = self.source_file(os) else {
            warn!(metric = self.id(), %os, "no source file on this OS");
            return Ok(Reading::new(
                PropertyFactory::for_definition(self),
                previous.cloned(),
            ));
        };

        let text = String::from_utf8_lossy(content);
        let current = match parse_cpu_ticks(&text) {
            Ok(ticks) => ticks,
            Err(e) => {
                let property = finish(self, Err(e), path, &text);
                return Ok(Reading::new(property, previous.cloned()));
            }
        };

        let property = finish(self, self.percent_since(baseline, &current), path, &text);
        let state = PreParsedContent::new(self.id(), StatePayload::CpuTicks(current));
        Ok(Reading::new(property, Some(state)))
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
        self.previous_ticks(previous)?;
        let property = match stdout {
            Some(stdout) => {
                let origin = self.command(os).unwrap_or("top");
                finish(self, self.parse_top(os, stdout), origin, stdout)
            }
            None => PropertyFactory::for_definition(self),
        };
        Ok(Reading::new(property, previous.cloned()))
    }
}
