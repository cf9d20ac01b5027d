//! System load averages.

use crate::address::Address;
use crate::error::{MetricError, ParseError};
use crate::os_type::OsType;
use crate::property::{PropertyFactory, PropertyType, Value};
use crate::units::MeasureUnit;

use super::procfs::{LoadAvg, parse_loadavg};
use super::top::{LOAD_AVERAGE, group};
use super::{
    Acquisition, LINUX_TOP_COMMAND, MAC_TOP_COMMAND, MetricDefinition, OsMetricDefinition,
    PROC_LOADAVG, PlatformTable, PreParsedContent, Reading, finish, reject_state,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadField {
    LastMinute,
    LastFiveMinutes,
    LastFifteenMinutes,
}

impl LoadField {
    pub const ALL: [LoadField; 3] = [
        LoadField::LastMinute,
        LoadField::LastFiveMinutes,
        LoadField::LastFifteenMinutes,
    ];

    pub fn id(self) -> &'static str {
        match self {
            LoadField::LastMinute => "LoadAverageLastMinute",
            LoadField::LastFiveMinutes => "LoadAverageLastFiveMinutes",
            LoadField::LastFifteenMinutes => "LoadAverageLastFifteenMinutes",
        }
    }

    pub fn from_id(id: &str) -> Option<LoadField> {
        LoadField::ALL.into_iter().find(|f| f.id() == id)
    }

    fn label(self) -> &'static str {
        match self {
            LoadField::LastMinute => "Load Average (1 min)",
            LoadField::LastFiveMinutes => "Load Average (5 min)",
            LoadField::LastFifteenMinutes => "Load Average (15 min)",
        }
    }

    fn description(self) -> &'static str {
        match self {
            LoadField::LastMinute => {
                "Average number of runnable or uninterruptible tasks over the last minute."
            }
            LoadField::LastFiveMinutes => {
                "Average number of runnable or uninterruptible tasks over the last five minutes."
            }
            LoadField::LastFifteenMinutes => {
                "Average number of runnable or uninterruptible tasks over the last fifteen minutes."
            }
        }
    }

    /// Position in both the `load average:` triple and `/proc/loadavg`.
    fn index(self) -> usize {
        match self {
            LoadField::LastMinute => 1,
            LoadField::LastFiveMinutes => 2,
            LoadField::LastFifteenMinutes => 3,
        }
    }

    fn pick(self, load: &LoadAvg) -> f64 {
        match self {
            LoadField::LastMinute => load.load1,
            LoadField::LastFiveMinutes => load.load5,
            LoadField::LastFifteenMinutes => load.load15,
        }
    }
}

/// Dimensionless load average.
#[derive(Debug, Clone)]
pub struct LoadAverage {
    field: LoadField,
    source: Address,
    platforms: PlatformTable,
}

impl LoadAverage {
    pub fn new(field: LoadField, source: Address) -> Self {
        Self {
            field,
            source,
            platforms: PlatformTable {
                linux: Acquisition::file_or_command(PROC_LOADAVG, LINUX_TOP_COMMAND),
                mac: Acquisition::command(MAC_TOP_COMMAND),
                windows: Acquisition::NONE,
            },
        }
    }

    pub fn field(&self) -> LoadField {
        self.field
    }

    fn from_top(&self, stdout: &str) -> Result<Value, ParseError> {
        let caps = LOAD_AVERAGE.captures(stdout)?;
        let raw = group(&caps, self.field.index())?;
        raw.parse::<f64>()
            .map(Value::Double)
            .map_err(|_| ParseError::new(format!("invalid load average '{raw}'")))
    }
}

impl MetricDefinition for LoadAverage {
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
        PropertyType::Double
    }

    fn base_unit(&self) -> Option<MeasureUnit> {
        None
    }

    fn source(&self) -> &Address {
        &self.source
    }

    fn as_os_metric(&self) -> Option<&dyn OsMetricDefinition> {
        Some(self)
    }
}

impl OsMetricDefinition for LoadAverage {
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
                let outcome = parse_loadavg(&text).map(|load| Value::Double(self.field.pick(&load)));
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
        let property = match (stdout, self.command(os)) {
            (Some(stdout), Some(command)) => finish(self, self.from_top(stdout), command, stdout),
            _ => PropertyFactory::for_definition(self),
        };
        Ok(Reading::new(property, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn double(field: LoadField, os: OsType, stdout: &str) -> Option<f64> {
        LoadAverage::new(field, Address::Local)
            .parse_command(os, Some(stdout), None)
            .unwrap()
            .property
            .value()
            .and_then(Value::as_f64)
    }

    #[test]
    fn test_linux_top() {
        let top = "top - 10:01:02 up 3 days,  2:03,  1 user,  load average: 0.15, 0.25, 0.35\n";
        assert_eq!(double(LoadField::LastMinute, OsType::Linux, top), Some(0.15));
        assert_eq!(double(LoadField::LastFiveMinutes, OsType::Linux, top), Some(0.25));
        assert_eq!(double(LoadField::LastFifteenMinutes, OsType::Linux, top), Some(0.35));
    }

    #[test]
    fn test_mac_top() {
        let top = "Processes: 373 total\nLoad Avg: 1.81, 1.95, 2.01\n";
        assert_eq!(double(LoadField::LastMinute, OsType::Mac, top), Some(1.81));
        assert_eq!(double(LoadField::LastFifteenMinutes, OsType::Mac, top), Some(2.01));
    }

    #[test]
    fn test_proc_loadavg() {
        let load = LoadAverage::new(LoadField::LastFiveMinutes, Address::Local);
        assert_eq!(load.source_file(OsType::Linux), Some(PROC_LOADAVG));
        let reading = load
            .parse_file(OsType::Linux, Some(b"0.50 1.25 2.00 3/612 4242\n"), None)
            .unwrap();
        assert_eq!(reading.property.value(), Some(&Value::Double(1.25)));
        assert_eq!(reading.property.unit(), None);
        assert_eq!(reading.property.to_string(), "LoadAverageLastFiveMinutes=1.25");
    }

    #[test]
    fn test_unsupported_or_garbage_is_null() {
        assert_eq!(double(LoadField::LastMinute, OsType::Linux, "no load here"), None);
        assert_eq!(double(LoadField::LastMinute, OsType::Windows, "load average: 1.0, 1.0, 1.0"), None);
    }
}
