//! Minimal definitions for exercising sources.

use crate::address::Address;
use crate::error::MetricError;
use crate::os_type::OsType;
use crate::property::{PropertyFactory, PropertyType, Value};
use crate::units::MeasureUnit;

use crate::definition::{MetricDefinition, OsMetricDefinition, PreParsedContent, Reading};

/// Reports the trimmed stdout of a command, on every OS.
#[derive(Debug, Clone)]
pub struct CommandMetric {
    id: String,
    command: String,
    source: Address,
}

impl CommandMetric {
    pub fn new(id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            command: command.into(),
            source: Address::Local,
        }
    }
}

impl MetricDefinition for CommandMetric {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        "Output of a shell command."
    }

    fn property_type(&self) -> PropertyType {
        PropertyType::String
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

impl OsMetricDefinition for CommandMetric {
    fn source_file(&self, _os: OsType) -> Option<&str> {
        None
    }

    fn parse_file(
        &self,
        _os: OsType,
        _content: Option<&[u8]>,
        _previous: Option<&PreParsedContent>,
    ) -> Result<Reading, MetricError> {
        Ok(Reading::new(PropertyFactory::for_definition(self), None))
    }

    fn command(&self, os: OsType) -> Option<&str> {
        os.is_supported().then_some(self.command.as_str())
    }

    fn parse_command(
        &self,
        _os: OsType,
        stdout: Option<&str>,
        _previous: Option<&PreParsedContent>,
    ) -> Result<Reading, MetricError> {
        let mut property = PropertyFactory::for_definition(self);
        if let Some(stdout) = stdout {
            property.set_value(Value::String(stdout.trim().to_string()))?;
        }
        Ok(Reading::new(property, None))
    }
}

/// A definition an OS source cannot collect.
#[derive(Debug, Clone)]
pub struct NotAnOsMetric {
    id: String,
    source: Address,
}

impl NotAnOsMetric {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: Address::Local,
        }
    }
}

impl MetricDefinition for NotAnOsMetric {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        "Not collectable from an OS source."
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
}
