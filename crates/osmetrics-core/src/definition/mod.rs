//! Metric definitions.
//!
//! A definition knows, per OS family, where a metric's raw input comes from
//! (a file, a command, or both) and how to turn that input into a
//! [`Property`]. It never performs I/O itself: the source fetches every
//! distinct file and command once per collection and hands the raw text to
//! each definition that asked for it, so metrics sharing an input are
//! extracted from the very same reading.
//!
//! # Parser contract
//!
//! `parse_file` / `parse_command` never fail because of bad input. Missing or
//! malformed input yields a property with a null value (plus a WARN for
//! malformed input). The only error they return is
//! [`MetricError::InvalidArgument`] when handed state that another
//! definition produced.

pub mod cpu;
pub mod load;
pub mod memory;
pub mod procfs;
pub mod top;

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::address::Address;
use crate::error::{MetricError, ParseError};
use crate::fmt::excerpt;
use crate::os_type::OsType;
use crate::property::{Property, PropertyFactory, PropertyType, Value};
use crate::units::MeasureUnit;

pub use cpu::{CpuField, CpuTime};
pub use load::{LoadAverage, LoadField};
pub use memory::{Memory, MemoryField};
pub use procfs::CpuTicks;

/// Linux `top`, one batch iteration, header only.
pub const LINUX_TOP_COMMAND: &str = "/usr/bin/top -b -n 1 -p 0";
/// macOS `top`, one logging sample, no process rows.
pub const MAC_TOP_COMMAND: &str = "/usr/bin/top -l 1 -n 0";

pub const PROC_STAT: &str = "/proc/stat";
pub const PROC_MEMINFO: &str = "/proc/meminfo";
pub const PROC_LOADAVG: &str = "/proc/loadavg";

/// Identity and typing shared by every metric definition.
pub trait MetricDefinition: fmt::Debug + Send + Sync {
    /// Stable identifier, e.g. `CpuIdleTime`. Case-sensitive.
    fn id(&self) -> &str;

    fn label(&self) -> &str;

    fn description(&self) -> &str;

    fn property_type(&self) -> PropertyType;

    /// `None` for dimensionless values such as load averages.
    fn base_unit(&self) -> Option<MeasureUnit>;

    /// Address of the source this definition is bound to.
    fn source(&self) -> &Address;

    /// Downcast used by OS sources to reject foreign definitions.
    fn as_os_metric(&self) -> Option<&dyn OsMetricDefinition> {
        None
    }
}

/// A metric read from a file or a command on an OS source.
///
/// For an OS family the definition supports, at least one of
/// [`source_file`](Self::source_file) and [`command`](Self::command) is
/// `Some`. When both are, sources prefer the file.
pub trait OsMetricDefinition: MetricDefinition {
    fn source_file(&self, os: OsType) -> Option<&str>;

    fn parse_file(
        &self,
        os: OsType,
        content: Option<&[u8]>,
        previous: Option<&PreParsedContent>,
    ) -> Result<Reading, MetricError>;

    fn command(&self, os: OsType) -> Option<&str>;

    fn parse_command(
        &self,
        os: OsType,
        stdout: Option<&str>,
        previous: Option<&PreParsedContent>,
    ) -> Result<Reading, MetricError>;
}

/// Parser output: the property plus the state to hand back next time.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub property: Property,
    pub state: Option<PreParsedContent>,
}

impl Reading {
    pub fn new(property: Property, state: Option<PreParsedContent>) -> Self {
        Self { property, state }
    }
}

/// Parser state carried between two collections.
///
/// Tagged with the id of the definition that produced it; a definition
/// refuses state it does not own.
#[derive(Debug, Clone, PartialEq)]
pub struct PreParsedContent {
    owner: String,
    payload: StatePayload,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatePayload {
    /// Cumulative aggregate CPU ticks from `/proc/stat`.
    CpuTicks(CpuTicks),
}

impl PreParsedContent {
    pub fn new(owner: impl Into<String>, payload: StatePayload) -> Self {
        Self {
            owner: owner.into(),
            payload,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn payload(&self) -> &StatePayload {
        &self.payload
    }

    /// Returns `self` if it was produced by `definition_id`.
    pub(crate) fn owned_by(&self, definition_id: &str) -> Result<&Self, MetricError> {
        if self.owner != definition_id {
            return Err(MetricError::invalid_argument(format!(
                "{definition_id} cannot use state produced by {}",
                self.owner
            )));
        }
        Ok(self)
    }
}

/// Rejects any state for definitions that keep none.
pub(crate) fn reject_state(
    definition_id: &str,
    previous: Option<&PreParsedContent>,
) -> Result<(), MetricError> {
    match previous {
        None => Ok(()),
        Some(state) => Err(MetricError::invalid_argument(format!(
            "{definition_id} is stateless but was given state produced by {}",
            state.owner
        ))),
    }
}

/// Command and file for one OS family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Acquisition {
    pub command: Option<&'static str>,
    pub file: Option<&'static str>,
}

impl Acquisition {
    pub const NONE: Acquisition = Acquisition {
        command: None,
        file: None,
    };

    pub const fn command(command: &'static str) -> Self {
        Acquisition {
            command: Some(command),
            file: None,
        }
    }

    pub const fn file_or_command(file: &'static str, command: &'static str) -> Self {
        Acquisition {
            command: Some(command),
            file: Some(file),
        }
    }
}

/// Per-OS acquisition slots of a definition, fixed at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlatformTable {
    pub linux: Acquisition,
    pub mac: Acquisition,
    pub windows: Acquisition,
}

impl PlatformTable {
    pub fn get(&self, os: OsType) -> Acquisition {
        match os {
            OsType::Linux => self.linux,
            OsType::Mac => self.mac,
            OsType::Windows => self.windows,
            OsType::Unknown => Acquisition::NONE,
        }
    }
}

/// Turns a parse outcome into a property, logging failures with the input.
pub(crate) fn finish(
    definition: &dyn MetricDefinition,
    outcome: Result<Value, ParseError>,
    origin: &str,
    input: &str,
) -> Property {
    let property = PropertyFactory::for_definition(definition);
    let result = outcome.map_err(|e| e.message).and_then(|value| {
        property
            .clone()
            .with_value(value)
            .map_err(|e| e.to_string())
    });

    match result {
        Ok(property) => property,
        Err(reason) => {
            warn!(
                metric = definition.id(),
                origin,
                reason = %reason,
                input = %excerpt(input),
                "failed to parse metric, returning null"
            );
            property
        }
    }
}

/// Returns one instance of every built-in definition, bound to `source`.
pub fn builtin_definitions(source: &Address) -> Vec<Arc<dyn MetricDefinition>> {
    let mut all: Vec<Arc<dyn MetricDefinition>> = Vec::new();
    for field in CpuField::ALL {
        all.push(Arc::new(CpuTime::new(field, source.clone())));
    }
    for field in MemoryField::ALL {
        all.push(Arc::new(Memory::new(field, source.clone())));
    }
    for field in LoadField::ALL {
        all.push(Arc::new(LoadAverage::new(field, source.clone())));
    }
    all
}

/// Builds the built-in definition called `id`, if there is one.
pub fn construct(id: &str, source: &Address) -> Option<Arc<dyn MetricDefinition>> {
    if let Some(field) = CpuField::from_id(id) {
        return Some(Arc::new(CpuTime::new(field, source.clone())));
    }
    if let Some(field) = MemoryField::from_id(id) {
        return Some(Arc::new(Memory::new(field, source.clone())));
    }
    if let Some(field) = LoadField::from_id(id) {
        return Some(Arc::new(LoadAverage::new(field, source.clone())));
    }
    None
}

/// Ids of every built-in definition, in registry order.
pub fn builtin_ids() -> Vec<&'static str> {
    CpuField::ALL
        .iter()
        .map(|f| f.id())
        .chain(MemoryField::ALL.iter().map(|f| f.id()))
        .chain(LoadField::ALL.iter().map(|f| f.id()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_ids_are_unique_and_constructible() {
        let ids = builtin_ids();
        assert_eq!(ids.len(), 16);
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), ids.len());

        for id in ids {
            let d = construct(id, &Address::Local).unwrap();
            assert_eq!(d.id(), id);
            assert!(d.as_os_metric().is_some());
            assert!(!d.label().trim().is_empty());
            assert!(!d.description().trim().is_empty());
        }
        assert!(construct("cpuidletime", &Address::Local).is_none());
    }

    #[test]
    fn test_every_supported_os_has_an_input() {
        for d in builtin_definitions(&Address::Local) {
            let os_def = d.as_os_metric().unwrap();
            // swap and some CPU fields have no macOS input at all
            let linux = OsType::Linux;
            assert!(
                os_def.source_file(linux).is_some() && os_def.command(linux).is_some(),
                "{} lacks a Linux input",
                d.id()
            );
            assert!(os_def.source_file(OsType::Unknown).is_none());
            assert!(os_def.command(OsType::Unknown).is_none());
            assert!(os_def.command(OsType::Windows).is_none());
        }
    }

    #[test]
    fn test_state_owner_check() {
        let state = PreParsedContent::new("CpuIdleTime", StatePayload::CpuTicks(CpuTicks::default()));
        assert!(state.owned_by("CpuIdleTime").is_ok());
        assert!(matches!(
            state.owned_by("CpuUserTime"),
            Err(MetricError::InvalidArgument(_))
        ));
        assert!(matches!(
            reject_state("SwapFree", Some(&state)),
            Err(MetricError::InvalidArgument(_))
        ));
        assert!(reject_state("SwapFree", None).is_ok());
    }

    #[test]
    fn test_platform_table_unknown_is_empty() {
        let table = PlatformTable {
            linux: Acquisition::file_or_command(PROC_STAT, LINUX_TOP_COMMAND),
            mac: Acquisition::command(MAC_TOP_COMMAND),
            windows: Acquisition::NONE,
        };
        assert_eq!(table.get(OsType::Linux).file, Some(PROC_STAT));
        assert_eq!(table.get(OsType::Mac).command, Some(MAC_TOP_COMMAND));
        assert_eq!(table.get(OsType::Unknown), Acquisition::NONE);
    }
}
