//! osmetrics-core: host metric collection.
//!
//! Provides:
//! - `definition`: metric definitions, i.e. where each metric comes from per OS
//!   and how its raw input is parsed
//! - `registry`: interning of definitions per `(id, source)`
//! - `source`: local and SSH metric sources, the fetch scheduler, executors
//! - `property` / `units`: typed values with measurement units
//! - `mock`: test doubles for filesystems, executors and `top` output
//!
//! ```ignore
//! use osmetrics_core::{registry, LocalOs, MetricSource, SourceConfig};
//!
//! let source = LocalOs::new(SourceConfig::default());
//! source.start().await?;
//! let idle = registry::parse("CpuIdleTime")?;
//! let properties = source.collect(&[idle]).await?;
//! ```

pub mod address;
pub mod config;
pub mod definition;
pub mod error;
pub mod fmt;
pub mod mock;
pub mod os_type;
pub mod property;
pub mod registry;
pub mod source;
pub mod units;

pub use address::Address;
pub use config::{SourceConfig, SshOptions};
pub use definition::{MetricDefinition, OsMetricDefinition, PreParsedContent, Reading};
pub use error::{ConfigurationError, ExecutionError, MetricError, ParseError};
pub use os_type::OsType;
pub use property::{Property, PropertyFactory, PropertyType, Value};
pub use registry::Registry;
pub use source::{LocalOs, MetricSource, OsSource, RemoteOs, Sample};
pub use units::MeasureUnit;
