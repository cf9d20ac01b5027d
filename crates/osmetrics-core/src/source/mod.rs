//! Metric sources and the per-collection fetch scheduler.
//!
//! # Collection
//!
//! ```text
//!  definitions ──► plan (file preferred, else command, else unavailable)
//!                    │
//!                    ▼
//!        unique files + unique commands, first-seen order
//!                    │  fetched once each, concurrently, under the timeout
//!                    ▼
//!        parse every definition in input order, threading parser state
//! ```
//!
//! Metrics that share an input are extracted from the same fetch, so e.g. all
//! CPU fields of one collection add up to the same `top` snapshot.

pub mod executor;
pub mod fs;
pub mod transport;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::address::Address;
use crate::config::SourceConfig;
use crate::definition::{MetricDefinition, OsMetricDefinition, PreParsedContent, Reading};
use crate::error::MetricError;
use crate::fmt::excerpt;
use crate::os_type::OsType;
use crate::property::{Property, PropertyFactory};

pub use executor::{ExecutionResult, NativeExecutor, ProcessExecutor};
pub use fs::{FileSystem, RealFs};
pub use transport::{LocalTransport, SshTransport, Transport};

/// One collection: the properties plus when they were taken.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub address: Address,
    /// Taken before any fetch starts.
    pub timestamp: DateTime<Utc>,
    pub properties: Vec<Property>,
}

/// A host metrics can be collected from.
#[async_trait]
pub trait MetricSource: Send + Sync {
    fn address(&self) -> &Address;

    fn is_started(&self) -> bool;

    /// Idempotent.
    async fn start(&self) -> Result<(), MetricError>;

    /// Idempotent. Drops all parser state.
    async fn stop(&self);

    /// Returns one property per definition, in input order.
    ///
    /// Fails only if the source is not started or a definition is not an OS
    /// metric. Everything else degrades to a null-valued property.
    async fn collect(
        &self,
        definitions: &[Arc<dyn MetricDefinition>],
    ) -> Result<Vec<Property>, MetricError>;

    async fn collect_sample(
        &self,
        definitions: &[Arc<dyn MetricDefinition>],
    ) -> Result<Sample, MetricError> {
        let timestamp = Utc::now();
        let properties = self.collect(definitions).await?;
        Ok(Sample {
            address: self.address().clone(),
            timestamp,
            properties,
        })
    }
}

#[derive(Debug, Default)]
struct SourceState {
    started: bool,
    os: Option<OsType>,
    /// Keyed by definition id.
    parser_state: HashMap<String, PreParsedContent>,
}

/// Where one definition gets its input from this round.
#[derive(Debug, Clone, Copy)]
enum Plan<'a> {
    File(&'a str),
    Command(&'a str),
    Unavailable,
}

/// A metric source backed by a [`Transport`].
#[derive(Debug)]
pub struct OsSource<T> {
    address: Address,
    transport: T,
    config: SourceConfig,
    state: Mutex<SourceState>,
    /// Serialises `start` and `stop`; held across the transport round-trips.
    lifecycle: AsyncMutex<()>,
}

/// The local host.
pub type LocalOs<E = ProcessExecutor, F = RealFs> = OsSource<LocalTransport<E, F>>;

/// A host reached over SSH.
pub type RemoteOs<E = ProcessExecutor> = OsSource<SshTransport<E>>;

impl<T: Transport> OsSource<T> {
    pub fn with_transport(address: Address, transport: T, config: SourceConfig) -> Self {
        Self {
            address,
            transport,
            config,
            state: Mutex::new(SourceState::default()),
            lifecycle: AsyncMutex::new(()),
        }
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// OS family in use, once started.
    pub fn os_type(&self) -> Option<OsType> {
        self.lock().os
    }

    fn lock(&self) -> MutexGuard<'_, SourceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn fetch_file(&self, path: &str) -> Option<Vec<u8>> {
        let limit = self.config.timeout();
        match timeout(limit, self.transport.read_file(path)).await {
            Ok(Ok(content)) => Some(content),
            Ok(Err(e)) => {
                warn!(source = %self.address, path, error = %e, "failed to read metric file");
                None
            }
            Err(_) => {
                warn!(source = %self.address, path, timeout = ?limit, "metric file read timed out");
                None
            }
        }
    }

    async fn fetch_command(&self, command: &str) -> Option<String> {
        let limit = self.config.timeout();
        let result = match timeout(limit, self.transport.execute(command)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(source = %self.address, command, error = %e, "failed to execute metric command");
                return None;
            }
            Err(_) => {
                warn!(source = %self.address, command, timeout = ?limit, "metric command timed out");
                return None;
            }
        };

        if !result.success() {
            warn!(
                source = %self.address,
                command,
                exit_code = result.exit_code,
                stdout = %excerpt(result.stdout.as_deref().unwrap_or("")),
                stderr = %excerpt(result.stderr.as_deref().unwrap_or("")),
                "metric command failed"
            );
            return None;
        }
        if result.stdout.is_none() {
            warn!(source = %self.address, command, "metric command produced no output");
        }
        result.stdout
    }
}

impl<E, F> OsSource<LocalTransport<E, F>>
where
    E: NativeExecutor,
    F: FileSystem + 'static,
{
    pub fn local(executor: E, fs: F, config: SourceConfig) -> Self {
        Self::with_transport(Address::Local, LocalTransport::new(executor, fs), config)
    }
}

impl LocalOs {
    pub fn new(config: SourceConfig) -> Self {
        Self::local(ProcessExecutor::new(), RealFs::new(), config)
    }
}

impl<E: NativeExecutor> OsSource<SshTransport<E>> {
    pub fn remote_with_executor(
        address: Address,
        config: SourceConfig,
        executor: E,
    ) -> Result<Self, MetricError> {
        let transport = SshTransport::with_executor(&address, config.ssh.clone(), executor)?;
        Ok(Self::with_transport(address, transport, config))
    }
}

impl RemoteOs {
    pub fn new(address: Address, config: SourceConfig) -> Result<Self, MetricError> {
        Self::remote_with_executor(address, config, ProcessExecutor::new())
    }
}

/// Builds the source an address calls for.
pub fn for_address(
    address: Address,
    config: SourceConfig,
) -> Result<Box<dyn MetricSource>, MetricError> {
    config.validate()?;
    match address {
        Address::Local => Ok(Box::new(LocalOs::new(config))),
        Address::Ssh { .. } => Ok(Box::new(RemoteOs::new(address, config)?)),
    }
}

#[async_trait]
impl<T: Transport> MetricSource for OsSource<T> {
    fn address(&self) -> &Address {
        &self.address
    }

    fn is_started(&self) -> bool {
        self.lock().started
    }

    async fn start(&self) -> Result<(), MetricError> {
        let _lifecycle = self.lifecycle.lock().await;
        if self.is_started() {
            return Ok(());
        }
        self.config.validate()?;

        self.transport.connect().await?;
        let os = match self.config.os_type {
            Some(os) => os,
            None => self.transport.detect_os().await,
        };
        if !os.is_supported() {
            warn!(source = %self.address, "unsupported OS, every metric will be null");
        }

        let mut state = self.lock();
        state.started = true;
        state.os = Some(os);
        info!(source = %self.address, %os, "metric source started");
        Ok(())
    }

    async fn stop(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        let was_started = {
            let mut state = self.lock();
            let was_started = state.started;
            *state = SourceState::default();
            was_started
        };
        if was_started {
            self.transport.disconnect().await;
            info!(source = %self.address, "metric source stopped");
        }
    }

    async fn collect(
        &self,
        definitions: &[Arc<dyn MetricDefinition>],
    ) -> Result<Vec<Property>, MetricError> {
        let (os, previous) = {
            let state = self.lock();
            if !state.started {
                return Err(MetricError::NotStarted(self.address.clone()));
            }
            (
                state.os.unwrap_or(OsType::Unknown),
                state.parser_state.clone(),
            )
        };

        let mut os_definitions: Vec<&dyn OsMetricDefinition> = Vec::with_capacity(definitions.len());
        for definition in definitions {
            let os_definition = definition.as_os_metric().ok_or_else(|| {
                MetricError::InvalidArgument(format!(
                    "{} is not an OS metric and cannot be collected from {}",
                    definition.id(),
                    self.address
                ))
            })?;
            os_definitions.push(os_definition);
        }

        let plans: Vec<Plan<'_>> = os_definitions
            .iter()
            .map(|d| {
                if let Some(path) = d.source_file(os) {
                    Plan::File(path)
                } else if let Some(command) = d.command(os) {
                    Plan::Command(command)
                } else {
                    debug!(metric = d.id(), %os, "metric not available on this OS");
                    Plan::Unavailable
                }
            })
            .collect();

        let mut files: Vec<&str> = Vec::new();
        let mut commands: Vec<&str> = Vec::new();
        for plan in &plans {
            match *plan {
                Plan::File(path) if !files.contains(&path) => files.push(path),
                Plan::Command(command) if !commands.contains(&command) => commands.push(command),
                _ => {}
            }
        }
        trace!(source = %self.address, ?files, ?commands, "fetch targets");

        let (file_contents, command_outputs) = if self.config.parallel_fetch {
            futures::join!(
                join_all(files.iter().map(|path| self.fetch_file(path))),
                join_all(commands.iter().map(|command| self.fetch_command(command))),
            )
        } else {
            let mut file_contents = Vec::with_capacity(files.len());
            for path in &files {
                file_contents.push(self.fetch_file(path).await);
            }
            let mut command_outputs = Vec::with_capacity(commands.len());
            for command in &commands {
                command_outputs.push(self.fetch_command(command).await);
            }
            (file_contents, command_outputs)
        };

        let file_contents: HashMap<&str, Option<Vec<u8>>> =
            files.into_iter().zip(file_contents).collect();
        let command_outputs: HashMap<&str, Option<String>> =
            commands.into_iter().zip(command_outputs).collect();

        let mut properties = Vec::with_capacity(definitions.len());
        let mut new_state: Vec<(String, Option<PreParsedContent>)> = Vec::new();
        for ((definition, os_definition), plan) in
            definitions.iter().zip(&os_definitions).zip(&plans)
        {
            let prev = previous.get(definition.id());
            let reading = match *plan {
                Plan::File(path) => {
                    let content = file_contents.get(path).and_then(|c| c.as_deref());
                    os_definition.parse_file(os, content, prev)?
                }
                Plan::Command(command) => {
                    let stdout = command_outputs.get(command).and_then(|s| s.as_deref());
                    os_definition.parse_command(os, stdout, prev)?
                }
                Plan::Unavailable => Reading::new(
                    PropertyFactory::for_definition(definition.as_ref()),
                    prev.cloned(),
                ),
            };
            new_state.push((definition.id().to_string(), reading.state));
            properties.push(reading.property);
        }

        let mut state = self.lock();
        // stop() may have run while we were fetching; its reset wins.
        if state.started {
            for (id, reading_state) in new_state {
                match reading_state {
                    Some(s) => {
                        state.parser_state.insert(id, s);
                    }
                    None => {
                        state.parser_state.remove(&id);
                    }
                }
            }
        }
        Ok(properties)
    }
}
