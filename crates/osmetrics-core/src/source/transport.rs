//! How a source reaches its host: directly, or over SSH.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::address::Address;
use crate::config::SshOptions;
use crate::error::{ConfigurationError, ExecutionError};
use crate::fmt::excerpt;
use crate::os_type::OsType;

use super::executor::{ExecutionResult, NativeExecutor, ProcessExecutor};
use super::fs::{FileSystem, RealFs};

/// Command execution and file reads against one host.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Brings the connection up. Called by `start()`.
    async fn connect(&self) -> Result<(), ExecutionError>;

    /// Tears the connection down. Failures are logged, never returned.
    async fn disconnect(&self);

    /// OS family of the host; [`OsType::Unknown`] if it cannot be told.
    async fn detect_os(&self) -> OsType;

    async fn execute(&self, command: &str) -> Result<ExecutionResult, ExecutionError>;

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, ExecutionError>;
}

/// The host this process runs on.
#[derive(Debug, Clone, Default)]
pub struct LocalTransport<E = ProcessExecutor, F = RealFs> {
    executor: E,
    fs: Arc<F>,
}

impl<E, F> LocalTransport<E, F>
where
    E: NativeExecutor,
    F: FileSystem + 'static,
{
    pub fn new(executor: E, fs: F) -> Self {
        Self {
            executor,
            fs: Arc::new(fs),
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }
}

#[async_trait]
impl<E, F> Transport for LocalTransport<E, F>
where
    E: NativeExecutor,
    F: FileSystem + 'static,
{
    async fn connect(&self) -> Result<(), ExecutionError> {
        Ok(())
    }

    async fn disconnect(&self) {}

    async fn detect_os(&self) -> OsType {
        OsType::current()
    }

    async fn execute(&self, command: &str) -> Result<ExecutionResult, ExecutionError> {
        self.executor.execute(command).await
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, ExecutionError> {
        let fs = Arc::clone(&self.fs);
        let owned = PathBuf::from(path);
        tokio::task::spawn_blocking(move || fs.read(&owned))
            .await
            .unwrap_or_else(|e| Err(io::Error::other(e)))
            .map_err(|source| ExecutionError::Io {
                path: path.to_string(),
                source,
            })
    }
}

/// Quotes `s` for a POSIX shell.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// A remote host reached with the OpenSSH client.
///
/// `connect` opens a control master; every later command multiplexes over it
/// until `disconnect` sends `-O exit`. The ssh client itself is run through
/// the local [`NativeExecutor`], so tests can script it.
#[derive(Debug, Clone)]
pub struct SshTransport<E = ProcessExecutor> {
    destination: String,
    port: u16,
    options: SshOptions,
    control_path: PathBuf,
    executor: E,
}

impl SshTransport<ProcessExecutor> {
    pub fn new(address: &Address, options: SshOptions) -> Result<Self, ConfigurationError> {
        Self::with_executor(address, options, ProcessExecutor::new())
    }
}

impl<E: NativeExecutor> SshTransport<E> {
    pub fn with_executor(
        address: &Address,
        options: SshOptions,
        executor: E,
    ) -> Result<Self, ConfigurationError> {
        let Address::Ssh { port, .. } = address else {
            return Err(ConfigurationError::InvalidAddress {
                address: address.to_string(),
                reason: "not an ssh address".into(),
            });
        };
        let destination = address
            .ssh_destination()
            .ok_or_else(|| ConfigurationError::InvalidAddress {
                address: address.to_string(),
                reason: "missing host".into(),
            })?;

        let mut hasher = DefaultHasher::new();
        address.hash(&mut hasher);
        std::process::id().hash(&mut hasher);
        let control_path = std::env::temp_dir().join(format!("osmetrics-{:016x}", hasher.finish()));

        Ok(Self {
            destination,
            port: *port,
            options,
            control_path,
            executor,
        })
    }

    pub fn control_path(&self) -> &Path {
        &self.control_path
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    fn control_path_option(&self) -> String {
        format!("ControlPath={}", self.control_path.display())
    }

    /// Local shell command line running `remote` on the host.
    fn command_line(&self, remote: &str) -> String {
        let mut args: Vec<String> = vec![self.options.program.clone()];
        if self.options.batch_mode {
            args.extend(["-o".into(), "BatchMode=yes".into()]);
        }
        args.extend([
            "-o".into(),
            format!("ConnectTimeout={}", self.options.connect_timeout_secs),
            "-o".into(),
            "ControlMaster=auto".into(),
            "-o".into(),
            format!("ControlPersist={}s", self.options.control_persist_secs),
            "-o".into(),
            self.control_path_option(),
            "-p".into(),
            self.port.to_string(),
        ]);
        args.extend(self.options.extra_args.iter().cloned());
        args.push(self.destination.clone());
        args.push(remote.to_string());

        args.iter()
            .map(|a| shell_quote(a))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn exit_command_line(&self) -> String {
        let control_path = self.control_path_option();
        [
            self.options.program.as_str(),
            "-o",
            control_path.as_str(),
            "-O",
            "exit",
            self.destination.as_str(),
        ]
        .iter()
        .map(|a| shell_quote(a))
        .collect::<Vec<_>>()
        .join(" ")
    }
}

#[async_trait]
impl<E: NativeExecutor> Transport for SshTransport<E> {
    async fn connect(&self) -> Result<(), ExecutionError> {
        let result = self.executor.execute(&self.command_line("true")).await?;
        if !result.success() {
            return Err(ExecutionError::Remote(format!(
                "cannot connect to {} (exit {}): {}",
                self.destination,
                result.exit_code,
                excerpt(result.stderr.as_deref().unwrap_or("").trim())
            )));
        }
        debug!(destination = %self.destination, control_path = %self.control_path.display(), "ssh control master up");
        Ok(())
    }

    async fn disconnect(&self) {
        match self.executor.execute(&self.exit_command_line()).await {
            Ok(result) if result.success() => {
                debug!(destination = %self.destination, "ssh control master closed");
            }
            Ok(result) => debug!(
                destination = %self.destination,
                exit_code = result.exit_code,
                "ssh control master was not running"
            ),
            Err(e) => warn!(destination = %self.destination, error = %e, "failed to stop ssh control master"),
        }
    }

    async fn detect_os(&self) -> OsType {
        match self.execute("uname -s").await {
            Ok(result) if result.success() => {
                let uname = result.stdout.unwrap_or_default();
                let os = OsType::from_uname(&uname);
                if !os.is_supported() {
                    warn!(destination = %self.destination, uname = %uname.trim(), "unrecognized remote OS");
                }
                os
            }
            Ok(result) => {
                warn!(
                    destination = %self.destination,
                    exit_code = result.exit_code,
                    "uname failed, remote OS unknown"
                );
                OsType::Unknown
            }
            Err(e) => {
                warn!(destination = %self.destination, error = %e, "uname failed, remote OS unknown");
                OsType::Unknown
            }
        }
    }

    async fn execute(&self, command: &str) -> Result<ExecutionResult, ExecutionError> {
        self.executor.execute(&self.command_line(command)).await
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, ExecutionError> {
        let result = self.execute(&format!("cat {}", shell_quote(path))).await?;
        if !result.success() {
            return Err(ExecutionError::Remote(format!(
                "cat {path} exited with {}: {}",
                result.exit_code,
                excerpt(result.stderr.as_deref().unwrap_or("").trim())
            )));
        }
        Ok(result.stdout.unwrap_or_default().into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockExecutor, MockFs};

    fn remote() -> Address {
        "ssh://ops@db1:2222".parse().unwrap()
    }

    fn ssh(executor: MockExecutor) -> SshTransport<MockExecutor> {
        SshTransport::with_executor(&remote(), SshOptions::default(), executor).unwrap()
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("uname -s"), "'uname -s'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn test_ssh_requires_ssh_address() {
        let err = SshTransport::new(&Address::Local, SshOptions::default()).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidAddress { .. }));
    }

    #[test]
    fn test_command_line() {
        let transport = ssh(MockExecutor::new());
        let line = transport.command_line("cat '/proc/stat'");
        assert!(line.starts_with("'ssh' '-o' 'BatchMode=yes'"), "{line}");
        assert!(line.contains("'ControlMaster=auto'"));
        assert!(line.contains("'ControlPersist=60s'"));
        assert!(line.contains("'-p' '2222'"));
        assert!(line.ends_with(r"'ops@db1' 'cat '\''/proc/stat'\'''"), "{line}");
        assert!(
            transport
                .control_path()
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("osmetrics-")
        );
    }

    #[tokio::test]
    async fn test_connect_failure_carries_stderr() {
        let executor = MockExecutor::new();
        let transport = ssh(executor.clone());
        executor.respond_with(
            &transport.command_line("true"),
            ExecutionResult::new(255, None, Some("Permission denied (publickey).\n".into())),
        );
        let err = transport.connect().await.unwrap_err();
        assert!(err.to_string().contains("Permission denied"), "{err}");
    }

    #[tokio::test]
    async fn test_remote_read_file_and_uname() {
        let executor = MockExecutor::new();
        let transport = ssh(executor.clone());
        executor.respond(&transport.command_line("uname -s"), "Darwin\n");
        executor.respond(
            &transport.command_line("cat '/proc/loadavg'"),
            "0.10 0.20 0.30 1/100 42\n",
        );

        assert_eq!(transport.detect_os().await, OsType::Mac);
        let bytes = transport.read_file("/proc/loadavg").await.unwrap();
        assert_eq!(bytes, b"0.10 0.20 0.30 1/100 42\n");

        // unscripted: the mock answers 127
        assert!(transport.read_file("/proc/nope").await.is_err());
    }

    #[tokio::test]
    async fn test_disconnect_sends_exit() {
        let executor = MockExecutor::new();
        let transport = ssh(executor.clone());
        transport.disconnect().await;
        let history = executor.history();
        assert_eq!(history.len(), 1);
        assert!(history[0].contains("'-O' 'exit'"));
    }

    #[tokio::test]
    async fn test_local_transport() {
        let executor = MockExecutor::new();
        executor.respond("hostname", "box\n");
        let transport = LocalTransport::new(executor, MockFs::linux_host());

        transport.connect().await.unwrap();
        assert_eq!(transport.detect_os().await, OsType::current());
        let result = transport.execute("hostname").await.unwrap();
        assert_eq!(result.stdout.as_deref(), Some("box\n"));

        let loadavg = transport.read_file("/proc/loadavg").await.unwrap();
        assert!(!loadavg.is_empty());
        let err = transport.read_file("/proc/missing").await.unwrap_err();
        assert!(matches!(err, ExecutionError::Io { .. }));
    }
}
