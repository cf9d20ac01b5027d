//! Per-source configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::os_type::OsType;

/// Default timeout for a single fetch (command run or file read), in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Timeout applied to every fetch. A fetch that exceeds it yields null values.
    pub timeout_ms: u64,
    /// Forces the OS family instead of detecting it.
    pub os_type: Option<OsType>,
    /// Run distinct fetches concurrently within one collection.
    pub parallel_fetch: bool,
    pub ssh: SshOptions,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            os_type: None,
            parallel_fetch: true,
            ssh: SshOptions::default(),
        }
    }
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn with_os_type(mut self, os_type: OsType) -> Self {
        self.os_type = Some(os_type);
        self
    }

    /// Sub-millisecond remainders round up, so only `Duration::ZERO` maps to 0.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let millis = timeout.as_nanos().div_ceil(1_000_000);
        self.timeout_ms = u64::try_from(millis).unwrap_or(u64::MAX);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.timeout_ms == 0 {
            return Err(ConfigurationError::InvalidConfig(
                "timeout_ms must be greater than zero".into(),
            ));
        }
        if self.ssh.program.trim().is_empty() {
            return Err(ConfigurationError::InvalidConfig(
                "ssh.program must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Options for the OpenSSH client used by remote sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshOptions {
    /// ssh client binary, resolved through `PATH`.
    pub program: String,
    /// Never prompt for passwords or host keys.
    pub batch_mode: bool,
    pub connect_timeout_secs: u64,
    /// How long the control master outlives the last command.
    pub control_persist_secs: u64,
    /// Appended verbatim before the destination, e.g. `-i ~/.ssh/monitoring`.
    pub extra_args: Vec<String>,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            program: "ssh".to_string(),
            batch_mode: true,
            connect_timeout_secs: 5,
            control_persist_secs: 60,
            extra_args: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SourceConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.os_type, None);
        assert!(config.parallel_fetch);
        assert_eq!(config.ssh.program, "ssh");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = SourceConfig::default().with_timeout(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_sub_second_timeout_is_kept() {
        let config = SourceConfig::default().with_timeout(Duration::from_millis(250));
        assert_eq!(config.timeout_ms, 250);
        assert_eq!(config.timeout(), Duration::from_millis(250));
        assert!(config.validate().is_ok());

        let config = SourceConfig::default().with_timeout(Duration::from_micros(1));
        assert_eq!(config.timeout_ms, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: SourceConfig =
            serde_json::from_str(r#"{"timeout_ms": 3000, "os_type": "mac", "ssh": {"batch_mode": false}}"#)
                .unwrap();
        assert_eq!(config.timeout_ms, 3000);
        assert_eq!(config.os_type, Some(OsType::Mac));
        assert!(!config.ssh.batch_mode);
        assert_eq!(config.ssh.program, "ssh");
        assert!(config.parallel_fetch);
    }
}
