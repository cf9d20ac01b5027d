//! Operating-system family detection.
//!
//! Detection only looks at the platform this library was compiled for. A
//! source that needs a different answer (tests, a remote host) carries its own
//! override in [`SourceConfig`](crate::config::SourceConfig).

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsType {
    Linux,
    Mac,
    Windows,
    Unknown,
}

/// Cached result of local OS detection.
static CURRENT: LazyLock<OsType> = LazyLock::new(|| OsType::from_os_name(std::env::consts::OS));

impl OsType {
    /// The OS family of the local host.
    pub fn current() -> OsType {
        *CURRENT
    }

    /// Maps a Rust target OS name (`std::env::consts::OS`).
    pub fn from_os_name(name: &str) -> OsType {
        match name {
            "linux" => OsType::Linux,
            "macos" => OsType::Mac,
            "windows" => OsType::Windows,
            _ => OsType::Unknown,
        }
    }

    /// Maps the output of `uname -s`.
    pub fn from_uname(output: &str) -> OsType {
        match output.trim() {
            "Linux" => OsType::Linux,
            "Darwin" => OsType::Mac,
            s if s.starts_with("MINGW") || s.starts_with("MSYS") || s.starts_with("CYGWIN") => {
                OsType::Windows
            }
            _ => OsType::Unknown,
        }
    }

    pub fn is_supported(self) -> bool {
        !matches!(self, OsType::Unknown)
    }
}

impl fmt::Display for OsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OsType::Linux => "LINUX",
            OsType::Mac => "MAC",
            OsType::Windows => "WINDOWS",
            OsType::Unknown => "UNKNOWN",
        })
    }
}

impl FromStr for OsType {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linux" => Ok(OsType::Linux),
            "mac" | "macos" | "darwin" => Ok(OsType::Mac),
            "windows" => Ok(OsType::Windows),
            _ => Err(ConfigurationError::InvalidConfig(format!(
                "unknown OS type '{s}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_matches_build_target() {
        let expected = if cfg!(target_os = "linux") {
            OsType::Linux
        } else if cfg!(target_os = "macos") {
            OsType::Mac
        } else if cfg!(target_os = "windows") {
            OsType::Windows
        } else {
            OsType::Unknown
        };
        assert_eq!(OsType::current(), expected);
        assert_eq!(OsType::current(), OsType::current());
    }

    #[test]
    fn test_from_uname() {
        assert_eq!(OsType::from_uname("Linux\n"), OsType::Linux);
        assert_eq!(OsType::from_uname("Darwin"), OsType::Mac);
        assert_eq!(OsType::from_uname("MINGW64_NT-10.0"), OsType::Windows);
        assert_eq!(OsType::from_uname("FreeBSD"), OsType::Unknown);
        assert_eq!(OsType::from_uname(""), OsType::Unknown);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("linux".parse::<OsType>().unwrap(), OsType::Linux);
        assert_eq!("MAC".parse::<OsType>().unwrap(), OsType::Mac);
        assert_eq!("darwin".parse::<OsType>().unwrap(), OsType::Mac);
        assert!("plan9".parse::<OsType>().is_err());
    }

    #[test]
    fn test_unknown_is_not_supported() {
        assert!(!OsType::Unknown.is_supported());
        assert!(OsType::Linux.is_supported());
    }
}
