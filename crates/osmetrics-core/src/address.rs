//! Metric source addressing.
//!
//! Two forms are accepted:
//!
//! - `local` for the host the library runs on
//! - `ssh://[user@]host[:port]` (or the bare `user@host[:port]` form) for a
//!   remote host reached over SSH; the port defaults to 22
//!
//! Addresses are canonicalised at parse time, so `ssh://ops@db1` and
//! `ssh://ops@db1:22` compare equal.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

pub const DEFAULT_SSH_PORT: u16 = 22;

const LOCAL_TOKEN: &str = "local";
const SSH_SCHEME: &str = "ssh://";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Address {
    Local,
    Ssh {
        user: Option<String>,
        host: String,
        port: u16,
    },
}

impl Address {
    pub fn local() -> Self {
        Address::Local
    }

    pub fn ssh(user: Option<&str>, host: impl Into<String>, port: u16) -> Self {
        Address::Ssh {
            user: user.map(str::to_string),
            host: host.into(),
            port,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Address::Local)
    }

    /// `user@host` (or just `host`) as passed to the ssh client.
    pub fn ssh_destination(&self) -> Option<String> {
        match self {
            Address::Local => None,
            Address::Ssh { user, host, .. } => Some(match user {
                Some(user) => format!("{user}@{host}"),
                None => host.clone(),
            }),
        }
    }
}

fn invalid(address: &str, reason: impl Into<String>) -> ConfigurationError {
    ConfigurationError::InvalidAddress {
        address: address.to_string(),
        reason: reason.into(),
    }
}

/// Splits `host[:port]`, accepting bracketed IPv6 literals.
fn split_host_port(original: &str, s: &str) -> Result<(String, u16), ConfigurationError> {
    let (host, port) = if let Some(rest) = s.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or_else(|| invalid(original, "unterminated '[' in host"))?;
        match after {
            "" => (host, None),
            _ => {
                let port = after
                    .strip_prefix(':')
                    .ok_or_else(|| invalid(original, "unexpected characters after ']'"))?;
                (host, Some(port))
            }
        }
    } else if s.matches(':').count() > 1 {
        // unbracketed IPv6 literal, no port
        (s, None)
    } else {
        match s.split_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (s, None),
        }
    };

    if host.is_empty() {
        return Err(invalid(original, "empty host"));
    }

    let port = match port {
        None => DEFAULT_SSH_PORT,
        Some(p) => match p.parse::<u16>() {
            Ok(0) | Err(_) => return Err(invalid(original, format!("invalid port '{p}'"))),
            Ok(port) => port,
        },
    };

    Ok((host.to_string(), port))
}

impl FromStr for Address {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed == LOCAL_TOKEN {
            return Ok(Address::Local);
        }

        let rest = match trimmed.strip_prefix(SSH_SCHEME) {
            Some(rest) => rest,
            None if trimmed.contains('@') => trimmed,
            None => {
                return Err(invalid(
                    s,
                    "expected 'local' or 'ssh://[user@]host[:port]'",
                ));
            }
        };

        if rest.contains('/') {
            return Err(invalid(s, "paths are not allowed in an ssh address"));
        }

        let (user, host_port) = match rest.rsplit_once('@') {
            Some(("", _)) => return Err(invalid(s, "empty user")),
            Some((user, host_port)) => (Some(user.to_string()), host_port),
            None => (None, rest),
        };

        let (host, port) = split_host_port(s, host_port)?;
        Ok(Address::Ssh { user, host, port })
    }
}

impl TryFrom<String> for Address {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Local => f.write_str(LOCAL_TOKEN),
            Address::Ssh { user, host, port } => {
                f.write_str(SSH_SCHEME)?;
                if let Some(user) = user {
                    write!(f, "{user}@")?;
                }
                if host.contains(':') {
                    write!(f, "[{host}]:{port}")
                } else {
                    write!(f, "{host}:{port}")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_local() {
        assert_eq!("local".parse::<Address>().unwrap(), Address::Local);
        assert_eq!(" local ".parse::<Address>().unwrap(), Address::Local);
    }

    #[test]
    fn test_parse_ssh_with_default_port() {
        let a: Address = "ssh://ops@db1.example.com".parse().unwrap();
        assert_eq!(a, Address::ssh(Some("ops"), "db1.example.com", 22));
        assert_eq!(a.to_string(), "ssh://ops@db1.example.com:22");
        assert_eq!(a.ssh_destination().as_deref(), Some("ops@db1.example.com"));
    }

    #[test]
    fn test_parse_ssh_explicit_port_equals_default() {
        let a: Address = "ssh://ops@db1:22".parse().unwrap();
        let b: Address = "ssh://ops@db1".parse().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_bare_user_at_host() {
        let a: Address = "root@10.0.0.5:2222".parse().unwrap();
        assert_eq!(a, Address::ssh(Some("root"), "10.0.0.5", 2222));
    }

    #[test]
    fn test_parse_ssh_without_user() {
        let a: Address = "ssh://bastion".parse().unwrap();
        assert_eq!(a, Address::ssh(None, "bastion", 22));
        assert_eq!(a.ssh_destination().as_deref(), Some("bastion"));
    }

    #[test]
    fn test_parse_ipv6() {
        let a: Address = "ssh://admin@[::1]:2200".parse().unwrap();
        assert_eq!(a, Address::ssh(Some("admin"), "::1", 2200));
        assert_eq!(a.to_string(), "ssh://admin@[::1]:2200");
        assert_eq!(a.to_string().parse::<Address>().unwrap(), a);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in [
            "",
            "remote",
            "ssh://",
            "ssh://@host",
            "ssh://u@host:0",
            "ssh://u@host:99999",
            "ssh://u@host:abc",
            "ssh://u@host/path",
            "ssh://u@[::1",
        ] {
            let err = bad.parse::<Address>().unwrap_err();
            assert!(
                matches!(err, ConfigurationError::InvalidAddress { .. }),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_serde_roundtrip_as_string() {
        let a = Address::ssh(Some("ops"), "db1", 2022);
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, "\"ssh://ops@db1:2022\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }
}
