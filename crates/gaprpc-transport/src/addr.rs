use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::TransportError;

const UNIX_PREFIX: &str = "unix:";

/// Where the radio controller is reachable.
///
/// Parsed from the command-line form: a bare path names a serial device,
/// `unix:<path>` names a socket bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAddr {
    /// Serial device node, e.g. `/dev/ttyACM0`.
    Serial(PathBuf),
    /// Unix domain socket bridge.
    Unix(PathBuf),
}

impl LinkAddr {
    /// Filesystem path of the endpoint.
    pub fn path(&self) -> &std::path::Path {
        match self {
            LinkAddr::Serial(path) | LinkAddr::Unix(path) => path,
        }
    }
}

impl FromStr for LinkAddr {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(path) = s.strip_prefix(UNIX_PREFIX) {
            if path.is_empty() {
                return Err(TransportError::InvalidAddress(s.to_string()));
            }
            return Ok(LinkAddr::Unix(PathBuf::from(path)));
        }
        if s.is_empty() {
            return Err(TransportError::InvalidAddress(s.to_string()));
        }
        Ok(LinkAddr::Serial(PathBuf::from(s)))
    }
}

impl fmt::Display for LinkAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkAddr::Serial(path) => write!(f, "{}", path.display()),
            LinkAddr::Unix(path) => write!(f, "{UNIX_PREFIX}{}", path.display()),
        }
    }
}
