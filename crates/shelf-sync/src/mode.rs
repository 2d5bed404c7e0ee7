use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Which primitive family coordinates access to the backing file.
///
/// All participants sharing one file must use the same mode: a thread-mode
/// instance cannot coordinate with a process-mode instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// In-process primitives shared by threads holding the same instance.
    #[default]
    Thread,
    /// File-lock primitives shared by every instance on the same path,
    /// in this process or any other.
    Process,
}

impl SyncMode {
    /// Numeric selector for thread mode.
    pub const THREAD_SELECTOR: u8 = 1;
    /// Numeric selector for process mode.
    pub const PROCESS_SELECTOR: u8 = 0;
}

impl TryFrom<u8> for SyncMode {
    type Error = SyncError;

    fn try_from(selector: u8) -> Result<Self, Self::Error> {
        match selector {
            Self::THREAD_SELECTOR => Ok(Self::Thread),
            Self::PROCESS_SELECTOR => Ok(Self::Process),
            other => Err(SyncError::InvalidMode(other.to_string())),
        }
    }
}

impl FromStr for SyncMode {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "thread" | "threads" => Ok(Self::Thread),
            "process" | "processes" => Ok(Self::Process),
            _ => Err(SyncError::InvalidMode(s.to_string())),
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Thread => write!(f, "thread"),
            Self::Process => write!(f, "process"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_selectors() {
        assert_eq!(SyncMode::try_from(1).unwrap(), SyncMode::Thread);
        assert_eq!(SyncMode::try_from(0).unwrap(), SyncMode::Process);
    }

    #[test]
    fn unknown_selector_is_configuration_error() {
        let err = SyncMode::try_from(2).unwrap_err();
        assert!(matches!(err, SyncError::InvalidMode(ref s) if s == "2"));
        assert!(err.is_configuration());
    }

    #[test]
    fn parse_names() {
        assert_eq!("thread".parse::<SyncMode>().unwrap(), SyncMode::Thread);
        assert_eq!(" Processes ".parse::<SyncMode>().unwrap(), SyncMode::Process);
        assert!("fiber".parse::<SyncMode>().is_err());
    }

    #[test]
    fn display_matches_parse() {
        for mode in [SyncMode::Thread, SyncMode::Process] {
            assert_eq!(mode.to_string().parse::<SyncMode>().unwrap(), mode);
        }
    }
}
