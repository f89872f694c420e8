use serde_repr::{Deserialize_repr, Serialize_repr};
use std::fmt;

/// Service check status, numbered the way the agent expects them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum ServiceCheckStatus {
    Ok = 0,
    Warning = 1,
    Critical = 2,
    Unknown = 3,
}

impl ServiceCheckStatus {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// OK when `up`, CRITICAL otherwise
    pub fn from_up(up: bool) -> Self {
        if up {
            ServiceCheckStatus::Ok
        } else {
            ServiceCheckStatus::Critical
        }
    }
}

impl fmt::Display for ServiceCheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ServiceCheckStatus::Ok => "OK",
            ServiceCheckStatus::Warning => "WARNING",
            ServiceCheckStatus::Critical => "CRITICAL",
            ServiceCheckStatus::Unknown => "UNKNOWN",
        };
        f.write_str(label)
    }
}
