//! Failure categories shared by the widget and the integration bridge.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a failure.
///
/// Serialized (diagnostics event detail) as snake_case, e.g. `timeout`.
/// `Display` and [`ErrorKind::to_wire`] give the `E_*` code used in log
/// lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or unexpected window message.
    Protocol,
    /// A host capability call failed or returned unusable data.
    Integration,
    /// No response arrived within the request timeout.
    Timeout,
    /// A message could not be posted.
    Transport,
    /// Invalid construction parameters.
    Contract,
}

impl ErrorKind {
    pub fn from_wire(kind: &str) -> Option<Self> {
        match kind {
            "E_PROTOCOL" => Some(Self::Protocol),
            "E_INTEGRATION" => Some(Self::Integration),
            "E_TIMEOUT" => Some(Self::Timeout),
            "E_TRANSPORT" => Some(Self::Transport),
            "E_CONTRACT" => Some(Self::Contract),
            _ => None,
        }
    }

    pub fn to_wire(&self) -> &'static str {
        match self {
            Self::Protocol => "E_PROTOCOL",
            Self::Integration => "E_INTEGRATION",
            Self::Timeout => "E_TIMEOUT",
            Self::Transport => "E_TRANSPORT",
            Self::Contract => "E_CONTRACT",
        }
    }

    /// Only contract violations abort; everything else degrades to an
    /// empty or neutral result.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Contract)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_wire())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_roundtrip() {
        for kind in [
            ErrorKind::Protocol,
            ErrorKind::Integration,
            ErrorKind::Timeout,
            ErrorKind::Transport,
            ErrorKind::Contract,
        ] {
            assert_eq!(ErrorKind::from_wire(kind.to_wire()), Some(kind));
        }
        assert_eq!(ErrorKind::from_wire("E_UNKNOWN"), None);
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_string(&ErrorKind::Timeout).unwrap();
        assert_eq!(json, "\"timeout\"");
        assert_eq!(ErrorKind::Timeout.to_string(), "E_TIMEOUT");
    }

    #[test]
    fn test_only_contract_is_fatal() {
        assert!(ErrorKind::Contract.is_fatal());
        assert!(!ErrorKind::Integration.is_fatal());
        assert!(!ErrorKind::Timeout.is_fatal());
        assert!(!ErrorKind::Protocol.is_fatal());
    }
}
