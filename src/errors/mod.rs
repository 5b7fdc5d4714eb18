//! Error taxonomy for the adapter and the integration bridge.
//!
//! | Category    | Raised by                         | Handling                         |
//! |-------------|-----------------------------------|----------------------------------|
//! | Protocol    | message parsing                   | logged, message ignored          |
//! | Integration | host capability calls             | logged, empty result             |
//! | Timeout     | request channel                   | rejected to the immediate caller |
//! | Transport   | posting to the frame/host window  | logged                           |
//! | Contract    | constructors, configuration       | returned as an error             |

mod kinds;

pub use kinds::ErrorKind;

use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;
use crate::ipc::RequestError;
use crate::transport::TransportError;

/// A window message that could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("message is not an object with a string `type`")]
    MissingType,

    #[error("`{message_type}` is missing required field `{field}`")]
    MissingField {
        message_type: &'static str,
        field: &'static str,
    },

    #[error("`{message_type}` has an invalid `{field}`: {reason}")]
    InvalidField {
        message_type: &'static str,
        field: &'static str,
        reason: String,
    },
}

/// Maps an error to its [`ErrorKind`].
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

impl Classify for ProtocolError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Protocol
    }
}

impl Classify for TransportError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Transport
    }
}

impl Classify for RequestError {
    fn kind(&self) -> ErrorKind {
        match self {
            RequestError::Timeout { .. } => ErrorKind::Timeout,
            RequestError::Transport(_) => ErrorKind::Transport,
            RequestError::Serialization(_) | RequestError::Abandoned { .. } => {
                ErrorKind::Integration
            }
        }
    }
}

impl Classify for ConfigError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Contract
    }
}

/// Serializable description of a handled failure, used as event detail.
#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl FailureReport {
    pub fn from_error<E: Classify + std::fmt::Display>(error: &E) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_errors_are_classified() {
        let timeout = RequestError::Timeout {
            path: "/contacts".to_string(),
        };
        assert_eq!(timeout.kind(), ErrorKind::Timeout);

        let transport = RequestError::Transport(TransportError::Closed);
        assert_eq!(transport.kind(), ErrorKind::Transport);
    }

    #[test]
    fn test_protocol_error_messages() {
        let err = ProtocolError::MissingField {
            message_type: "rc-call-start-notify",
            field: "call",
        };
        assert_eq!(
            err.to_string(),
            "`rc-call-start-notify` is missing required field `call`"
        );
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn test_failure_report_serialization() {
        let err = RequestError::Timeout {
            path: "/match".to_string(),
        };
        let report = FailureReport::from_error(&err).with_context("matchContacts");
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["kind"], "timeout");
        assert_eq!(value["context"], "matchContacts");
        assert!(value["message"].as_str().unwrap().contains("/match"));
    }

    #[test]
    fn test_config_errors_are_fatal() {
        let err = ConfigError::Contract("prefix must not be empty".to_string());
        assert!(err.kind().is_fatal());
    }
}
