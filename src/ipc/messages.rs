//! Window message vocabulary.
//!
//! Inbound messages are parsed defensively into closed enums; anything the
//! widget or the bridge does not know is surfaced as a dedicated variant
//! instead of an error so callers can delegate or ignore it.

use std::collections::HashMap;

use phf::phf_map;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::adapter::calls::{CallEvent, CallRecord};
use crate::errors::ProtocolError;
use crate::ipc::types::is_truthy;

pub const REGISTER_SERVICE: &str = "rc-adapter-register-third-party-service";
pub const UPDATE_AUTHORIZATION_STATUS: &str = "rc-adapter-update-authorization-status";

/// Inbound widget message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterMessageKind {
    Call(CallEvent),
    RouteChanged,
    LoginStatus,
    ActiveCall,
    RingoutCall,
    InboundMessage,
    MessageUpdated,
    PushAdapterState,
    PushPresence,
    PushLocale,
}

static ADAPTER_MESSAGE_KINDS: phf::Map<&'static str, AdapterMessageKind> = phf_map! {
    "rc-call-ring-notify" => AdapterMessageKind::Call(CallEvent::Ring),
    "rc-call-start-notify" => AdapterMessageKind::Call(CallEvent::Start),
    "rc-call-hold-notify" => AdapterMessageKind::Call(CallEvent::Hold),
    "rc-call-resume-notify" => AdapterMessageKind::Call(CallEvent::Resume),
    "rc-call-end-notify" => AdapterMessageKind::Call(CallEvent::End),
    "rc-route-changed-notify" => AdapterMessageKind::RouteChanged,
    "rc-login-status-notify" => AdapterMessageKind::LoginStatus,
    "rc-active-call-notify" => AdapterMessageKind::ActiveCall,
    "rc-ringout-call-notify" => AdapterMessageKind::RingoutCall,
    "rc-inbound-message-notify" => AdapterMessageKind::InboundMessage,
    "rc-message-updated-notify" => AdapterMessageKind::MessageUpdated,
    "rc-adapter-push-adapter-state" => AdapterMessageKind::PushAdapterState,
    "rc-adapter-push-presence" => AdapterMessageKind::PushPresence,
    "rc-adapter-push-locale" => AdapterMessageKind::PushLocale,
};

/// Look up the kind of an inbound widget message type.
pub fn adapter_message_kind(message_type: &str) -> Option<AdapterMessageKind> {
    ADAPTER_MESSAGE_KINDS.get(message_type).copied()
}

/// Adapter state pushed by the frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdapterStatePush {
    pub minimized: Option<bool>,
    pub closed: Option<bool>,
    pub ringing: Option<bool>,
    pub user_status: Option<String>,
    pub dnd_status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PresencePush {
    pub user_status: Option<String>,
    pub dnd_status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalePush {
    pub locale: Option<String>,
    pub strings: HashMap<String, String>,
}

/// Message addressed to the widget.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterMessage {
    Call { event: CallEvent, call: CallRecord },
    RouteChanged { path: String },
    LoginStatus { logged_in: bool },
    ActiveCall { call: Value },
    RingoutCall { call: Value },
    InboundMessage { message_id: Option<Value> },
    MessageUpdated { message_id: Option<Value> },
    PushAdapterState(AdapterStatePush),
    PushPresence(PresencePush),
    PushLocale(LocalePush),
    /// Any other type, left to the caller.
    Unknown { message_type: String },
}

fn message_type(message: &Value) -> Result<&str, ProtocolError> {
    message
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingType)
}

fn present<'a>(message: &'a Value, field: &str) -> Option<&'a Value> {
    message.get(field).filter(|value| !value.is_null())
}

fn decode<T: DeserializeOwned>(
    value: Value,
    message_type: &'static str,
    field: &'static str,
) -> Result<T, ProtocolError> {
    serde_json::from_value(value).map_err(|e| ProtocolError::InvalidField {
        message_type,
        field,
        reason: e.to_string(),
    })
}

impl AdapterMessage {
    pub fn parse(message: &Value) -> Result<Self, ProtocolError> {
        let message_type = message_type(message)?;
        let Some((&name, &kind)) = ADAPTER_MESSAGE_KINDS.get_entry(message_type) else {
            return Ok(AdapterMessage::Unknown {
                message_type: message_type.to_string(),
            });
        };

        let parsed = match kind {
            AdapterMessageKind::Call(event) => {
                let call = present(message, "call").ok_or(ProtocolError::MissingField {
                    message_type: name,
                    field: "call",
                })?;
                AdapterMessage::Call {
                    event,
                    call: decode(call.clone(), name, "call")?,
                }
            }
            AdapterMessageKind::RouteChanged => AdapterMessage::RouteChanged {
                path: message
                    .get("path")
                    .and_then(Value::as_str)
                    .ok_or(ProtocolError::MissingField {
                        message_type: name,
                        field: "path",
                    })?
                    .to_string(),
            },
            AdapterMessageKind::LoginStatus => AdapterMessage::LoginStatus {
                logged_in: message.get("loggedIn").is_some_and(is_truthy),
            },
            AdapterMessageKind::ActiveCall => AdapterMessage::ActiveCall {
                call: message.get("call").cloned().unwrap_or(Value::Null),
            },
            AdapterMessageKind::RingoutCall => AdapterMessage::RingoutCall {
                call: message.get("call").cloned().unwrap_or(Value::Null),
            },
            AdapterMessageKind::InboundMessage => AdapterMessage::InboundMessage {
                message_id: message.pointer("/message/id").cloned(),
            },
            AdapterMessageKind::MessageUpdated => AdapterMessage::MessageUpdated {
                message_id: message.pointer("/message/id").cloned(),
            },
            AdapterMessageKind::PushAdapterState => {
                AdapterMessage::PushAdapterState(decode(message.clone(), name, "state")?)
            }
            AdapterMessageKind::PushPresence => {
                AdapterMessage::PushPresence(decode(message.clone(), name, "presence")?)
            }
            AdapterMessageKind::PushLocale => {
                let strings = message
                    .get("strings")
                    .and_then(Value::as_object)
                    .map(|strings| {
                        strings
                            .iter()
                            .filter_map(|(key, value)| {
                                value.as_str().map(|text| (key.clone(), text.to_string()))
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                AdapterMessage::PushLocale(LocalePush {
                    locale: message
                        .get("locale")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    strings,
                })
            }
        };
        Ok(parsed)
    }
}

/// Message posted from the widget into the softphone frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum AdapterCommand {
    #[serde(rename = "rc-adapter-goto-presence")]
    GotoPresence {
        #[serde(skip_serializing_if = "Option::is_none")]
        version: Option<String>,
    },
    #[serde(rename = "rc-adapter-set-environment")]
    SetEnvironment,
    #[serde(rename = "rc-adapter-logout")]
    Logout,
    #[serde(rename = "rc-adapter-new-sms", rename_all = "camelCase")]
    NewSms {
        phone_number: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    #[serde(rename = "rc-adapter-new-call", rename_all = "camelCase")]
    NewCall { phone_number: String, to_call: bool },
    #[serde(rename = "rc-adapter-control-call", rename_all = "camelCase")]
    ControlCall { call_action: String, call_id: String },
    #[serde(rename = "rc-adapter-sync-minimized")]
    SyncMinimized { minimized: bool },
    #[serde(rename = "rc-adapter-presence-item-clicked", rename_all = "camelCase")]
    PresenceItemClicked { presence_type: String },
}

impl AdapterCommand {
    pub fn message_type(&self) -> &'static str {
        match self {
            AdapterCommand::GotoPresence { .. } => "rc-adapter-goto-presence",
            AdapterCommand::SetEnvironment => "rc-adapter-set-environment",
            AdapterCommand::Logout => "rc-adapter-logout",
            AdapterCommand::NewSms { .. } => "rc-adapter-new-sms",
            AdapterCommand::NewCall { .. } => "rc-adapter-new-call",
            AdapterCommand::ControlCall { .. } => "rc-adapter-control-call",
            AdapterCommand::SyncMinimized { .. } => "rc-adapter-sync-minimized",
            AdapterCommand::PresenceItemClicked { .. } => "rc-adapter-presence-item-clicked",
        }
    }
}

/// Capabilities announced by a host page.
///
/// Empty strings are treated like absent fields.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceRegistration {
    pub name: String,
    pub authorization_path: Option<String>,
    pub authorized: Option<Value>,
    pub authorized_title: Option<String>,
    pub unauthorized_title: Option<String>,
    pub contacts_path: Option<String>,
    pub contact_search_path: Option<String>,
    pub contact_match_path: Option<String>,
    pub activities_path: Option<String>,
    pub activity_path: Option<String>,
    pub conference_invite_path: Option<String>,
    pub conference_invite_title: Option<String>,
    pub call_logger_path: Option<String>,
    pub call_logger_title: Option<String>,
    pub show_log_modal: Option<bool>,
}

/// `Some` when the field holds a non-empty string.
pub fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|value| !value.is_empty())
}

impl ServiceRegistration {
    /// Initial authorization state; anything but a truthy value is false.
    pub fn initially_authorized(&self) -> bool {
        self.authorized.as_ref().is_some_and(is_truthy)
    }
}

/// Message addressed to the integration bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceMessage {
    Register(ServiceRegistration),
    UpdateAuthorizationStatus { authorized: bool },
    /// Not a bridge message.
    Unrelated,
}

impl ServiceMessage {
    pub fn parse(message: &Value) -> Result<Self, ProtocolError> {
        match message_type(message)? {
            REGISTER_SERVICE => {
                let service = present(message, "service").ok_or(ProtocolError::MissingField {
                    message_type: REGISTER_SERVICE,
                    field: "service",
                })?;
                Ok(ServiceMessage::Register(decode(
                    service.clone(),
                    REGISTER_SERVICE,
                    "service",
                )?))
            }
            UPDATE_AUTHORIZATION_STATUS => Ok(ServiceMessage::UpdateAuthorizationStatus {
                authorized: message.get("authorized").is_some_and(is_truthy),
            }),
            _ => Ok(ServiceMessage::Unrelated),
        }
    }
}
