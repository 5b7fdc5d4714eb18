//! Call-state reducer.
//!
//! Every call notification from the softphone frame is folded into an
//! immutable [`CallState`] by [`reduce_calls`]. The state keeps the call
//! list newest-first and tracks which call is "current" for the call bar.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

const STATUS_CONNECTING: &str = "webphone-session-connecting";
const STATUS_CONNECTED: &str = "webphone-session-connected";
const STATUS_ON_HOLD: &str = "webphone-session-onHold";

const DIRECTION_INBOUND: &str = "Inbound";

/// Session status reported by the frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CallStatus {
    Connecting,
    Connected,
    OnHold,
    Other(String),
}

impl From<String> for CallStatus {
    fn from(status: String) -> Self {
        match status.as_str() {
            STATUS_CONNECTING => CallStatus::Connecting,
            STATUS_CONNECTED => CallStatus::Connected,
            STATUS_ON_HOLD => CallStatus::OnHold,
            _ => CallStatus::Other(status),
        }
    }
}

impl From<CallStatus> for String {
    fn from(status: CallStatus) -> Self {
        match status {
            CallStatus::Connecting => STATUS_CONNECTING.to_string(),
            CallStatus::Connected => STATUS_CONNECTED.to_string(),
            CallStatus::OnHold => STATUS_ON_HOLD.to_string(),
            CallStatus::Other(other) => other,
        }
    }
}

/// Kind of call notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallEvent {
    Ring,
    Start,
    Hold,
    Resume,
    End,
}

/// A call as reported by the softphone frame.
///
/// Fields the widget does not interpret are kept in `extra` and survive a
/// round trip. Only `id` is required; optional fields with an unexpected
/// JSON type read as absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    #[serde(deserialize_with = "call_id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub from_user_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(default, deserialize_with = "lenient_millis", skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
    #[serde(default, deserialize_with = "lenient_millis", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    #[serde(default, deserialize_with = "lenient_status", skip_serializing_if = "Option::is_none")]
    pub call_status: Option<CallStatus>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CallRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            from_user_name: None,
            from: None,
            to: None,
            direction: None,
            start_time: None,
            end_time: None,
            call_status: None,
            extra: Map::new(),
        }
    }

    /// Inbound and still connecting.
    pub fn is_ringing(&self) -> bool {
        self.direction
            .as_deref()
            .is_some_and(|d| d.eq_ignore_ascii_case(DIRECTION_INBOUND))
            && self.call_status == Some(CallStatus::Connecting)
    }

    pub fn is_held(&self) -> bool {
        self.call_status == Some(CallStatus::OnHold)
    }

    /// Caller label for notifications.
    pub fn caller(&self) -> &str {
        self.from_user_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .or(self.from.as_deref())
            .unwrap_or_default()
    }

    /// Fill a missing status or direction from the notification kind.
    fn completed_for(mut self, event: CallEvent) -> Self {
        if self.call_status.is_none() {
            self.call_status = match event {
                CallEvent::Ring => Some(CallStatus::Connecting),
                CallEvent::Hold => Some(CallStatus::OnHold),
                CallEvent::Start | CallEvent::Resume => Some(CallStatus::Connected),
                CallEvent::End => None,
            };
        }
        if event == CallEvent::Ring && self.direction.is_none() {
            self.direction = Some(DIRECTION_INBOUND.to_string());
        }
        self
    }
}

/// Call ids arrive as strings or numbers; both are kept as text.
fn call_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(id) => Ok(id),
        Value::Number(id) => Ok(id.to_string()),
        other => Err(D::Error::custom(format!(
            "call id must be a string or a number, got {}",
            other
        ))),
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        _ => None,
    })
}

/// Epoch milliseconds; fractional values are truncated.
fn lenient_millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let Value::Number(number) = Value::deserialize(deserializer)? else {
        return Ok(None);
    };
    Ok(number.as_i64().or_else(|| {
        number
            .as_f64()
            .filter(|millis| millis.is_finite())
            .map(|millis| millis.trunc() as i64)
    }))
}

fn lenient_status<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<CallStatus>, D::Error> {
    Ok(lenient_string(deserializer)?.map(CallStatus::from))
}

/// Derived counters that drive call-bar visibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSummary {
    pub ringing: usize,
    pub on_hold: usize,
    pub has_active_calls: bool,
}

/// Immutable call set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallState {
    /// Newest first.
    calls: Vec<CallRecord>,
    current_id: Option<String>,
    current_start_time: i64,
}

impl CallState {
    pub fn calls(&self) -> &[CallRecord] {
        &self.calls
    }

    /// Call shown in the call bar: the tracked call, unless it is ringing
    /// or on hold.
    pub fn current_call(&self) -> Option<&CallRecord> {
        let id = self.current_id.as_deref()?;
        self.calls
            .iter()
            .find(|call| call.id == id)
            .filter(|call| !call.is_ringing() && !call.is_held())
    }

    /// Start time of the tracked call, 0 when none.
    pub fn current_start_time(&self) -> i64 {
        self.current_start_time
    }

    pub fn summary(&self) -> CallSummary {
        CallSummary {
            ringing: self.calls.iter().filter(|c| c.is_ringing()).count(),
            on_hold: self.calls.iter().filter(|c| c.is_held()).count(),
            has_active_calls: !self.calls.is_empty(),
        }
    }
}

/// Fold one call notification into the call set.
pub fn reduce_calls(state: &CallState, event: CallEvent, call: CallRecord) -> CallState {
    let call = call.completed_for(event);
    let mut others: Vec<CallRecord> = state
        .calls
        .iter()
        .filter(|c| c.id != call.id)
        .cloned()
        .collect();

    let mut current_id = state.current_id.clone();
    let mut current_start_time = state.current_start_time;

    if event == CallEvent::End || call.end_time.is_some() {
        if current_id.as_deref() == Some(call.id.as_str()) {
            let replacement = others.iter().find(|c| !c.is_ringing());
            current_id = replacement.map(|c| c.id.clone());
            current_start_time = replacement.and_then(|c| c.start_time).unwrap_or(0);
        }
        return CallState {
            calls: others,
            current_id,
            current_start_time,
        };
    }

    if !call.is_ringing() {
        let newly_held = call.is_held();
        if current_id.is_none() || !newly_held {
            current_id = Some(call.id.clone());
            current_start_time = call.start_time.unwrap_or(0);
        }
        // Only one connected call at a time.
        if !newly_held {
            for other in others.iter_mut().filter(|c| !c.is_ringing()) {
                other.call_status = Some(CallStatus::OnHold);
            }
        }
    }

    let mut calls = Vec::with_capacity(others.len() + 1);
    calls.push(call);
    calls.extend(others);

    CallState {
        calls,
        current_id,
        current_start_time,
    }
}
