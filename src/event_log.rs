//! Structured diagnostics events.
//!
//! The widget and the bridge report what they do through an injected
//! [`EventSink`]. Sinks provided here:
//! - [`LogEventSink`] forwards every event to the `log` facade
//! - [`EventRingBuffer`] keeps the most recent events for bug reports,
//!   bounded by count and byte size, with phone numbers and e-mail
//!   addresses redacted
//! - [`CombinedSink`] tees events into several sinks

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Local, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::event_seq::{next_seq, with_seq};

/// Default maximum total size in bytes.
const DEFAULT_MAX_BYTES: usize = 256 * 1024;

/// Component that raised an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Adapter,
    Bridge,
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventSource::Adapter => f.write_str("adapter"),
            EventSource::Bridge => f.write_str("bridge"),
        }
    }
}

/// One diagnostics event.
#[derive(Debug, Clone, Serialize)]
pub struct AdapterEvent {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub source: EventSource,
    pub name: String,
    pub detail: Value,
}

impl AdapterEvent {
    pub fn new(source: EventSource, name: impl Into<String>, detail: Value) -> Self {
        Self {
            seq: next_seq(),
            timestamp: Utc::now(),
            source,
            name: name.into(),
            detail,
        }
    }
}

/// Receiver of diagnostics events.
pub trait EventSink: Send + Sync {
    fn record(&self, event: AdapterEvent);
}

/// Forwards events to the `log` facade at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn record(&self, event: AdapterEvent) {
        log::info!(
            target: "softphone_adapter::events",
            "{} {}: {}",
            event.source,
            event.name,
            with_seq(event.detail, event.seq)
        );
    }
}

/// Tees events into several sinks.
#[derive(Default, Clone)]
pub struct CombinedSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl CombinedSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for CombinedSink {
    fn record(&self, event: AdapterEvent) {
        for sink in &self.sinks {
            sink.record(event.clone());
        }
    }
}

/// Patterns for redacting personal data.
static REDACTION_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (
            r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}",
            "[EMAIL_REDACTED]",
        ),
        // Dialable numbers: optional +, at least 7 digits with separators.
        (r"\+?\d[\d\s().*-]{5,}\d", "[PHONE_REDACTED]"),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| match Regex::new(pattern) {
        Ok(regex) => Some((regex, replacement)),
        Err(e) => {
            log::error!("Invalid redaction pattern {}: {}", pattern, e);
            None
        }
    })
    .collect()
});

fn redact_sensitive(text: &str) -> String {
    REDACTION_PATTERNS
        .iter()
        .fold(text.to_string(), |acc, (pattern, replacement)| {
            pattern.replace_all(&acc, *replacement).into_owned()
        })
}

/// Redact string leaves and object keys only. Numbers such as epoch
/// millisecond timestamps are kept.
fn redact_value(value: Value) -> Value {
    match value {
        Value::String(text) => Value::String(redact_sensitive(&text)),
        Value::Array(items) => Value::Array(items.into_iter().map(redact_value).collect()),
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(key, field)| (redact_sensitive(&key), redact_value(field)))
                .collect(),
        ),
        other => other,
    }
}

/// A buffered, redacted event.
#[derive(Debug, Clone, Serialize)]
pub struct BufferedEvent {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub source: EventSource,
    pub name: String,
    /// Detail rendered as JSON text, redacted.
    pub detail: String,
    #[serde(skip)]
    byte_size: usize,
}

impl BufferedEvent {
    fn from_event(event: AdapterEvent) -> Self {
        let detail = redact_value(event.detail).to_string();
        let byte_size = event.name.len() + detail.len() + 50;
        Self {
            seq: event.seq,
            timestamp: event.timestamp,
            source: event.source,
            name: event.name,
            detail,
            byte_size,
        }
    }

    /// Format as a single line for diagnostics output.
    pub fn format_line(&self) -> String {
        let local_time: DateTime<Local> = self.timestamp.into();
        format!(
            "{} #{} [{}] {}: {}",
            local_time.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.seq,
            self.source,
            self.name,
            self.detail
        )
    }
}

/// Statistics about the event buffer.
#[derive(Debug, Clone, Serialize)]
pub struct BufferStats {
    pub entry_count: usize,
    pub max_entries: usize,
    pub byte_size: usize,
    pub max_bytes: usize,
}

struct BufferInner {
    entries: VecDeque<BufferedEvent>,
    current_bytes: usize,
}

/// Thread-safe ring buffer of recent events.
pub struct EventRingBuffer {
    inner: RwLock<BufferInner>,
    max_entries: usize,
    max_bytes: usize,
}

impl EventRingBuffer {
    pub fn new(max_entries: usize, max_bytes: usize) -> Self {
        Self {
            inner: RwLock::new(BufferInner {
                entries: VecDeque::with_capacity(max_entries.min(1000)),
                current_bytes: 0,
            }),
            max_entries,
            max_bytes,
        }
    }

    /// Buffer bounded by entry count and the default byte limit.
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self::new(max_entries, DEFAULT_MAX_BYTES)
    }

    fn push(&self, entry: BufferedEvent) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        while inner.entries.len() >= self.max_entries
            || (inner.current_bytes + entry.byte_size > self.max_bytes && !inner.entries.is_empty())
        {
            match inner.entries.pop_front() {
                Some(removed) => {
                    inner.current_bytes = inner.current_bytes.saturating_sub(removed.byte_size)
                }
                None => break,
            }
        }

        inner.current_bytes += entry.byte_size;
        inner.entries.push_back(entry);
    }

    pub fn events(&self) -> Vec<BufferedEvent> {
        self.read().entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().entries.is_empty()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.entries.clear();
        inner.current_bytes = 0;
    }

    /// Format all events as a multiline string.
    pub fn format_all(&self) -> String {
        self.read()
            .entries
            .iter()
            .map(BufferedEvent::format_line)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn stats(&self) -> BufferStats {
        let inner = self.read();
        BufferStats {
            entry_count: inner.entries.len(),
            max_entries: self.max_entries,
            byte_size: inner.current_bytes,
            max_bytes: self.max_bytes,
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BufferInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventSink for EventRingBuffer {
    fn record(&self, event: AdapterEvent) {
        self.push(BufferedEvent::from_event(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(name: &str, detail: Value) -> AdapterEvent {
        AdapterEvent::new(EventSource::Adapter, name, detail)
    }

    #[test]
    fn test_events_are_sequenced() {
        let first = event("a", json!({}));
        let second = event("b", json!({}));
        assert!(second.seq > first.seq);
    }

    #[test]
    fn test_phone_redaction() {
        let buffer = EventRingBuffer::new(10, 10_000);
        buffer.record(event("click_to_call", json!({"phoneNumber": "+1 (202) 555-1234"})));

        let entry = &buffer.events()[0];
        assert!(entry.detail.contains("[PHONE_REDACTED]"));
        assert!(!entry.detail.contains("555"));
    }

    #[test]
    fn test_email_redaction() {
        let buffer = EventRingBuffer::new(10, 10_000);
        buffer.record(event("contact", json!({"email": "ann@example.com"})));

        let entry = &buffer.events()[0];
        assert!(entry.detail.contains("[EMAIL_REDACTED]"));
        assert!(!entry.detail.contains("ann@example.com"));
    }

    #[test]
    fn test_short_numbers_not_redacted() {
        let buffer = EventRingBuffer::new(10, 10_000);
        buffer.record(event("summary", json!({"ringing": 2, "onHold": 10})));
        assert!(buffer.events()[0].detail.contains("\"onHold\":10"));
    }

    #[test]
    fn test_numeric_timestamps_not_redacted() {
        let buffer = EventRingBuffer::new(10, 10_000);
        buffer.record(event(
            "calls_updated",
            json!({
                "startTime": 1_700_000_000_123_i64,
                "calls": [{"from": "+12025551234", "startTime": 1_700_000_000_456_i64}],
                "matches": {"+12025551234": []}
            }),
        ));

        let detail = &buffer.events()[0].detail;
        assert!(detail.contains("1700000000123"));
        assert!(detail.contains("1700000000456"));
        assert!(!detail.contains("2025551234"));
        assert_eq!(detail.matches("[PHONE_REDACTED]").count(), 2);
    }

    #[test]
    fn test_eviction_by_count() {
        let buffer = EventRingBuffer::new(3, 1_000_000);
        for i in 0..5 {
            buffer.record(event(&format!("event{}", i), json!(null)));
        }

        let names: Vec<_> = buffer.events().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["event2", "event3", "event4"]);
    }

    #[test]
    fn test_eviction_by_size() {
        let buffer = EventRingBuffer::new(1000, 200);
        for i in 0..10 {
            buffer.record(event("sized", json!({"index": i})));
        }
        assert!(buffer.len() < 10);
        assert!(buffer.stats().byte_size <= 200 + 100);
    }

    #[test]
    fn test_clear_and_format() {
        let buffer = EventRingBuffer::with_max_entries(16);
        buffer.record(AdapterEvent::new(EventSource::Bridge, "registered", json!({"name": "crm"})));

        let formatted = buffer.format_all();
        assert!(formatted.contains("[bridge]"));
        assert!(formatted.contains("registered"));

        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.stats().byte_size, 0);
    }

    #[test]
    fn test_combined_sink_forwards_to_all() {
        let first = Arc::new(EventRingBuffer::with_max_entries(16));
        let second = Arc::new(EventRingBuffer::with_max_entries(16));
        let combined = CombinedSink::new(vec![
            first.clone() as Arc<dyn EventSink>,
            second.clone() as Arc<dyn EventSink>,
            Arc::new(LogEventSink) as Arc<dyn EventSink>,
        ]);

        combined.record(event("route_changed", json!({"path": "/calls"})));

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(first.events()[0].seq, second.events()[0].seq);
    }
}
