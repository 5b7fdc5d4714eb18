//! Process-wide ordering of diagnostics events.

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{json, Value};

static NEXT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Next sequence number; strictly increasing across all sinks.
pub fn next_seq() -> u64 {
    NEXT_SEQ.fetch_add(1, Ordering::Relaxed)
}

/// Attach `seq` to an event detail, wrapping non-object details.
pub fn with_seq(detail: Value, seq: u64) -> Value {
    match detail {
        Value::Object(mut map) => {
            map.insert("seq".to_string(), json!(seq));
            Value::Object(map)
        }
        Value::Null => json!({ "seq": seq }),
        other => json!({
            "seq": seq,
            "data": other
        }),
    }
}
