//! Fuzz test for window message parsing.
//!
//! Every message a page or frame posts is untrusted; the parsers must
//! reject garbage without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use serde_json::Value;
use softphone_adapter::adapter::links::{resolve_click, DomElement};
use softphone_adapter::ipc::messages::{AdapterMessage, ServiceMessage, ServiceRegistration};
use softphone_adapter::ipc::types::ResponseEnvelope;
use softphone_adapter::third_party::contacts::parse_contacts;

fuzz_target!(|data: &[u8]| {
    if let Ok(message) = serde_json::from_slice::<Value>(data) {
        let _ = AdapterMessage::parse(&message);
        let _ = ServiceMessage::parse(&message);
        let _ = ResponseEnvelope::from_message(&message);
        let _ = serde_json::from_value::<ServiceRegistration>(message.clone());
        if let Value::Array(entries) = message {
            let _ = parse_contacts(entries);
        }
    }

    // Treat the input as a link target.
    if let Ok(href) = std::str::from_utf8(data) {
        let _ = resolve_click(&[DomElement::anchor(href)]);
    }
});
