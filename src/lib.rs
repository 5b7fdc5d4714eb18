//! Softphone adapter - widget state machine and host integration bridge.
//!
//! This library holds the protocol and state core of an embeddable
//! softphone widget: the call-bar state machine fed by the softphone frame,
//! the third-party service bridge that calls back into the host page, and
//! the correlated request/response channel both are built on.

pub mod adapter;
pub mod config;
pub mod errors;
pub mod event_log;
pub mod event_seq;
pub mod ipc;
pub mod store;
pub mod third_party;
pub mod transport;

pub use adapter::Adapter;
pub use third_party::ThirdPartyService;

/// Initialize `env_logger` with an `info` default filter.
///
/// Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
