//! Floating softphone widget.
//!
//! The [`Adapter`] consumes notifications from the embedded softphone frame,
//! keeps the call bar summary and widget geometry, and forwards user
//! intents back into the frame as [`AdapterCommand`]s.

pub mod calls;
pub mod links;
pub mod notification;
pub mod widget;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::config::{AdapterOptions, ConfigError};
use crate::errors::FailureReport;
use crate::event_log::{AdapterEvent, EventSink, EventSource, LogEventSink};
use crate::ipc::messages::{AdapterCommand, AdapterMessage, AdapterStatePush, LocalePush};
use crate::transport::MessageTransport;

use calls::{reduce_calls, CallEvent, CallRecord, CallState, CallSummary};
use links::{resolve_click, DomElement, LinkIntent};
use notification::{DesktopNotification, LogNotifier, Notifier};
use widget::{calls_label, DragRelease, RouteFlags, WidgetState, WidgetView};

/// What the embedder should do with the intercepted click.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClickOutcome {
    pub prevent_default: bool,
}

/// Widget state machine.
pub struct Adapter {
    options: AdapterOptions,
    transport: Arc<dyn MessageTransport>,
    notifier: Option<Arc<dyn Notifier>>,
    events: Arc<dyn EventSink>,
    widget: WidgetState,
    calls: CallState,
    summary: CallSummary,
    logged_in: Option<bool>,
    locale: Option<String>,
    strings: HashMap<String, String>,
}

impl Adapter {
    pub fn new(
        options: AdapterOptions,
        transport: Arc<dyn MessageTransport>,
    ) -> Result<Self, ConfigError> {
        options.validate()?;

        let notifier: Option<Arc<dyn Notifier>> = if options.enable_notification {
            Some(Arc::new(LogNotifier))
        } else {
            None
        };
        let widget = WidgetState::new(
            options.default_direction,
            options.new_adapter_ui,
            options.z_index,
        );

        Ok(Self {
            options,
            transport,
            notifier,
            events: Arc::new(LogEventSink),
            widget,
            calls: CallState::default(),
            summary: CallSummary::default(),
            logged_in: None,
            locale: None,
            strings: HashMap::new(),
        })
    }

    /// Replace the notification backend. Only used when notifications are
    /// enabled in the options.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        if self.options.enable_notification {
            self.notifier = Some(notifier);
        }
        self
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Id of the embedded frame, when an app URL is configured.
    pub fn frame_id(&self) -> Option<String> {
        self.options
            .app_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .map(|_| format!("{}-adapter-frame", self.options.prefix))
    }

    /// Handle one inbound window message. Malformed messages are logged and
    /// dropped.
    pub fn handle_message(&mut self, message: &Value) {
        if message.is_null() {
            return;
        }
        let parsed = match AdapterMessage::parse(message) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("Ignoring malformed widget message: {}", e);
                if let Ok(detail) = serde_json::to_value(FailureReport::from_error(&e)) {
                    self.record("protocol_error", detail);
                }
                return;
            }
        };

        match parsed {
            AdapterMessage::Call { event, call } => self.on_call(event, call),
            AdapterMessage::RouteChanged { path } => {
                log::info!("rc-route-changed-notify: {}", path);
                self.record("route_changed", json!({ "path": path }));
                self.widget.current_path = path;
            }
            AdapterMessage::LoginStatus { logged_in } => {
                log::info!("rc-login-status-notify: {}", logged_in);
                self.logged_in = Some(logged_in);
            }
            AdapterMessage::ActiveCall { call } => log::info!("rc-active-call-notify: {}", call),
            AdapterMessage::RingoutCall { call } => log::info!("rc-ringout-call-notify: {}", call),
            AdapterMessage::InboundMessage { message_id } => {
                log::info!("rc-inbound-message-notify: {:?}", message_id)
            }
            AdapterMessage::MessageUpdated { message_id } => {
                log::info!("rc-message-updated-notify: {:?}", message_id)
            }
            AdapterMessage::PushAdapterState(state) => self.on_push_adapter_state(state),
            AdapterMessage::PushPresence(presence) => {
                self.widget.user_status = presence.user_status;
                self.widget.dnd_status = presence.dnd_status;
            }
            AdapterMessage::PushLocale(locale) => self.on_push_locale(locale),
            AdapterMessage::Unknown { message_type } => {
                log::debug!("Unhandled widget message type: {}", message_type)
            }
        }
    }

    fn on_call(&mut self, event: CallEvent, call: CallRecord) {
        log::info!("{:?} call: {}", event, call.id);
        if event == CallEvent::Ring {
            self.set_minimized(false);
            if let Some(notifier) = &self.notifier {
                notifier.notify(&DesktopNotification::incoming_call(&call));
            }
        }
        self.calls = reduce_calls(&self.calls, event, call);
        self.summary = self.calls.summary();
        self.record(
            "calls_updated",
            json!({
                "event": event,
                "summary": self.summary,
                "current": self.calls.current_call().map(|c| c.id.clone()),
            }),
        );
    }

    fn on_push_adapter_state(&mut self, state: AdapterStatePush) {
        if let Some(minimized) = state.minimized {
            self.widget.minimized = minimized;
        }
        if let Some(closed) = state.closed {
            self.widget.closed = closed;
        }
        if let Some(ringing) = state.ringing {
            self.widget.ringing = ringing;
        }
        self.widget.user_status = state.user_status;
        self.widget.dnd_status = state.dnd_status;
        self.widget.loading = false;
    }

    fn on_push_locale(&mut self, locale: LocalePush) {
        self.locale = locale.locale;
        self.strings = locale.strings;
    }

    /// Handle a document click. `path` is the clicked element followed by
    /// its ancestors.
    pub fn handle_click(&mut self, path: &[DomElement]) -> ClickOutcome {
        match resolve_click(path) {
            Some(LinkIntent::Call { phone_number }) => {
                self.click_to_call(&phone_number, true);
                ClickOutcome {
                    prevent_default: true,
                }
            }
            Some(LinkIntent::Sms { phone_number, text }) => {
                self.click_to_sms(&phone_number, text.as_deref());
                ClickOutcome {
                    prevent_default: true,
                }
            }
            None => ClickOutcome::default(),
        }
    }

    // --- Outbound intents ---

    pub fn goto_presence(&self) {
        self.post(AdapterCommand::GotoPresence {
            version: self.options.version.clone(),
        });
    }

    pub fn set_environment(&self) {
        self.post(AdapterCommand::SetEnvironment);
    }

    pub fn click_to_sms(&mut self, phone_number: &str, text: Option<&str>) {
        self.set_minimized(false);
        self.post(AdapterCommand::NewSms {
            phone_number: phone_number.to_string(),
            text: text.map(str::to_string),
        });
    }

    pub fn click_to_call(&mut self, phone_number: &str, to_call: bool) {
        self.set_minimized(false);
        self.post(AdapterCommand::NewCall {
            phone_number: phone_number.to_string(),
            to_call,
        });
    }

    pub fn control_call(&self, action: &str, call_id: &str) {
        self.post(AdapterCommand::ControlCall {
            call_action: action.to_string(),
            call_id: call_id.to_string(),
        });
    }

    pub fn logout_user(&self) {
        self.post(AdapterCommand::Logout);
    }

    /// A presence entry of the dropdown was picked.
    pub fn set_presence(&self, presence_type: &str) {
        self.post(AdapterCommand::PresenceItemClicked {
            presence_type: presence_type.to_string(),
        });
    }

    fn post(&self, command: AdapterCommand) {
        let message_type = command.message_type();
        let message = match serde_json::to_value(&command) {
            Ok(message) => message,
            Err(e) => {
                log::error!("Failed to encode {}: {}", message_type, e);
                return;
            }
        };
        if let Err(e) = self.transport.post_message(message) {
            log::warn!("Failed to post {}: {}", message_type, e);
            if let Ok(detail) =
                serde_json::to_value(FailureReport::from_error(&e).with_context(message_type))
            {
                self.record("transport_error", detail);
            }
        }
    }

    // --- Widget geometry ---

    /// Minimize or restore; the frame is told only when the value changes.
    pub fn set_minimized(&mut self, minimized: bool) {
        if self.widget.minimized == minimized {
            return;
        }
        self.widget.minimized = minimized;
        self.post(AdapterCommand::SyncMinimized { minimized });
    }

    pub fn toggle_minimized(&mut self) {
        self.set_minimized(!self.widget.minimized);
    }

    pub fn set_closed(&mut self, closed: bool) {
        self.widget.closed = closed;
    }

    pub fn set_ringing(&mut self, ringing: bool) {
        self.widget.ringing = ringing;
    }

    pub fn set_hover(&mut self, hover: bool) {
        self.widget.hover = hover;
    }

    pub fn set_header_hover(&mut self, hover: bool) {
        self.widget.hover_header = hover;
    }

    pub fn begin_drag(&mut self, x: i32, y: i32) {
        self.widget.begin_drag(x, y);
    }

    pub fn drag_to(&mut self, x: i32, y: i32) {
        self.widget.drag_to(x, y);
    }

    /// Finish a header gesture. A release without movement is a header
    /// click, which restores a minimized widget.
    pub fn end_drag(&mut self) -> DragRelease {
        let release = self.widget.end_drag();
        if release == DragRelease::Click && self.widget.minimized {
            self.toggle_minimized();
        }
        release
    }

    // --- Projection ---

    pub fn view(&self) -> WidgetView {
        let current = self.calls.current_call();
        WidgetView {
            main_class: self.widget.main_class(),
            header_class: self.widget.header_class(),
            icon_container_class: self.widget.icon_container_class(),
            position_style: self.widget.position_style(),
            route: RouteFlags::compute(&self.widget.current_path, current.is_some(), &self.summary),
            show_duration: current.is_some(),
            current_start_time: self.calls.current_start_time(),
            ringing_calls_label: calls_label(&self.strings, "ringCallsInfo", self.summary.ringing),
            on_hold_calls_label: calls_label(&self.strings, "onHoldCallsInfo", self.summary.on_hold),
            summary: self.summary,
            frame_id: self.frame_id(),
        }
    }

    pub fn calls(&self) -> &CallState {
        &self.calls
    }

    pub fn current_call(&self) -> Option<&CallRecord> {
        self.calls.current_call()
    }

    pub fn summary(&self) -> CallSummary {
        self.summary
    }

    pub fn widget(&self) -> &WidgetState {
        &self.widget
    }

    pub fn current_path(&self) -> &str {
        &self.widget.current_path
    }

    pub fn logged_in(&self) -> Option<bool> {
        self.logged_in
    }

    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }

    fn record(&self, name: &str, detail: Value) {
        self.events
            .record(AdapterEvent::new(EventSource::Adapter, name, detail));
    }
}
