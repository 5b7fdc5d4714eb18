//! Third-party integration bridge.
//!
//! A host page registers itself once with
//! `rc-adapter-register-third-party-service`, announcing which capabilities
//! it serves (contacts, search, matching, activities, conference invites,
//! call logging, authorization) and at which paths. The bridge then calls
//! back into the host through the [`RequestChannel`].
//!
//! Integration is best-effort: every host call catches and logs its own
//! failures and degrades to an empty result.

pub mod contacts;
pub mod state;

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::{json, Value};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use crate::config::BridgeConfig;
use crate::errors::{Classify, FailureReport};
use crate::event_log::{AdapterEvent, EventSink, EventSource, LogEventSink};
use crate::ipc::messages::{non_empty, ServiceMessage, ServiceRegistration};
use crate::ipc::{is_truthy, RequestChannel, RequestError, RequestTimeouts};
use crate::store::Store;
use crate::transport::MessageTransport;

pub use contacts::{
    search_contact_phone_numbers, Contact, ContactConsumers, ContactEntity, ContactId,
    NoopContactConsumers, PhoneNumber,
};
pub use state::{ServiceAction, ServiceState};

/// Host paths recorded at registration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServicePaths {
    pub authorization: Option<String>,
    pub contacts: Option<String>,
    pub contact_search: Option<String>,
    pub contact_match: Option<String>,
    pub activities: Option<String>,
    pub activity: Option<String>,
    pub conference_invite: Option<String>,
    pub call_logger: Option<String>,
}

/// One contacts fetch shared by every concurrent caller.
type ContactsFetch = Shared<BoxFuture<'static, Option<Vec<Contact>>>>;

struct Inner {
    channel: RequestChannel,
    store: Store<ServiceState, ServiceAction>,
    paths: RwLock<ServicePaths>,
    contacts_fetch: Mutex<Option<ContactsFetch>>,
    consumers: Arc<dyn ContactConsumers>,
    events: Arc<dyn EventSink>,
}

/// Handle to the bridge. Clones share the same state.
#[derive(Clone)]
pub struct ThirdPartyService {
    inner: Arc<Inner>,
}

impl ThirdPartyService {
    pub fn new(
        transport: Arc<dyn MessageTransport>,
        timeouts: RequestTimeouts,
        consumers: Arc<dyn ContactConsumers>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                channel: RequestChannel::new(transport, timeouts),
                store: Store::new(ServiceState::default(), state::service_reducer),
                paths: RwLock::new(ServicePaths::default()),
                contacts_fetch: Mutex::new(None),
                consumers,
                events,
            }),
        }
    }

    /// Bridge with no downstream consumers that logs its events.
    pub fn from_config(transport: Arc<dyn MessageTransport>, config: &BridgeConfig) -> Self {
        Self::new(
            transport,
            config.request_timeouts(),
            Arc::new(NoopContactConsumers),
            Arc::new(LogEventSink),
        )
    }

    /// Feed every message of `inbound` into [`Self::handle_message`].
    pub fn listen(&self, mut inbound: broadcast::Receiver<Value>) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            loop {
                match inbound.recv().await {
                    Ok(message) => service.handle_message(&message).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        log::warn!("Bridge listener lagged, skipped {} messages", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            log::debug!("Bridge listener stopped");
        })
    }

    /// Route one inbound window message.
    pub async fn handle_message(&self, message: &Value) {
        if self.inner.channel.handle_message(message).await {
            return;
        }
        match ServiceMessage::parse(message) {
            Ok(ServiceMessage::Register(registration)) => self.register(registration),
            Ok(ServiceMessage::UpdateAuthorizationStatus { authorized }) => {
                self.update_authorization_status(authorized)
            }
            Ok(ServiceMessage::Unrelated) => {}
            Err(e) => log::debug!("Ignoring message: {}", e),
        }
    }

    fn register(&self, service: ServiceRegistration) {
        if let Some(existing) = self.service_name() {
            log::debug!(
                "Service '{}' already registered, ignoring '{}'",
                existing,
                service.name
            );
            return;
        }
        if service.name.is_empty() {
            log::debug!("Ignoring service registration without a name");
            return;
        }

        let accepted = self.inner.store.dispatch(ServiceAction::Register {
            service_name: service.name.clone(),
        });
        if !accepted {
            log::debug!("Lost registration race, ignoring '{}'", service.name);
            return;
        }
        log::info!("Registered third-party service '{}'", service.name);

        if let Some(path) = non_empty(&service.authorization_path) {
            self.update_paths(|paths| paths.authorization = Some(path.to_string()));
            self.dispatch(ServiceAction::RegisterAuthorization {
                authorized: service.initially_authorized(),
                authorized_title: service.authorized_title.clone(),
                unauthorized_title: service.unauthorized_title.clone(),
            });
        }

        if let Some(path) = non_empty(&service.contacts_path) {
            self.update_paths(|paths| paths.contacts = Some(path.to_string()));
            self.inner.consumers.add_contact_source(self.clone());
            self.spawn_fetch_contacts();
        }

        if let Some(path) = non_empty(&service.contact_search_path) {
            self.update_paths(|paths| paths.contact_search = Some(path.to_string()));
            self.inner.consumers.add_search_source(self.clone());
            self.inner.consumers.trigger_match();
        }

        if let Some(path) = non_empty(&service.contact_match_path) {
            self.update_paths(|paths| paths.contact_match = Some(path.to_string()));
            self.inner.consumers.add_match_provider(self.clone());
        }

        if let Some(path) = non_empty(&service.activities_path) {
            self.update_paths(|paths| {
                paths.activities = Some(path.to_string());
                paths.activity = non_empty(&service.activity_path).map(str::to_string);
            });
            self.dispatch(ServiceAction::RegisterActivities);
        }

        if let (Some(title), Some(path)) = (
            non_empty(&service.conference_invite_title),
            non_empty(&service.conference_invite_path),
        ) {
            self.update_paths(|paths| paths.conference_invite = Some(path.to_string()));
            self.dispatch(ServiceAction::RegisterConferenceInvite {
                title: title.to_string(),
            });
        }

        if let Some(path) = non_empty(&service.call_logger_path) {
            self.update_paths(|paths| paths.call_logger = Some(path.to_string()));
            self.dispatch(ServiceAction::RegisterCallLogger {
                title: non_empty(&service.call_logger_title).map(str::to_string),
                show_log_modal: service.show_log_modal.unwrap_or(false),
            });
        }

        self.record(
            "service_registered",
            json!({ "name": service.name, "paths": self.registered_capabilities() }),
        );
    }

    fn update_authorization_status(&self, authorized: bool) {
        if !self.authorization_registered() {
            log::debug!("Authorization status update before authorization was registered");
            return;
        }
        let was_authorized = self.authorized();
        self.dispatch(ServiceAction::UpdateAuthorizationStatus { authorized });
        self.record("authorization_changed", json!({ "authorized": authorized }));

        if !was_authorized && authorized {
            self.spawn_fetch_contacts();
        }
    }

    fn spawn_fetch_contacts(&self) {
        let service = self.clone();
        tokio::spawn(async move {
            service.fetch_contacts().await;
        });
    }

    /// Fetch every page of contacts from the host.
    ///
    /// Concurrent callers share one request chain and receive the same
    /// result. Returns an empty list when no contacts path is registered,
    /// the service is not authorized, or the host call fails.
    pub async fn fetch_contacts(&self) -> Vec<Contact> {
        let Some(path) = self.paths().contacts else {
            return Vec::new();
        };
        if self.is_gated() {
            return Vec::new();
        }

        let (fetch, leader) = {
            let mut slot = self.inner.contacts_fetch.lock().await;
            match slot.as_ref() {
                Some(in_flight) if in_flight.peek().is_none() => (in_flight.clone(), false),
                _ => {
                    let fetch = self.clone().fetch_all_contacts(path).boxed().shared();
                    *slot = Some(fetch.clone());
                    (fetch, true)
                }
            }
        };

        let contacts = fetch.clone().await;

        if leader {
            let mut slot = self.inner.contacts_fetch.lock().await;
            if slot.as_ref().is_some_and(|current| current.ptr_eq(&fetch)) {
                *slot = None;
            }
        }

        contacts.unwrap_or_default()
    }

    /// Alias of [`Self::fetch_contacts`] for contact-source consumers.
    pub async fn sync(&self) -> Vec<Contact> {
        self.fetch_contacts().await
    }

    async fn fetch_all_contacts(self, path: String) -> Option<Vec<Contact>> {
        match self.request_contact_pages(&path).await {
            Ok(contacts) => {
                log::info!("Fetched {} contacts from {}", contacts.len(), path);
                self.record("contacts_fetched", json!({ "count": contacts.len() }));
                self.dispatch(ServiceAction::FetchContactsSuccess {
                    contacts: contacts.clone(),
                    sync_timestamp: Utc::now(),
                });
                Some(contacts)
            }
            Err(e) => {
                self.report_failure(&e, "fetchContacts");
                None
            }
        }
    }

    async fn request_contact_pages(&self, path: &str) -> Result<Vec<Contact>, RequestError> {
        let mut contacts = Vec::new();
        let mut page = json!(1);
        loop {
            let response = self
                .inner
                .channel
                .request(path, json!({ "page": page }))
                .await?;
            let Value::Array(items) = response.data else {
                log::warn!("Contacts page {} from {} is not an array", page, path);
                break;
            };
            contacts.extend(contacts::parse_contacts(items));
            match response.next_page {
                Some(next) if is_truthy(&next) => page = next,
                _ => break,
            }
        }
        Ok(contacts)
    }

    /// Merge changed contacts into the cached list.
    pub fn merge_contacts(&self, changed: Vec<Contact>) {
        self.dispatch(ServiceAction::SyncContactsSuccess {
            contacts: changed,
            sync_timestamp: Utc::now(),
        });
    }

    /// Ask the host for contacts matching `search_string`.
    pub async fn search_contacts(&self, search_string: &str) -> Vec<Contact> {
        let Some(path) = self.paths().contact_search else {
            return Vec::new();
        };
        if self.is_gated() {
            return Vec::new();
        }
        match self
            .inner
            .channel
            .request(&path, json!({ "searchString": search_string }))
            .await
        {
            Ok(response) => match response.data {
                Value::Array(items) => contacts::parse_contacts(items),
                _ => Vec::new(),
            },
            Err(e) => {
                self.report_failure(&e, "searchContacts");
                Vec::new()
            }
        }
    }

    /// Search provider handed to the contact-search consumer.
    pub async fn search_source(&self, search_string: &str) -> Vec<ContactEntity> {
        if search_string.is_empty() || self.is_gated() {
            return Vec::new();
        }
        let contacts = self.search_contacts(search_string).await;
        search_contact_phone_numbers(
            &contacts,
            search_string,
            self.source_name().as_deref().unwrap_or_default(),
        )
    }

    /// Match phone numbers to host contacts.
    ///
    /// Once the host answers, the result holds exactly one entry per input
    /// number.
    pub async fn match_contacts(&self, phone_numbers: &[String]) -> HashMap<String, Vec<Value>> {
        let Some(path) = self.paths().contact_match else {
            return HashMap::new();
        };
        if self.is_gated() {
            return HashMap::new();
        }
        let data = match self
            .inner
            .channel
            .request(&path, json!({ "phoneNumbers": phone_numbers }))
            .await
        {
            Ok(response) => response.data,
            Err(e) => {
                self.report_failure(&e, "matchContacts");
                return HashMap::new();
            }
        };

        phone_numbers
            .iter()
            .map(|number| {
                let matches = data
                    .get(number.as_str())
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                (number.clone(), matches)
            })
            .collect()
    }

    /// Load the host's activities for `contact`.
    pub async fn fetch_activities(&self, contact: Value) {
        let Some(path) = self.paths().activities else {
            return;
        };
        self.dispatch(ServiceAction::LoadActivities);
        match self
            .inner
            .channel
            .request(&path, json!({ "contact": contact }))
            .await
        {
            Ok(response) => {
                let activities = match response.data {
                    Value::Array(items) => items,
                    _ => Vec::new(),
                };
                self.dispatch(ServiceAction::LoadActivitiesSuccess { activities });
            }
            Err(e) => self.report_failure(&e, "fetchActivities"),
        }
    }

    pub async fn open_activity(&self, activity: Value) {
        let path = self.paths().activity;
        self.notify_host(path, json!({ "activity": activity }), "openActivity")
            .await;
    }

    pub async fn invite_conference(&self, conference: Value) {
        let path = self.paths().conference_invite;
        self.notify_host(path, json!({ "conference": conference }), "inviteConference")
            .await;
    }

    /// Hand a call log to the host; `data` is the payload as-is.
    pub async fn log_call(&self, data: Value) {
        let path = self.paths().call_logger;
        self.notify_host(path, data, "logCall").await;
    }

    /// Ask the host to toggle authorization, sending the current state.
    pub async fn authorize_service(&self) {
        let path = self.paths().authorization;
        let authorized = self.inner.store.read(|state| state.authorized);
        self.notify_host(path, json!({ "authorized": authorized }), "authorizeService")
            .await;
    }

    async fn notify_host(&self, path: Option<String>, payload: Value, operation: &str) {
        let Some(path) = path else {
            return;
        };
        if let Err(e) = self.inner.channel.request(&path, payload).await {
            self.report_failure(&e, operation);
        }
    }

    // --- Accessors ---

    pub fn state(&self) -> ServiceState {
        self.inner.store.get()
    }

    /// State snapshots after every change.
    pub fn subscribe(&self) -> broadcast::Receiver<ServiceState> {
        self.inner.store.subscribe()
    }

    pub fn paths(&self) -> ServicePaths {
        self.inner
            .paths
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn service_name(&self) -> Option<String> {
        self.inner.store.read(|state| state.service_name.clone())
    }

    pub fn source_name(&self) -> Option<String> {
        self.service_name()
    }

    pub fn source_ready(&self) -> bool {
        !self.is_gated() && self.inner.store.read(|state| state.source_ready)
    }

    /// Ready check of the search and match providers. Reports ready while
    /// unauthorized so consumers do not wait on a gated source.
    pub fn provider_ready(&self) -> bool {
        self.is_gated() || self.inner.store.read(|state| state.source_ready)
    }

    pub fn authorization_registered(&self) -> bool {
        self.inner.store.read(|state| state.authorized.is_some())
    }

    pub fn authorized(&self) -> bool {
        self.inner
            .store
            .read(|state| state.authorized.unwrap_or(false))
    }

    pub fn authorized_title(&self) -> Option<String> {
        self.inner.store.read(|state| state.authorized_title.clone())
    }

    pub fn unauthorized_title(&self) -> Option<String> {
        self.inner
            .store
            .read(|state| state.unauthorized_title.clone())
    }

    pub fn activities_registered(&self) -> bool {
        !self.is_gated() && self.inner.store.read(|state| state.activities_registered)
    }

    pub fn activities_loaded(&self) -> bool {
        self.inner.store.read(|state| state.activities_loaded)
    }

    pub fn activities(&self) -> Vec<Value> {
        self.inner.store.read(|state| state.activities.clone())
    }

    pub fn conference_invite_title(&self) -> Option<String> {
        self.inner
            .store
            .read(|state| state.conference_invite_title.clone())
    }

    pub fn call_logger_registered(&self) -> bool {
        self.inner.store.read(|state| state.call_logger_registered)
    }

    pub fn call_logger_title(&self) -> Option<String> {
        self.inner.store.read(|state| state.call_logger_title.clone())
    }

    pub fn show_log_modal(&self) -> bool {
        self.inner.store.read(|state| state.show_log_modal)
    }

    pub fn contacts(&self) -> Vec<Contact> {
        self.inner.store.read(|state| state.contacts.clone())
    }

    pub fn contact_sync_timestamp(&self) -> Option<chrono::DateTime<Utc>> {
        self.inner.store.read(|state| state.contact_sync_timestamp)
    }

    /// Number of host requests still waiting for a response.
    pub async fn pending_requests(&self) -> usize {
        self.inner.channel.pending_count().await
    }

    // --- Internals ---

    /// Authorization is registered and not granted.
    fn is_gated(&self) -> bool {
        self.inner
            .store
            .read(|state| state.authorized == Some(false))
    }

    fn dispatch(&self, action: ServiceAction) {
        self.inner.store.dispatch(action);
    }

    fn update_paths(&self, f: impl FnOnce(&mut ServicePaths)) {
        let mut paths = self
            .inner
            .paths
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut paths);
    }

    fn registered_capabilities(&self) -> Vec<&'static str> {
        let paths = self.paths();
        [
            ("authorization", paths.authorization.is_some()),
            ("contacts", paths.contacts.is_some()),
            ("contactSearch", paths.contact_search.is_some()),
            ("contactMatch", paths.contact_match.is_some()),
            ("activities", paths.activities.is_some()),
            ("conferenceInvite", paths.conference_invite.is_some()),
            ("callLogger", paths.call_logger.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, present)| present.then_some(name))
        .collect()
    }

    fn record(&self, name: &str, detail: Value) {
        self.inner
            .events
            .record(AdapterEvent::new(EventSource::Bridge, name, detail));
    }

    fn report_failure<E: Classify + std::fmt::Display>(&self, error: &E, operation: &str) {
        log::warn!("{} failed [{}]: {}", operation, error.kind(), error);
        let report = FailureReport::from_error(error).with_context(operation);
        match serde_json::to_value(&report) {
            Ok(detail) => self.record("integration_failure", detail),
            Err(e) => log::debug!("Failure report not serializable: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::EventRingBuffer;
    use crate::transport::ChannelTransport;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn service() -> (ThirdPartyService, UnboundedReceiver<Value>, Arc<EventRingBuffer>) {
        let (transport, outbound) = ChannelTransport::new();
        let events = Arc::new(EventRingBuffer::with_max_entries(64));
        let service = ThirdPartyService::new(
            Arc::new(transport),
            RequestTimeouts::new(Duration::from_millis(200)),
            Arc::new(NoopContactConsumers),
            events.clone(),
        );
        (service, outbound, events)
    }

    fn register(service: serde_json::Value) -> Value {
        json!({"type": "rc-adapter-register-third-party-service", "service": service})
    }

    #[tokio::test]
    async fn test_registration_records_paths_and_titles() {
        let (service, _outbound, events) = service();
        service
            .handle_message(&register(json!({
                "name": "CRM",
                "activitiesPath": "/activities",
                "activityPath": "/activity",
                "conferenceInvitePath": "/invite",
                "callLoggerPath": "/log",
                "callLoggerTitle": "Log to CRM"
            })))
            .await;

        assert_eq!(service.service_name().as_deref(), Some("CRM"));
        assert!(service.source_ready());
        assert!(service.activities_registered());
        assert!(service.call_logger_registered());
        assert_eq!(service.call_logger_title().as_deref(), Some("Log to CRM"));
        // Conference invite needs both a title and a path.
        assert_eq!(service.conference_invite_title(), None);
        assert_eq!(service.paths().conference_invite, None);
        assert_eq!(service.paths().activity.as_deref(), Some("/activity"));
        assert!(!service.authorization_registered());
        assert!(events.events().iter().any(|e| e.name == "service_registered"));
    }

    #[tokio::test]
    async fn test_nameless_registration_is_ignored() {
        let (service, _outbound, _events) = service();
        service.handle_message(&register(json!({"name": ""}))).await;
        service
            .handle_message(&json!({"type": "rc-adapter-register-third-party-service"}))
            .await;
        assert_eq!(service.service_name(), None);

        service.handle_message(&register(json!({"name": "Late"}))).await;
        assert_eq!(service.service_name().as_deref(), Some("Late"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_registrations_keep_one_service() {
        let (service, _outbound, events) = service();
        let attempts: Vec<_> = (0..16)
            .map(|i| {
                let service = service.clone();
                tokio::spawn(async move {
                    service
                        .handle_message(&register(json!({
                            "name": format!("CRM-{}", i),
                            "callLoggerPath": format!("/log/{}", i)
                        })))
                        .await;
                })
            })
            .collect();
        for attempt in attempts {
            attempt.await.unwrap();
        }

        let name = service.service_name().unwrap();
        let registered: Vec<_> = events
            .events()
            .into_iter()
            .filter(|e| e.name == "service_registered")
            .collect();
        assert_eq!(registered.len(), 1);
        assert!(registered[0].detail.contains(&name));
    }

    #[tokio::test]
    async fn test_operations_without_paths_are_noops() {
        let (service, mut outbound, _events) = service();
        service.handle_message(&register(json!({"name": "Bare"}))).await;

        assert!(service.fetch_contacts().await.is_empty());
        assert!(service.search_contacts("ann").await.is_empty());
        assert!(service.match_contacts(&["+1".to_string()]).await.is_empty());
        service.fetch_activities(json!({"id": 1})).await;
        service.open_activity(json!({})).await;
        service.invite_conference(json!({})).await;
        service.log_call(json!({})).await;
        service.authorize_service().await;

        assert!(outbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_search_source_skips_empty_search() {
        let (service, mut outbound, _events) = service();
        service
            .handle_message(&register(json!({"name": "CRM", "contactSearchPath": "/search"})))
            .await;

        assert!(service.search_source("").await.is_empty());
        assert!(outbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failed_request_is_reported_and_neutralized() {
        let (service, _outbound, events) = service();
        service
            .handle_message(&register(json!({"name": "CRM", "contactMatchPath": "/match"})))
            .await;

        // Nobody answers: the request times out.
        let result = service.match_contacts(&["+15550001".to_string()]).await;
        assert!(result.is_empty());
        assert_eq!(service.pending_requests().await, 0);

        let failure = events
            .events()
            .into_iter()
            .find(|e| e.name == "integration_failure")
            .unwrap();
        assert!(failure.detail.contains("timeout"));
        assert!(failure.detail.contains("matchContacts"));
    }
}
