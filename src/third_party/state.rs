//! Bridge state and its reducer.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::contacts::{Contact, ContactId};

/// Everything the bridge knows about the registered host service.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceState {
    /// Set once by the accepted registration.
    pub service_name: Option<String>,
    pub source_ready: bool,
    /// `None` while no authorization capability is registered.
    pub authorized: Option<bool>,
    pub authorized_title: Option<String>,
    pub unauthorized_title: Option<String>,
    pub activities_registered: bool,
    pub activities_loaded: bool,
    pub activities: Vec<Value>,
    pub call_logger_registered: bool,
    pub call_logger_title: Option<String>,
    pub show_log_modal: bool,
    pub conference_invite_title: Option<String>,
    pub contacts: Vec<Contact>,
    pub contact_sync_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub enum ServiceAction {
    Register {
        service_name: String,
    },
    RegisterAuthorization {
        authorized: bool,
        authorized_title: Option<String>,
        unauthorized_title: Option<String>,
    },
    UpdateAuthorizationStatus {
        authorized: bool,
    },
    RegisterActivities,
    LoadActivities,
    LoadActivitiesSuccess {
        activities: Vec<Value>,
    },
    RegisterConferenceInvite {
        title: String,
    },
    RegisterCallLogger {
        title: Option<String>,
        show_log_modal: bool,
    },
    /// Full contact list replaced.
    FetchContactsSuccess {
        contacts: Vec<Contact>,
        sync_timestamp: DateTime<Utc>,
    },
    /// Changed contacts merged in; deleted ones dropped.
    SyncContactsSuccess {
        contacts: Vec<Contact>,
        sync_timestamp: DateTime<Utc>,
    },
}

pub fn service_reducer(state: &ServiceState, action: ServiceAction) -> ServiceState {
    let mut next = state.clone();
    match action {
        // A service registers once; later registrations leave the state unchanged.
        ServiceAction::Register { service_name } => {
            if next.service_name.is_none() {
                next.service_name = Some(service_name);
                next.source_ready = true;
            }
        }
        ServiceAction::RegisterAuthorization {
            authorized,
            authorized_title,
            unauthorized_title,
        } => {
            next.authorized = Some(authorized);
            next.authorized_title = authorized_title;
            next.unauthorized_title = unauthorized_title;
        }
        ServiceAction::UpdateAuthorizationStatus { authorized } => {
            next.authorized = Some(authorized);
        }
        ServiceAction::RegisterActivities => next.activities_registered = true,
        ServiceAction::LoadActivities => {
            next.activities_loaded = false;
            next.activities = Vec::new();
        }
        ServiceAction::LoadActivitiesSuccess { activities } => {
            next.activities_loaded = true;
            next.activities = activities;
        }
        ServiceAction::RegisterConferenceInvite { title } => {
            next.conference_invite_title = Some(title);
        }
        ServiceAction::RegisterCallLogger {
            title,
            show_log_modal,
        } => {
            next.call_logger_registered = true;
            if title.is_some() {
                next.call_logger_title = title;
            }
            next.show_log_modal = show_log_modal;
        }
        ServiceAction::FetchContactsSuccess {
            contacts,
            sync_timestamp,
        } => {
            next.contacts = contacts;
            next.contact_sync_timestamp = Some(sync_timestamp);
        }
        ServiceAction::SyncContactsSuccess {
            contacts,
            sync_timestamp,
        } => {
            let changed: HashSet<&ContactId> = contacts.iter().map(|c| &c.id).collect();
            next.contacts.retain(|c| !changed.contains(&c.id));
            next.contacts
                .extend(contacts.iter().filter(|c| !c.is_deleted()).cloned());
            next.contact_sync_timestamp = Some(sync_timestamp);
        }
    }
    next
}
