//! Contact records returned by the host, and the phone-number search that
//! turns them into searchable entities.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ThirdPartyService;

/// Contact id as sent by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContactId {
    Number(i64),
    String(String),
}

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContactId::Number(id) => write!(f, "{id}"),
            ContactId::String(id) => f.write_str(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneNumber {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A contact owned by the host page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: ContactId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub contact_type: Option<String>,
    #[serde(default)]
    pub phone_numbers: Vec<PhoneNumber>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Contact {
    /// `name`, or first and last name joined by a space.
    pub fn display_name(&self) -> String {
        match self.name.as_deref().filter(|name| !name.is_empty()) {
            Some(name) => name.to_string(),
            None => format!(
                "{} {}",
                self.first_name.as_deref().unwrap_or_default(),
                self.last_name.as_deref().unwrap_or_default()
            ),
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.unwrap_or(false)
    }
}

/// Parse a host page of contacts, skipping entries that are not contacts.
pub fn parse_contacts(items: Vec<Value>) -> Vec<Contact> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Contact>(item) {
            Ok(contact) => Some(contact),
            Err(e) => {
                log::warn!("Skipping malformed contact: {}", e);
                None
            }
        })
        .collect()
}

/// One phone number of a contact, as offered to the contact search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactEntity {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub contact_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_type: Option<String>,
    pub entity_type: String,
}

/// Every phone number whose contact name (case-insensitive) or number
/// contains `search_string`.
pub fn search_contact_phone_numbers(
    contacts: &[Contact],
    search_string: &str,
    entity_type: &str,
) -> Vec<ContactEntity> {
    let search_text = search_string.to_lowercase();
    let mut result = Vec::new();

    for contact in contacts {
        let name = contact.display_name();
        let name_matches = name.to_lowercase().contains(&search_text);
        for phone in &contact.phone_numbers {
            let number_matches = phone
                .phone_number
                .as_deref()
                .is_some_and(|number| number.contains(&search_text));
            if !name_matches && !number_matches {
                continue;
            }
            result.push(ContactEntity {
                id: format!(
                    "{}{}",
                    contact.id,
                    phone.phone_number.as_deref().unwrap_or_default()
                ),
                name: name.clone(),
                contact_type: contact.contact_type.clone(),
                phone_number: phone.phone_number.clone(),
                phone_type: phone
                    .phone_type
                    .as_ref()
                    .map(|phone_type| phone_type.replacen("Phone", "", 1)),
                entity_type: entity_type.to_string(),
            });
        }
    }

    result
}

/// Downstream collaborators that consume the bridge's contacts.
///
/// Each registration hands over a handle to the service; consumers call
/// back into it (`fetch_contacts`, `search_source`, `match_contacts`) when
/// they need data.
pub trait ContactConsumers: Send + Sync {
    /// The service became a contacts source.
    fn add_contact_source(&self, service: ThirdPartyService);
    /// The service can answer contact searches.
    fn add_search_source(&self, service: ThirdPartyService);
    /// The service can match phone numbers to contacts.
    fn add_match_provider(&self, service: ThirdPartyService);
    /// Re-run contact matching.
    fn trigger_match(&self);
}

/// Consumers that ignore every registration.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopContactConsumers;

impl ContactConsumers for NoopContactConsumers {
    fn add_contact_source(&self, service: ThirdPartyService) {
        log::debug!("No contact source consumer for {:?}", service.service_name());
    }

    fn add_search_source(&self, service: ThirdPartyService) {
        log::debug!("No search consumer for {:?}", service.service_name());
    }

    fn add_match_provider(&self, service: ThirdPartyService) {
        log::debug!("No match consumer for {:?}", service.service_name());
    }

    fn trigger_match(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn contacts() -> Vec<Contact> {
        parse_contacts(vec![
            json!({
                "id": 1,
                "name": "Ann Lee",
                "type": "CRM",
                "phoneNumbers": [
                    {"phoneNumber": "+15550001", "phoneType": "directPhone"},
                    {"phoneNumber": "+15550002", "phoneType": "mobile"}
                ]
            }),
            json!({
                "id": "b",
                "firstName": "Bob",
                "lastName": "Stone",
                "phoneNumbers": [{"phoneNumber": "+17770001", "phoneType": "homePhone"}]
            }),
        ])
    }

    #[test]
    fn test_search_by_name_is_case_insensitive() {
        let result = search_contact_phone_numbers(&contacts(), "ANN", "CRM");
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].id, "1+15550001");
        assert_eq!(result[0].name, "Ann Lee");
        assert_eq!(result[0].phone_type.as_deref(), Some("direct"));
        assert_eq!(result[0].entity_type, "CRM");
        assert_eq!(result[1].phone_type.as_deref(), Some("mobile"));
    }

    #[test]
    fn test_search_by_number_only_returns_matching_numbers() {
        let result = search_contact_phone_numbers(&contacts(), "0002", "CRM");
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].phone_number.as_deref(), Some("+15550002"));
    }

    #[test]
    fn test_name_falls_back_to_first_and_last() {
        let result = search_contact_phone_numbers(&contacts(), "bob st", "CRM");
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "b+17770001");
        assert_eq!(result[0].name, "Bob Stone");
        assert_eq!(result[0].phone_type.as_deref(), Some("home"));
    }

    #[test]
    fn test_malformed_contacts_are_skipped() {
        let parsed = parse_contacts(vec![
            json!({"id": 1}),
            json!("not a contact"),
            json!({"name": "no id"}),
            json!({"id": 2, "phoneNumbers": "bad"}),
        ]);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].id, ContactId::Number(1));
        assert!(parsed[0].phone_numbers.is_empty());
    }

    #[test]
    fn test_unknown_contact_fields_survive() {
        let parsed = parse_contacts(vec![json!({"id": "x", "company": "Acme", "deleted": true})]);
        assert_eq!(parsed[0].extra["company"], "Acme");
        assert!(parsed[0].is_deleted());

        let value = serde_json::to_value(&parsed[0]).unwrap();
        assert_eq!(value["company"], "Acme");
    }
}
