//! Mapping between backend records and canonical contacts, in both directions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{Contact, ContactDraft, MultiValue, Tag};
use crate::normalize::{normalize, RawField};
use crate::phone;

/// A contact record as the backend serializes it.
///
/// Every field is optional; missing or null fields become empty strings.
/// Scalar fields are read leniently so a mistyped value degrades that one
/// field instead of failing the whole response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BackendContact {
    pub id: Value,
    pub full_name: Value,
    pub email: Option<RawField>,
    pub phone_number: Option<RawField>,
    pub organization: Value,
    pub org_type: Value,
    pub sector: Value,
    pub country: Value,
    pub linkedin: Value,
    pub instagram: Value,
    pub twitter: Value,
}

/// A tag record as the backend serializes it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BackendTag {
    pub id: Value,
    pub name: Value,
}

/// Request body for `/insert` and `/update/:id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactPayload {
    pub full_name: String,
    pub email: MultiValue,
    pub phone_number: MultiValue,
    pub organization: String,
    pub org_type: String,
    pub linkedin: String,
    pub instagram: String,
    pub twitter: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sector: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub country: String,
}

/// Render a backend scalar as a string. The same id always yields the same
/// string, whether the backend sent it as a number or as text.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

pub fn transform(record: BackendContact) -> Contact {
    Contact {
        id: scalar_text(&record.id),
        full_name: scalar_text(&record.full_name),
        email: MultiValue::List(normalize(record.email.as_ref())),
        phone: MultiValue::List(normalize(record.phone_number.as_ref())),
        organization: scalar_text(&record.organization),
        organization_type: scalar_text(&record.org_type),
        sector: scalar_text(&record.sector),
        country: scalar_text(&record.country),
        linkedin: scalar_text(&record.linkedin),
        instagram: scalar_text(&record.instagram),
        x: scalar_text(&record.twitter),
    }
}

pub fn transform_all(records: Vec<BackendContact>) -> Vec<Contact> {
    records.into_iter().map(transform).collect()
}

pub fn transform_tag(record: BackendTag) -> Tag {
    Tag {
        id: scalar_text(&record.id),
        name: scalar_text(&record.name),
    }
}

impl From<&ContactDraft> for ContactPayload {
    /// Phones are canonicalized here, immediately before submission.
    fn from(draft: &ContactDraft) -> Self {
        Self {
            full_name: draft.full_name.trim().to_string(),
            email: draft.email.map_values(|v| v.trim().to_string()),
            phone_number: draft.phone.map_values(phone::to_canonical),
            organization: draft.organization.clone(),
            org_type: draft.organization_type.clone(),
            linkedin: draft.linkedin.clone(),
            instagram: draft.instagram.clone(),
            twitter: draft.x.clone(),
            sector: draft.sector.clone(),
            country: draft.country.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> BackendContact {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_transform_maps_aliases_and_lists() {
        let contact = transform(record(json!({
            "id": 5,
            "full_name": "Jane Doe",
            "org_type": "NGO",
            "twitter": "jdoe",
            "phone_number": "{+11234567890, +19876543210}"
        })));

        assert_eq!(contact.id, "5");
        assert_eq!(contact.full_name, "Jane Doe");
        assert_eq!(contact.organization_type, "NGO");
        assert_eq!(contact.x, "jdoe");
        assert_eq!(
            contact.phone,
            MultiValue::List(vec!["+11234567890".into(), "+19876543210".into()])
        );
    }

    #[test]
    fn test_transform_defaults_missing_fields() {
        let contact = transform(record(json!({ "id": "abc" })));
        assert_eq!(contact.id, "abc");
        assert_eq!(contact.full_name, "");
        assert_eq!(contact.organization, "");
        assert_eq!(contact.sector, "");
        assert_eq!(contact.country, "");
        assert_eq!(contact.email, MultiValue::List(vec![]));
        assert_eq!(contact.phone, MultiValue::List(vec![]));
    }

    #[test]
    fn test_transform_tolerates_nulls() {
        let contact = transform(record(json!({
            "id": 7,
            "full_name": null,
            "email": null,
            "linkedin": null,
            "organization": "OAS"
        })));
        assert_eq!(contact.full_name, "");
        assert_eq!(contact.linkedin, "");
        assert_eq!(contact.organization, "OAS");
    }

    #[test]
    fn test_id_is_stable_across_fetches() {
        let first = transform(record(json!({ "id": 42 })));
        let second = transform(record(json!({ "id": 42 })));
        assert_eq!(first.id, second.id);
        assert_eq!(scalar_text(&json!(42)), scalar_text(&json!("42")));
    }

    #[test]
    fn test_transform_tolerates_mistyped_scalars() {
        let contact = transform(record(json!({
            "id": 8,
            "full_name": 42,
            "organization": null,
            "sector": true,
            "phone_number": [7035551234_u64]
        })));
        assert_eq!(contact.full_name, "42");
        assert_eq!(contact.organization, "");
        assert_eq!(contact.sector, "true");
        assert_eq!(contact.phone, MultiValue::List(vec!["7035551234".into()]));
    }

    #[test]
    fn test_transform_tag() {
        let tag = transform_tag(serde_json::from_value(json!({ "id": 3, "name": "Embassy" })).unwrap());
        assert_eq!(tag, Tag { id: "3".into(), name: "Embassy".into() });
    }

    #[test]
    fn test_payload_canonicalizes_phones_and_keeps_order() {
        let draft = ContactDraft {
            full_name: " Jane Doe ".into(),
            email: MultiValue::List(vec!["b@x.org".into(), "a@x.org".into()]),
            phone: MultiValue::List(vec!["(703) 939-7628".into(), "".into(), "+34 444 48 888".into()]),
            x: "jdoe".into(),
            ..Default::default()
        };
        let payload = ContactPayload::from(&draft);
        assert_eq!(payload.full_name, "Jane Doe");
        assert_eq!(
            payload.email,
            MultiValue::List(vec!["b@x.org".into(), "a@x.org".into()])
        );
        assert_eq!(
            payload.phone_number,
            MultiValue::List(vec!["+17039397628".into(), "+3444448888".into()])
        );
        assert_eq!(payload.twitter, "jdoe");
    }

    #[test]
    fn test_payload_body_shape() {
        let draft = ContactDraft {
            full_name: "Jane".into(),
            phone: MultiValue::Single("703 939 7628".into()),
            ..Default::default()
        };
        let body = serde_json::to_value(ContactPayload::from(&draft)).unwrap();
        assert_eq!(body["phone_number"], json!("+17039397628"));
        assert_eq!(body["linkedin"], json!(""));
        assert!(body.get("sector").is_none());
        assert!(body.get("country").is_none());

        let draft = ContactDraft {
            sector: "Diplomacy".into(),
            ..draft
        };
        let body = serde_json::to_value(ContactPayload::from(&draft)).unwrap();
        assert_eq!(body["sector"], json!("Diplomacy"));
    }
}
