//! Canonical contact and tag types shared by every layer of the client.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::normalize::flatten;

/// A contact field that may hold a single value or an ordered list of values.
///
/// Serialized as a JSON string or a JSON array respectively, which is the
/// shape the backend accepts for `email` and `phone_number`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MultiValue {
    Single(String),
    List(Vec<String>),
}

impl Default for MultiValue {
    fn default() -> Self {
        MultiValue::Single(String::new())
    }
}

impl MultiValue {
    /// Build from user-supplied values: none is empty, one is a scalar,
    /// several keep their order as a list.
    pub fn from_values(mut values: Vec<String>) -> Self {
        match values.len() {
            0 => MultiValue::default(),
            1 => MultiValue::Single(values.remove(0)),
            _ => MultiValue::List(values),
        }
    }

    /// Non-empty values in order.
    pub fn values(&self) -> Vec<&str> {
        match self {
            MultiValue::Single(value) if value.is_empty() => Vec::new(),
            MultiValue::Single(value) => vec![value.as_str()],
            MultiValue::List(values) => values
                .iter()
                .map(String::as_str)
                .filter(|v| !v.is_empty())
                .collect(),
        }
    }

    /// Text form used for matching and export: lists joined with `", "`.
    pub fn joined(&self) -> String {
        match self {
            MultiValue::Single(value) => value.clone(),
            MultiValue::List(values) => values.join(", "),
        }
    }

    /// Apply `f` to every value, keeping the scalar/list shape. List entries
    /// that map to an empty string are dropped.
    pub fn map_values(&self, f: impl Fn(&str) -> String) -> MultiValue {
        match self {
            MultiValue::Single(value) => MultiValue::Single(f(value)),
            MultiValue::List(values) => MultiValue::List(
                values
                    .iter()
                    .map(|v| f(v))
                    .filter(|v| !v.is_empty())
                    .collect(),
            ),
        }
    }
}

/// A contact as the rest of the client sees it, after normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: String,
    pub full_name: String,
    pub email: MultiValue,
    pub phone: MultiValue,
    pub organization: String,
    pub organization_type: String,
    pub sector: String,
    pub country: String,
    pub linkedin: String,
    pub instagram: String,
    pub x: String,
}

impl Contact {
    /// Text value of `field`; list-valued fields are joined with `", "`.
    pub fn field_text(&self, field: ContactField) -> String {
        match field {
            ContactField::FullName => self.full_name.clone(),
            ContactField::Email => self.email.joined(),
            ContactField::Phone => self.phone.joined(),
            ContactField::Organization => self.organization.clone(),
            ContactField::OrganizationType => self.organization_type.clone(),
            ContactField::Sector => self.sector.clone(),
            ContactField::Country => self.country.clone(),
            ContactField::Linkedin => self.linkedin.clone(),
            ContactField::Instagram => self.instagram.clone(),
            ContactField::X => self.x.clone(),
        }
    }

    /// Name this contact references in the given tag set.
    pub fn tag_name(&self, kind: TagKind) -> &str {
        match kind {
            TagKind::Organization => &self.organization,
            TagKind::OrganizationType => &self.organization_type,
            TagKind::Sector => &self.sector,
        }
    }
}

/// Everything about a contact except its backend-assigned id. Used for
/// create and full-record update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactDraft {
    pub full_name: String,
    pub email: MultiValue,
    pub phone: MultiValue,
    pub organization: String,
    pub organization_type: String,
    pub sector: String,
    pub country: String,
    pub linkedin: String,
    pub instagram: String,
    pub x: String,
}

impl ContactDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.full_name.trim().is_empty() {
            return Err(ValidationError::MissingField("full name"));
        }
        Ok(())
    }
}

impl From<&Contact> for ContactDraft {
    /// Single-element lists become scalars again, so a contact with one
    /// address is submitted the way it was entered.
    fn from(contact: &Contact) -> Self {
        let owned = |value: &MultiValue| -> Vec<String> {
            value.values().into_iter().map(str::to_string).collect()
        };
        Self {
            full_name: contact.full_name.clone(),
            email: flatten(owned(&contact.email)),
            phone: flatten(owned(&contact.phone)),
            organization: contact.organization.clone(),
            organization_type: contact.organization_type.clone(),
            sector: contact.sector.clone(),
            country: contact.country.clone(),
            linkedin: contact.linkedin.clone(),
            instagram: contact.instagram.clone(),
            x: contact.x.clone(),
        }
    }
}

/// Contact fields that can be filtered on. The key strings are shared by
/// the client-side filter and the `/search` query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContactField {
    FullName,
    Email,
    Phone,
    Organization,
    OrganizationType,
    Sector,
    Country,
    Linkedin,
    Instagram,
    X,
}

impl ContactField {
    pub const ALL: [ContactField; 10] = [
        ContactField::FullName,
        ContactField::Email,
        ContactField::Phone,
        ContactField::Organization,
        ContactField::OrganizationType,
        ContactField::Sector,
        ContactField::Country,
        ContactField::Linkedin,
        ContactField::Instagram,
        ContactField::X,
    ];

    /// Fields consulted by free-text search. Sector and country are
    /// filter-only.
    pub const SEARCHABLE: [ContactField; 8] = [
        ContactField::FullName,
        ContactField::Email,
        ContactField::Phone,
        ContactField::Organization,
        ContactField::OrganizationType,
        ContactField::Linkedin,
        ContactField::Instagram,
        ContactField::X,
    ];

    pub fn key(self) -> &'static str {
        match self {
            ContactField::FullName => "fullName",
            ContactField::Email => "email",
            ContactField::Phone => "phone",
            ContactField::Organization => "organization",
            ContactField::OrganizationType => "organizationType",
            ContactField::Sector => "sector",
            ContactField::Country => "country",
            ContactField::Linkedin => "linkedin",
            ContactField::Instagram => "instagram",
            ContactField::X => "x",
        }
    }
}

impl fmt::Display for ContactField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ContactField {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        ContactField::ALL
            .into_iter()
            .find(|field| field.key().eq_ignore_ascii_case(trimmed))
            .or(match trimmed.to_ascii_lowercase().as_str() {
                "full_name" | "name" => Some(ContactField::FullName),
                "organization_type" | "org_type" | "type" => Some(ContactField::OrganizationType),
                "phone_number" => Some(ContactField::Phone),
                "twitter" => Some(ContactField::X),
                _ => None,
            })
            .ok_or_else(|| ValidationError::UnknownField(trimmed.to_string()))
    }
}

/// A labeled tag referenced from contacts by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
}

/// The three tag sets the directory manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    Organization,
    OrganizationType,
    Sector,
}

impl TagKind {
    pub const ALL: [TagKind; 3] = [
        TagKind::Organization,
        TagKind::OrganizationType,
        TagKind::Sector,
    ];

    pub fn title(self) -> &'static str {
        match self {
            TagKind::Organization => "Organizations",
            TagKind::OrganizationType => "Organization Types",
            TagKind::Sector => "Sectors",
        }
    }

    pub fn list_path(self) -> &'static str {
        match self {
            TagKind::Organization => "get_organizations",
            TagKind::OrganizationType => "get_organization_types",
            TagKind::Sector => "get_sectors",
        }
    }

    pub fn add_path(self) -> &'static str {
        match self {
            TagKind::Organization => "add_organization",
            TagKind::OrganizationType => "add_organization_type",
            TagKind::Sector => "add_sector",
        }
    }

    pub fn delete_path(self) -> &'static str {
        match self {
            TagKind::Organization => "delete_organization",
            TagKind::OrganizationType => "delete_organization_type",
            TagKind::Sector => "delete_sector",
        }
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}
