//! Client-side filter and free-text search over an already fetched page.
//!
//! This narrows within the current page only; server-side filters narrow
//! across pages through the query string. Both tiers run, one after the
//! other.

use crate::model::{Contact, ContactField};
use crate::query::FilterMap;

/// Normalize a string for matching.
pub fn normalize(s: &str) -> String {
    s.to_lowercase()
}

/// `None` when the query imposes no constraint.
pub fn normalize_query(query: &str) -> Option<String> {
    if query.is_empty() {
        None
    } else {
        Some(normalize(query))
    }
}

/// True when every active filter value is a case-insensitive substring of the
/// corresponding contact field.
pub fn matches_filters(contact: &Contact, filters: &FilterMap) -> bool {
    filters.active().all(|(field, value)| {
        normalize(&contact.field_text(field)).contains(&normalize(value))
    })
}

/// True when the already-normalized query occurs in any searchable field.
pub fn matches_search(contact: &Contact, normalized_query: &str) -> bool {
    ContactField::SEARCHABLE
        .iter()
        .any(|field| normalize(&contact.field_text(*field)).contains(normalized_query))
}

pub fn apply_filters<'a>(contacts: &'a [Contact], filters: &FilterMap) -> Vec<&'a Contact> {
    contacts
        .iter()
        .filter(|contact| matches_filters(contact, filters))
        .collect()
}

pub fn apply_search<'a>(contacts: Vec<&'a Contact>, query: &str) -> Vec<&'a Contact> {
    match normalize_query(query) {
        None => contacts,
        Some(needle) => contacts
            .into_iter()
            .filter(|contact| matches_search(contact, &needle))
            .collect(),
    }
}

/// Filter pass, then search pass over the survivors.
pub fn apply<'a>(contacts: &'a [Contact], filters: &FilterMap, query: &str) -> Vec<&'a Contact> {
    apply_search(apply_filters(contacts, filters), query)
}
