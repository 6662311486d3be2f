//! Directory backend abstraction and its HTTP implementation.
//!
//! This module provides:
//! - `Backend` trait for the REST backend the directory talks to
//! - `HttpBackend` implementation using reqwest
//! - `SearchPage`, one server-paginated slice of contacts

pub mod http;

use crate::error::ApiError;
use crate::model::{Contact, Tag, TagKind};
use crate::transform::ContactPayload;

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    /// Contacts on this page, already normalized
    pub contacts: Vec<Contact>,
    /// Total number of matches across all pages
    pub total: u64,
}

/// Trait for directory backend implementations
#[allow(async_fn_in_trait)]
pub trait Backend {
    /// Paginated, filtered listing. `query` comes from the query builder.
    async fn search(&self, query: &str) -> Result<SearchPage, ApiError>;

    /// Unpaginated listing of every contact
    async fn list_all(&self) -> Result<Vec<Contact>, ApiError>;

    /// Fetch a single contact by id
    async fn get(&self, id: &str) -> Result<Contact, ApiError>;

    /// Create a contact; the backend assigns the id.
    /// Returns the backend's confirmation message
    async fn create(&self, payload: &ContactPayload) -> Result<String, ApiError>;

    /// Replace every field of an existing contact
    async fn update(&self, id: &str, payload: &ContactPayload) -> Result<String, ApiError>;

    async fn delete(&self, id: &str) -> Result<String, ApiError>;

    async fn list_tags(&self, kind: TagKind) -> Result<Vec<Tag>, ApiError>;

    async fn add_tag(&self, kind: TagKind, name: &str) -> Result<String, ApiError>;

    async fn delete_tag(&self, kind: TagKind, id: &str) -> Result<String, ApiError>;
}
