//! Directory state: the current view, a response cache, and mutations that
//! invalidate and refetch what they touch.
//!
//! Cached responses are keyed by what was asked for: a contacts page by its
//! query string, a tag set by its kind. The last response for a key replaces
//! whatever was there. After a successful mutation the affected keys are
//! dropped and refetched; until that refetch lands callers may see the old
//! data.

use std::collections::HashMap;

use tracing::{debug, error, warn};

use crate::error::{ApiError, LoadError, MutationError, Resource, ValidationError};
use crate::model::{Contact, ContactDraft, Tag, TagKind};
use crate::query::ViewState;
use crate::remote::{Backend, SearchPage};
use crate::search;
use crate::transform::ContactPayload;

/// Cache key for a stored response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    ContactsPage(String),
    Tags(TagKind),
}

/// A contact that names a tag missing from the loaded tag set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingReference<'a> {
    pub contact: &'a Contact,
    pub kind: TagKind,
    pub name: &'a str,
}

pub struct Directory<B> {
    backend: B,
    view: ViewState,
    pages: HashMap<String, SearchPage>,
    tags: HashMap<TagKind, Vec<Tag>>,
}

impl<B: Backend> Directory<B> {
    pub fn new(backend: B, view: ViewState) -> Self {
        Self {
            backend,
            view,
            pages: HashMap::new(),
            tags: HashMap::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    /// Mutable view state. Filter and search changes reset the page, so the
    /// next `load` always fetches a page consistent with them.
    pub fn view_mut(&mut self) -> &mut ViewState {
        &mut self.view
    }

    /// Fetch everything the current view needs that is not already cached:
    /// the contacts page and all three tag sets. Failures are collapsed into
    /// one error.
    pub async fn load(&mut self) -> Result<(), LoadError> {
        let mut failures = Vec::new();

        let query = self.view.query_string();
        if !self.pages.contains_key(&query) {
            if let Err(err) = self.fetch_page(query).await {
                failures.push((Resource::Contacts, err));
            }
        }

        for kind in TagKind::ALL {
            if !self.tags.contains_key(&kind) {
                if let Err(err) = self.fetch_tags(kind).await {
                    failures.push((tag_resource(kind), err));
                }
            }
        }

        LoadError::collect(failures)
    }

    /// Drop every cached response and load again from scratch.
    pub async fn reload(&mut self) -> Result<(), LoadError> {
        self.pages.clear();
        self.tags.clear();
        self.load().await
    }

    async fn fetch_page(&mut self, query: String) -> Result<(), ApiError> {
        let page = self.backend.search(&query).await?;
        debug!(%query, count = page.contacts.len(), total = page.total, "cached contacts page");
        self.pages.insert(query, page);
        Ok(())
    }

    async fn fetch_tags(&mut self, kind: TagKind) -> Result<(), ApiError> {
        let tags = self.backend.list_tags(kind).await?;
        debug!(kind = %kind, count = tags.len(), "cached tag set");
        self.tags.insert(kind, tags);
        Ok(())
    }

    /// The cached page for the current view, if loaded.
    pub fn page(&self) -> Option<&SearchPage> {
        self.pages.get(&self.view.query_string())
    }

    pub fn tags(&self, kind: TagKind) -> &[Tag] {
        self.tags.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// One tag set, fetched only if it is not cached.
    pub async fn load_tags(&mut self, kind: TagKind) -> Result<&[Tag], ApiError> {
        if !self.tags.contains_key(&kind) {
            self.fetch_tags(kind).await?;
        }
        Ok(self.tags(kind))
    }

    /// Contacts on the current page that survive the client-side filter and
    /// search passes.
    pub fn displayed(&self) -> Vec<&Contact> {
        match self.page() {
            Some(page) => search::apply(&page.contacts, self.view.filters(), self.view.search()),
            None => Vec::new(),
        }
    }

    /// Contacts on the current page naming a tag that is not in its loaded
    /// tag set. Tag sets that are not loaded are skipped.
    pub fn dangling_references(&self) -> Vec<DanglingReference<'_>> {
        let Some(page) = self.page() else {
            return Vec::new();
        };
        let mut found = Vec::new();
        for contact in &page.contacts {
            for kind in TagKind::ALL {
                let Some(tags) = self.tags.get(&kind) else {
                    continue;
                };
                let name = contact.tag_name(kind);
                if !name.is_empty() && !tags.iter().any(|tag| tag.name == name) {
                    found.push(DanglingReference { contact, kind, name });
                }
            }
        }
        found
    }

    pub fn invalidate(&mut self, key: &CacheKey) {
        debug!(?key, "invalidating cache entry");
        match key {
            CacheKey::ContactsPage(query) => {
                self.pages.remove(query);
            }
            CacheKey::Tags(kind) => {
                self.tags.remove(kind);
            }
        }
    }

    /// Drop every cached contacts page; any of them may contain the contact
    /// that just changed.
    fn invalidate_contacts(&mut self) {
        let keys: Vec<CacheKey> = self.pages.keys().cloned().map(CacheKey::ContactsPage).collect();
        for key in &keys {
            self.invalidate(key);
        }
    }

    /// Refetch the current contacts page after a mutation. A failure here is
    /// not the mutation's failure; the next `load` retries it.
    async fn revalidate_contacts(&mut self) {
        let query = self.view.query_string();
        if let Err(err) = self.fetch_page(query).await {
            warn!(error = %err, "failed to refresh contacts after change");
        }
    }

    async fn revalidate_tags(&mut self, kind: TagKind) {
        self.invalidate(&CacheKey::Tags(kind));
        if let Err(err) = self.fetch_tags(kind).await {
            warn!(kind = %kind, error = %err, "failed to refresh tags after change");
        }
    }

    /// Fetch one contact directly from the backend, bypassing the cache.
    pub async fn contact(&self, id: &str) -> Result<Contact, ApiError> {
        self.backend.get(id).await
    }

    pub async fn add_contact(&mut self, draft: &ContactDraft) -> Result<String, MutationError> {
        draft.validate()?;
        let payload = ContactPayload::from(draft);
        let message = self.backend.create(&payload).await.map_err(|err| {
            error!(error = %err, "failed to add contact");
            err
        })?;
        self.invalidate_contacts();
        self.revalidate_contacts().await;
        Ok(message)
    }

    /// Replace every field of contact `id` with `draft`.
    pub async fn update_contact(&mut self, id: &str, draft: &ContactDraft) -> Result<String, MutationError> {
        draft.validate()?;
        let payload = ContactPayload::from(draft);
        let message = self.backend.update(id, &payload).await.map_err(|err| {
            error!(id, error = %err, "failed to update contact");
            err
        })?;
        self.invalidate_contacts();
        self.revalidate_contacts().await;
        Ok(message)
    }

    pub async fn delete_contact(&mut self, id: &str) -> Result<String, MutationError> {
        let message = self.backend.delete(id).await.map_err(|err| {
            error!(id, error = %err, "failed to delete contact");
            err
        })?;
        self.invalidate_contacts();
        self.revalidate_contacts().await;
        Ok(message)
    }

    pub async fn add_tag(&mut self, kind: TagKind, name: &str) -> Result<String, MutationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::MissingField("name").into());
        }
        let message = self.backend.add_tag(kind, name).await.map_err(|err| {
            error!(kind = %kind, tag = name, error = %err, "failed to add tag");
            err
        })?;
        self.revalidate_tags(kind).await;
        Ok(message)
    }

    pub async fn remove_tag(&mut self, kind: TagKind, id: &str) -> Result<String, MutationError> {
        let message = self.backend.delete_tag(kind, id).await.map_err(|err| {
            error!(kind = %kind, id, error = %err, "failed to remove tag");
            err
        })?;
        self.revalidate_tags(kind).await;
        Ok(message)
    }
}

fn tag_resource(kind: TagKind) -> Resource {
    match kind {
        TagKind::Organization => Resource::Organizations,
        TagKind::OrganizationType => Resource::OrganizationTypes,
        TagKind::Sector => Resource::Sectors,
    }
}
