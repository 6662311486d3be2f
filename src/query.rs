//! Filter, search, and pagination state, and the `/search` query string
//! built from it.

use std::collections::BTreeMap;

use url::form_urlencoded;

use crate::error::ValidationError;
use crate::model::ContactField;

pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Field to substring-value constraints. An empty value means no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterMap(BTreeMap<ContactField, String>);

impl FilterMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `field=value` pairs as typed on the command line.
    pub fn from_pairs<S: AsRef<str>>(pairs: &[S]) -> Result<Self, ValidationError> {
        let mut filters = Self::new();
        for pair in pairs {
            let (field, value) = parse_pair(pair.as_ref())?;
            filters.insert(field, value);
        }
        Ok(filters)
    }

    pub fn insert(&mut self, field: ContactField, value: impl Into<String>) {
        self.0.insert(field, value.into());
    }

    /// Entries that actually constrain results.
    pub fn active(&self) -> impl Iterator<Item = (ContactField, &str)> {
        self.0
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(field, value)| (*field, value.as_str()))
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }
}

fn parse_pair(pair: &str) -> Result<(ContactField, String), ValidationError> {
    let (field, value) = pair
        .split_once('=')
        .ok_or_else(|| ValidationError::InvalidFilter(pair.to_string()))?;
    let field: ContactField = field.parse()?;
    Ok((field, value.trim().to_string()))
}

/// Query string for the paginated search endpoint. `page` and `pageSize` are
/// always present; there is no separate "list everything" form.
pub fn build_query(filters: &FilterMap, page: u32, page_size: u32) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (field, value) in filters.active() {
        serializer.append_pair(field.key(), value);
    }
    serializer.append_pair("page", &page.to_string());
    serializer.append_pair("pageSize", &page_size.to_string());
    serializer.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    current_page: u32,
    page_size: u32,
}

impl Pagination {
    pub fn new(page_size: u32) -> Self {
        Self {
            current_page: 1,
            page_size: page_size.max(1),
        }
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn set_page(&mut self, page: u32) {
        self.current_page = page.max(1);
    }

    pub fn reset(&mut self) {
        self.current_page = 1;
    }

    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.page_size)).max(1)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

/// What the user is currently looking at: server-side filters, free-text
/// search, and page. Changing the filters or the search text moves back to
/// page 1 so the page is never stale relative to them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    filters: FilterMap,
    search: String,
    pagination: Pagination,
}

impl ViewState {
    pub fn new(page_size: u32) -> Self {
        Self {
            filters: FilterMap::new(),
            search: String::new(),
            pagination: Pagination::new(page_size),
        }
    }

    pub fn filters(&self) -> &FilterMap {
        &self.filters
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    pub fn set_filters(&mut self, filters: FilterMap) {
        if filters != self.filters {
            self.pagination.reset();
        }
        self.filters = filters;
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        let search = search.into();
        if search != self.search {
            self.pagination.reset();
        }
        self.search = search;
    }

    pub fn set_page(&mut self, page: u32) {
        self.pagination.set_page(page);
    }

    pub fn query_string(&self) -> String {
        build_query(
            &self.filters,
            self.pagination.current_page(),
            self.pagination.page_size(),
        )
    }
}
