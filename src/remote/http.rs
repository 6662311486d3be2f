//! REST backend client implementation using reqwest.

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use crate::error::ApiError;
use crate::model::{Contact, Tag, TagKind};
use crate::remote::{Backend, SearchPage};
use crate::transform::{self, BackendContact, BackendTag, ContactPayload};

/// Backend reached over HTTP at a configured base URL
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: Client,
    base: Url,
}

/// `/search` response body. Older backends return a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum SearchBody {
    Paged {
        results: Vec<BackendContact>,
        #[serde(default)]
        total: Option<u64>,
    },
    Bare(Vec<BackendContact>),
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let base = Url::parse(base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            http: Client::new(),
            base,
        })
    }

    /// Base URL with `segments` appended; each segment is percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ApiError::InvalidUrl(self.base.to_string()))?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<String, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            debug!(status = status.as_u16(), "backend returned error status");
            return Err(ApiError::status(status.as_u16(), body));
        }
        Ok(body)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        debug!(%url, "fetching");
        let body = self.send(self.http.get(url)).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Decode a `/search` response into a page of normalized contacts.
pub fn parse_search(body: &str) -> Result<SearchPage, ApiError> {
    let page = match serde_json::from_str::<SearchBody>(body)? {
        SearchBody::Paged { results, total } => {
            let total = total.unwrap_or(results.len() as u64);
            SearchPage {
                contacts: transform::transform_all(results),
                total,
            }
        }
        SearchBody::Bare(records) => {
            let total = records.len() as u64;
            SearchPage {
                contacts: transform::transform_all(records),
                total,
            }
        }
    };
    Ok(page)
}

/// Confirmation text of a mutation response: the `message` field when the
/// body is a JSON object carrying one, the raw body otherwise.
pub fn ack_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

impl Backend for HttpBackend {
    async fn search(&self, query: &str) -> Result<SearchPage, ApiError> {
        let mut url = self.endpoint(&["search"])?;
        url.set_query(Some(query));
        debug!(%url, "searching");
        let body = self.send(self.http.get(url)).await?;
        parse_search(&body)
    }

    async fn list_all(&self) -> Result<Vec<Contact>, ApiError> {
        let records: Vec<BackendContact> = self.get_json(self.endpoint(&["view"])?).await?;
        Ok(transform::transform_all(records))
    }

    async fn get(&self, id: &str) -> Result<Contact, ApiError> {
        let record: BackendContact = self.get_json(self.endpoint(&["view", id])?).await?;
        Ok(transform::transform(record))
    }

    async fn create(&self, payload: &ContactPayload) -> Result<String, ApiError> {
        let url = self.endpoint(&["insert"])?;
        debug!(%url, "creating contact");
        let body = self.send(self.http.post(url).json(payload)).await?;
        Ok(ack_message(&body))
    }

    async fn update(&self, id: &str, payload: &ContactPayload) -> Result<String, ApiError> {
        let url = self.endpoint(&["update", id])?;
        debug!(%url, "updating contact");
        let body = self.send(self.http.put(url).json(payload)).await?;
        Ok(ack_message(&body))
    }

    async fn delete(&self, id: &str) -> Result<String, ApiError> {
        let url = self.endpoint(&["delete", id])?;
        debug!(%url, "deleting contact");
        let body = self.send(self.http.delete(url)).await?;
        Ok(ack_message(&body))
    }

    async fn list_tags(&self, kind: TagKind) -> Result<Vec<Tag>, ApiError> {
        let records: Vec<BackendTag> = self.get_json(self.endpoint(&[kind.list_path()])?).await?;
        Ok(records.into_iter().map(transform::transform_tag).collect())
    }

    async fn add_tag(&self, kind: TagKind, name: &str) -> Result<String, ApiError> {
        let url = self.endpoint(&[kind.add_path()])?;
        debug!(%url, tag = name, "adding tag");
        let body = self
            .send(self.http.post(url).json(&json!({ "name": name })))
            .await?;
        Ok(ack_message(&body))
    }

    async fn delete_tag(&self, kind: TagKind, id: &str) -> Result<String, ApiError> {
        let url = self.endpoint(&[kind.delete_path(), id])?;
        debug!(%url, "deleting tag");
        let body = self.send(self.http.delete(url)).await?;
        Ok(ack_message(&body))
    }
}
