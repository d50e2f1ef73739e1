use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use url::Url;

use super::{extract_text, Document, DocumentStore, Revision, StoredDocument};
use crate::config::StoreConfig;
use crate::error::{LoctextError, Result};

/// Response of a document GET
#[derive(Deserialize)]
struct GetResponse {
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source", default)]
    source: Option<Document>,
    #[serde(rename = "_seq_no", default)]
    seq_no: Option<u64>,
    #[serde(rename = "_primary_term", default)]
    primary_term: Option<u64>,
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: SearchHits,
}

#[derive(Deserialize)]
struct SearchHits {
    hits: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    #[serde(rename = "_source", default)]
    source: Document,
}

/// Elasticsearch REST backend
pub struct ElasticsearchStore {
    client: Client,
    base_url: Url,
    collection: String,
    document_type: String,
}

impl ElasticsearchStore {
    pub fn new(base_url: &str, collection: &str, document_type: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| LoctextError::Config(format!("Invalid store URL {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(LoctextError::Config(format!("Store URL {} cannot be a base", base_url)));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LoctextError::Config(format!("Failed to build store HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            collection: collection.to_string(),
            document_type: document_type.to_string(),
        })
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        Self::new(&config.url, &config.collection, &config.document_type, config.timeout())
    }

    /// `{base}/{collection}/{segments...}` with each segment escaped
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push(&self.collection).extend(segments);
        }
        url
    }

    fn document_url(&self, id: &str) -> Url {
        self.url(&[self.document_type.as_str(), id])
    }

    fn unavailable(action: &str, e: reqwest::Error) -> LoctextError {
        LoctextError::StoreUnavailable(format!("{} failed: {}", action, e))
    }

    async fn error_body(response: Response) -> String {
        response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string())
    }
}

#[async_trait]
impl DocumentStore for ElasticsearchStore {
    async fn get(&self, id: &str) -> Result<Option<StoredDocument>> {
        let response = self
            .client
            .get(self.document_url(id))
            .send()
            .await
            .map_err(|e| Self::unavailable("get", e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(LoctextError::StoreUnavailable(format!(
                "get {} returned {}: {}",
                id,
                status,
                Self::error_body(response).await
            )));
        }

        let body: GetResponse = response
            .json()
            .await
            .map_err(|e| Self::unavailable("parsing get response", e))?;

        if !body.found {
            return Ok(None);
        }

        let revision = match (body.seq_no, body.primary_term) {
            (Some(seq_no), Some(primary_term)) => Some(Revision { seq_no, primary_term }),
            _ => None,
        };

        Ok(Some(StoredDocument {
            id: id.to_string(),
            source: body.source.unwrap_or_default(),
            revision,
        }))
    }

    async fn index(&self, id: &str, document: &Document, expected: Option<Revision>) -> Result<()> {
        let mut url = self.document_url(id);
        if let Some(revision) = expected {
            url.query_pairs_mut()
                .append_pair("if_seq_no", &revision.seq_no.to_string())
                .append_pair("if_primary_term", &revision.primary_term.to_string());
        }

        let response = self
            .client
            .put(url)
            .json(document)
            .send()
            .await
            .map_err(|e| Self::unavailable("index", e))?;

        let status = response.status();
        if status == StatusCode::CONFLICT {
            return Err(LoctextError::VersionConflict(id.to_string()));
        }
        if !status.is_success() {
            return Err(LoctextError::StoreUnavailable(format!(
                "index {} returned {}: {}",
                id,
                status,
                Self::error_body(response).await
            )));
        }

        Ok(())
    }

    async fn source_text(&self, id: &str) -> Result<String> {
        let query = json!({"query": {"match": {"_id": id}}});

        let response = self
            .client
            .post(self.url(&["_search"]))
            .json(&query)
            .send()
            .await
            .map_err(|e| Self::unavailable("search", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoctextError::StoreUnavailable(format!(
                "search for {} returned {}: {}",
                id,
                status,
                Self::error_body(response).await
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| Self::unavailable("parsing search response", e))?;

        let hit = body
            .hits
            .hits
            .into_iter()
            .next()
            .ok_or_else(|| LoctextError::DocumentNotFound(id.to_string()))?;

        extract_text(&hit.source)
            .map(String::from)
            .ok_or_else(|| LoctextError::InvalidInput(format!("Document {} has no text field", id)))
    }
}
