use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::{EntityTagger, TagCache};
use crate::annotation::{char_len, char_slice, Entity, EntityClass};
use crate::config::TaggerConfig;
use crate::error::{LoctextError, Result};

/// Request body for the tagger's annotate endpoint
#[derive(Serialize)]
struct AnnotateRequest<'a> {
    text: &'a str,
    ids: String,
    autodetect: bool,
}

/// One mention as returned by the tagger; `end` is inclusive
#[derive(Debug, Deserialize)]
struct TaggerMention {
    start: usize,
    end: usize,
    #[serde(rename = "type")]
    entity_type: i64,
    #[serde(default)]
    ids: Vec<String>,
}

/// Failed call, with whether another attempt could succeed
struct CallFailure {
    message: String,
    transient: bool,
}

/// Mapping from tagger type ids to entity classes
#[derive(Debug, Clone, PartialEq)]
pub struct EntityTypes {
    /// Taxonomy ids of the organisms whose proteins are tagged
    pub proteins: Vec<i64>,
    pub location: i64,
    pub organism: i64,
}

impl EntityTypes {
    pub fn from_config(config: &TaggerConfig) -> Self {
        Self {
            proteins: config.protein_types.clone(),
            location: config.location_type,
            organism: config.organism_type,
        }
    }

    /// Requested type ids as the tagger expects them
    pub fn request_ids(&self) -> String {
        self.proteins
            .iter()
            .chain([self.location, self.organism].iter())
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Class for a tagger type id, `None` for types that were not requested
    pub fn classify(&self, entity_type: i64) -> Option<EntityClass> {
        if entity_type == self.location {
            Some(EntityClass::Location)
        } else if entity_type == self.organism {
            Some(EntityClass::Organism)
        } else if self.proteins.contains(&entity_type) {
            Some(EntityClass::Protein)
        } else {
            None
        }
    }
}

/// HTTP client for the dockerized STRING tagger
pub struct StringTagger {
    client: Client,
    endpoint: String,
    types: EntityTypes,
    max_retries: usize,
    cache: Option<Arc<TagCache>>,
}

impl StringTagger {
    /// Create a tagger client against `endpoint` (scheme, host and port)
    pub fn new(endpoint: &str, types: EntityTypes, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LoctextError::Config(format!("Failed to build tagger HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            types,
            max_retries: 0,
            cache: None,
        })
    }

    /// Build from the `[tagger]` configuration section
    pub fn from_config(config: &TaggerConfig) -> Result<Self> {
        let cache = if config.cache_capacity > 0 {
            Some(Arc::new(TagCache::new(config.cache_capacity)))
        } else {
            None
        };

        Ok(Self::new(&config.url, EntityTypes::from_config(config), config.timeout())?
            .with_retries(config.max_retries)
            .with_cache(cache))
    }

    pub fn with_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_cache(mut self, cache: Option<Arc<TagCache>>) -> Self {
        self.cache = cache;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Single request to the annotate endpoint
    async fn request(&self, text: &str) -> std::result::Result<Vec<TaggerMention>, CallFailure> {
        let url = format!("{}/annotate", self.endpoint);
        let body = AnnotateRequest {
            text,
            ids: self.types.request_ids(),
            autodetect: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CallFailure {
                transient: e.is_timeout() || e.is_connect(),
                message: format!("Network error calling {}: {}", url, e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(CallFailure {
                transient: status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error(),
                message: format!("Tagger error {}: {}", status, body),
            });
        }

        response.json().await.map_err(|e| CallFailure {
            transient: false,
            message: format!("Failed to parse tagger response: {}", e),
        })
    }

    /// Request with exponential backoff on transient failures
    async fn request_with_retry(&self, text: &str) -> Result<Vec<TaggerMention>> {
        let mut attempt = 0;
        let mut delay = Duration::from_millis(500);

        loop {
            match self.request(text).await {
                Ok(mentions) => return Ok(mentions),
                Err(failure) if failure.transient && attempt < self.max_retries => {
                    log::warn!(
                        "Tagger retry {}/{} after error: {}",
                        attempt + 1,
                        self.max_retries,
                        failure.message
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(failure) => return Err(LoctextError::TaggingUnavailable(failure.message)),
            }
        }
    }

    /// Validate offsets, filter to requested types and slice mention text
    fn to_entities(&self, text: &str, mentions: Vec<TaggerMention>) -> Result<Vec<Entity>> {
        let text_len = char_len(text);
        let mut entities = Vec::with_capacity(mentions.len());

        for mention in mentions {
            let Some(class) = self.types.classify(mention.entity_type) else {
                log::debug!("Dropping mention of unrequested type {}", mention.entity_type);
                continue;
            };

            if mention.start > mention.end || mention.end >= text_len {
                return Err(LoctextError::TaggingUnavailable(format!(
                    "Tagger returned span {}..={} outside text of length {}",
                    mention.start, mention.end, text_len
                )));
            }

            let mention_text = char_slice(text, mention.start, mention.end + 1);
            entities.push(Entity::new(class, mention_text, mention.start, mention.ids));
        }

        Ok(entities)
    }
}

#[async_trait]
impl EntityTagger for StringTagger {
    async fn tag(&self, text: &str) -> Result<Vec<Entity>> {
        if text.trim().is_empty() {
            return Err(LoctextError::InvalidInput("Cannot tag empty text".to_string()));
        }

        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(text) {
                log::debug!("Tag cache hit ({} entities)", cached.len());
                return Ok(cached);
            }
        }

        let start = std::time::Instant::now();
        let mentions = self.request_with_retry(text).await?;
        let entities = self.to_entities(text, mentions)?;
        log::debug!(
            "Tagger returned {} entities in {:?}",
            entities.len(),
            start.elapsed()
        );

        if let Some(cache) = &self.cache {
            cache.put(text, entities.clone());
        }

        Ok(entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::StatusCode as AxumStatus, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn types() -> EntityTypes {
        EntityTypes {
            proteins: vec![9606],
            location: -22,
            organism: -2,
        }
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn fixed_response(body: Value) -> Router {
        Router::new().route(
            "/annotate",
            post(move || {
                let body = body.clone();
                async move { Json(body) }
            }),
        )
    }

    #[test]
    fn test_request_ids() {
        assert_eq!(types().request_ids(), "9606,-22,-2");
    }

    #[test]
    fn test_default_config_request_ids() {
        let types = EntityTypes::from_config(&TaggerConfig::default());
        assert_eq!(types.request_ids(), "9606,3702,4932,-22,-2");
    }

    #[test]
    fn test_classify() {
        let types = types();
        assert_eq!(types.classify(9606), Some(EntityClass::Protein));
        assert_eq!(types.classify(-22), Some(EntityClass::Location));
        assert_eq!(types.classify(-2), Some(EntityClass::Organism));
        assert_eq!(types.classify(10090), None);
        assert_eq!(types.classify(-26), None);
    }

    #[tokio::test]
    async fn test_tag_converts_inclusive_spans() {
        let url = serve(fixed_response(json!([
            {"start": 0, "end": 3, "type": 9606, "ids": ["P04637"]},
            {"start": 11, "end": 17, "type": -22, "ids": ["GO:0005634"]}
        ])))
        .await;

        let tagger = StringTagger::new(&url, types(), Duration::from_secs(5)).unwrap();
        let entities = tagger.tag("TP53 is in nucleus.").await.unwrap();

        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].class, EntityClass::Protein);
        assert_eq!(entities[0].text, "TP53");
        assert_eq!(entities[0].offset, 0);
        assert_eq!(entities[0].norms, vec!["P04637".to_string()]);
        assert_eq!(entities[1].class, EntityClass::Location);
        assert_eq!(entities[1].text, "nucleus");
        assert_eq!(entities[1].offset, 11);
    }

    #[tokio::test]
    async fn test_tag_sends_requested_types() {
        let app = Router::new().route(
            "/annotate",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["ids"], "9606,-22,-2");
                assert_eq!(body["text"], "Some text");
                Json(json!([]))
            }),
        );
        let url = serve(app).await;

        let tagger = StringTagger::new(&url, types(), Duration::from_secs(5)).unwrap();
        assert!(tagger.tag("Some text").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tag_drops_unrequested_types() {
        let url = serve(fixed_response(json!([
            {"start": 0, "end": 3, "type": 10090, "ids": []},
            {"start": 6, "end": 10, "type": -2, "ids": ["9606"]}
        ])))
        .await;

        let tagger = StringTagger::new(&url, types(), Duration::from_secs(5)).unwrap();
        let entities = tagger.tag("Trp53 human cells").await.unwrap();

        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].class, EntityClass::Organism);
        assert_eq!(entities[0].text, "human");
    }

    #[tokio::test]
    async fn test_out_of_bounds_span_is_unavailable() {
        let url = serve(fixed_response(json!([
            {"start": 0, "end": 50, "type": 9606, "ids": []}
        ])))
        .await;

        let tagger = StringTagger::new(&url, types(), Duration::from_secs(5)).unwrap();
        let err = tagger.tag("short").await.unwrap_err();
        assert!(matches!(err, LoctextError::TaggingUnavailable(_)));
    }

    #[tokio::test]
    async fn test_unrequested_mention_is_dropped_before_bounds_check() {
        let url = serve(fixed_response(json!([
            {"start": 0, "end": 3, "type": 9606, "ids": ["P04637"]},
            {"start": 40, "end": 90, "type": 10090, "ids": []}
        ])))
        .await;

        let tagger = StringTagger::new(&url, types(), Duration::from_secs(5)).unwrap();
        let entities = tagger.tag("TP53 is in nucleus.").await.unwrap();

        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].text, "TP53");
    }

    #[tokio::test]
    async fn test_slow_service_times_out() {
        let app = Router::new().route(
            "/annotate",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Json(json!([]))
            }),
        );
        let url = serve(app).await;

        let tagger = StringTagger::new(&url, types(), Duration::from_millis(300)).unwrap();
        let start = std::time::Instant::now();
        let err = tagger.tag("TP53 is in nucleus.").await.unwrap_err();

        assert!(matches!(err, LoctextError::TaggingUnavailable(_)));
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let app = Router::new().route(
            "/annotate",
            post(|| async { (AxumStatus::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let url = serve(app).await;

        let tagger = StringTagger::new(&url, types(), Duration::from_secs(5)).unwrap();
        let err = tagger.tag("text").await.unwrap_err();
        assert_eq!(err.kind(), "TaggingUnavailable");
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/annotate",
                post(|State(calls): State<Arc<AtomicUsize>>| async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(AxumStatus::SERVICE_UNAVAILABLE)
                    } else {
                        Ok(Json(json!([])))
                    }
                }),
            )
            .with_state(calls.clone());
        let url = serve(app).await;

        let tagger = StringTagger::new(&url, types(), Duration::from_secs(5))
            .unwrap()
            .with_retries(1);
        assert!(tagger.tag("text").await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_no_retry_by_default() {
        let calls = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/annotate",
                post(|State(calls): State<Arc<AtomicUsize>>| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    AxumStatus::SERVICE_UNAVAILABLE
                }),
            )
            .with_state(calls.clone());
        let url = serve(app).await;

        let tagger = StringTagger::new(&url, types(), Duration::from_secs(5)).unwrap();
        assert!(tagger.tag("text").await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unreachable_service_is_unavailable() {
        let tagger =
            StringTagger::new("http://127.0.0.1:1", types(), Duration::from_secs(2)).unwrap();
        let err = tagger.tag("text").await.unwrap_err();
        assert!(matches!(err, LoctextError::TaggingUnavailable(_)));
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let tagger =
            StringTagger::new("http://127.0.0.1:1", types(), Duration::from_secs(2)).unwrap();
        let err = tagger.tag("   ").await.unwrap_err();
        assert!(matches!(err, LoctextError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_cache_skips_second_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/annotate",
                post(|State(calls): State<Arc<AtomicUsize>>| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Json(json!([{"start": 0, "end": 3, "type": 9606, "ids": []}]))
                }),
            )
            .with_state(calls.clone());
        let url = serve(app).await;

        let tagger = StringTagger::new(&url, types(), Duration::from_secs(5))
            .unwrap()
            .with_cache(Some(Arc::new(TagCache::new(4))));
        let first = tagger.tag("TP53 text").await.unwrap();
        let second = tagger.tag("TP53 text").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
