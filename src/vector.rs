//! Pinecone REST client: index management, similarity query and upsert.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::OnceCell;

use crate::config::PineconeConfig;
use crate::rag::RagError;
use crate::rag::retriever::RetrievedChunk;

const CONTROL_PLANE_URL: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2024-07";
/// Metadata key holding the chunk text.
pub const TEXT_KEY: &str = "text";
/// Dimension of `text-embedding-ada-002` vectors.
pub const EMBEDDING_DIMENSION: usize = 1536;

#[derive(Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexDescription>,
}

#[derive(Deserialize)]
struct IndexDescription {
    name: String,
    #[serde(default)]
    host: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    namespace: &'a str,
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

/// One vector to store.
#[derive(Debug, Clone, Serialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: Map<String, Value>,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
    namespace: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

/// Client bound to one index and namespace.
///
/// The data-plane host is resolved on first use and cached; concurrent first
/// calls share a single resolution.
pub struct PineconeClient {
    http: reqwest::Client,
    api_key: String,
    control_url: String,
    index_name: String,
    namespace: String,
    host: OnceCell<String>,
}

impl PineconeClient {
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        config: &PineconeConfig,
    ) -> Self {
        if let Some(environment) = &config.environment {
            tracing::debug!("Pinecone environment label: {environment}");
        }
        Self {
            http,
            api_key: config.api_key.clone(),
            control_url: CONTROL_PLANE_URL.to_string(),
            index_name: config.index_name.clone(),
            namespace: config.namespace.clone(),
            host: OnceCell::new(),
        }
    }

    /// Points the control plane somewhere else (a proxy or a test server).
    #[must_use]
    pub fn with_control_url(
        mut self,
        url: impl Into<String>,
    ) -> Self {
        self.control_url = url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    fn request(
        &self,
        method: reqwest::Method,
        url: &str,
    ) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(
        resp: reqwest::Response,
        what: &str,
    ) -> Result<T, RagError> {
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(RagError::VectorStore(format!("{what} returned {status}: {body}")));
        }
        resp.json()
            .await
            .map_err(|e| RagError::VectorStore(format!("failed to parse {what} response: {e}")))
    }

    /// Names of all indexes in the project.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::VectorStore`] on any API failure.
    pub async fn list_indexes(&self) -> Result<Vec<String>, RagError> {
        let url = format!("{}/indexes", self.control_url);
        let resp = self
            .request(reqwest::Method::GET, &url)
            .send()
            .await
            .map_err(|e| RagError::VectorStore(format!("failed to list indexes: {e}")))?;
        let list: IndexList = Self::read_json(resp, "list indexes").await?;
        Ok(list.indexes.into_iter().map(|index| index.name).collect())
    }

    async fn create_index(&self) -> Result<(), RagError> {
        let url = format!("{}/indexes", self.control_url);
        let body = serde_json::json!({
            "name": self.index_name,
            "dimension": EMBEDDING_DIMENSION,
            "metric": "cosine",
            "spec": { "serverless": { "cloud": "aws", "region": "us-east-1" } },
        });
        let resp = self
            .request(reqwest::Method::POST, &url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RagError::VectorStore(format!("failed to create index: {e}")))?;
        let _: Value = Self::read_json(resp, "create index").await?;
        Ok(())
    }

    /// Creates the index when it does not exist yet, then waits `init_wait`
    /// for it to come up. Returns whether the index was created.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::VectorStore`] if listing or creating fails.
    pub async fn ensure_index(
        &self,
        init_wait: Duration,
    ) -> Result<bool, RagError> {
        let existing = self.list_indexes().await?;
        if existing.iter().any(|name| name == &self.index_name) {
            return Ok(false);
        }

        tracing::info!("Index {} not found, creating it", self.index_name);
        self.create_index().await?;
        tracing::info!(
            "Waiting for {} milliseconds for index initialization to complete...",
            init_wait.as_millis()
        );
        tokio::time::sleep(init_wait).await;
        tracing::info!("Index initialization complete");
        Ok(true)
    }

    async fn host(&self) -> Result<&str, RagError> {
        self.host
            .get_or_try_init(|| async {
                let url = format!("{}/indexes/{}", self.control_url, self.index_name);
                let resp = self
                    .request(reqwest::Method::GET, &url)
                    .send()
                    .await
                    .map_err(|e| RagError::VectorStore(format!("failed to describe index: {e}")))?;
                let description: IndexDescription = Self::read_json(resp, "describe index").await?;
                let host = description
                    .host
                    .ok_or_else(|| RagError::VectorStore(format!("index {} has no host yet", description.name)))?;
                tracing::info!("Resolved Pinecone index host: {host}");
                Ok::<_, RagError>(data_plane_url(&host))
            })
            .await
            .map(String::as_str)
    }

    /// Top-`top_k` chunks nearest to `vector` in the namespace.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::VectorStore`] on any API failure.
    pub async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, RagError> {
        let url = format!("{}/query", self.host().await?);
        let resp = self
            .request(reqwest::Method::POST, &url)
            .json(&QueryRequest {
                namespace: &self.namespace,
                vector,
                top_k,
                include_metadata: true,
            })
            .send()
            .await
            .map_err(|e| RagError::VectorStore(format!("failed to query index: {e}")))?;
        let response: QueryResponse = Self::read_json(resp, "query").await?;

        Ok(response
            .matches
            .into_iter()
            .map(|m| chunk_from_metadata(m.metadata.unwrap_or_default()))
            .collect())
    }

    /// Stores `records` in the namespace. Returns the upserted count.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::VectorStore`] on any API failure.
    pub async fn upsert(
        &self,
        records: &[VectorRecord],
    ) -> Result<usize, RagError> {
        let url = format!("{}/vectors/upsert", self.host().await?);
        let resp = self
            .request(reqwest::Method::POST, &url)
            .json(&UpsertRequest {
                vectors: records,
                namespace: &self.namespace,
            })
            .send()
            .await
            .map_err(|e| RagError::VectorStore(format!("failed to upsert vectors: {e}")))?;
        let response: UpsertResponse = Self::read_json(resp, "upsert").await?;
        Ok(response.upserted_count)
    }
}

fn data_plane_url(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.trim_end_matches('/').to_string()
    } else {
        format!("https://{host}")
    }
}

/// Moves the `text` key out of the metadata into the chunk body.
fn chunk_from_metadata(mut metadata: Map<String, Value>) -> RetrievedChunk {
    let text = match metadata.remove(TEXT_KEY) {
        Some(Value::String(text)) => text,
        Some(other) => other.to_string(),
        None => String::new(),
    };
    RetrievedChunk { text, metadata }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_plane_url() {
        assert_eq!(data_plane_url("docs-abc.svc.pinecone.io"), "https://docs-abc.svc.pinecone.io");
        assert_eq!(data_plane_url("http://127.0.0.1:5080/"), "http://127.0.0.1:5080");
    }

    #[test]
    fn test_chunk_from_metadata_extracts_text() {
        let metadata = serde_json::json!({ "text": "Rust is fast", "source": "resume.pdf", "loc.pageNumber": 2 });
        let chunk = chunk_from_metadata(metadata.as_object().unwrap().clone());
        assert_eq!(chunk.text, "Rust is fast");
        assert!(!chunk.metadata.contains_key(TEXT_KEY));
        assert_eq!(chunk.metadata["source"], "resume.pdf");
    }

    #[test]
    fn test_query_response_parsing() {
        let json = r#"{"matches":[{"id":"a","score":0.91,"metadata":{"text":"one"}},{"id":"b","score":0.5}],"namespace":"docs"}"#;
        let parsed: QueryResponse = serde_json::from_str(json).unwrap();
        let chunks: Vec<RetrievedChunk> = parsed
            .matches
            .into_iter()
            .map(|m| chunk_from_metadata(m.metadata.unwrap_or_default()))
            .collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "one");
        assert_eq!(chunks[1].text, "");
    }

    #[test]
    fn test_query_request_is_camel_case() {
        let body = serde_json::to_value(QueryRequest {
            namespace: "ns",
            vector: &[0.5],
            top_k: 4,
            include_metadata: true,
        })
        .unwrap();
        assert_eq!(body["topK"], 4);
        assert_eq!(body["includeMetadata"], true);
    }
}
