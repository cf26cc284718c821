//! OpenAI-compatible embeddings over plain HTTP.

use serde::{Deserialize, Serialize};

use crate::config::OpenAiConfig;
use crate::rag::RagError;

const BATCH_SIZE: usize = 64;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Clone)]
pub struct OpenAiEmbeddings {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbeddings {
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        config: &OpenAiConfig,
    ) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            model: config.embedding_model.clone(),
        }
    }

    /// Embeds `texts` in batches, preserving input order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Embedding`] on transport failures, non-2xx statuses,
    /// or a response with the wrong number of vectors.
    pub async fn embed_documents(
        &self,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, RagError> {
        let mut all = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            all.extend(self.embed_batch(batch).await?);
        }
        Ok(all)
    }

    /// Embeds a single query string.
    ///
    /// # Errors
    ///
    /// See [`Self::embed_documents`].
    pub async fn embed_query(
        &self,
        text: &str,
    ) -> Result<Vec<f32>, RagError> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("no embedding returned".to_string()))
    }

    async fn embed_batch(
        &self,
        batch: &[String],
    ) -> Result<Vec<Vec<f32>>, RagError> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/v1/embeddings", self.base_url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbedRequest {
                model: &self.model,
                input: batch,
            })
            .send()
            .await
            .map_err(|e| RagError::Embedding(format!("failed to call embeddings API: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(RagError::Embedding(format!("embeddings API returned {status}: {body}")));
        }

        let body: EmbedResponse = resp
            .json()
            .await
            .map_err(|e| RagError::Embedding(format!("failed to parse embeddings response: {e}")))?;

        order_embeddings(body.data, batch.len())
    }
}

fn order_embeddings(
    mut data: Vec<EmbedData>,
    expected: usize,
) -> Result<Vec<Vec<f32>>, RagError> {
    if data.len() != expected {
        return Err(RagError::Embedding(format!(
            "expected {expected} embeddings, got {}",
            data.len()
        )));
    }
    data.sort_by_key(|d| d.index);
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_embeddings_sorts_by_index() {
        let data = vec![
            EmbedData {
                index: 1,
                embedding: vec![1.0],
            },
            EmbedData {
                index: 0,
                embedding: vec![0.0],
            },
        ];
        assert_eq!(order_embeddings(data, 2).unwrap(), vec![vec![0.0], vec![1.0]]);
    }

    #[test]
    fn test_order_embeddings_count_mismatch() {
        let err = order_embeddings(vec![], 1).unwrap_err();
        assert!(err.to_string().contains("expected 1 embeddings"));
    }

    #[test]
    fn test_response_parsing() {
        let json = r#"{"object":"list","data":[{"object":"embedding","index":0,"embedding":[0.1,0.2]}],"model":"text-embedding-ada-002"}"#;
        let parsed: EmbedResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.data[0].embedding, vec![0.1, 0.2]);
    }
}
