use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use super::RagError;
use crate::embeddings::OpenAiEmbeddings;
use crate::vector::PineconeClient;

/// A document fragment returned by similarity search.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct RetrievedChunk {
    pub text: String,
    #[schema(value_type = Object)]
    pub metadata: Map<String, Value>,
}

impl RetrievedChunk {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: Map::new(),
        }
    }
}

#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(
        &self,
        query: &str,
    ) -> Result<Vec<RetrievedChunk>, RagError>;
}

/// Joins chunk texts into the `context` block of the answer prompt.
#[must_use]
pub fn format_documents(chunks: &[RetrievedChunk]) -> String {
    chunks.iter().map(|chunk| chunk.text.as_str()).collect::<Vec<_>>().join("\n\n")
}

/// Embeds the query and searches the Pinecone namespace.
pub struct PineconeRetriever {
    embeddings: OpenAiEmbeddings,
    index: Arc<PineconeClient>,
    top_k: usize,
}

impl PineconeRetriever {
    #[must_use]
    pub const fn new(
        embeddings: OpenAiEmbeddings,
        index: Arc<PineconeClient>,
        top_k: usize,
    ) -> Self {
        Self {
            embeddings,
            index,
            top_k,
        }
    }
}

#[async_trait]
impl Retriever for PineconeRetriever {
    async fn retrieve(
        &self,
        query: &str,
    ) -> Result<Vec<RetrievedChunk>, RagError> {
        let vector = self.embeddings.embed_query(query).await?;
        let chunks = self.index.query(&vector, self.top_k).await?;
        tracing::debug!("Retrieved {} chunks from {}", chunks.len(), self.index.index_name());
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_documents_joins_with_blank_line() {
        let chunks = vec![RetrievedChunk::new("first"), RetrievedChunk::new("second")];
        assert_eq!(format_documents(&chunks), "first\n\nsecond");
    }

    #[test]
    fn test_format_documents_empty() {
        assert_eq!(format_documents(&[]), "");
    }
}
