//! Offline ingestion: load a document, chunk it, embed the chunks and store
//! them in the vector index.

pub mod loader;
pub mod splitter;

use std::path::Path;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::config::{Config, ConfigError};
use crate::embeddings::OpenAiEmbeddings;
use crate::rag::RagError;
use crate::upload::UploadProgressEvent;
use crate::vector::{PineconeClient, TEXT_KEY, VectorRecord};
use loader::{formatted_text, load_document};
use splitter::{InvalidChunking, RecursiveSplitter};

/// Chunks embedded and upserted per request.
const UPSERT_BATCH: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to load {path}: {reason}")]
    Load { path: String, reason: String },
    #[error("{0} contains no text")]
    Empty(String),
    #[error(transparent)]
    Chunking(#[from] InvalidChunking),
    #[error(transparent)]
    Rag(#[from] RagError),
}

/// A chunk ready to embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChunk {
    pub text: String,
    pub source: String,
    pub index: usize,
}

impl DocumentChunk {
    fn metadata(&self) -> Map<String, Value> {
        let mut metadata = Map::new();
        metadata.insert(TEXT_KEY.to_string(), Value::String(self.text.clone()));
        metadata.insert("source".to_string(), Value::String(self.source.clone()));
        metadata.insert("chunk".to_string(), Value::from(self.index));
        metadata
    }
}

/// Loads `path` and splits it into normalized chunks.
///
/// # Errors
///
/// Returns [`IngestError::Load`] if the file cannot be read and
/// [`IngestError::Empty`] if it yields no text.
pub fn chunk_document(
    path: &Path,
    splitter: &RecursiveSplitter,
) -> Result<Vec<DocumentChunk>, IngestError> {
    let document = load_document(path)?;
    let chunks: Vec<DocumentChunk> = splitter
        .split_text(&document.text)
        .iter()
        .map(|chunk| formatted_text(chunk).trim().to_string())
        .filter(|text| !text.is_empty())
        .enumerate()
        .map(|(index, text)| DocumentChunk {
            text,
            source: document.source.clone(),
            index,
        })
        .collect();

    if chunks.is_empty() {
        return Err(IngestError::Empty(document.source));
    }
    Ok(chunks)
}

pub struct Ingestor {
    embeddings: OpenAiEmbeddings,
    index: PineconeClient,
    init_wait: Duration,
    splitter: RecursiveSplitter,
}

impl Ingestor {
    /// # Errors
    ///
    /// Returns [`IngestError::Config`] when Pinecone or OpenAI settings are
    /// missing and [`IngestError::Chunking`] when the chunk overlap is not
    /// smaller than the chunk size.
    pub fn from_config(
        http: reqwest::Client,
        config: &Config,
    ) -> Result<Self, IngestError> {
        let splitter = RecursiveSplitter::new(config.chunk_size, config.chunk_overlap)?;
        let pinecone = config.pinecone()?;
        let openai = config.openai()?;
        Ok(Self::new(
            OpenAiEmbeddings::new(http.clone(), openai),
            PineconeClient::new(http, pinecone),
            Duration::from_millis(pinecone.index_init_timeout_ms),
        )
        .with_splitter(splitter))
    }

    #[must_use]
    pub fn new(
        embeddings: OpenAiEmbeddings,
        index: PineconeClient,
        init_wait: Duration,
    ) -> Self {
        Self {
            embeddings,
            index,
            init_wait,
            splitter: RecursiveSplitter::default(),
        }
    }

    #[must_use]
    pub fn with_splitter(
        mut self,
        splitter: RecursiveSplitter,
    ) -> Self {
        self.splitter = splitter;
        self
    }

    /// Ensures the index exists, then chunks, embeds and stores `path`.
    /// Returns the number of stored chunks.
    ///
    /// # Errors
    ///
    /// Stops at the first load, embedding or vector store failure.
    pub async fn run(
        &self,
        path: &Path,
        on_progress: impl FnMut(&UploadProgressEvent),
    ) -> Result<usize, IngestError> {
        if self.index.ensure_index(self.init_wait).await? {
            tracing::info!("Created index {}", self.index.index_name());
        }

        tracing::info!("Preparing chunks from {}", path.display());
        let chunks = chunk_document(path, &self.splitter)?;
        tracing::info!("Loading {} chunks into Pinecone...", chunks.len());

        let stored = self.embed_and_store(&chunks, on_progress).await?;
        tracing::info!("Data embedded and stored in index {}", self.index.index_name());
        Ok(stored)
    }

    /// Embeds `chunks` batch by batch and upserts each batch, reporting
    /// cumulative progress after every batch.
    ///
    /// # Errors
    ///
    /// Returns the first embedding or upsert failure.
    pub async fn embed_and_store(
        &self,
        chunks: &[DocumentChunk],
        mut on_progress: impl FnMut(&UploadProgressEvent),
    ) -> Result<usize, IngestError> {
        let filename = chunks.first().map(|c| c.source.clone()).unwrap_or_default();
        let total = chunks.len();
        let mut upserted = 0;

        for batch in chunks.chunks(UPSERT_BATCH) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embeddings.embed_documents(&texts).await?;

            let records: Vec<VectorRecord> = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, values)| VectorRecord {
                    id: uuid::Uuid::new_v4().to_string(),
                    values,
                    metadata: chunk.metadata(),
                })
                .collect();

            let count = self.index.upsert(&records).await?;
            if count != records.len() {
                tracing::warn!("Upserted {count} of {} vectors", records.len());
            }
            upserted += records.len();

            on_progress(&UploadProgressEvent {
                filename: filename.clone(),
                total_chunks: total as u64,
                chunks_upserted: upserted as u64,
                is_complete: upserted == total,
                error: None,
            });
        }

        Ok(upserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_metadata_carries_text() {
        let chunk = DocumentChunk {
            text: "Ana worked at Acme.".to_string(),
            source: "cv.pdf".to_string(),
            index: 3,
        };
        let metadata = chunk.metadata();
        assert_eq!(metadata[TEXT_KEY], "Ana worked at Acme.");
        assert_eq!(metadata["source"], "cv.pdf");
        assert_eq!(metadata["chunk"], 3);
    }

    #[test]
    fn test_chunk_document_normalizes_and_numbers() {
        let path = std::env::temp_dir().join(format!("docsmind-ingest-{}.txt", uuid::Uuid::new_v4()));
        std::fs::write(&path, "First  para\nline.\n\nSecond para.").unwrap();

        let chunks = chunk_document(&path, &RecursiveSplitter::new(20, 0).unwrap()).unwrap();
        std::fs::remove_file(&path).unwrap();

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["First para line.", "Second para."]);
        assert_eq!(chunks[1].index, 1);
    }

    #[test]
    fn test_empty_document_is_rejected() {
        let path = std::env::temp_dir().join(format!("docsmind-empty-{}.txt", uuid::Uuid::new_v4()));
        std::fs::write(&path, "  \n\n ").unwrap();

        let result = chunk_document(&path, &RecursiveSplitter::default());
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(IngestError::Empty(_))));
    }

    #[test]
    fn test_invalid_chunking_from_config_is_an_error() {
        let mut config = Config::default();
        config.chunk_size = 200;
        config.chunk_overlap = 200;

        let result = Ingestor::from_config(reqwest::Client::new(), &config);
        assert!(matches!(
            result,
            Err(IngestError::Chunking(InvalidChunking { size: 200, overlap: 200 }))
        ));
    }
}
