//! Clients shared by every request, built once at startup.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{ChatBackend, Config};
use crate::embeddings::OpenAiEmbeddings;
use crate::error::ApiError;
use crate::rag::ChatChain;
use crate::rag::llm::GenAiModel;
use crate::rag::retriever::PineconeRetriever;
use crate::upstream::UpstreamClient;
use crate::vector::PineconeClient;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub upstream: UpstreamClient,
    chain: Option<ChatChain>,
}

impl AppState {
    /// Builds the HTTP client and, when the model and vector database are
    /// configured, the local chat chain.
    ///
    /// # Errors
    ///
    /// Returns the `reqwest` error if the HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        let upstream = UpstreamClient::new(http.clone(), config.api_base());

        let chain = match (config.pinecone(), config.openai()) {
            (Ok(pinecone), Ok(openai)) => {
                let index = Arc::new(PineconeClient::new(http.clone(), pinecone));
                let retriever = PineconeRetriever::new(OpenAiEmbeddings::new(http, openai), index, config.retriever_top_k);
                let model = GenAiModel::new(openai.model.clone(), &openai.api_key);
                tracing::info!("Local chat chain ready (model {}, index {})", model.model(), pinecone.index_name);
                Some(ChatChain::new(Arc::new(model), Arc::new(retriever)))
            }
            (Err(e), _) | (_, Err(e)) => {
                if config.chat_backend == ChatBackend::Local {
                    tracing::warn!("Local chat disabled: {e}");
                }
                None
            }
        };

        Ok(Self {
            config: Arc::new(config),
            upstream,
            chain,
        })
    }

    /// State with an injected chain, for tests and embedding.
    #[must_use]
    pub fn with_chain(
        config: Config,
        upstream: UpstreamClient,
        chain: Option<ChatChain>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            upstream,
            chain,
        }
    }

    /// The local chat chain.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the missing variable.
    pub fn chain(&self) -> Result<&ChatChain, ApiError> {
        if let Some(chain) = &self.chain {
            return Ok(chain);
        }
        self.config.pinecone()?;
        self.config.openai()?;
        Err(ApiError::internal_server_error("chat chain not initialized"))
    }
}
