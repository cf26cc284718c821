//! # docsmind
//!
//! Backend-for-frontend for a chat-over-your-documents product.
//!
//! The crate serves three concerns:
//!
//! - **Chat**: a retrieval-augmented pipeline that rewrites a follow-up into a
//!   standalone question, retrieves matching chunks from a Pinecone index and
//!   streams the model's answer back chunk by chunk.
//! - **BFF routes**: auth and upload calls relayed to the external API server,
//!   with a signed `auth_token` session cookie and gated page routes.
//! - **Ingestion**: loading, chunking, embedding and storing documents, plus a
//!   client for the upload route that follows ingestion progress.
//!
//! ## Library Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use docsmind::{ChatChain, Config};
//! use docsmind::rag::llm::GenAiModel;
//! use docsmind::rag::retriever::PineconeRetriever;
//! use docsmind::embeddings::OpenAiEmbeddings;
//! use docsmind::vector::PineconeClient;
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let config = Config::from_env()?;
//!     let (pinecone, openai) = (config.pinecone()?, config.openai()?);
//!     let http = reqwest::Client::new();
//!
//!     let retriever = PineconeRetriever::new(
//!         OpenAiEmbeddings::new(http.clone(), openai),
//!         Arc::new(PineconeClient::new(http, pinecone)),
//!         config.retriever_top_k,
//!     );
//!     let chain = ChatChain::new(
//!         Arc::new(GenAiModel::new(openai.model.clone(), &openai.api_key)),
//!         Arc::new(retriever),
//!     );
//!
//!     let mut answer = chain.call("Where did she work in 2020?", "Human: Tell me about Ana").await?.stream;
//!     while let Some(chunk) = answer.next().await {
//!         print!("{}", chunk?);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Server Mode
//!
//! The `server` feature (on by default) builds the `docsmind` HTTP server and
//! the `docsmind-ingest` and `docsmind-upload` tools.

pub mod auth;
pub mod chat;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod ingest;
pub mod rag;
pub mod routes;
pub mod state;
pub mod streaming;
pub mod template;
pub mod upload;
pub mod upstream;
pub mod vector;

pub use chat::{ChatMessage, ChatRequest, ChatRole};
pub use config::{Config, ConfigError};
pub use error::{ApiError, ErrorResponse};
pub use rag::{ChatChain, RagError};
pub use state::AppState;
