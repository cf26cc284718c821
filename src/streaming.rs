//! Adapters from the chat chain's text stream to HTTP response bodies.
//!
//! Two framings are offered: a plain chunked text body, where every model
//! chunk is written as soon as it arrives, and Server-Sent Events carrying
//! [`Progress`] updates (including the retrieved sources).

use std::convert::Infallible;
use std::pin::Pin;

use actix_web::web::Bytes;
use actix_web_lab::sse;
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::rag::ChatChain;
use crate::rag::llm::TextStream;
use crate::rag::retriever::RetrievedChunk;

/// Type alias for the stream returned by [`chat_progress_stream`]
pub type ProgressStream = Pin<Box<dyn Stream<Item = Progress> + Send>>;

/// Progress update events
#[derive(Serialize, Deserialize, Clone, Debug, ToSchema)]
pub enum Progress {
    Status(String),
    Question(String),
    Sources(Vec<RetrievedChunk>),
    ModelOutputChunk(String),
    Result(String),
    Error(String),
}

impl Progress {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| serde_json::json!({ "Error": e.to_string() }).to_string())
    }

    /// Format as SSE message
    #[must_use]
    pub fn to_sse(&self) -> String {
        format!("data: {}\n\n", self.to_json())
    }

    #[must_use]
    pub fn to_sse_event(&self) -> sse::Event {
        sse::Event::Data(sse::Data::new(self.to_json()))
    }
}

/// Writes each chunk as its own body frame. A failing producer ends the body
/// early; the failure is logged since headers have already been sent.
pub fn text_body(stream: TextStream) -> impl Stream<Item = Result<Bytes, Infallible>> + 'static {
    async_stream::stream! {
        let mut stream = stream;
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(text) => yield Ok(Bytes::from(text)),
                Err(e) => {
                    tracing::error!("Answer stream failed: {e}");
                    break;
                }
            }
        }
    }
}

/// Runs a chat turn and reports every step as a [`Progress`] event.
#[must_use]
pub fn chat_progress_stream(
    chain: ChatChain,
    question: String,
    chat_history: String,
) -> ProgressStream {
    let events = async_stream::stream! {
        yield Progress::Status("Rephrasing question...".to_string());

        let standalone = match chain.standalone_question(&question, &chat_history).await {
            Ok(q) => {
                yield Progress::Question(q.clone());
                q
            }
            Err(e) => {
                tracing::error!("Failed to rephrase question: {e}");
                yield Progress::Error("Failed to rephrase question".to_string());
                return;
            }
        };

        yield Progress::Status("Searching documents...".to_string());

        let sources = match chain.retrieve(&standalone).await {
            Ok(sources) => {
                yield Progress::Sources(sources.clone());
                sources
            }
            Err(e) => {
                tracing::error!("Failed to retrieve documents: {e}");
                yield Progress::Error("Failed to search documents".to_string());
                return;
            }
        };

        yield Progress::Status("Generating answer...".to_string());

        let mut stream = match chain.answer(&sources, &standalone).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!("Failed to start answer stream: {e}");
                yield Progress::Error("Failed to generate answer".to_string());
                return;
            }
        };

        let mut answer = String::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(text) => {
                    answer.push_str(&text);
                    yield Progress::ModelOutputChunk(text);
                }
                Err(e) => {
                    tracing::error!("Answer stream failed: {e}");
                    yield Progress::Error("Answer stream interrupted".to_string());
                    return;
                }
            }
        }

        yield Progress::Result(answer);
    };

    Box::pin(events)
}
