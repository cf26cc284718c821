//! Retrieval-augmented chat chain.
//!
//! One chat turn runs three steps in order:
//!
//! 1. rewrite the follow-up into a standalone question (non-streaming model call),
//! 2. retrieve the nearest chunks for that question,
//! 3. stream the answer to the QA prompt built from those chunks.
//!
//! Steps 1 and 2 complete before any byte is sent, so their failures surface
//! as a normal error response. Failures during step 3 end the stream.

pub mod llm;
pub mod retriever;

use std::sync::Arc;

use crate::template::TemplateEngine;
use llm::{LanguageModel, TextStream};
use retriever::{RetrievedChunk, Retriever, format_documents};

#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error("language model error: {0}")]
    Model(String),
    #[error("embedding error: {0}")]
    Embedding(String),
    #[error("vector store error: {0}")]
    VectorStore(String),
}

/// Everything needed to answer a turn, with the answer still streaming.
pub struct PreparedAnswer {
    pub standalone_question: String,
    pub sources: Vec<RetrievedChunk>,
    pub stream: TextStream,
}

#[derive(Clone)]
pub struct ChatChain {
    model: Arc<dyn LanguageModel>,
    retriever: Arc<dyn Retriever>,
}

/// Trims the question and flattens newlines into spaces.
#[must_use]
pub fn sanitize_question(question: &str) -> String {
    question.trim().replace('\n', " ")
}

impl ChatChain {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        retriever: Arc<dyn Retriever>,
    ) -> Self {
        Self { model, retriever }
    }

    /// Rephrases `question` so it stands without `chat_history`.
    ///
    /// # Errors
    ///
    /// Propagates the model error; there is no retry.
    pub async fn standalone_question(
        &self,
        question: &str,
        chat_history: &str,
    ) -> Result<String, RagError> {
        let prompt = TemplateEngine::render_standalone_question_prompt(chat_history, &sanitize_question(question));
        let rewritten = self.model.complete(&prompt).await?;
        Ok(rewritten.trim().to_string())
    }

    /// Nearest chunks for an already standalone question.
    ///
    /// # Errors
    ///
    /// Propagates embedding and vector store errors.
    pub async fn retrieve(
        &self,
        question: &str,
    ) -> Result<Vec<RetrievedChunk>, RagError> {
        self.retriever.retrieve(question).await
    }

    /// Streams the answer to `question` grounded on `sources`.
    ///
    /// # Errors
    ///
    /// Propagates the model error raised while opening the stream.
    pub async fn answer(
        &self,
        sources: &[RetrievedChunk],
        question: &str,
    ) -> Result<TextStream, RagError> {
        let prompt = TemplateEngine::render_qa_prompt(&format_documents(sources), question);
        self.model.stream(&prompt).await
    }

    /// Runs a whole turn up to the point where the answer starts streaming.
    ///
    /// # Errors
    ///
    /// Returns the first error from rewriting, retrieval, or opening the stream.
    pub async fn call(
        &self,
        question: &str,
        chat_history: &str,
    ) -> Result<PreparedAnswer, RagError> {
        let standalone_question = self.standalone_question(question, chat_history).await?;
        tracing::info!("Standalone question: {standalone_question}");

        let sources = self.retrieve(&standalone_question).await?;
        let stream = self.answer(&sources, &standalone_question).await?;

        Ok(PreparedAnswer {
            standalone_question,
            sources,
            stream,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted model and retriever shared by unit and handler tests.

    use std::sync::Mutex;

    use async_trait::async_trait;
    use futures::stream;

    use super::*;

    #[derive(Default)]
    pub struct ScriptedModel {
        pub rewrite: String,
        pub answer_chunks: Vec<String>,
        pub fail_rewrite: bool,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        pub fn new(
            rewrite: &str,
            answer_chunks: &[&str],
        ) -> Self {
            Self {
                rewrite: rewrite.to_string(),
                answer_chunks: answer_chunks.iter().map(|c| (*c).to_string()).collect(),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn complete(
            &self,
            prompt: &str,
        ) -> Result<String, RagError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if self.fail_rewrite {
                return Err(RagError::Model("rate limited".to_string()));
            }
            Ok(self.rewrite.clone())
        }

        async fn stream(
            &self,
            prompt: &str,
        ) -> Result<TextStream, RagError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let chunks: Vec<Result<String, RagError>> = self.answer_chunks.iter().cloned().map(Ok).collect();
            Ok(Box::pin(stream::iter(chunks)))
        }
    }

    #[derive(Default)]
    pub struct FixedRetriever {
        pub chunks: Vec<RetrievedChunk>,
        pub queries: Mutex<Vec<String>>,
    }

    impl FixedRetriever {
        pub fn new(texts: &[&str]) -> Self {
            Self {
                chunks: texts.iter().map(|t| RetrievedChunk::new(*t)).collect(),
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Retriever for FixedRetriever {
        async fn retrieve(
            &self,
            query: &str,
        ) -> Result<Vec<RetrievedChunk>, RagError> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(self.chunks.clone())
        }
    }
}
