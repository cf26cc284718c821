//! Language-model seam and its `genai` implementation.

use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use genai::ModelIden;
use genai::chat::{ChatMessage, ChatOptions, ChatRequest, ChatStreamEvent};
use genai::resolver::{AuthData, AuthResolver};

use super::RagError;

/// Text chunks in emission order. The stream ends when the model is done.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, RagError>> + Send>>;

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Single-shot completion of `prompt`.
    async fn complete(
        &self,
        prompt: &str,
    ) -> Result<String, RagError>;

    /// Streaming completion of `prompt`; the first chunk is yielded as soon as
    /// the provider emits it.
    async fn stream(
        &self,
        prompt: &str,
    ) -> Result<TextStream, RagError>;
}

/// Chat completions through the `genai` client, temperature 0.
pub struct GenAiModel {
    client: genai::Client,
    model: String,
    options: ChatOptions,
}

impl GenAiModel {
    /// Builds a client that authenticates every call with `api_key`.
    #[must_use]
    pub fn new(
        model: impl Into<String>,
        api_key: &str,
    ) -> Self {
        let key = api_key.to_string();
        let auth_resolver = AuthResolver::from_resolver_fn(
            move |_model_iden: ModelIden| -> Result<Option<AuthData>, genai::resolver::Error> {
                Ok(Some(AuthData::from_single(key.clone())))
            },
        );
        let client = genai::Client::builder().with_auth_resolver(auth_resolver).build();

        Self {
            client,
            model: model.into(),
            options: ChatOptions::default().with_temperature(0.0),
        }
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LanguageModel for GenAiModel {
    async fn complete(
        &self,
        prompt: &str,
    ) -> Result<String, RagError> {
        let chat_req = ChatRequest::new(vec![ChatMessage::user(prompt.to_string())]);

        let response = self
            .client
            .exec_chat(&self.model, chat_req, Some(&self.options))
            .await
            .map_err(|e| RagError::Model(format!("chat request failed: {e}")))?;

        response
            .into_first_text()
            .ok_or_else(|| RagError::Model("no response from AI model".to_string()))
    }

    async fn stream(
        &self,
        prompt: &str,
    ) -> Result<TextStream, RagError> {
        let chat_req = ChatRequest::new(vec![ChatMessage::user(prompt.to_string())]);

        let chat_response = self
            .client
            .exec_chat_stream(&self.model, chat_req, Some(&self.options))
            .await
            .map_err(|e| RagError::Model(format!("chat stream request failed: {e}")))?;

        let chunks = chat_response.stream.filter_map(|event| async move {
            match event {
                Ok(ChatStreamEvent::Chunk(chunk)) if !chunk.content.is_empty() => Some(Ok(chunk.content)),
                Ok(_) => None,
                Err(e) => Some(Err(RagError::Model(format!("chat stream failed: {e}")))),
            }
        });

        Ok(Box::pin(chunks))
    }
}
