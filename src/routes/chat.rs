//! Chat endpoints.

use actix_web::http::StatusCode;
use actix_web::http::header::CONTENT_TYPE;
use actix_web::{HttpRequest, HttpResponse, Responder, post, web};
use actix_web_lab::sse::{self, Sse};
use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::auth::bearer_token;
use crate::chat::ChatRequest;
use crate::config::ChatBackend;
use crate::error::ApiError;
use crate::state::AppState;
use crate::streaming::{chat_progress_stream, text_body};
use crate::upstream::UpstreamRequest;

const REMOTE_CHAT_ENDPOINT: &str = "/chat/docsmind";

/// Body sent to the API server when chat runs remotely.
#[derive(Debug, Serialize)]
struct RemoteChatRequest {
    question: String,
    chat_history: String,
}

fn question_and_history(request: &ChatRequest) -> Result<(String, String), ApiError> {
    let question = request
        .last_message()
        .ok_or_else(|| ApiError::bad_request("No question in the request body"))?;
    Ok((question.to_string(), request.formatted_history()))
}

#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Answer streamed as it is generated", content_type = "text/plain"),
        (status = 400, description = "No question in the request body", body = crate::error::ErrorResponse),
        (status = 500, description = "Rewriting or retrieval failed", body = crate::error::ErrorResponse)
    ),
    tag = "chat"
)]
#[post("/api/chat")]
pub async fn chat(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<ChatRequest>,
) -> Result<HttpResponse, ApiError> {
    let (question, chat_history) = question_and_history(&body)?;

    match state.config.chat_backend {
        ChatBackend::Local => {
            let prepared = state.chain()?.call(&question, &chat_history).await?;
            tracing::debug!("Answering from {} sources", prepared.sources.len());
            Ok(HttpResponse::Ok()
                .content_type("text/plain; charset=utf-8")
                .streaming(text_body(prepared.stream)))
        }
        ChatBackend::Remote => {
            let request = UpstreamRequest::post(REMOTE_CHAT_ENDPOINT)
                .json(&RemoteChatRequest {
                    question,
                    chat_history,
                })?
                .bearer(bearer_token(&req).as_deref());
            let response = state.upstream.send(request).await?;

            let status = StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("text/plain; charset=utf-8")
                .to_string();

            Ok(HttpResponse::build(status)
                .insert_header((CONTENT_TYPE, content_type))
                .streaming(response.bytes_stream()))
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/chat/events",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Progress events, sources and answer chunks", content_type = "text/event-stream"),
        (status = 400, description = "No question in the request body", body = crate::error::ErrorResponse)
    ),
    tag = "chat"
)]
#[post("/api/chat/events")]
pub async fn chat_events(
    state: web::Data<AppState>,
    body: web::Json<ChatRequest>,
) -> Result<impl Responder, ApiError> {
    let (question, chat_history) = question_and_history(&body)?;
    let chain = state.chain()?.clone();

    let (tx, rx) = mpsc::channel::<sse::Event>(100);

    tokio::spawn(async move {
        let mut events = chat_progress_stream(chain, question, chat_history);
        while let Some(progress) = events.next().await {
            if tx.send(progress.to_sse_event()).await.is_err() {
                tracing::debug!("Client disconnected, stopping chat turn");
                return;
            }
        }
    });

    let stream = tokio_stream::wrappers::ReceiverStream::new(rx).map(Ok::<_, actix_web::Error>);
    Ok(Sse::from_stream(stream))
}
