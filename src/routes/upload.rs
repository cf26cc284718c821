//! Streaming upload proxy.

use actix_multipart::{Field, Multipart, MultipartError};
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, post, web};
use futures::TryStreamExt;
use reqwest::multipart::{Form, Part};

use crate::auth::bearer_token;
use crate::state::AppState;
use crate::upstream::UpstreamRequest;

/// Multipart field carrying the documents.
pub const DOCS_FIELD: &str = "docs";
const UPLOAD_ENDPOINT: &str = "/embeddings/multiple/openai";

#[derive(Debug, thiserror::Error)]
enum UploadError {
    #[error("malformed multipart body: {0}")]
    Multipart(#[from] MultipartError),
    #[error("invalid part: {0}")]
    Part(#[from] reqwest::Error),
    #[error("upload exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

/// Parts of the incoming form, re-assembled for forwarding.
struct ReassembledForm {
    form: Form,
    files: usize,
}

/// Reads `field`, charging its bytes against the request-wide `remaining` budget.
async fn read_field(
    field: &mut Field,
    remaining: &mut usize,
    limit: usize,
) -> Result<Vec<u8>, UploadError> {
    let mut data = Vec::new();
    while let Some(chunk) = field.try_next().await? {
        *remaining = remaining.checked_sub(chunk.len()).ok_or(UploadError::TooLarge { limit })?;
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

async fn reassemble(
    mut payload: Multipart,
    limit: usize,
) -> Result<ReassembledForm, UploadError> {
    let mut form = Form::new();
    let mut files = 0;
    let mut remaining = limit;

    while let Some(mut field) = payload.try_next().await? {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);
        let content_type = field.content_type().map(ToString::to_string);
        let data = read_field(&mut field, &mut remaining, limit).await?;

        match filename {
            Some(filename) => {
                if name == DOCS_FIELD {
                    files += 1;
                }
                tracing::debug!("Forwarding file {filename} ({} bytes) as {name}", data.len());
                let mut part = Part::bytes(data).file_name(filename);
                if let Some(content_type) = content_type {
                    part = part.mime_str(&content_type)?;
                }
                form = form.part(name, part);
            }
            None => {
                form = form.text(name, String::from_utf8_lossy(&data).into_owned());
            }
        }
    }

    Ok(ReassembledForm { form, files })
}

#[utoipa::path(
    post,
    path = "/api/upload",
    request_body(content_type = "multipart/form-data", description = "One or more `docs` files plus optional text fields such as `namespace`"),
    responses(
        (status = 200, description = "Ingestion progress relayed from the API server", content_type = "application/json"),
        (status = 400, description = "No files provided"),
        (status = 413, description = "Upload larger than MAX_UPLOAD_BYTES"),
        (status = 500, description = "Internal server error")
    ),
    tag = "upload"
)]
#[post("/api/upload")]
pub async fn upload(
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: Multipart,
) -> HttpResponse {
    let reassembled = match reassemble(payload, state.config.max_upload_bytes).await {
        Ok(reassembled) => reassembled,
        Err(UploadError::TooLarge { limit }) => {
            tracing::warn!("Rejected upload larger than {limit} bytes");
            return HttpResponse::PayloadTooLarge()
                .json(serde_json::json!({ "error": format!("Upload exceeds the {limit} byte limit") }));
        }
        Err(e) => {
            tracing::error!("Error in upload API route: {e}");
            return HttpResponse::InternalServerError().json(serde_json::json!({ "error": "Internal server error" }));
        }
    };

    if reassembled.files == 0 {
        return HttpResponse::BadRequest().json(serde_json::json!({ "error": "No files provided" }));
    }
    tracing::info!("Forwarding {} document(s) for ingestion", reassembled.files);

    let request = UpstreamRequest::post(UPLOAD_ENDPOINT)
        .multipart(reassembled.form)
        .bearer(bearer_token(&req).as_deref())
        .timeout(state.config.upload_timeout);

    match state.upstream.send(request).await {
        Ok(response) => {
            let status = StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
            HttpResponse::build(status)
                .content_type("application/json")
                .streaming(response.bytes_stream())
        }
        Err(e) => {
            tracing::error!("Error in upload API route: {e}");
            HttpResponse::InternalServerError().json(serde_json::json!({ "error": "Internal server error" }))
        }
    }
}
