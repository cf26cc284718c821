use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use crate::config::ConfigError;
use crate::rag::RagError;
use crate::upstream::UpstreamError;

/// Message returned for every server-side failure. Details only go to the log.
pub const GENERIC_FAILURE: &str = "Error: Something went wrong. Try again!";

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

#[derive(Debug)]
pub enum ApiError {
    Rag(RagError),
    Upstream(UpstreamError),
    Config(ConfigError),
    InternalServerError(String),
    BadRequest(String),
    Unauthorized(String),
}

impl fmt::Display for ApiError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            ApiError::Rag(err) => write!(f, "Chat pipeline error: {err}"),
            ApiError::Upstream(err) => write!(f, "Upstream error: {err}"),
            ApiError::Config(err) => write!(f, "Configuration error: {err}"),
            ApiError::InternalServerError(msg) => write!(f, "Internal server error: {msg}"),
            ApiError::BadRequest(msg) => write!(f, "Bad request: {msg}"),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
        }
    }
}

impl ApiError {
    fn kind(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Rag(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CHAT_ERROR"),
            ApiError::Upstream(_) => (StatusCode::INTERNAL_SERVER_ERROR, "UPSTREAM_ERROR"),
            ApiError::Config(_) => (StatusCode::SERVICE_UNAVAILABLE, "NOT_CONFIGURED"),
            ApiError::InternalServerError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        self.kind().0
    }

    fn error_response(&self) -> HttpResponse {
        let (status_code, error_type) = self.kind();

        // Client errors echo their message; everything else is logged and masked.
        let message = match self {
            ApiError::BadRequest(msg) | ApiError::Unauthorized(msg) => msg.clone(),
            other => {
                tracing::error!("Request failed: {other}");
                GENERIC_FAILURE.to_string()
            }
        };

        let error_response = ErrorResponse {
            error: error_type.to_string(),
            message,
            status_code: status_code.as_u16(),
        };

        HttpResponse::build(status_code).json(error_response)
    }
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        ApiError::Rag(err)
    }
}

impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        ApiError::Upstream(err)
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::Config(err)
    }
}

// Helper functions for creating specific error types
impl ApiError {
    pub fn internal_server_error(msg: impl Into<String>) -> Self {
        ApiError::InternalServerError(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        ApiError::Unauthorized(msg.into())
    }
}
