//! Thin request builder over `reqwest` for calls to the external API server.
//!
//! Mirrors what every BFF route needs: a bearer token, an optional query
//! string, a JSON or multipart body, and either the raw streaming response or
//! a parsed JSON reply with its `Set-Cookie` headers.

use std::time::Duration;

use reqwest::Method;
use reqwest::header::{AUTHORIZATION, SET_COOKIE};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("could not encode request body: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("invalid JSON from {url}: {reason}")]
    Decode { url: String, reason: String },
}

pub enum UpstreamBody {
    Empty,
    Json(serde_json::Value),
    Multipart(reqwest::multipart::Form),
}

pub struct UpstreamRequest {
    method: Method,
    endpoint: String,
    query: Vec<(String, String)>,
    body: UpstreamBody,
    bearer: Option<String>,
    headers: Vec<(String, String)>,
    timeout: Option<Duration>,
}

impl UpstreamRequest {
    pub fn new(
        method: Method,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            query: Vec::new(),
            body: UpstreamBody::Empty,
            bearer: None,
            headers: Vec::new(),
            timeout: None,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(Method::POST, endpoint)
    }

    #[must_use]
    pub fn query(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Serializes `body` as the JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Encode`] if `body` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(
        mut self,
        body: &T,
    ) -> Result<Self, UpstreamError> {
        self.body = UpstreamBody::Json(serde_json::to_value(body)?);
        Ok(self)
    }

    #[must_use]
    pub fn multipart(
        mut self,
        form: reqwest::multipart::Form,
    ) -> Self {
        self.body = UpstreamBody::Multipart(form);
        self
    }

    /// Sets `Authorization: Bearer <token>`. Blank tokens are ignored.
    #[must_use]
    pub fn bearer(
        mut self,
        token: Option<&str>,
    ) -> Self {
        self.bearer = token.map(str::trim).filter(|t| !t.is_empty()).map(str::to_string);
        self
    }

    #[must_use]
    pub fn header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub const fn timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A fully read JSON reply.
#[derive(Debug)]
pub struct UpstreamReply {
    pub status: u16,
    pub body: serde_json::Value,
    pub set_cookies: Vec<String>,
}

#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
}

impl UpstreamClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issues the request and returns the raw response, body unread.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Request`] on connection or timeout failures.
    /// Non-2xx statuses are not errors; callers relay them.
    pub async fn send(
        &self,
        request: UpstreamRequest,
    ) -> Result<reqwest::Response, UpstreamError> {
        let url = format!("{}{}", self.base_url, request.endpoint);

        let mut builder = self.http.request(request.method, &url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = &request.bearer {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        builder = match request.body {
            UpstreamBody::Empty => builder,
            UpstreamBody::Json(value) => builder.json(&value),
            UpstreamBody::Multipart(form) => builder.multipart(form),
        };

        tracing::debug!("Forwarding to {url}");
        let response = builder
            .send()
            .await
            .map_err(|source| UpstreamError::Request { url: url.clone(), source })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::warn!("404: API not found at {url}");
        }

        Ok(response)
    }

    /// Issues the request and reads the body as JSON. An empty body reads as `null`.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Request`] on transport failures and
    /// [`UpstreamError::Decode`] when the body is not JSON.
    pub async fn send_json(
        &self,
        request: UpstreamRequest,
    ) -> Result<UpstreamReply, UpstreamError> {
        let response = self.send(request).await?;
        let url = response.url().to_string();
        let status = response.status().as_u16();
        let set_cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(str::to_string)
            .collect();

        let bytes = response
            .bytes()
            .await
            .map_err(|source| UpstreamError::Request { url: url.clone(), source })?;

        let body = if bytes.iter().all(u8::is_ascii_whitespace) {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).map_err(|e| UpstreamError::Decode {
                url,
                reason: e.to_string(),
            })?
        };

        Ok(UpstreamReply {
            status,
            body,
            set_cookies,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_bearer_is_dropped() {
        let request = UpstreamRequest::get("/auth/logout").bearer(Some("  "));
        assert!(request.bearer.is_none());

        let request = UpstreamRequest::get("/auth/logout").bearer(Some("abc"));
        assert_eq!(request.bearer.as_deref(), Some("abc"));
    }

    #[test]
    fn test_builder_collects_query_and_headers() {
        let request = UpstreamRequest::post("/auth/reset-password")
            .query("token", "t-1")
            .header("X-Request-Id", "42")
            .timeout(Duration::from_secs(5))
            .json(&serde_json::json!({ "password": "hunter2" }))
            .unwrap();

        assert_eq!(request.method, Method::POST);
        assert_eq!(request.query, vec![("token".to_string(), "t-1".to_string())]);
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.timeout, Some(Duration::from_secs(5)));
        assert!(matches!(request.body, UpstreamBody::Json(_)));
    }
}
